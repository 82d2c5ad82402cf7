//! Cross-panel X bounds synchronization.
//!
//! Panels in "synced" mode share one [`BoundsSyncGroup`]. The panel that
//! produced the latest user interaction publishes its X bounds; the others
//! adopt them on their next frame.

use std::sync::{Arc, RwLock};

use crate::view::Range;

const SYNC_EPSILON: f64 = 1e-9;

/// Member identifier inside a sync group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncMemberId(u64);

/// Shared store of the latest synced X bounds.
#[derive(Debug, Clone, Default)]
pub struct BoundsSyncGroup {
    inner: Arc<RwLock<SyncGroupState>>,
}

impl BoundsSyncGroup {
    /// Create an empty sync group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a member id.
    pub fn register_member(&self) -> SyncMemberId {
        let mut state = self.inner.write().expect("sync group lock");
        state.next_member_id = state.next_member_id.wrapping_add(1);
        SyncMemberId(state.next_member_id)
    }

    /// Publish X bounds chosen by a member.
    ///
    /// Republishing the same bounds from the same source is a no-op.
    pub fn publish_bounds(&self, source: SyncMemberId, x: Range) {
        let mut state = self.inner.write().expect("sync group lock");
        if let Some(current) = state.update
            && current.source == source
            && let SyncKind::Bounds(current_x) = current.kind
            && range_approx_eq(current_x, x)
        {
            return;
        }
        let seq = state.next_seq();
        state.update = Some(SyncUpdate {
            seq,
            source,
            kind: SyncKind::Bounds(x),
        });
    }

    /// Publish that a member reset its view.
    pub fn publish_reset(&self, source: SyncMemberId) {
        let mut state = self.inner.write().expect("sync group lock");
        if let Some(current) = state.update
            && matches!(current.kind, SyncKind::Reset)
            && current.source == source
        {
            return;
        }
        let seq = state.next_seq();
        state.update = Some(SyncUpdate {
            seq,
            source,
            kind: SyncKind::Reset,
        });
    }

    /// The most recent update.
    pub fn latest(&self) -> Option<SyncUpdate> {
        self.inner.read().expect("sync group lock").update
    }
}

#[derive(Debug, Default)]
struct SyncGroupState {
    next_member_id: u64,
    next_seq: u64,
    update: Option<SyncUpdate>,
}

impl SyncGroupState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq = self.next_seq.wrapping_add(1);
        self.next_seq
    }
}

/// One published change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncUpdate {
    /// Increases with every publish.
    pub seq: u64,
    /// Publishing member.
    pub source: SyncMemberId,
    /// What changed.
    pub kind: SyncKind,
}

/// Kind of a published change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncKind {
    /// New shared X bounds.
    Bounds(Range),
    /// The shared bounds were cleared.
    Reset,
}

/// A member's view of a group.
#[derive(Debug, Clone)]
pub(crate) struct SyncBinding {
    group: BoundsSyncGroup,
    member_id: SyncMemberId,
    last_seen_seq: u64,
}

impl SyncBinding {
    pub(crate) fn new(group: BoundsSyncGroup) -> Self {
        let member_id = group.register_member();
        Self {
            group,
            member_id,
            last_seen_seq: 0,
        }
    }

    pub(crate) fn publish_bounds(&mut self, x: Range) {
        self.group.publish_bounds(self.member_id, x);
        self.mark_seen();
    }

    pub(crate) fn publish_reset(&mut self) {
        self.group.publish_reset(self.member_id);
        self.mark_seen();
    }

    /// An update from another member not yet seen by this one.
    pub(crate) fn poll(&mut self) -> Option<SyncKind> {
        let update = self.group.latest()?;
        if update.seq == self.last_seen_seq {
            return None;
        }
        self.last_seen_seq = update.seq;
        if update.source == self.member_id {
            return None;
        }
        Some(update.kind)
    }

    fn mark_seen(&mut self) {
        if let Some(update) = self.group.latest() {
            self.last_seen_seq = update.seq;
        }
    }
}

fn range_approx_eq(a: Range, b: Range) -> bool {
    (a.min - b.min).abs() <= SYNC_EPSILON && (a.max - b.max).abs() <= SYNC_EPSILON
}

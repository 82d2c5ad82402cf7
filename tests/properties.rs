use proptest::prelude::*;
use serde_json::json;

use tsplot::{
    BlockTopicCursor, Datum, MessageBlock, MessageEvent, Range, SeriesDescriptor, SeriesKey, Size,
    Time, TimestampDatasets, UpdateDataAction, Viewport,
};

fn key() -> SeriesKey {
    SeriesKey::new("0:receiveTime:/topic.value")
}

fn configured() -> TimestampDatasets {
    let mut datasets = TimestampDatasets::new();
    datasets.apply(UpdateDataAction::UpdateSeriesConfig {
        series: vec![SeriesDescriptor {
            key: key(),
            index: 0,
            label: "/topic.value".to_string(),
        }],
    });
    datasets
}

fn datum(x: f64, y: f64) -> Datum {
    Datum {
        x,
        y,
        receive_time: Time::from_seconds(x),
        header_stamp: None,
        value: json!(y),
    }
}

fn ascending_items() -> impl Strategy<Value = Vec<Datum>> {
    prop::collection::vec((0.0_f64..5.0, -1.0e3_f64..1.0e3), 1..3000).prop_map(|steps| {
        let mut x = 0.0;
        steps
            .into_iter()
            .map(|(dx, y)| {
                x += dx;
                datum(x, y)
            })
            .collect()
    })
}

fn split_batches(items: Vec<Datum>, batch: usize) -> Vec<Vec<Datum>> {
    items.chunks(batch.max(1)).map(<[Datum]>::to_vec).collect()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn downsampling_keeps_first_and_last_sample(
        items in ascending_items(),
        batch in 1_usize..500,
        width in 1_u16..600,
    ) {
        let mut datasets = configured();
        let first = items[0].clone();
        let last = items[items.len() - 1].clone();
        for batch in split_batches(items, batch) {
            datasets.apply(UpdateDataAction::AppendFull { series: key(), items: batch });
        }
        let viewport =
            Viewport::from_x(Range::new(first.x, last.x), Size::new(f32::from(width), 100.0));
        let out = datasets.viewport_datasets(&viewport);
        let data = &out[0].data;
        prop_assert!(data.len() <= usize::from(width) * 4 + 64);
        prop_assert_eq!(data.first(), Some(&first));
        prop_assert_eq!(data.last(), Some(&last));
    }

    #[test]
    fn csv_data_returns_every_appended_sample(
        items in ascending_items(),
        batch in 1_usize..200,
        live in any::<bool>(),
    ) {
        let mut datasets = configured();
        let expected = items.clone();
        for batch in split_batches(items, batch) {
            let action = if live {
                UpdateDataAction::AppendCurrent { series: key(), items: batch }
            } else {
                UpdateDataAction::AppendFull { series: key(), items: batch }
            };
            datasets.apply(action);
        }
        let csv = datasets.csv_data();
        prop_assert_eq!(csv.len(), 1);
        prop_assert_eq!(&csv[0].data, &expected);
    }

    #[test]
    fn reset_current_discards_previous_live_data(
        before in ascending_items(),
        after in ascending_items(),
    ) {
        let mut datasets = configured();
        datasets.apply_actions([
            UpdateDataAction::AppendCurrent { series: key(), items: before },
            UpdateDataAction::ResetCurrent { series: key() },
            UpdateDataAction::AppendCurrent { series: key(), items: after.clone() },
        ]);
        prop_assert_eq!(datasets.series_len(&key()), Some((0, after.len())));
        prop_assert_eq!(&datasets.csv_data()[0].data, &after);
    }

    #[test]
    fn appending_blocks_never_resets_cursor(initial in 1_usize..8, appended in 0_usize..8) {
        let make_block = |i: usize| {
            let event = MessageEvent::new("/topic", Time::new(i as i64, 0), json!({ "value": i }));
            Some(std::sync::Arc::new(MessageBlock::new().with_topic("/topic", vec![event])))
        };
        let mut blocks: Vec<_> = (0..initial).map(make_block).collect();
        let mut cursor = BlockTopicCursor::new("/topic");
        while cursor.next(&blocks).is_some() {}
        blocks.extend((initial..initial + appended).map(make_block));
        prop_assert!(!cursor.next_will_reset(&blocks));

        let replaced: Vec<_> = (0..initial + appended).map(make_block).collect();
        prop_assert!(cursor.next_will_reset(&replaced));
        prop_assert!(cursor.next_will_reset(&blocks[..initial - 1]));
    }
}

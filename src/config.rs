//! Persisted plot settings and runtime tuning.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::math::MathFunction;
use crate::series::TimestampMethod;

/// How X values are derived for every series of a plot.
///
/// Switching modes swaps the whole dataset builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum XAxisMode {
    /// Seconds since start, from preloaded blocks and live frames.
    #[default]
    Timestamp,
    /// Seconds since start, from live frames only.
    PartialTimestamp,
    /// Array index within the latest message.
    Index,
    /// Values of another message path, accumulated over time.
    Custom,
    /// Values of another message path, latest message only.
    CurrentCustom,
}

impl XAxisMode {
    /// Whether the mode reads its X values from [`PlotConfig::x_axis_path`].
    pub fn uses_x_path(self) -> bool {
        matches!(self, Self::Custom | Self::CurrentCustom)
    }
}

/// One configured series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlotPath {
    /// Message path expression for Y values.
    pub value: String,
    /// Disabled series are kept in settings but not plotted.
    pub enabled: bool,
    /// Which timestamp positions samples on the X axis.
    pub timestamp_method: TimestampMethod,
    /// Legend label; defaults to the path.
    pub label: Option<String>,
    /// Optional function applied to every Y value.
    pub math_modifier: Option<String>,
}

impl Default for PlotPath {
    fn default() -> Self {
        Self {
            value: String::new(),
            enabled: true,
            timestamp_method: TimestampMethod::default(),
            label: None,
            math_modifier: None,
        }
    }
}

impl PlotPath {
    /// An enabled receive-time series for a path.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Set the timestamp method.
    pub fn with_timestamp_method(mut self, method: TimestampMethod) -> Self {
        self.timestamp_method = method;
        self
    }

    /// Set the math modifier.
    pub fn with_math(mut self, function: MathFunction) -> Self {
        self.math_modifier = Some(function.name().to_string());
        self
    }

    /// Set the legend label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// The X path used by the custom axis modes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XAxisPath {
    /// Message path expression for X values.
    pub value: String,
    /// Whether the path is in use.
    pub enabled: bool,
}

/// Persisted settings of one plot panel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlotConfig {
    /// Configured series, in legend order.
    pub paths: Vec<PlotPath>,
    /// X axis mode.
    pub x_axis_val: XAxisMode,
    /// X path for the custom modes.
    pub x_axis_path: Option<XAxisPath>,
    /// Fixed X minimum.
    pub min_x_value: Option<f64>,
    /// Fixed X maximum.
    pub max_x_value: Option<f64>,
    /// Fixed Y minimum.
    pub min_y_value: Option<f64>,
    /// Fixed Y maximum.
    pub max_y_value: Option<f64>,
    /// Share X bounds with other synced panels.
    pub is_synced: bool,
    /// Show only the trailing window of this many seconds while playing.
    pub following_view_width: Option<f64>,
}

impl PlotConfig {
    /// Decode settings from their persisted JSON form.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode settings into their persisted JSON form.
    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The X path expression, when the active mode uses one.
    pub fn active_x_path(&self) -> Option<&str> {
        if !self.x_axis_val.uses_x_path() {
            return None;
        }
        self.x_axis_path
            .as_ref()
            .filter(|path| path.enabled && !path.value.trim().is_empty())
            .map(|path| path.value.as_str())
    }
}

/// Runtime tuning for a [`PlotCoordinator`](crate::coordinator::PlotCoordinator).
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Zoom factor change per wheel delta unit.
    pub wheel_zoom_sensitivity: f64,
    /// Padding fraction applied to auto-fitted Y bounds.
    pub padding_frac: f64,
    /// Minimum padding applied to auto-fitted Y bounds.
    pub min_padding: f64,
    /// Pixel radius for hover hit testing.
    pub hover_threshold_px: f32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            wheel_zoom_sensitivity: 0.002,
            padding_frac: 0.05,
            min_padding: 1e-6,
            hover_threshold_px: 12.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_camel_case_settings() {
        let config = PlotConfig::from_json(
            r#"{
                "paths": [
                    { "value": "/odom.twist.linear.x", "timestampMethod": "headerStamp" },
                    { "value": "/cmd_vel.linear.x", "enabled": false, "mathModifier": "abs" }
                ],
                "xAxisVal": "partialTimestamp",
                "isSynced": true,
                "followingViewWidth": 5
            }"#,
        )
        .unwrap();
        assert_eq!(config.paths.len(), 2);
        assert!(config.paths[0].enabled);
        assert_eq!(config.paths[0].timestamp_method, TimestampMethod::HeaderStamp);
        assert_eq!(config.paths[1].math_modifier.as_deref(), Some("abs"));
        assert_eq!(config.x_axis_val, XAxisMode::PartialTimestamp);
        assert!(config.is_synced);
        assert_eq!(config.following_view_width, Some(5.0));
    }

    #[test]
    fn rejects_unknown_axis_mode() {
        let err = PlotConfig::from_json(r#"{ "xAxisVal": "sideways" }"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn active_x_path_requires_custom_mode() {
        let mut config = PlotConfig {
            x_axis_path: Some(XAxisPath {
                value: "/pose.x".to_string(),
                enabled: true,
            }),
            ..PlotConfig::default()
        };
        assert_eq!(config.active_x_path(), None);
        config.x_axis_val = XAxisMode::Custom;
        assert_eq!(config.active_x_path(), Some("/pose.x"));
    }
}

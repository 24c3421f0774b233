//! Traffic flow and incident results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speed estimate for the road segment nearest a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSegmentData {
    /// Functional road class, e.g. `FRC2`.
    pub frc: String,
    /// km/h
    pub current_speed: f64,
    /// km/h
    pub free_flow_speed: f64,
    /// 0.0–1.0
    pub confidence: f64,
}

/// Canonical traffic flow result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResult {
    pub flow_segment_data: FlowSegmentData,
}

impl FlowResult {
    /// Plausible urban values used when no provider can answer, so map
    /// overlays always have something to draw.
    pub fn default_estimate() -> Self {
        Self {
            flow_segment_data: FlowSegmentData {
                frc: "FRC3".to_string(),
                current_speed: 30.0,
                free_flow_speed: 50.0,
                confidence: 0.5,
            },
        }
    }

    /// `current / free_flow`, clamped to `[0, 1]`.
    pub fn congestion_ratio(&self) -> f64 {
        let d = &self.flow_segment_data;
        if d.free_flow_speed <= 0.0 {
            return 1.0;
        }
        (d.current_speed / d.free_flow_speed).clamp(0.0, 1.0)
    }
}

/// Incident geometry as GeoJSON-style coordinates (`[lon, lat]` pairs).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncidentGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: serde_json::Value,
}

/// A single traffic incident.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub icon_category: u32,
    pub magnitude_of_delay: u32,
    pub description: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub delay_seconds: Option<f64>,
    pub length_meters: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub geometry: Option<IncidentGeometry>,
}

/// Result of `traffic_incidents`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncidentResponse {
    pub incidents: Vec<Incident>,
}

impl IncidentResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

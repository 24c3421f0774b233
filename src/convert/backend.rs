//! Backend proxy `/api/traffic/nearby` aggregate.
//!
//! The proxy answers either a flat speed record or one already wrapped in
//! `flowSegmentData`; field names are accepted in camelCase or snake_case.

use serde::Deserialize;

use crate::types::{FlowResult, FlowSegmentData};
use crate::{Result, WaypostError};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NearbyBody {
    Wrapped {
        #[serde(rename = "flowSegmentData")]
        flow_segment_data: NearbyFlow,
    },
    Flat(NearbyFlow),
}

#[derive(Debug, Deserialize)]
pub struct NearbyFlow {
    frc: Option<String>,
    #[serde(
        alias = "currentSpeed",
        alias = "averageSpeed",
        alias = "average_speed"
    )]
    current_speed: Option<f64>,
    #[serde(alias = "freeFlowSpeed")]
    free_flow_speed: Option<f64>,
    confidence: Option<f64>,
}

/// Map the proxy aggregate onto the canonical flow shape. Missing
/// free-flow and confidence values take the default estimate's.
pub fn flow(body: NearbyBody) -> Result<FlowResult> {
    let data = match body {
        NearbyBody::Wrapped { flow_segment_data } => flow_segment_data,
        NearbyBody::Flat(flat) => flat,
    };
    let current_speed = data
        .current_speed
        .ok_or_else(|| WaypostError::DataError("backend flow without speed".into()))?;
    let defaults = FlowResult::default_estimate().flow_segment_data;
    Ok(FlowResult {
        flow_segment_data: FlowSegmentData {
            frc: data.frc.unwrap_or(defaults.frc),
            current_speed,
            free_flow_speed: data.free_flow_speed.unwrap_or(defaults.free_flow_speed),
            confidence: data.confidence.unwrap_or(defaults.confidence),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_snake_case() {
        let body: NearbyBody =
            serde_json::from_str(r#"{"average_speed":22.5,"free_flow_speed":45}"#).unwrap();
        let out = flow(body).unwrap();
        assert_eq!(out.flow_segment_data.current_speed, 22.5);
        assert_eq!(out.flow_segment_data.free_flow_speed, 45.0);
        assert_eq!(out.flow_segment_data.confidence, 0.5);
    }

    #[test]
    fn wrapped_camel_case() {
        let body: NearbyBody = serde_json::from_str(
            r#"{"flowSegmentData":{"frc":"FRC2","currentSpeed":40,"freeFlowSpeed":60,"confidence":0.9}}"#,
        )
        .unwrap();
        let out = flow(body).unwrap();
        assert_eq!(out.flow_segment_data.frc, "FRC2");
        assert_eq!(out.flow_segment_data.confidence, 0.9);
    }

    #[test]
    fn missing_speed_is_error() {
        let body: NearbyBody = serde_json::from_str(r#"{"count":0}"#).unwrap();
        assert!(flow(body).is_err());
    }
}

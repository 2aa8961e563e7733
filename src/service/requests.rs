//! Wire DTOs exchanged with the surrounding backend

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::Location;
use crate::optimizer::{OptimizationType, Recommendation, RecommendationType};
use crate::simulation::SimulationResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub sensor_id: Option<i64>,
    pub knowledge_id: Option<i64>,
    #[validate(range(min = 1, max = 3650))]
    pub days_back: Option<u32>,
}

impl TrainingRequest {
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Explicit 0/1 schedule, required when no optimization is requested
    #[serde(default)]
    pub operation: Option<Vec<u8>>,
    pub starting_temperature: f64,
    /// `DD/MM/YYYY HH:MM`
    pub starting_time: String,
    /// Outdoor forecast starting at `startingTime`, at least `duration + 1` values
    #[validate(length(min = 2))]
    pub outdoor_temperatures: Vec<f64>,
    pub setpoint: f64,
    /// Steps of 5 minutes, clamped to 1..=288
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub optimization_type: Option<OptimizationType>,
}

impl PredictionRequest {
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub total_energy: f64,
    pub temperatures: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_operation: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_type: Option<RecommendationType>,
}

impl From<SimulationResult> for PredictionResponse {
    fn from(result: SimulationResult) -> Self {
        Self {
            total_energy: result.total_energy,
            temperatures: result.temperatures,
            recommended_operation: None,
            savings_percentage: None,
            recommendation_type: None,
        }
    }
}

impl From<Recommendation> for PredictionResponse {
    fn from(recommendation: Recommendation) -> Self {
        Self {
            total_energy: recommendation.total_energy,
            temperatures: recommendation.temperatures,
            recommended_operation: Some(recommendation.recommended_operation.to_flags()),
            savings_percentage: Some(recommendation.savings_percentage),
            recommendation_type: Some(recommendation.recommendation_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_request_camel_case() {
        let json = r#"{
            "latitude": 40.0,
            "longitude": -3.7,
            "startingTemperature": 25.0,
            "startingTime": "15/07/2024 14:00",
            "outdoorTemperatures": [30.0, 30.5, 31.0],
            "setpoint": 24.0,
            "duration": 2,
            "optimizationType": "peak"
        }"#;
        let request: PredictionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.optimization_type, Some(OptimizationType::Peak));
        assert_eq!(request.operation, None);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_coordinates_fail_validation() {
        let request = TrainingRequest {
            latitude: 120.0,
            longitude: 0.0,
            sensor_id: None,
            knowledge_id: None,
            days_back: Some(0),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("latitude"));
        assert!(fields.contains_key("days_back"));
    }

    #[test]
    fn test_plain_response_omits_recommendation() {
        let response = PredictionResponse::from(SimulationResult {
            total_energy: 1.0,
            temperatures: vec![25.0, 24.5],
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["totalEnergy"], 1.0);
        assert!(json.get("recommendedOperation").is_none());
    }
}

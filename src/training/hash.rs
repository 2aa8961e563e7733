use sha2::{Digest, Sha256};

use crate::domain::TrainingSample;

/// SHA-256 hex digest identifying the samples a model was trained on.
///
/// Each sample contributes one line
/// `timestamp|indoor|outdoor|operation|energy|setpoint|inlet|outlet`, absent
/// readings left empty.
pub fn data_hash(samples: &[TrainingSample]) -> String {
    let mut hasher = Sha256::new();
    for sample in samples {
        let line = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}\n",
            sample.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            sample.indoor_temp,
            sample.outdoor_temp,
            u8::from(sample.operation),
            sample.energy_consumption,
            optional(sample.setpoint),
            optional(sample.inlet_temp),
            optional(sample.outlet_temp),
        );
        hasher.update(line.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Multipliers applied to the three objective components before they are summed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ObjectiveWeights {
    pub route: f64,
    pub time_deviation: f64,
    pub congestion: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        ObjectiveWeights {
            route: 1.0,
            time_deviation: 1.0,
            congestion: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_weights_default_to_one() {
        let weights: ObjectiveWeights = serde_json::from_str(r#"{ "congestion": 50.0 }"#).unwrap();

        assert_eq!(weights.route, 1.0);
        assert_eq!(weights.time_deviation, 1.0);
        assert_eq!(weights.congestion, 50.0);
    }
}

use serde::{Deserialize, Serialize};

/// Class names in the order of the model's output vector.
///
/// Nothing in the ONNX artifact carries these names, so a retrained model
/// with a different label set must ship with an updated list.
pub const CLASS_NAMES: [&str; 5] = [
    "Bacterial_spot",
    "Healthy",
    "Septoria_leaf_spot",
    "Spider_mites_Two_spotted_spider_mite",
    "YellowLeaf__Curl_Virus",
];

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    #[serde(rename = "Hello")]
    pub hello: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        HealthResponse {
            hello: "World".to_string(),
        }
    }
}

/// Outcome of one forward pass: the winning label and its raw score.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: &'static str,
    pub index: usize,
    pub confidence: f32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub class: String,
    pub confidence: String,
}

impl From<Prediction> for PredictionResponse {
    fn from(prediction: Prediction) -> Self {
        PredictionResponse {
            class: prediction.label.to_string(),
            // Debug keeps a fractional part on whole numbers ("1.0", not "1")
            confidence: format!("{:?}", prediction.confidence),
        }
    }
}

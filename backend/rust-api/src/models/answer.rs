use serde::{Deserialize, Serialize};

/// One solution step of a question, as authored in the content catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Raw markup of every accepted form of the step's answer.
    pub accepted_answers: Vec<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckStepRequest {
    pub input: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StepCheck {
    pub step_index: usize,
    pub step_count: usize,
    pub correct: bool,
    pub normalized_input: String,
}

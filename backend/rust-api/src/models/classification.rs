use serde::{Deserialize, Serialize};

use super::hint::BehaviorType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BehaviorCategory {
    SignError,
    MagnitudeError,
    Repetition,
    CloseAttempt,
    Guessing,
    Random,
    Default,
}

impl BehaviorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorCategory::SignError => "sign-error",
            BehaviorCategory::MagnitudeError => "magnitude-error",
            BehaviorCategory::Repetition => "repetition",
            BehaviorCategory::CloseAttempt => "close-attempt",
            BehaviorCategory::Guessing => "guessing",
            BehaviorCategory::Random => "random",
            BehaviorCategory::Default => "default",
        }
    }

    /// Hint behavior type used to pick a hint for this attempt pattern.
    pub fn hint_behavior(&self) -> BehaviorType {
        match self {
            BehaviorCategory::SignError | BehaviorCategory::MagnitudeError => {
                BehaviorType::Struggling
            }
            BehaviorCategory::Repetition => BehaviorType::Repeating,
            BehaviorCategory::CloseAttempt => BehaviorType::SelfCorrection,
            BehaviorCategory::Guessing | BehaviorCategory::Random => BehaviorType::Guessing,
            BehaviorCategory::Default => BehaviorType::General,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: BehaviorCategory,
    pub user_input: String,
    pub correct_answer: String,
    pub attempt_history: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub user_input: String,
    pub correct_answer: String,
    #[serde(default)]
    pub attempt_history: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyResponse {
    #[serde(flatten)]
    pub result: ClassificationResult,
    pub hint_behavior: BehaviorType,
}

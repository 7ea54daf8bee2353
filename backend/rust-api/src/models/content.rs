use serde::{Deserialize, Serialize};

use super::answer::StepSpec;
use super::hint::HintKey;

/// Question document as stored in the `questions` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionContent {
    pub topic_id: i64,
    pub category_id: i64,
    pub question_id: i64,
    #[serde(default)]
    pub topic_title: String,
    #[serde(default)]
    pub category_title: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub guidance: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl QuestionContent {
    pub fn key(&self) -> HintKey {
        HintKey::new(self.topic_id, self.category_id, self.question_id)
    }

    pub fn step(&self, step_index: usize) -> Option<&StepSpec> {
        self.steps.get(step_index)
    }

    /// Descriptive context handed to the hint generation service.
    pub fn context(&self) -> String {
        let mut lines = Vec::new();
        if !self.topic_title.is_empty() {
            lines.push(format!("Topic: {}", self.topic_title));
        }
        if !self.category_title.is_empty() {
            lines.push(format!("Category: {}", self.category_title));
        }
        lines.push(format!("Question: {}", self.prompt));
        if let Some(guidance) = self.guidance.as_deref().filter(|g| !g.trim().is_empty()) {
            lines.push(format!("Guidance: {}", guidance));
        }
        lines.join("\n")
    }
}

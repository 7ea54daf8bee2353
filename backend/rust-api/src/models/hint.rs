use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Composite identity of a question's hint set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HintKey {
    pub topic_id: i64,
    pub category_id: i64,
    pub question_id: i64,
}

impl HintKey {
    pub fn new(topic_id: i64, category_id: i64, question_id: i64) -> Self {
        Self {
            topic_id,
            category_id,
            question_id,
        }
    }
}

impl fmt::Display for HintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "topic={} category={} question={}",
            self.topic_id, self.category_id, self.question_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BehaviorType {
    Struggling,
    Guessing,
    Repeating,
    SelfCorrection,
    General,
}

impl BehaviorType {
    pub const ALL: [BehaviorType; 5] = [
        BehaviorType::Struggling,
        BehaviorType::Guessing,
        BehaviorType::Repeating,
        BehaviorType::SelfCorrection,
        BehaviorType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorType::Struggling => "struggling",
            BehaviorType::Guessing => "guessing",
            BehaviorType::Repeating => "repeating",
            BehaviorType::SelfCorrection => "self-correction",
            BehaviorType::General => "general",
        }
    }
}

impl FromStr for BehaviorType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace(['_', '-'], "");
        match normalized.as_str() {
            "struggling" => Ok(BehaviorType::Struggling),
            "guessing" => Ok(BehaviorType::Guessing),
            "repeating" => Ok(BehaviorType::Repeating),
            "selfcorrection" => Ok(BehaviorType::SelfCorrection),
            "general" => Ok(BehaviorType::General),
            _ => Err(format!("Invalid behavior type: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One hint for one step, aimed at one behavior pattern.
///
/// Field names follow the generation service's camelCase wire format, which is
/// also what gets persisted in the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRecord {
    pub step_index: usize,
    pub hint_text: String,
    pub behavior_type: BehaviorType,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintSource {
    Generated,
    Fallback,
}

impl HintSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HintSource::Generated => "generated",
            HintSource::Fallback => "fallback",
        }
    }
}

/// Immutable hint set for a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHintSet {
    pub topic_id: i64,
    pub category_id: i64,
    pub question_id: i64,
    pub hints: Vec<HintRecord>,
    pub generated_at: DateTime<Utc>,
    pub source: HintSource,
}

impl SessionHintSet {
    pub fn new(key: HintKey, hints: Vec<HintRecord>, source: HintSource) -> Self {
        Self {
            topic_id: key.topic_id,
            category_id: key.category_id,
            question_id: key.question_id,
            hints,
            generated_at: Utc::now(),
            source,
        }
    }

    pub fn key(&self) -> HintKey {
        HintKey::new(self.topic_id, self.category_id, self.question_id)
    }

    pub fn has_general_hint(&self) -> bool {
        self.hints
            .iter()
            .any(|hint| hint.behavior_type == BehaviorType::General)
    }
}

/// Body sent to the hint generation service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HintGenerationRequest {
    pub topic_id: i64,
    pub category_id: i64,
    pub question_id: i64,
    pub question_context: String,
    /// Normalized accepted answers, one list per step.
    pub expected_answers: Vec<Vec<String>>,
    pub behavior_types: Vec<BehaviorType>,
    pub step_count: usize,
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HintGenerationResponse {
    pub hints: Vec<HintRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveHintQuery {
    #[serde(default)]
    pub behavior: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolvedHintResponse {
    pub step_index: usize,
    pub behavior_type: BehaviorType,
    pub hint_text: String,
    pub source: HintSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behavior_type_parses_loose_spellings() {
        assert_eq!(
            "self-correction".parse::<BehaviorType>().unwrap(),
            BehaviorType::SelfCorrection
        );
        assert_eq!(
            "Self_Correction".parse::<BehaviorType>().unwrap(),
            BehaviorType::SelfCorrection
        );
        assert_eq!(
            " GUESSING ".parse::<BehaviorType>().unwrap(),
            BehaviorType::Guessing
        );
        assert!("lucky".parse::<BehaviorType>().is_err());
    }

    #[test]
    fn hint_record_uses_camel_case_wire_format() {
        let json = serde_json::json!({
            "stepIndex": 1,
            "hintText": "Isolate x first.",
            "behaviorType": "self-correction",
            "difficulty": "hard"
        });
        let record: HintRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.step_index, 1);
        assert_eq!(record.behavior_type, BehaviorType::SelfCorrection);
        assert_eq!(record.difficulty, Difficulty::Hard);
    }

    #[test]
    fn generation_response_without_hints_is_rejected() {
        let parsed = serde_json::from_str::<HintGenerationResponse>(r#"{"items": []}"#);
        assert!(parsed.is_err());
    }
}

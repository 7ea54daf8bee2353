use std::sync::Arc;

use crate::error::{HintError, HintResult};
use crate::metrics::ANSWERS_CHECKED_TOTAL;
use crate::models::answer::StepCheck;
use crate::models::{HintKey, QuestionContent, StepSpec};

use super::content_service::ContentCatalog;
use super::notation::normalize;

/// Normalized forms of a step's accepted variants, in authoring order,
/// without duplicates or empty entries.
pub fn accepted_answers(step: &StepSpec) -> Vec<String> {
    let mut answers: Vec<String> = Vec::with_capacity(step.accepted_answers.len());
    for variant in &step.accepted_answers {
        let normalized = normalize(variant);
        if !normalized.is_empty() && !answers.contains(&normalized) {
            answers.push(normalized);
        }
    }
    answers
}

/// Exact match of the normalized input against any normalized variant.
///
/// This is string equality after normalization, not algebraic equivalence:
/// `2x` and `x·2` only match if both are declared as variants.
pub fn is_correct(step: &StepSpec, raw_input: &str) -> bool {
    let input = normalize(raw_input);
    !input.is_empty() && step.accepted_answers.iter().any(|v| normalize(v) == input)
}

/// Accepted answers for every step of a question.
pub fn expected_answers(content: &QuestionContent) -> Vec<Vec<String>> {
    content.steps.iter().map(accepted_answers).collect()
}

pub struct AnswerService {
    catalog: Arc<dyn ContentCatalog>,
}

impl AnswerService {
    pub fn new(catalog: Arc<dyn ContentCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn check_step(
        &self,
        key: &HintKey,
        step_index: usize,
        raw_input: &str,
    ) -> HintResult<StepCheck> {
        let content = self.load_question(key).await?;
        let step = content.step(step_index).ok_or_else(|| {
            HintError::not_found(format!("step {} of question {}", step_index, key))
        })?;

        let correct = is_correct(step, raw_input);
        let correct_label = if correct { "true" } else { "false" };
        ANSWERS_CHECKED_TOTAL
            .with_label_values(&[correct_label])
            .inc();

        tracing::info!(
            "Step checked: {}, step={}, correct={}",
            key,
            step_index,
            correct
        );

        Ok(StepCheck {
            step_index,
            step_count: content.steps.len(),
            correct,
            normalized_input: normalize(raw_input),
        })
    }

    async fn load_question(&self, key: &HintKey) -> HintResult<QuestionContent> {
        self.catalog
            .question(key)
            .await?
            .ok_or_else(|| HintError::not_found(format!("question {}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(variants: &[&str]) -> StepSpec {
        StepSpec {
            accepted_answers: variants.iter().map(|v| v.to_string()).collect(),
            placeholder: None,
        }
    }

    #[test]
    fn every_variant_is_accepted() {
        let spec = step(&["2x + 6", r"2 \cdot x + 6", r"6 + 2x"]);
        for variant in &spec.accepted_answers {
            assert!(is_correct(&spec, variant), "{variant}");
        }
    }

    #[test]
    fn spacing_only_differences_match() {
        let spec = step(&["2x + 6"]);
        assert!(is_correct(&spec, "  2x   +  6 "));
        assert!(is_correct(&spec, "2x\t+\n6"));
    }

    #[test]
    fn markup_and_plain_forms_match_after_normalization() {
        let spec = step(&[r"\frac{1}{2}"]);
        assert!(is_correct(&spec, "(1)/(2)"));
        let spec = step(&["x^{2}"]);
        assert!(is_correct(&spec, "x^2"));
    }

    #[test]
    fn no_algebraic_equivalence() {
        let spec = step(&["2x + 6"]);
        assert!(!is_correct(&spec, "6 + 2x"));
        assert!(!is_correct(&spec, "2(x + 3)"));
    }

    #[test]
    fn empty_input_is_never_correct() {
        let spec = step(&["", "4"]);
        assert!(!is_correct(&spec, ""));
        assert!(!is_correct(&spec, "   "));
        assert!(is_correct(&spec, "4"));
    }

    #[test]
    fn accepted_answers_are_deduplicated_in_order() {
        let spec = step(&["x = 4", "x=4", "x  =  4", ""]);
        assert_eq!(accepted_answers(&spec), vec!["x = 4", "x=4"]);
    }
}

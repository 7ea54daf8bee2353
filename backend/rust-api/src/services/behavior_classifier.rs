//! Attempt-pattern classification.
//!
//! Rules are evaluated top to bottom and the first match wins. Specific
//! diagnoses (sign flip, literal repetition) sit above the statistical ones,
//! which need enough history to mean anything.

use serde::Deserialize;

use crate::metrics::ATTEMPTS_CLASSIFIED_TOTAL;
use crate::models::{BehaviorCategory, ClassificationResult};

use super::notation::normalize;

pub const DEFAULT_CLOSE_ATTEMPT_PERCENT: f64 = 20.0;
pub const DEFAULT_MAGNITUDE_HIGH: (f64, f64) = (10.0, 100.0);
pub const DEFAULT_MAGNITUDE_LOW: (f64, f64) = (0.01, 0.1);
pub const DEFAULT_GUESSING_MIN_HISTORY: usize = 3;
pub const DEFAULT_GUESSING_SPREAD_FACTOR: f64 = 0.5;
pub const DEFAULT_REPETITION_MIN_OCCURRENCES: usize = 2;
pub const DEFAULT_RANDOM_MIN_HISTORY: usize = 2;

/// Tunable limits of the numeric detectors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Relative error (in percent) still counted as a close attempt.
    pub close_attempt_percent: f64,
    /// `|user / correct|` in `[low, high)` is an order-of-magnitude slip upwards.
    pub magnitude_high: (f64, f64),
    /// `|user / correct|` in `(low, high]` is an order-of-magnitude slip downwards.
    pub magnitude_low: (f64, f64),
    pub guessing_min_history: usize,
    /// Guessing when the deviation variance exceeds `(|correct| * factor)^2`.
    pub guessing_spread_factor: f64,
    pub repetition_min_occurrences: usize,
    pub random_min_history: usize,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            close_attempt_percent: DEFAULT_CLOSE_ATTEMPT_PERCENT,
            magnitude_high: DEFAULT_MAGNITUDE_HIGH,
            magnitude_low: DEFAULT_MAGNITUDE_LOW,
            guessing_min_history: DEFAULT_GUESSING_MIN_HISTORY,
            guessing_spread_factor: DEFAULT_GUESSING_SPREAD_FACTOR,
            repetition_min_occurrences: DEFAULT_REPETITION_MIN_OCCURRENCES,
            random_min_history: DEFAULT_RANDOM_MIN_HISTORY,
        }
    }
}

/// Everything a rule may look at, parsed once per classification.
pub struct AttemptContext<'a> {
    pub input: String,
    pub user_num: Option<f64>,
    pub correct_num: Option<f64>,
    pub history: Vec<String>,
    pub thresholds: &'a ClassifierThresholds,
}

impl<'a> AttemptContext<'a> {
    pub fn new(
        user_input: &str,
        correct_answer: &str,
        attempt_history: &[String],
        thresholds: &'a ClassifierThresholds,
    ) -> Self {
        Self {
            input: normalize(user_input),
            user_num: parse_number(user_input),
            correct_num: parse_number(correct_answer),
            history: attempt_history.iter().map(|a| normalize(a)).collect(),
            thresholds,
        }
    }

    fn numbers(&self) -> Option<(f64, f64)> {
        Some((self.user_num?, self.correct_num?))
    }
}

pub type RulePredicate = fn(&AttemptContext<'_>) -> bool;

pub struct Rule {
    pub category: BehaviorCategory,
    pub matches: RulePredicate,
}

/// Ordered rule table; `Default` applies when nothing here matches.
pub static RULES: &[Rule] = &[
    Rule {
        category: BehaviorCategory::SignError,
        matches: is_sign_error,
    },
    Rule {
        category: BehaviorCategory::Repetition,
        matches: is_repetition,
    },
    Rule {
        category: BehaviorCategory::CloseAttempt,
        matches: is_close_attempt,
    },
    Rule {
        category: BehaviorCategory::MagnitudeError,
        matches: is_magnitude_error,
    },
    Rule {
        category: BehaviorCategory::Guessing,
        matches: is_guessing,
    },
    Rule {
        category: BehaviorCategory::Random,
        matches: is_random,
    },
];

/// Parses learner input as a number after normalization; `None` when the
/// input is not a plain finite number. Inner spaces are accepted only as
/// thousands separators (`1 000`), so `2 3` is not a number.
pub fn parse_number(raw: &str) -> Option<f64> {
    let normalized = normalize(raw).replace('−', "-");
    let mut groups = normalized.split(' ');
    let mut compact = groups.next()?.to_string();

    for group in groups {
        let lead_digits = compact.trim_start_matches(['-', '+']);
        let is_grouping = group.len() == 3
            && group.chars().all(|c| c.is_ascii_digit())
            && !lead_digits.is_empty()
            && lead_digits.chars().all(|c| c.is_ascii_digit());
        if !is_grouping {
            return None;
        }
        compact.push_str(group);
    }

    compact.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn is_sign_error(ctx: &AttemptContext<'_>) -> bool {
    ctx.numbers()
        .is_some_and(|(user, correct)| user.abs() == correct.abs() && user != correct)
}

pub fn is_repetition(ctx: &AttemptContext<'_>) -> bool {
    let min = ctx.thresholds.repetition_min_occurrences;
    if ctx.input.is_empty() || ctx.history.len() < min {
        return false;
    }
    ctx.history.iter().filter(|a| **a == ctx.input).count() >= min
}

pub fn is_close_attempt(ctx: &AttemptContext<'_>) -> bool {
    ctx.numbers().is_some_and(|(user, correct)| {
        correct != 0.0
            && (user - correct).abs() / correct.abs() * 100.0 <= ctx.thresholds.close_attempt_percent
    })
}

pub fn is_magnitude_error(ctx: &AttemptContext<'_>) -> bool {
    ctx.numbers().is_some_and(|(user, correct)| {
        if correct == 0.0 {
            return false;
        }
        let ratio = (user / correct).abs();
        let (high_min, high_max) = ctx.thresholds.magnitude_high;
        let (low_min, low_max) = ctx.thresholds.magnitude_low;
        (ratio >= high_min && ratio < high_max) || (ratio > low_min && ratio <= low_max)
    })
}

pub fn is_guessing(ctx: &AttemptContext<'_>) -> bool {
    let Some(correct) = ctx.correct_num else {
        return false;
    };
    let deviations: Vec<f64> = ctx
        .history
        .iter()
        .filter_map(|attempt| parse_number(attempt))
        .map(|attempt| (attempt - correct).abs())
        .collect();
    if deviations.len() < ctx.thresholds.guessing_min_history {
        return false;
    }

    let n = deviations.len() as f64;
    let mean = deviations.iter().sum::<f64>() / n;
    let variance = deviations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let spread = correct.abs() * ctx.thresholds.guessing_spread_factor;
    variance > spread * spread
}

pub fn is_random(ctx: &AttemptContext<'_>) -> bool {
    ctx.history.len() >= ctx.thresholds.random_min_history
}

#[derive(Debug, Clone, Default)]
pub struct BehaviorClassifier {
    thresholds: ClassifierThresholds,
}

impl BehaviorClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(
        &self,
        user_input: &str,
        correct_answer: &str,
        attempt_history: &[String],
    ) -> ClassificationResult {
        let ctx = AttemptContext::new(user_input, correct_answer, attempt_history, &self.thresholds);
        let category = RULES
            .iter()
            .find(|rule| (rule.matches)(&ctx))
            .map(|rule| rule.category)
            .unwrap_or(BehaviorCategory::Default);

        ATTEMPTS_CLASSIFIED_TOTAL
            .with_label_values(&[category.as_str()])
            .inc();
        tracing::debug!(
            "Attempt classified as {} (history={})",
            category.as_str(),
            attempt_history.len()
        );

        ClassificationResult {
            category,
            user_input: user_input.to_string(),
            correct_answer: correct_answer.to_string(),
            attempt_history: attempt_history.to_vec(),
        }
    }
}

/// Classifies with the default thresholds.
pub fn classify(
    user_input: &str,
    correct_answer: &str,
    attempt_history: &[String],
) -> ClassificationResult {
    BehaviorClassifier::default().classify(user_input, correct_answer, attempt_history)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn ctx<'a>(
        input: &str,
        correct: &str,
        past: &[&str],
        thresholds: &'a ClassifierThresholds,
    ) -> AttemptContext<'a> {
        AttemptContext::new(input, correct, &history(past), thresholds)
    }

    #[test]
    fn rule_table_order_is_fixed() {
        let order: Vec<_> = RULES.iter().map(|r| r.category).collect();
        assert_eq!(
            order,
            vec![
                BehaviorCategory::SignError,
                BehaviorCategory::Repetition,
                BehaviorCategory::CloseAttempt,
                BehaviorCategory::MagnitudeError,
                BehaviorCategory::Guessing,
                BehaviorCategory::Random,
            ]
        );
    }

    #[test]
    fn sign_error_rule() {
        let t = ClassifierThresholds::default();
        assert!(is_sign_error(&ctx("-7", "7", &[], &t)));
        assert!(is_sign_error(&ctx("2.5", "-2.5", &[], &t)));
        assert!(!is_sign_error(&ctx("7", "7", &[], &t)));
        assert!(!is_sign_error(&ctx("0", "-0", &[], &t)));
        assert!(!is_sign_error(&ctx("x", "7", &[], &t)));
    }

    #[test]
    fn sign_error_overrides_every_other_rule() {
        for correct in [1.0, -3.0, 12.5, 400.0, -0.02] {
            let user = (-correct).to_string();
            let correct = correct.to_string();
            let past = history(&[&user, &user, "1", "900"]);
            let result = classify(&user, &correct, &past);
            assert_eq!(result.category, BehaviorCategory::SignError, "{user} vs {correct}");
        }
    }

    #[test]
    fn repetition_rule() {
        let t = ClassifierThresholds::default();
        assert!(is_repetition(&ctx("5", "12", &["5", "5"], &t)));
        assert!(is_repetition(&ctx("x + 1", "2", &["x+1", "x  + 1", "x + 1"], &t)));
        assert!(!is_repetition(&ctx("5", "12", &["5"], &t)));
        assert!(!is_repetition(&ctx("5", "12", &["5", "6"], &t)));
    }

    #[test]
    fn repetition_beats_random() {
        let result = classify("5", "12", &history(&["5", "5"]));
        assert_eq!(result.category, BehaviorCategory::Repetition);
    }

    #[test]
    fn close_attempt_rule() {
        let t = ClassifierThresholds::default();
        assert!(is_close_attempt(&ctx("11", "10", &[], &t)));
        assert!(is_close_attempt(&ctx("8", "10", &[], &t)));
        assert!(!is_close_attempt(&ctx("7.9", "10", &[], &t)));
        assert!(!is_close_attempt(&ctx("0.1", "0", &[], &t)));
    }

    #[test]
    fn magnitude_error_rule() {
        let t = ClassifierThresholds::default();
        assert!(is_magnitude_error(&ctx("100", "10", &[], &t)));
        assert!(is_magnitude_error(&ctx("1", "10", &[], &t)));
        assert!(is_magnitude_error(&ctx("-250", "5", &[], &t)));
        assert!(!is_magnitude_error(&ctx("1000", "10", &[], &t)));
        assert!(!is_magnitude_error(&ctx("0.05", "10", &[], &t)));
        assert!(!is_magnitude_error(&ctx("3", "0", &[], &t)));
    }

    #[test]
    fn guessing_rule() {
        let t = ClassifierThresholds::default();
        assert!(is_guessing(&ctx("55", "10", &["1", "30", "-40"], &t)));
        // Tight cluster around the answer is not guessing.
        assert!(!is_guessing(&ctx("55", "10", &["12", "13", "14"], &t)));
        // Needs three numeric entries.
        assert!(!is_guessing(&ctx("55", "10", &["1", "30", "abc"], &t)));
        assert!(!is_guessing(&ctx("55", "ten", &["1", "30", "-40"], &t)));
    }

    #[test]
    fn full_chain_falls_through_to_random_and_default() {
        assert_eq!(
            classify("55", "10", &history(&["1", "30", "-40"])).category,
            BehaviorCategory::Guessing
        );
        assert_eq!(
            classify("c", "10", &history(&["a", "b"])).category,
            BehaviorCategory::Random
        );
        assert_eq!(classify("x", "10", &[]).category, BehaviorCategory::Default);
        assert_eq!(classify("37", "10", &history(&["4"])).category, BehaviorCategory::Default);
    }

    #[test]
    fn non_numeric_inputs_disable_numeric_rules() {
        let result = classify(r"\frac{1}{2}", "0.5", &[]);
        assert_eq!(result.category, BehaviorCategory::Default);
    }

    #[test]
    fn markup_numbers_are_parsed() {
        assert_eq!(parse_number(" -3.5 "), Some(-3.5));
        assert_eq!(parse_number("−4"), Some(-4.0));
        assert_eq!(parse_number("1 000"), Some(1000.0));
        assert_eq!(parse_number("-12 345 678"), Some(-12345678.0));
        assert_eq!(parse_number("2 3"), None);
        assert_eq!(parse_number("1 0000"), None);
        assert_eq!(parse_number("1.5 000"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("2x"), None);
    }

    #[test]
    fn spaced_digits_disable_numeric_rules() {
        assert_eq!(
            classify("2 3", "-23", &[]).category,
            BehaviorCategory::Default
        );
    }

    #[test]
    fn thresholds_are_overridable() {
        let strict = BehaviorClassifier::new(ClassifierThresholds {
            close_attempt_percent: 5.0,
            ..ClassifierThresholds::default()
        });
        assert_eq!(
            strict.classify("11", "10", &[]).category,
            BehaviorCategory::Default
        );
        assert_eq!(
            classify("11", "10", &[]).category,
            BehaviorCategory::CloseAttempt
        );
    }

    #[test]
    fn result_echoes_inputs() {
        let past = history(&["3", "4"]);
        let result = classify("5", "6", &past);
        assert_eq!(result.user_input, "5");
        assert_eq!(result.correct_answer, "6");
        assert_eq!(result.attempt_history, past);
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{HintError, HintResult};
use crate::metrics::{HINTS_RESOLVED_TOTAL, HINT_GENERATION_DURATION_SECONDS, HINT_SETS_TOTAL};
use crate::models::hint::HintGenerationRequest;
use crate::models::{
    BehaviorType, Difficulty, HintKey, HintRecord, HintSource, QuestionContent, SessionHintSet,
};

use super::answer_service::expected_answers;
use super::content_service::ContentCatalog;
use super::hint_cache::TieredHintCache;
use super::hint_generator::HintGenerator;
use super::notation::{normalize, scaffold};

pub const DEFAULT_GUIDANCE: &str = "Re-read the question and write down what it asks you to find.";

type InFlight = Shared<BoxFuture<'static, SessionHintSet>>;

/// Everything a generation needs, shareable with the in-flight future.
struct HintPipeline {
    cache: Arc<TieredHintCache>,
    generator: Arc<dyn HintGenerator>,
    catalog: Arc<dyn ContentCatalog>,
    generation_timeout: Duration,
}

/// Serves per-question hint sets: cache first, then the generation service,
/// then a deterministic fallback. Callers never see a generation error.
pub struct HintService {
    pipeline: Arc<HintPipeline>,
    in_flight: Mutex<HashMap<HintKey, InFlight>>,
}

impl HintService {
    pub fn new(
        cache: Arc<TieredHintCache>,
        generator: Arc<dyn HintGenerator>,
        catalog: Arc<dyn ContentCatalog>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            pipeline: Arc::new(HintPipeline {
                cache,
                generator,
                catalog,
                generation_timeout,
            }),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn ensure_hints(&self, key: HintKey) -> SessionHintSet {
        if let Some(set) = self.pipeline.cache.get(&key).await {
            return set;
        }

        // Concurrent misses for one question share a single generation.
        let flight = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key)
                .or_insert_with(|| self.start_flight(key))
                .clone()
        };

        self.join_flight(key, flight).await
    }

    /// Drops the cached set for `key` and builds a fresh one. The cache is
    /// not consulted afterwards, so a durable tier that refused the delete
    /// cannot hand the stale set back.
    pub async fn regenerate(&self, key: HintKey) -> SessionHintSet {
        tracing::info!("Regenerating hints for {}", key);
        self.pipeline.cache.clear(Some(&key)).await;

        let flight = self.start_flight(key);
        self.in_flight.lock().await.insert(key, flight.clone());

        self.join_flight(key, flight).await
    }

    fn start_flight(&self, key: HintKey) -> InFlight {
        let pipeline = self.pipeline.clone();
        async move { pipeline.build_and_store(key).await }
            .boxed()
            .shared()
    }

    async fn join_flight(&self, key: HintKey, flight: InFlight) -> SessionHintSet {
        let set = flight.clone().await;

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(&key).is_some_and(|current| current.ptr_eq(&flight)) {
            in_flight.remove(&key);
        }

        set
    }

    pub fn resolve(&self, set: &SessionHintSet, step_index: usize, behavior: BehaviorType) -> String {
        resolve(set, step_index, behavior)
    }
}

impl HintPipeline {
    async fn build_and_store(&self, key: HintKey) -> SessionHintSet {
        let content = match self.catalog.question(&key).await {
            Ok(Some(content)) => Some(content),
            Ok(None) => {
                tracing::warn!("Question {} not in catalog, using fallback hints", key);
                None
            }
            Err(e) => {
                tracing::warn!("Catalog lookup failed for {}: {}, using fallback hints", key, e);
                None
            }
        };

        let set = match &content {
            Some(content) => match self.generate(key, content).await {
                Ok(hints) => {
                    tracing::info!("Generated {} hints for {}", hints.len(), key);
                    SessionHintSet::new(key, ensure_general_hint(hints, Some(content)), HintSource::Generated)
                }
                Err(e) => {
                    tracing::warn!("Hint generation failed for {}: {}", key, e);
                    fallback_hint_set(key, Some(content))
                }
            },
            None => fallback_hint_set(key, None),
        };

        HINT_SETS_TOTAL
            .with_label_values(&[set.source.as_str()])
            .inc();
        self.cache.put(&set).await;
        set
    }

    async fn generate(&self, key: HintKey, content: &QuestionContent) -> HintResult<Vec<HintRecord>> {
        let request = HintGenerationRequest {
            topic_id: key.topic_id,
            category_id: key.category_id,
            question_id: key.question_id,
            question_context: content.context(),
            expected_answers: expected_answers(content),
            behavior_types: BehaviorType::ALL.to_vec(),
            step_count: content.steps.len(),
            request_id: Uuid::new_v4().to_string(),
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.generation_timeout, self.generator.generate(&request)).await;
        HINT_GENERATION_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        let hints = match outcome {
            Ok(result) => result?,
            Err(_) => {
                return Err(HintError::Timeout {
                    timeout_ms: self.generation_timeout.as_millis() as u64,
                })
            }
        };

        let hints: Vec<HintRecord> = hints
            .into_iter()
            .filter(|hint| !hint.hint_text.trim().is_empty())
            .collect();
        if hints.is_empty() {
            return Err(HintError::Generation("empty hint list".to_string()));
        }
        Ok(hints)
    }
}

/// Picks the most specific hint: exact step and behavior, then the step's
/// general hint, then the behavior at any step, then a general hint at any
/// step, then the first hint.
pub fn resolve_record(
    set: &SessionHintSet,
    step_index: usize,
    behavior: BehaviorType,
) -> Option<(&HintRecord, &'static str)> {
    let hints = &set.hints;
    hints
        .iter()
        .find(|h| h.step_index == step_index && h.behavior_type == behavior)
        .map(|h| (h, "exact"))
        .or_else(|| {
            hints
                .iter()
                .find(|h| h.step_index == step_index && h.behavior_type == BehaviorType::General)
                .map(|h| (h, "step_general"))
        })
        .or_else(|| {
            hints
                .iter()
                .find(|h| h.behavior_type == behavior)
                .map(|h| (h, "behavior"))
        })
        .or_else(|| {
            hints
                .iter()
                .find(|h| h.behavior_type == BehaviorType::General)
                .map(|h| (h, "general"))
        })
        .or_else(|| hints.first().map(|h| (h, "first")))
}

pub fn resolve(set: &SessionHintSet, step_index: usize, behavior: BehaviorType) -> String {
    match resolve_record(set, step_index, behavior) {
        Some((hint, matched)) => {
            HINTS_RESOLVED_TOTAL.with_label_values(&[matched]).inc();
            hint.hint_text.clone()
        }
        None => {
            HINTS_RESOLVED_TOTAL.with_label_values(&["default"]).inc();
            DEFAULT_GUIDANCE.to_string()
        }
    }
}

/// Guidance sentence the fallback hints are built around.
pub fn guidance_text(content: Option<&QuestionContent>) -> String {
    let Some(content) = content else {
        return DEFAULT_GUIDANCE.to_string();
    };

    if let Some(guidance) = content.guidance.as_deref().map(normalize).filter(|g| !g.is_empty()) {
        return guidance;
    }

    let first_step = content.steps.first();
    if let Some(placeholder) = first_step
        .and_then(|step| step.placeholder.as_deref())
        .map(normalize)
        .filter(|p| !p.is_empty())
    {
        return placeholder;
    }

    if let Some(answer) = first_step
        .and_then(|step| step.accepted_answers.first())
        .filter(|a| !normalize(a).is_empty())
    {
        return format!("Try completing: {}", scaffold(answer));
    }

    DEFAULT_GUIDANCE.to_string()
}

/// Five fixed hints, one per behavior type, all at step 0.
pub fn fallback_hints(guidance: &str) -> Vec<HintRecord> {
    let hint = |behavior_type, difficulty, lead: &str| HintRecord {
        step_index: 0,
        hint_text: format!("{} {}", lead, guidance),
        behavior_type,
        difficulty,
    };

    vec![
        hint(
            BehaviorType::General,
            Difficulty::Easy,
            "Start from what the question gives you.",
        ),
        hint(
            BehaviorType::Struggling,
            Difficulty::Easy,
            "Slow down and do one operation at a time, checking signs as you go.",
        ),
        hint(
            BehaviorType::Guessing,
            Difficulty::Medium,
            "Instead of trying numbers, write down the rule that connects them.",
        ),
        hint(
            BehaviorType::Repeating,
            Difficulty::Medium,
            "You have entered this answer before. Look for the slip in your working.",
        ),
        hint(
            BehaviorType::SelfCorrection,
            Difficulty::Hard,
            "You are close. Recheck your last step.",
        ),
    ]
}

pub fn fallback_hint_set(key: HintKey, content: Option<&QuestionContent>) -> SessionHintSet {
    SessionHintSet::new(
        key,
        fallback_hints(&guidance_text(content)),
        HintSource::Fallback,
    )
}

fn ensure_general_hint(mut hints: Vec<HintRecord>, content: Option<&QuestionContent>) -> Vec<HintRecord> {
    if !hints.iter().any(|h| h.behavior_type == BehaviorType::General) {
        let general = fallback_hints(&guidance_text(content))
            .into_iter()
            .find(|h| h.behavior_type == BehaviorType::General);
        hints.extend(general);
    }
    hints
}

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use mathpractice_hints::{
    config::Config,
    create_router,
    error::{HintError, HintResult},
    models::{
        hint::HintGenerationRequest, BehaviorType, Difficulty, HintKey, HintRecord,
        QuestionContent, StepSpec,
    },
    services::{
        content_service::ContentCatalog,
        hint_cache::{InMemoryKeyValueStore, KeyValueStore},
        hint_generator::HintGenerator,
        AppState,
    },
};

pub const TOPIC: i64 = 1;
pub const CATEGORY: i64 = 2;
pub const QUESTION: i64 = 3;

pub fn question_key() -> HintKey {
    HintKey::new(TOPIC, CATEGORY, QUESTION)
}

/// g(x) = 2x - 8 evaluated at 5, in two steps.
pub fn sample_question() -> QuestionContent {
    QuestionContent {
        topic_id: TOPIC,
        category_id: CATEGORY,
        question_id: QUESTION,
        topic_title: "Functions".to_string(),
        category_title: "Evaluating functions".to_string(),
        prompt: r"Evaluate $g(5)$ for $g(x) = 2x - 8$".to_string(),
        guidance: None,
        steps: vec![
            StepSpec {
                accepted_answers: vec!["g(5) = 2(5) - 8".to_string(), "2 \\cdot 5 - 8".to_string()],
                placeholder: Some("Substitute x = 5".to_string()),
            },
            StepSpec {
                accepted_answers: vec!["2".to_string(), "g(5) = 2".to_string()],
                placeholder: None,
            },
        ],
    }
}

pub struct StaticCatalog {
    questions: HashMap<HintKey, QuestionContent>,
    fail: bool,
}

impl StaticCatalog {
    pub fn with(questions: Vec<QuestionContent>) -> Self {
        Self {
            questions: questions.into_iter().map(|q| (q.key(), q)).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            questions: HashMap::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ContentCatalog for StaticCatalog {
    async fn question(&self, key: &HintKey) -> HintResult<Option<QuestionContent>> {
        if self.fail {
            return Err(HintError::Catalog("catalog offline".to_string()));
        }
        Ok(self.questions.get(key).cloned())
    }
}

#[derive(Clone)]
pub enum GeneratorMode {
    Succeed(Vec<HintRecord>),
    Fail,
    Empty,
    Slow(Duration, Vec<HintRecord>),
}

/// Generator fake that counts calls and records the last request.
pub struct ScriptedGenerator {
    mode: Mutex<GeneratorMode>,
    calls: AtomicUsize,
    last_request: Mutex<Option<HintGenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(mode: GeneratorMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_mode(&self, mode: GeneratorMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn last_request(&self) -> Option<HintGenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl HintGenerator for ScriptedGenerator {
    async fn generate(&self, request: &HintGenerationRequest) -> HintResult<Vec<HintRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let mode = self.mode.lock().unwrap().clone();
        match mode {
            GeneratorMode::Succeed(hints) => Ok(hints),
            GeneratorMode::Fail => Err(HintError::Generation("service returned 503".to_string())),
            GeneratorMode::Empty => Ok(Vec::new()),
            GeneratorMode::Slow(delay, hints) => {
                tokio::time::sleep(delay).await;
                Ok(hints)
            }
        }
    }
}

/// Durable store whose every call fails, as with Redis down.
pub struct FailingKeyValueStore;

#[async_trait]
impl KeyValueStore for FailingKeyValueStore {
    async fn get(&self, _key: &str) -> HintResult<Option<String>> {
        Err(HintError::store("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str) -> HintResult<()> {
        Err(HintError::store("connection refused"))
    }

    async fn delete(&self, _key: &str) -> HintResult<()> {
        Err(HintError::store("connection refused"))
    }

    async fn delete_prefix(&self, _prefix: &str) -> HintResult<u64> {
        Err(HintError::store("connection refused"))
    }
}

/// Durable store that reads and writes but refuses to delete.
#[derive(Default)]
pub struct StickyKeyValueStore {
    inner: InMemoryKeyValueStore,
}

#[async_trait]
impl KeyValueStore for StickyKeyValueStore {
    async fn get(&self, key: &str) -> HintResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> HintResult<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, _key: &str) -> HintResult<()> {
        Err(HintError::store("DEL not permitted"))
    }

    async fn delete_prefix(&self, _prefix: &str) -> HintResult<u64> {
        Err(HintError::store("DEL not permitted"))
    }
}

pub fn generated_hints() -> Vec<HintRecord> {
    vec![
        HintRecord {
            step_index: 0,
            hint_text: "Replace every x with 5.".to_string(),
            behavior_type: BehaviorType::General,
            difficulty: Difficulty::Easy,
        },
        HintRecord {
            step_index: 0,
            hint_text: "Multiply before you subtract.".to_string(),
            behavior_type: BehaviorType::Struggling,
            difficulty: Difficulty::Easy,
        },
        HintRecord {
            step_index: 1,
            hint_text: "2 times 5 is 10, now take away 8.".to_string(),
            behavior_type: BehaviorType::General,
            difficulty: Difficulty::Medium,
        },
        HintRecord {
            step_index: 1,
            hint_text: "Check the sign of your result.".to_string(),
            behavior_type: BehaviorType::SelfCorrection,
            difficulty: Difficulty::Hard,
        },
    ]
}

pub fn test_config() -> Config {
    Config {
        hint_api_timeout_ms: 300,
        ..Config::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub generator: Arc<ScriptedGenerator>,
}

pub fn create_test_app_with(
    catalog: Arc<dyn ContentCatalog>,
    mode: GeneratorMode,
    durable: Arc<dyn KeyValueStore>,
) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let generator = Arc::new(ScriptedGenerator::new(mode));
    let state = Arc::new(AppState::from_parts(
        test_config(),
        catalog,
        generator.clone(),
        durable,
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        generator,
    }
}

pub fn create_test_app(mode: GeneratorMode) -> TestApp {
    create_test_app_with(
        Arc::new(StaticCatalog::with(vec![sample_question()])),
        mode,
        Arc::new(InMemoryKeyValueStore::new()),
    )
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, json)
}

pub fn question_uri(suffix: &str) -> String {
    format!(
        "/api/v1/questions/{}/{}/{}/{}",
        TOPIC, CATEGORY, QUESTION, suffix
    )
}

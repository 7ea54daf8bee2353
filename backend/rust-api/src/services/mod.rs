use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, DurableBackend};
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

use self::answer_service::AnswerService;
use self::behavior_classifier::BehaviorClassifier;
use self::content_service::{ContentCatalog, MongoContentCatalog};
use self::hint_cache::{InMemoryKeyValueStore, KeyValueStore, RedisKeyValueStore, TieredHintCache};
use self::hint_generator::{HintGenerator, HttpHintGenerator};
use self::hint_service::HintService;

pub struct AppState {
    pub config: Config,
    /// `None` when the state was assembled from in-process parts.
    pub mongo: Option<Database>,
    pub redis: Option<ConnectionManager>,
    pub answers: AnswerService,
    pub classifier: BehaviorClassifier,
    pub hints: Arc<HintService>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: Option<redis::Client>,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        let redis = match (config.hints.durable_backend, redis_client) {
            (DurableBackend::Redis, Some(client)) => Some(connect_redis(client).await?),
            (DurableBackend::Redis, None) => {
                anyhow::bail!("hints.durable_backend is redis but no Redis client was given")
            }
            (DurableBackend::Memory, _) => {
                tracing::warn!("Durable hint tier is in-process memory; hints will not survive restarts");
                None
            }
        };

        let durable: Arc<dyn KeyValueStore> = match &redis {
            Some(conn) => Arc::new(RedisKeyValueStore::new(conn.clone())),
            None => Arc::new(InMemoryKeyValueStore::new()),
        };
        let catalog: Arc<dyn ContentCatalog> = Arc::new(MongoContentCatalog::new(&mongo));
        let generator: Arc<dyn HintGenerator> = Arc::new(HttpHintGenerator::new(
            config.hint_api_url.clone(),
            Duration::from_millis(config.hint_api_timeout_ms),
        ));

        let mut state = Self::from_parts(config, catalog, generator, durable);
        state.mongo = Some(mongo);
        state.redis = redis;
        Ok(state)
    }

    /// Wires the services over caller-provided collaborators.
    pub fn from_parts(
        config: Config,
        catalog: Arc<dyn ContentCatalog>,
        generator: Arc<dyn HintGenerator>,
        durable: Arc<dyn KeyValueStore>,
    ) -> Self {
        let cache = Arc::new(TieredHintCache::new(
            config.hints.cache_namespace.clone(),
            durable,
        ));
        let hints = Arc::new(HintService::new(
            cache,
            generator,
            catalog.clone(),
            Duration::from_millis(config.hint_api_timeout_ms),
        ));

        Self {
            answers: AnswerService::new(catalog),
            classifier: BehaviorClassifier::new(config.classifier.clone()),
            hints,
            mongo: None,
            redis: None,
            config,
        }
    }
}

async fn connect_redis(redis_client: redis::Client) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");

    let redis = tokio::time::timeout(
        Duration::from_secs(30),
        ConnectionManager::new(redis_client),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    tracing::info!("Redis ConnectionManager created, testing with PING...");

    let mut conn = redis.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}

pub mod answer_service;
pub mod behavior_classifier;
pub mod content_service;
pub mod hint_cache;
pub mod hint_generator;
pub mod hint_service;
pub mod notation;

use async_trait::async_trait;
use mongodb::{bson::doc, Collection, Database};

use crate::error::{HintError, HintResult};
use crate::metrics::track_db_operation;
use crate::models::{HintKey, QuestionContent};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

const QUESTIONS_COLLECTION: &str = "questions";

/// Read-only access to authored question text and step answers.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    async fn question(&self, key: &HintKey) -> HintResult<Option<QuestionContent>>;
}

pub struct MongoContentCatalog {
    questions: Collection<QuestionContent>,
}

impl MongoContentCatalog {
    pub fn new(mongo: &Database) -> Self {
        Self {
            questions: mongo.collection(QUESTIONS_COLLECTION),
        }
    }
}

#[async_trait]
impl ContentCatalog for MongoContentCatalog {
    async fn question(&self, key: &HintKey) -> HintResult<Option<QuestionContent>> {
        let filter = doc! {
            "topic_id": key.topic_id,
            "category_id": key.category_id,
            "question_id": key.question_id,
        };

        let found = track_db_operation("find_one", QUESTIONS_COLLECTION, async {
            retry_async_with_config(RetryConfig::default(), "catalog find_one", || async {
                self.questions.find_one(filter.clone()).await
            })
            .await
            .map_err(anyhow::Error::from)
        })
        .await
        .map_err(|e| HintError::Catalog(format!("{:#}", e)))?;

        if found.is_none() {
            tracing::debug!("Question not in catalog: {}", key);
        }
        Ok(found)
    }
}

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::answer::CheckStepRequest;
use crate::models::classification::ClassifyRequest;

/// Longest learner input accepted in a request body, in characters.
pub const MAX_INPUT_CHARS: usize = 512;
/// Longest attempt history accepted by `/classify`.
pub const MAX_ATTEMPT_HISTORY: usize = 100;

/// Size limits checked after a body has been parsed.
pub trait RequestLimits {
    fn check_limits(&self) -> Result<(), String>;
}

impl RequestLimits for CheckStepRequest {
    fn check_limits(&self) -> Result<(), String> {
        check_input("input", &self.input)
    }
}

impl RequestLimits for ClassifyRequest {
    fn check_limits(&self) -> Result<(), String> {
        check_input("user_input", &self.user_input)?;
        check_input("correct_answer", &self.correct_answer)?;
        if self.attempt_history.len() > MAX_ATTEMPT_HISTORY {
            return Err(format!(
                "attempt_history has {} entries, at most {} allowed",
                self.attempt_history.len(),
                MAX_ATTEMPT_HISTORY
            ));
        }
        self.attempt_history
            .iter()
            .try_for_each(|attempt| check_input("attempt_history", attempt))
    }
}

fn check_input(field: &str, value: &str) -> Result<(), String> {
    let chars = value.chars().count();
    if chars > MAX_INPUT_CHARS {
        return Err(format!(
            "{} is {} characters long, at most {} allowed",
            field, chars, MAX_INPUT_CHARS
        ));
    }
    Ok(())
}

/// Custom JSON extractor that returns JSON error responses instead of plain
/// text, and rejects bodies over the request limits.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + RequestLimits + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => value,
            Err(rejection) => {
                return Err(bad_request(format!(
                    "Failed to parse JSON request body: {}",
                    rejection
                )))
            }
        };

        value.check_limits().map_err(bad_request)?;
        Ok(AppJson(value))
    }
}

fn bad_request(message: String) -> Response {
    tracing::warn!("{}", message);
    let error_response = json!({
        "message": message,
        "status": 400
    });
    (StatusCode::BAD_REQUEST, Json(error_response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_request_limits() {
        let request = ClassifyRequest {
            user_input: "-12".to_string(),
            correct_answer: "12".to_string(),
            attempt_history: vec!["5".to_string(); MAX_ATTEMPT_HISTORY],
        };
        assert!(request.check_limits().is_ok());

        let request = ClassifyRequest {
            attempt_history: vec!["5".to_string(); MAX_ATTEMPT_HISTORY + 1],
            ..request
        };
        assert!(request.check_limits().is_err());
    }

    #[test]
    fn check_step_request_limits_count_chars_not_bytes() {
        let request = CheckStepRequest {
            input: "π".repeat(MAX_INPUT_CHARS),
        };
        assert!(request.check_limits().is_ok());

        let request = CheckStepRequest {
            input: "1".repeat(MAX_INPUT_CHARS + 1),
        };
        assert!(request.check_limits().is_err());
    }
}

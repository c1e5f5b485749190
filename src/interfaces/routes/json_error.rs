use actix_web::{
    web,
    http::StatusCode,
    ResponseError,
    HttpResponse,
    error::JsonPayloadError,
};
use serde_json::json;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config());
}

/// Wrong field types are 422; anything else wrong with the body is 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| JsonError::from(err).into())
}

#[derive(Debug)]
pub struct JsonError {
    message: String,
    status: StatusCode
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status).json(json!({ "error": self.message }))
    }
}

impl From<JsonPayloadError> for JsonError {
    fn from(err: JsonPayloadError) -> Self {
        match err {
            JsonPayloadError::Deserialize(e) if e.is_data() => JsonError {
                message: format!("Invalid field: {}", e),
                status: StatusCode::UNPROCESSABLE_ENTITY,
            },
            other => JsonError {
                message: format!("JSON payload error: {}", other),
                status: StatusCode::BAD_REQUEST,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_is_unprocessable() {
        let err = serde_json::from_str::<u32>(r#""ten""#).unwrap_err();
        let mapped = JsonError::from(JsonPayloadError::Deserialize(err));
        assert_eq!(mapped.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn broken_json_is_bad_request() {
        let err = serde_json::from_str::<serde_json::Value>(r#"{"a":"#).unwrap_err();
        assert!(!err.is_data());
        let mapped = JsonError::from(JsonPayloadError::Deserialize(err));
        assert_eq!(mapped.status_code(), StatusCode::BAD_REQUEST);
    }
}

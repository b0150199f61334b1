//! Extractors whose rejections use the API error envelope.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;

/// A JSON request body. Malformed bodies become `INVALID_JSON` errors.
#[derive(Debug)]
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<Value>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

impl JsonBody {
    /// Deserializes into a typed request body; shape errors are validation errors
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.0).map_err(|e| ApiError::validation_error(e.to_string(), None))
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge("Request body is too large".to_string());
    }
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::invalid_json("Expected a request with Content-Type: application/json")
        }
        other => ApiError::invalid_json(other.body_text()),
    }
}

/// Raw query parameters; typed parsing happens in the handlers and services
#[derive(Debug, Default)]
pub struct QueryParams(pub HashMap<String, String>);

#[async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map(|Query(params)| QueryParams(params))
            .map_err(|e| ApiError::bad_request(e.body_text()))
    }
}

impl QueryParams {
    /// A required uuid parameter, such as `?id=`
    pub fn uuid(&self, name: &str) -> Result<Uuid, ApiError> {
        let raw = self
            .0
            .get(name)
            .ok_or_else(|| ApiError::invalid_field(name, "is required"))?;
        parse_id(name, raw)
    }

    pub fn optional_uuid(&self, name: &str) -> Result<Option<Uuid>, ApiError> {
        self.0.get(name).map(|raw| parse_id(name, raw)).transpose()
    }

    pub fn flag(&self, name: &str) -> Result<bool, ApiError> {
        match self.0.get(name).map(String::as_str) {
            None | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") | Some("") => Ok(true),
            Some(_) => Err(ApiError::invalid_field(name, "must be true or false")),
        }
    }

    /// Everything except the named keys, for forwarding as list filters
    pub fn without(mut self, keys: &[&str]) -> HashMap<String, String> {
        self.0.retain(|k, _| !keys.contains(&k.as_str()));
        self.0
    }
}

pub fn parse_id(field: &str, raw: &str) -> Result<Uuid, ApiError> {
    raw.trim()
        .parse::<Uuid>()
        .map_err(|_| ApiError::invalid_field(field, "must be a UUID"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn ids_and_flags_parse_strictly() {
        let id = Uuid::new_v4();
        let q = params(&[("id", &id.to_string()), ("history", "true"), ("bad", "x")]);
        assert_eq!(q.uuid("id").unwrap(), id);
        assert!(q.uuid("missing").is_err());
        assert!(q.flag("history").unwrap());
        assert!(!q.flag("absent").unwrap());
        assert!(q.flag("bad").is_err());
        assert!(parse_id("id", "not-a-uuid").is_err());
    }

    #[test]
    fn typed_bodies_report_missing_fields() {
        #[derive(Debug, serde::Deserialize)]
        struct Body {
            #[allow(dead_code)]
            level_id: Uuid,
        }
        let err = JsonBody(serde_json::json!({})).parse::<Body>().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.message().contains("level_id"));
    }

    #[test]
    fn without_drops_control_keys() {
        let rest = params(&[("id", "1"), ("status", "active")]).without(&["id"]);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest["status"], "active");
    }
}

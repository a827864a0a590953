//! Request handlers for the inference service.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use ndarray::Array2;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::error::{Result, ServerError};
use super::state::AppState;

/// A raw record to classify; the same shape as one pre-transform dataset
/// row.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

/// POST /predict — apply the loaded transform and model to one raw record.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let started = Instant::now();
    state.metrics.record_request();

    let outcome = run_prediction(&state, &headers, &body).await;
    state
        .metrics
        .record_latency(started.elapsed().as_secs_f64());

    match &outcome {
        Err(ServerError::InvalidRequest(_)) => state.metrics.record_invalid_request(),
        Err(ServerError::Inference(_)) => state.metrics.record_inference_error(),
        Ok(_) => {}
    }

    outcome
}

async fn run_prediction(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Json<serde_json::Value>> {
    let request = parse_request(headers, body)?;
    let artifacts = state.snapshot().await;

    let documents = vec![request.text.clone()];
    let features = artifacts
        .vectorizer
        .transform(&documents)
        .map_err(|e| ServerError::Inference(e.to_string()))?;

    let (label, probability) = predict_one(&artifacts.model, &features)?;

    debug!(label, probability, "Prediction served");

    Ok(Json(json!({
        "label": label,
        "probability": probability,
    })))
}

fn predict_one(
    model: &crate::training::Classifier,
    features: &Array2<f64>,
) -> Result<(f64, f64)> {
    let labels = model
        .predict(features)
        .map_err(|e| ServerError::Inference(e.to_string()))?;
    let probabilities = model
        .predict_proba(features)
        .map_err(|e| ServerError::Inference(e.to_string()))?;

    match (labels.first(), probabilities.first()) {
        (Some(&label), Some(&probability)) => Ok((label, probability)),
        _ => Err(ServerError::Inference("empty prediction output".to_string())),
    }
}

/// Accept the record as JSON (`{"text": ...}`) or an urlencoded form
/// (`text=...`). Rejections name the offending field.
fn parse_request(headers: &HeaderMap, body: &Bytes) -> Result<PredictRequest> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let request: PredictRequest = serde_urlencoded::from_bytes(body)
            .map_err(|_| {
                ServerError::InvalidRequest(
                    "missing or invalid field 'text' in form body".to_string(),
                )
            })?;
        return validate(request);
    }

    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ServerError::InvalidRequest(format!("malformed JSON body: {}", e)))?;

    let text = match value.get("text") {
        None => {
            return Err(ServerError::InvalidRequest(
                "missing required field 'text'".to_string(),
            ))
        }
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ServerError::InvalidRequest(
                "field 'text' must be a string".to_string(),
            ))
        }
    };

    validate(PredictRequest { text })
}

fn validate(request: PredictRequest) -> Result<PredictRequest> {
    if request.text.trim().is_empty() {
        return Err(ServerError::InvalidRequest(
            "field 'text' must not be empty".to_string(),
        ));
    }
    Ok(request)
}

/// GET /metrics — Prometheus text exposition. Never blocks a prediction.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// GET /health — artifact identity and uptime.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let artifacts = state.snapshot().await;
    Json(json!({
        "status": "ready",
        "model_sha256": artifacts.model_ref.sha256,
        "vectorizer_sha256": artifacts.vectorizer_ref.sha256,
        "uptime_secs": state.metrics.uptime_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers
    }

    #[test]
    fn test_parse_json_request() {
        let body = Bytes::from(r#"{"text": "free offer"}"#);
        let request = parse_request(&json_headers(), &body).unwrap();
        assert_eq!(request.text, "free offer");
    }

    #[test]
    fn test_parse_form_request() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        let body = Bytes::from("text=hello+world");
        let request = parse_request(&headers, &body).unwrap();
        assert_eq!(request.text, "hello world");
    }

    #[test]
    fn test_malformed_json_names_the_problem() {
        let body = Bytes::from("not json");
        let err = parse_request(&json_headers(), &body).unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
        assert!(err.to_string().contains("malformed JSON"));
    }

    #[test]
    fn test_missing_text_field_is_named() {
        let body = Bytes::from(r#"{"message": "hi"}"#);
        let err = parse_request(&json_headers(), &body).unwrap_err();
        assert!(err.to_string().contains("'text'"));
    }

    #[test]
    fn test_non_string_text_rejected() {
        let body = Bytes::from(r#"{"text": 42}"#);
        let err = parse_request(&json_headers(), &body).unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_empty_text_rejected() {
        let body = Bytes::from(r#"{"text": "   "}"#);
        let err = parse_request(&json_headers(), &body).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }
}

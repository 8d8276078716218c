//! HTTP front-end.
//!
//! Two endpoints select the two workflows; both accept
//! `{"data": {"iri": "..."}}` and always answer 200 with a JSON body —
//! pipeline failures are reported in-band as `{"status": "error", ...}`.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::pipeline::{Pipeline, SubmitData};

/// Pipelines shared by all requests; each request gets its own context.
#[derive(Clone)]
pub struct AppState {
    pub sign: Arc<Pipeline>,
    pub validate: Arc<Pipeline>,
}

/// Wire shape of the submitted payload.
#[derive(Debug, Deserialize)]
pub struct SubmitEnvelope {
    pub data: SubmitData,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sign", post(sign))
        .route("/validate", post(validate))
        .route("/health", get(health))
        .with_state(state)
}

async fn sign(State(state): State<AppState>, Json(envelope): Json<SubmitEnvelope>) -> Json<Value> {
    Json(state.sign.execute(envelope.data).await)
}

async fn validate(
    State(state): State<AppState>,
    Json(envelope): Json<SubmitEnvelope>,
) -> Json<Value> {
    Json(state.validate.execute(envelope.data).await)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

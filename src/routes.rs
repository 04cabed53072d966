//! HTTP routes for reading the chain, submitting payloads and offering
//! competing chains.

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::ledger::{Adoption, Appended};
use crate::model::Block;
use crate::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BODY_BYTES: usize = 1 << 20;
const REJECTION_HEADER: &str = "x-rejection-reason";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_chain).post(submit_block))
        .route("/chain", post(adopt_chain))
        .route("/validate", get(validate_chain))
        .route("/health", get(health))
        .route("/version", get(version))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(timeout_layer(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Requests running past `limit` are answered with 408.
fn timeout_layer(limit: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limit)
}

/// Serialize `value` as indented JSON with the given status.
fn pretty_json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec_pretty(value)?;
    Ok((status, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Body of `POST /`. Also accepts the field as `data`.
#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    #[serde(alias = "data", alias = "Data")]
    pub payload: String,
}

/// GET /
pub async fn get_chain(State(state): State<AppState>) -> Result<Response, ApiError> {
    let blocks = state.ledger.snapshot();
    pretty_json(StatusCode::OK, &*blocks)
}

/// POST / — 201 with the committed block, 409 with the rejected one and the
/// failed rule in `x-rejection-reason`.
pub async fn submit_block(
    State(state): State<AppState>,
    payload: Result<Json<SubmitPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    match state.ledger.append(payload.payload.into_bytes()) {
        Appended::Committed(block) => pretty_json(StatusCode::CREATED, &block),
        Appended::Rejected { block, reason } => {
            let mut resp = pretty_json(StatusCode::CONFLICT, &block)?;
            if let Ok(value) = HeaderValue::from_str(&reason.to_string()) {
                resp.headers_mut().insert(REJECTION_HEADER, value);
            }
            Ok(resp)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdoptResp {
    pub adopted: bool,
    pub length: usize,
}

/// POST /chain — offer a competing chain; adopted only if strictly longer.
pub async fn adopt_chain(
    State(state): State<AppState>,
    blocks: Result<Json<Vec<Block>>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(blocks) = blocks?;
    let resp = match state.ledger.adopt_if_longer(blocks)? {
        Adoption::Adopted { length } => AdoptResp {
            adopted: true,
            length,
        },
        Adoption::Kept { length } => AdoptResp {
            adopted: false,
            length,
        },
    };
    pretty_json(StatusCode::OK, &resp)
}

/// GET /validate — audit linkage and hashes of the whole chain; returns { ok, errors[] }
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResp {
    pub ok: bool,
    pub errors: Vec<String>,
}
pub async fn validate_chain(State(state): State<AppState>) -> Result<Response, ApiError> {
    let blocks = state.ledger.snapshot();
    let errors: Vec<String> = state
        .ledger
        .config()
        .validation
        .audit(&blocks)
        .iter()
        .map(ToString::to_string)
        .collect();

    pretty_json(
        StatusCode::OK,
        &ValidateResp {
            ok: errors.is_empty(),
            errors,
        },
    )
}

/// GET /health
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// GET /version
#[derive(Serialize)]
pub struct Version {
    pub version: &'static str,
    pub git_sha: Option<&'static str>,
}
pub async fn version() -> Json<Version> {
    Json(Version {
        version: env!("CARGO_PKG_VERSION"),
        git_sha: option_env!("GIT_SHA"),
    })
}

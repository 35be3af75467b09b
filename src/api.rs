use crate::error::AppError;
use crate::game;
use crate::repo::RevealStore;
use crate::types::{
    AccessRequest, CastVoteRequest, CastVoteResponse, RevealResponse, StatsResponse,
    ValidateAccessResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::debug;

pub struct AppState<S> {
    pub store: Arc<S>,
    pub vote_secret: Arc<str>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            vote_secret: self.vote_secret.clone(),
        }
    }
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>, vote_secret: &str) -> Self {
        Self {
            store,
            vote_secret: Arc::from(vote_secret),
        }
    }
}

pub fn app_router<S>(state: AppState<S>) -> Router
where
    S: RevealStore + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/validate_access", post(validate_access::<S>))
        .route("/api/vote", post(cast_vote::<S>))
        .route("/api/reveal", post(reveal::<S>))
        .route("/api/stats", get(stats::<S>))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn validate_access<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<AccessRequest>, JsonRejection>,
) -> Response
where
    S: RevealStore,
{
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };
    debug!("validate_access request");
    match game::validate_access(state.store.as_ref(), &body.access_key).await {
        Ok(res) => Json(res).into_response(),
        Err(AppError::UnknownKey) => (
            StatusCode::UNAUTHORIZED,
            Json(ValidateAccessResponse {
                valid: false,
                is_admin: false,
                is_doctor: false,
                has_voted: false,
                error: Some(AppError::UnknownKey.to_string()),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn cast_vote<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<Json<CastVoteResponse>, AppError>
where
    S: RevealStore,
{
    let Json(body) = body?;
    debug!(team = %body.team, "cast_vote request");
    let res = game::cast_vote(
        state.store.as_ref(),
        &body.access_key,
        &body.team,
        &state.vote_secret,
    )
    .await?;
    Ok(Json(res))
}

async fn reveal<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<AccessRequest>, JsonRejection>,
) -> Result<Json<RevealResponse>, AppError>
where
    S: RevealStore,
{
    let Json(body) = body?;
    debug!("reveal request");
    let res = game::reveal(state.store.as_ref(), &body.access_key, &state.vote_secret).await?;
    Ok(Json(res))
}

async fn stats<S>(State(state): State<AppState<S>>) -> Result<Json<StatsResponse>, AppError>
where
    S: RevealStore,
{
    let res = game::stats(state.store.as_ref(), &state.vote_secret).await?;
    Ok(Json(res))
}

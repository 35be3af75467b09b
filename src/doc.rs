//! OpenAPI / Swagger documentation definitions.
use crate::types::{
    AccessRequest, CastVoteRequest, CastVoteResponse, Phase, RevealResponse, StatsResponse, Team,
    ValidateAccessResponse, VoteStatus,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_doc,
        validate_access_doc,
        cast_vote_doc,
        reveal_doc,
        stats_doc
    ),
    components(
        schemas(
            AccessRequest,
            ValidateAccessResponse,
            CastVoteRequest,
            CastVoteResponse,
            RevealResponse,
            StatsResponse,
            Phase,
            Team,
            VoteStatus
        )
    ),
    tags(
        (name = "reveal", description = "Gender reveal voting API")
    )
)]
pub struct ApiDoc;

// Doc-only shim functions so utoipa can pick up signatures.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "OK"))
)]
pub async fn health_doc() {}

#[utoipa::path(
    post,
    path = "/api/validate_access",
    request_body = AccessRequest,
    responses(
        (status = 200, body = ValidateAccessResponse),
        (status = 401, description = "Unknown access key", body = ValidateAccessResponse)
    )
)]
pub async fn validate_access_doc() {}

#[utoipa::path(
    post,
    path = "/api/vote",
    request_body = CastVoteRequest,
    responses(
        (status = 200, body = CastVoteResponse),
        (status = 400, description = "Team is not boy or girl, or the body is malformed"),
        (status = 401, description = "Unknown access key"),
        (status = 403, description = "Voting has ended or key already used")
    )
)]
pub async fn cast_vote_doc() {}

#[utoipa::path(
    post,
    path = "/api/reveal",
    request_body = AccessRequest,
    responses(
        (status = 200, body = RevealResponse),
        (status = 401, description = "Unknown access key"),
        (status = 403, description = "Key is not an admin key"),
        (status = 404, description = "No doctor vote has been cast")
    )
)]
pub async fn reveal_doc() {}

#[utoipa::path(
    get,
    path = "/api/stats",
    responses((status = 200, body = StatsResponse))
)]
pub async fn stats_doc() {}

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::core::{Engine, EngineError};
use crate::models::{
    ErrorResponse, HealthResponse, InteractionRequest, InteractionResponse, LikeResponse,
    MatchListResponse, ScoreCandidatesRequest, ScoreCandidatesResponse, StatisticsResponse,
};
use crate::services::PostgresClient;

/// Engine wired to the production Postgres stores
pub type PgEngine = Engine<PostgresClient, PostgresClient>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PgEngine>,
    pub store: Arc<PostgresClient>,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/candidates/score", web::post().to(score_candidates))
        .route("/matches/like", web::post().to(like))
        .route("/matches/pass", web::post().to(pass))
        .route("/matches/accept", web::post().to(accept))
        .route("/matches/reject", web::post().to(reject))
        .route("/matches", web::get().to(list_matches))
        .route("/stats", web::get().to(statistics));
}

fn validation_error(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

fn engine_error(e: EngineError) -> HttpResponse {
    match e {
        EngineError::NotFound(what) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Not found".to_string(),
            message: what,
            status_code: 404,
        }),
        EngineError::InvalidInput(message) => HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid input".to_string(),
            message,
            status_code: 400,
        }),
        e => {
            tracing::error!("request failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal error".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

fn edge_response(edge: crate::models::RelationshipEdge) -> InteractionResponse {
    InteractionResponse {
        from_id: edge.from_id,
        to_id: edge.to_id,
        status: edge.status,
        score: edge.score,
        accepted_at: edge.accepted_at,
        rejected_at: edge.rejected_at,
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = state.store.health_check().await.unwrap_or(false);
    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.engine.model_loaded(),
        timestamp: chrono::Utc::now(),
    })
}

/// Score candidates endpoint
///
/// POST /api/v1/candidates/score
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "candidateIds": ["string"],
///   "limit": 20
/// }
/// ```
async fn score_candidates(
    state: web::Data<AppState>,
    req: web::Json<ScoreCandidatesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("validation failed for score request: {:?}", errors);
        return validation_error(errors);
    }

    // Cap limit to prevent excessive queries
    let limit = req.limit.min(100) as usize;

    tracing::info!("Scoring candidates for user: {}, limit: {}", req.user_id, limit);

    match state
        .engine
        .score_candidates(&req.user_id, &req.candidate_ids, limit)
        .await
    {
        Ok(scored) => HttpResponse::Ok().json(ScoreCandidatesResponse {
            results: scored.results,
            total_candidates: scored.total_candidates,
            degraded: scored.degraded,
        }),
        Err(e) => engine_error(e),
    }
}

/// Like endpoint: propose a match, detecting mutual interest
///
/// POST /api/v1/matches/like
async fn like(state: web::Data<AppState>, req: web::Json<InteractionRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.engine.like(&req.user_id, &req.target_user_id).await {
        Ok(outcome) => HttpResponse::Ok().json(LikeResponse {
            created: outcome.created,
            mutual: outcome.mutual,
        }),
        Err(e) => engine_error(e),
    }
}

/// Pass endpoint: record an explicit negative interaction
///
/// POST /api/v1/matches/pass
async fn pass(state: web::Data<AppState>, req: web::Json<InteractionRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.engine.pass(&req.user_id, &req.target_user_id).await {
        Ok((edge, _created)) => HttpResponse::Ok().json(edge_response(edge)),
        Err(e) => engine_error(e),
    }
}

/// Accept endpoint
///
/// POST /api/v1/matches/accept
async fn accept(state: web::Data<AppState>, req: web::Json<InteractionRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.engine.accept(&req.user_id, &req.target_user_id).await {
        Ok(edge) => HttpResponse::Ok().json(edge_response(edge)),
        Err(e) => engine_error(e),
    }
}

/// Reject endpoint
///
/// POST /api/v1/matches/reject
async fn reject(state: web::Data<AppState>, req: web::Json<InteractionRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.engine.reject(&req.user_id, &req.target_user_id).await {
        Ok(edge) => HttpResponse::Ok().json(edge_response(edge)),
        Err(e) => engine_error(e),
    }
}

fn require_user_id(query: &HashMap<String, String>) -> Result<&String, HttpResponse> {
    query.get("userId").ok_or_else(|| {
        HttpResponse::BadRequest().json(ErrorResponse {
            error: "Missing userId parameter".to_string(),
            message: "userId query parameter is required".to_string(),
            status_code: 400,
        })
    })
}

/// List mutually accepted matches
///
/// GET /api/v1/matches?userId={userId}
async fn list_matches(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let user_id = match require_user_id(&query) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.engine.list_matches(user_id).await {
        Ok(matches) => HttpResponse::Ok().json(MatchListResponse {
            user_id: user_id.clone(),
            count: matches.len(),
            matches,
        }),
        Err(e) => engine_error(e),
    }
}

/// Recompute and return match statistics
///
/// GET /api/v1/stats?userId={userId}
async fn statistics(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let user_id = match require_user_id(&query) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let (statistics, engagement) = state.engine.statistics(user_id).await;

    HttpResponse::Ok().json(StatisticsResponse {
        user_id: user_id.clone(),
        statistics,
        engagement: engagement.map(|e| e.as_str().to_string()),
    })
}

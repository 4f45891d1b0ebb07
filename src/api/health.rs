use crate::events::ChangeFeed;
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::warn;

/// Liveness plus a database round trip.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database reachable", body = Object, example = json!({
            "status": "ok", "database": "ok", "subscriptions": 2
        })),
        (status = 503, description = "Database unreachable")
    ),
    tag = "Health"
)]
pub async fn health(pool: web::Data<MySqlPool>, feed: web::Data<ChangeFeed>) -> impl Responder {
    match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "database": "ok",
            "subscriptions": feed.active_subscriptions()
        })),
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "degraded",
                "database": "unreachable"
            }))
        }
    }
}

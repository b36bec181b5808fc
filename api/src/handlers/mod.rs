use axum::extract::State;

use crate::{context::ApiContext, error::ApiError};

pub mod certificates;
pub mod ocsp;


#[utoipa::path(
    get,
    path = "/health",
    tags = ["health"],
    responses((status = 200, description = "Storage is reachable", body = String))
)]
pub async fn health_check(State(ctx): State<ApiContext>) -> Result<&'static str, ApiError> {
    ctx.registry.storage().ping().await?;
    Ok("Healthy")
}

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use mir_ca::{
    CaError,
    ocsp::{self, ResponseStatus},
};
use mir_common::views::ApiErrorResponse;
use tracing::warn;

use crate::{context::ApiContext, error::ApiError};

const OCSP_RESPONSE_CONTENT_TYPE: &str = "application/ocsp-response";

fn ocsp_response(status: StatusCode, der: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, OCSP_RESPONSE_CONTENT_TYPE)], der).into_response()
}

/// Answer a DER OCSP request about certificates issued by `ipid`.
#[utoipa::path(
    post,
    path = "/{ipid}/ocsp",
    tags = ["ocsp"],
    params(("ipid" = String, Path, description = "Issuing organization")),
    request_body(content = Vec<u8>, content_type = "application/ocsp-request"),
    responses(
        (status = 200, description = "Signed OCSP response", body = Vec<u8>, content_type = "application/ocsp-response"),
        (status = 400, description = "malformedRequest OCSP response", body = Vec<u8>, content_type = "application/ocsp-response"),
        (status = 404, description = "Organization not found", body = ApiErrorResponse),
    )
)]
pub async fn respond(
    State(ctx): State<ApiContext>,
    Path(ipid): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let org = ctx.registry.organization(&ipid).await?;

    match org.respond_to_ocsp(&body).await {
        Ok(der) => Ok(ocsp_response(StatusCode::OK, der)),
        Err(CaError::MalformedRequest(reason)) => {
            warn!(%ipid, %reason, "Rejected OCSP request");
            Ok(ocsp_response(
                StatusCode::BAD_REQUEST,
                ocsp::unsuccessful(ResponseStatus::MalformedRequest),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use mir_common::views::{ApiErrorResponse, IssuedCertificate};
use tracing::info;

use crate::{context::ApiContext, error::ApiError};

const PEM_CHAIN_CONTENT_TYPE: &str = "application/pem-certificate-chain";

/// Issue a certificate for a signed request. The body is a JWS, flattened
/// JSON or compact, signed with the key to be certified and carrying it as
/// `jwk` in the protected header.
#[utoipa::path(
    put,
    path = "/{ipid}/certificates",
    tags = ["certificates"],
    params(("ipid" = String, Path, description = "Issuing organization")),
    request_body(content = String, content_type = "application/jose+json"),
    responses(
        (status = 200, description = "Certificate issued", body = IssuedCertificate),
        (status = 400, description = "Malformed or unverifiable request", body = ApiErrorResponse),
        (status = 404, description = "Organization not found", body = ApiErrorResponse),
        (status = 409, description = "No identifier available", body = ApiErrorResponse),
    )
)]
pub async fn request_certificate(
    State(ctx): State<ApiContext>,
    Path(ipid): Path<String>,
    body: String,
) -> Result<Json<IssuedCertificate>, ApiError> {
    let org = ctx.registry.organization(&ipid).await?;
    let (entity, cert) = ctx.registry.issue_for_request(&org, &body).await?;

    info!(mrn = %entity.uid, serial = %cert.serial, "Certificate request granted");
    Ok(Json(IssuedCertificate {
        mrn: entity.uid,
        x5u: cert.x5u,
    }))
}

/// The PEM chain of a certificate issued by `ipid`, leaf first.
#[utoipa::path(
    get,
    path = "/{ipid}/certificates/{file}",
    tags = ["certificates"],
    params(
        ("ipid" = String, Path, description = "Issuing organization"),
        ("file" = String, Path, description = "Hex serial followed by `.x5u`"),
    ),
    responses(
        (status = 200, description = "Certificate chain", body = String, content_type = "application/pem-certificate-chain"),
        (status = 404, description = "Unknown organization or serial", body = ApiErrorResponse),
    )
)]
pub async fn get_chain(
    State(ctx): State<ApiContext>,
    Path((ipid, file)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let serial = file.strip_suffix(".x5u").ok_or(ApiError::NotFound)?;
    let org = ctx.registry.organization(&ipid).await?;

    let chain = org.certificate_chain(serial).await?;
    if chain.is_empty() {
        return Err(ApiError::NotFound);
    }

    let pem: String = chain.into_iter().map(|cert| cert.pem).collect();
    Ok(([(header::CONTENT_TYPE, PEM_CHAIN_CONTENT_TYPE)], pem))
}

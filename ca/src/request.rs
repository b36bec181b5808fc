//! Signed certificate requests.
//!
//! A request is a JWS signed with the requester's own key, which it carries
//! as a JWK in the protected header. Both the flattened JSON and the compact
//! serialization are accepted.

use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header,
    jwk::{AlgorithmParameters, EllipticCurve, Jwk},
};
use mir_common::params::SubjectAttributes;
use serde::Deserialize;
use tracing::debug;

use crate::{error::CaError, keys::PublicKey};

/// A verified request: the requester's public key and the descriptive facts
/// it asked to have certified.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub public_key: PublicKey,
    pub attributes: SubjectAttributes,
}

#[derive(Deserialize)]
struct FlattenedJws {
    protected: String,
    payload: String,
    signature: String,
}

/// The compact form of `body`, which may be a flattened JWS JSON object, a
/// JSON string holding a compact JWS, or a bare compact JWS.
fn compact(body: &str) -> Result<String, CaError> {
    let body = body.trim();
    if body.starts_with('{') {
        let jws: FlattenedJws = serde_json::from_str(body)
            .map_err(|e| CaError::MalformedRequest(format!("invalid JWS JSON: {e}")))?;
        return Ok(format!("{}.{}.{}", jws.protected, jws.payload, jws.signature));
    }
    if body.starts_with('"') {
        return serde_json::from_str(body)
            .map_err(|e| CaError::MalformedRequest(format!("invalid JWS string: {e}")));
    }
    Ok(body.to_string())
}

/// Convert the header JWK into our key type, accepting only P-256 and P-384.
fn requester_key(jwk: &Jwk) -> Result<PublicKey, CaError> {
    let AlgorithmParameters::EllipticCurve(params) = &jwk.algorithm else {
        return Err(CaError::MalformedRequest("request key is not an EC key".into()));
    };
    let crv = match params.curve {
        EllipticCurve::P256 => "P-256",
        EllipticCurve::P384 => "P-384",
        _ => {
            return Err(CaError::MalformedRequest(
                "request key curve must be P-256 or P-384".into(),
            ));
        }
    };

    let jwk = serde_json::json!({
        "kty": "EC",
        "crv": crv,
        "x": params.x,
        "y": params.y,
    });
    PublicKey::from_jwk(&jwk.to_string())
        .map_err(|e| CaError::MalformedRequest(e.to_string()))
}

/// Verify `body` against the key in its own header and extract the request.
pub fn verify(body: &str) -> Result<SignedRequest, CaError> {
    let token = compact(body)?;
    let header = decode_header(&token)
        .map_err(|e| CaError::MalformedRequest(format!("invalid JWS header: {e}")))?;

    if !matches!(header.alg, Algorithm::ES256 | Algorithm::ES384) {
        return Err(CaError::MalformedRequest(format!(
            "unsupported JWS algorithm {:?}",
            header.alg
        )));
    }
    let jwk = header
        .jwk
        .as_ref()
        .ok_or_else(|| CaError::MalformedRequest("JWS header has no jwk".into()))?;

    let public_key = requester_key(jwk)?;
    let key = DecodingKey::from_jwk(jwk)
        .map_err(|e| CaError::MalformedRequest(format!("unusable JWK: {e}")))?;

    let mut validation = Validation::new(header.alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<SubjectAttributes>(&token, &key, &validation)
        .map_err(|e| CaError::ValidationFailure(e.to_string()))?;

    debug!(curve = public_key.curve().name(), "Verified certificate request");
    Ok(SignedRequest {
        public_key,
        attributes: data.claims.without_blanks(),
    })
}

//! Output views returned by the MIR HTTP surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of a successful certificate request.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IssuedCertificate {
    /// The MRN assigned to the requester. Fully qualified, e.g.
    /// `urn:mrn:mcp:id:acme:aboamare-spirit`.
    #[serde(rename = "MRN")]
    pub mrn: String,

    /// Where the PEM certificate chain of the new certificate can be fetched.
    pub x5u: Option<String>,
}

/// An error response for an API endpoint. This is used to return errors to the
/// client in a consistent format.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// An optional error code that can be used to identify the type of error
    /// that occurred.
    pub code: Option<String>,

    /// A human-readable message describing the error that occurred.
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `mrn` recorded for self-signed root certificates, which have no UID in
/// their subject.
pub const ROOT_MRN: &str = "root";

/// An issued certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCertificate {
    /// SHA-256 fingerprint of the DER certificate, lower-case hex.
    #[serde(rename = "_id")]
    pub id: String,

    /// Serial number, lower-case hex of the INTEGER content octets.
    pub serial: String,

    /// Subject MRN at issuance time, or [`ROOT_MRN`].
    pub mrn: String,

    pub pem: String,

    #[serde(
        rename = "notAfter",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub not_after: DateTime<Utc>,

    /// Fingerprint of the issuing certificate. Absent on self-signed roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DbCertStatus>,
}

impl Display for DbCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DbCertificate {{ id: {}, serial: {}, mrn: {}, parent: {:?} }}",
            self.id, self.serial, self.mrn, self.parent
        )
    }
}

/// Revocation state recorded against a certificate. A certificate without a
/// recorded state is good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DbCertStatus {
    Good,
    Revoked {
        #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
        at: DateTime<Utc>,
    },
    Unknown,
}

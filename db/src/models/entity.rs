use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mir_common::params::{DistinguishedName, SubjectAttributes};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Can issue certificates in its own namespace.
    Organization,
    /// A leaf: vessel, device, service or person.
    Entity,
}

/// Anything that can hold a certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbEntity {
    /// The MRN. Immutable once assigned.
    #[serde(rename = "_id")]
    pub uid: String,

    #[serde(rename = "type")]
    pub kind: EntityKind,

    /// Short, path-safe identifier of an organization. Unique across all
    /// entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipid: Option<String>,

    /// `ipid` of the organization that issued this entity's certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mir: Option<String>,

    #[serde(flatten)]
    pub attributes: SubjectAttributes,

    /// Administrator email addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crl: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocsp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matp: Option<String>,

    /// Subject name of the most recent certificate.
    #[serde(rename = "DN", default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<DistinguishedName>,

    /// Fingerprints of issued certificates, most recent first.
    #[serde(default)]
    pub certificates: Vec<String>,

    #[serde(
        rename = "certificateExpires",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub certificate_expires: Option<DateTime<Utc>>,

    /// Chain retrieval URL of the most recent certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5u: Option<String>,

    /// Fingerprint of the self-signed root, on the top-level organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Federation trust map: certificate fingerprint to trusted peer MRN.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trust: BTreeMap<String, String>,
}

impl DbEntity {
    pub fn new(uid: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            uid: uid.into(),
            kind,
            ipid: None,
            mir: None,
            attributes: SubjectAttributes::default(),
            owners: Vec::new(),
            crl: None,
            ocsp: None,
            matp: None,
            dn: None,
            certificates: Vec::new(),
            certificate_expires: None,
            x5u: None,
            root: None,
            trust: BTreeMap::new(),
        }
    }

    /// Fingerprint of the most recent certificate.
    pub fn fingerprint(&self) -> Option<&str> {
        self.certificates.first().map(String::as_str)
    }

    pub fn is_organization(&self) -> bool {
        self.kind == EntityKind::Organization
    }
}

#[cfg(test)]
mod tests {
    use bson::Bson;

    use super::*;

    #[test]
    fn expiry_is_stored_as_a_date() {
        let expires = DateTime::from_timestamp(1_900_000_000, 0).unwrap();
        let mut entity = DbEntity::new("urn:mrn:mcp:id:acme:ship", EntityKind::Entity);
        entity.certificate_expires = Some(expires);

        let doc = bson::to_document(&entity).unwrap();
        assert_eq!(
            doc.get("certificateExpires"),
            Some(&Bson::DateTime(bson::DateTime::from_chrono(expires)))
        );
        let back: DbEntity = bson::from_document(doc).unwrap();
        assert_eq!(back.certificate_expires, Some(expires));

        let doc = bson::to_document(&DbEntity::new("urn:mrn:mcp:id:acme", EntityKind::Organization)).unwrap();
        assert!(!doc.contains_key("certificateExpires"));
        let back: DbEntity = bson::from_document(doc).unwrap();
        assert_eq!(back.certificate_expires, None);
    }
}

//! Input parameters describing certificate subjects.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

mod name;
pub use name::*;

/// The descriptive facts an entity may carry. Every field is optional and
/// free-form; the ones that are present end up as otherName entries in the
/// Subject Alternative Name extension of the entity's certificate.
///
/// Field names on the wire follow the established MCP spelling (`callSign`,
/// `IMONumber`, `MMSI`, ...). Unknown fields are ignored when deserializing,
/// which is how a signed certificate request is reduced to the supported
/// properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct SubjectAttributes {
    /// Common name of the subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Organizational unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Two letter country code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// DNS domain the subject's services are published under. Never placed
    /// in a certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(rename = "callSign", default, skip_serializing_if = "Option::is_none")]
    pub call_sign: Option<String>,

    #[serde(rename = "IMONumber", default, skip_serializing_if = "Option::is_none")]
    pub imo_number: Option<String>,

    #[serde(rename = "MMSI", default, skip_serializing_if = "Option::is_none")]
    pub mmsi: Option<String>,

    #[serde(rename = "flagState", default, skip_serializing_if = "Option::is_none")]
    pub flag_state: Option<String>,

    #[serde(rename = "shipType", default, skip_serializing_if = "Option::is_none")]
    pub ship_type: Option<String>,

    #[serde(rename = "homePort", default, skip_serializing_if = "Option::is_none")]
    pub home_port: Option<String>,

    /// Another MRN the subject is known by.
    #[serde(rename = "secondaryMRN", default, skip_serializing_if = "Option::is_none")]
    pub secondary_mrn: Option<String>,

    #[serde(rename = "URL", alias = "url", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SubjectAttributes {
    /// Iterate over the present fields that belong in a Subject Alternative
    /// Name, as `(field name, value)` pairs. `domain` is not one of them.
    pub fn alt_name_fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("name", &self.name),
            ("organization", &self.organization),
            ("unit", &self.unit),
            ("country", &self.country),
            ("email", &self.email),
            ("callSign", &self.call_sign),
            ("IMONumber", &self.imo_number),
            ("MMSI", &self.mmsi),
            ("flagState", &self.flag_state),
            ("shipType", &self.ship_type),
            ("homePort", &self.home_port),
            ("secondaryMRN", &self.secondary_mrn),
            ("URL", &self.url),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
    }

    /// Drop fields holding empty strings so they count as absent.
    pub fn without_blanks(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.organization,
            &mut self.unit,
            &mut self.country,
            &mut self.email,
            &mut self.domain,
            &mut self.call_sign,
            &mut self.imo_number,
            &mut self.mmsi,
            &mut self.flag_state,
            &mut self.ship_type,
            &mut self.home_port,
            &mut self.secondary_mrn,
            &mut self.url,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }

    /// Fill every absent field from `defaults`. Fields already set are left
    /// alone.
    pub fn or(self, defaults: &SubjectAttributes) -> Self {
        let pick = |own: Option<String>, fallback: &Option<String>| own.or_else(|| fallback.clone());

        Self {
            name: pick(self.name, &defaults.name),
            organization: pick(self.organization, &defaults.organization),
            unit: pick(self.unit, &defaults.unit),
            country: pick(self.country, &defaults.country),
            email: pick(self.email, &defaults.email),
            domain: pick(self.domain, &defaults.domain),
            call_sign: pick(self.call_sign, &defaults.call_sign),
            imo_number: pick(self.imo_number, &defaults.imo_number),
            mmsi: pick(self.mmsi, &defaults.mmsi),
            flag_state: pick(self.flag_state, &defaults.flag_state),
            ship_type: pick(self.ship_type, &defaults.ship_type),
            home_port: pick(self.home_port, &defaults.home_port),
            secondary_mrn: pick(self.secondary_mrn, &defaults.secondary_mrn),
            url: pick(self.url, &defaults.url),
        }
    }
}

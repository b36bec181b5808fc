use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Attribute types that may appear in a certificate's subject or issuer name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ToSchema)]
pub enum NameAttribute {
    #[serde(rename = "country")]
    Country,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "organization")]
    Organization,
    #[serde(rename = "unit")]
    Unit,
    #[serde(rename = "UID", alias = "uid")]
    Uid,
}

/// Value of a name attribute. Integers are encoded as ASN.1 INTEGER, text as
/// UTF8String.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum NameValue {
    Integer(i64),
    Text(String),
}

impl From<&str> for NameValue {
    fn from(value: &str) -> Self {
        NameValue::Text(value.to_string())
    }
}

impl From<String> for NameValue {
    fn from(value: String) -> Self {
        NameValue::Text(value)
    }
}

impl From<i64> for NameValue {
    fn from(value: i64) -> Self {
        NameValue::Integer(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct NameEntry {
    pub attribute: NameAttribute,
    pub value: NameValue,
}

/// An ordered distinguished name. Each entry becomes its own relative
/// distinguished name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(transparent)]
pub struct DistinguishedName(Vec<NameEntry>);

impl DistinguishedName {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// The name `{UID: uid}` that identifies an organization acting as a CA.
    pub fn from_uid(uid: impl Into<String>) -> Self {
        Self::new().with(NameAttribute::Uid, uid.into())
    }

    /// Append an entry, builder style.
    pub fn with(mut self, attribute: NameAttribute, value: impl Into<NameValue>) -> Self {
        self.push(attribute, value);
        self
    }

    /// Append an entry when a value is present.
    pub fn with_opt(self, attribute: NameAttribute, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with(attribute, v),
            None => self,
        }
    }

    pub fn push(&mut self, attribute: NameAttribute, value: impl Into<NameValue>) {
        self.0.push(NameEntry {
            attribute,
            value: value.into(),
        });
    }

    pub fn get(&self, attribute: NameAttribute) -> Option<&NameValue> {
        self.0
            .iter()
            .find(|entry| entry.attribute == attribute)
            .map(|entry| &entry.value)
    }

    /// The UID entry, when it is text.
    pub fn uid(&self) -> Option<&str> {
        match self.get(NameAttribute::Uid) {
            Some(NameValue::Text(uid)) => Some(uid),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[NameEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let dn = DistinguishedName::new()
            .with(NameAttribute::Organization, "acme")
            .with(NameAttribute::Country, "US")
            .with_opt(NameAttribute::Email, None);

        let attributes: Vec<_> = dn.entries().iter().map(|e| e.attribute).collect();
        assert_eq!(attributes, vec![NameAttribute::Organization, NameAttribute::Country]);
    }

    #[test]
    fn integer_values_survive_serialization() {
        let dn = DistinguishedName::from_uid("urn:mrn:mcp:id:acme").with(NameAttribute::Unit, 7i64);
        let json = serde_json::to_string(&dn).unwrap();
        let back: DistinguishedName = serde_json::from_str(&json).unwrap();

        assert_eq!(back.get(NameAttribute::Unit), Some(&NameValue::Integer(7)));
        assert_eq!(back.uid(), Some("urn:mrn:mcp:id:acme"));
    }
}

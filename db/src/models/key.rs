use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A key pair belonging to an issued certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbKey {
    /// Fingerprint of the certificate this key pair was issued with.
    #[serde(rename = "_id")]
    pub id: String,

    /// Public key as JWK JSON.
    pub public: String,

    /// Private key as JWK JSON, when keys are stored unsealed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,

    /// Private key JWK sealed with AES-256-GCM: nonce (12 bytes) ||
    /// ciphertext || tag (16 bytes). The record id is the AAD.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "optional_binary")]
    pub sealed_private: Option<Vec<u8>>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Bytes as BSON binary with the generic subtype.
mod optional_binary {
    use bson::{Binary, spec::BinarySubtype};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        bytes
            .as_ref()
            .map(|bytes| Binary {
                subtype: BinarySubtype::Generic,
                bytes: bytes.clone(),
            })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Ok(Option::<Binary>::deserialize(deserializer)?.map(|binary| binary.bytes))
    }
}

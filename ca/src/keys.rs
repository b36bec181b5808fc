//! Key pair lifecycle: generation, JWK interchange, storage and a cache of
//! loaded signing keys.

use std::{collections::HashMap, fmt, sync::Arc};

use chrono::Utc;
use mir_db::{models::DbKey, storage::Storage};
use p256::ecdsa::signature::Signer;
use pkcs8::EncodePublicKey;
use rand_core::OsRng;
use sha1::{Digest, Sha1};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    crypto::aes::{self, KEY_SIZE},
    error::CaError,
    oid::{self, Oid},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
}

impl Curve {
    /// The JWK `crv` name.
    pub fn name(&self) -> &'static str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "P-256" => Some(Curve::P256),
            "P-384" => Some(Curve::P384),
            _ => None,
        }
    }

    /// ECDSA with the digest matching the curve size.
    pub fn signature_algorithm(&self) -> Oid {
        match self {
            Curve::P256 => oid::ECDSA_WITH_SHA256,
            Curve::P384 => oid::ECDSA_WITH_SHA384,
        }
    }
}

fn curve_of_jwk(jwk: &str) -> Result<Curve, CaError> {
    let value: serde_json::Value = serde_json::from_str(jwk)
        .map_err(|e| CaError::InvalidSubject(format!("invalid JWK: {e}")))?;

    if value.get("kty").and_then(|v| v.as_str()) != Some("EC") {
        return Err(CaError::InvalidSubject("JWK is not an EC key".into()));
    }

    value
        .get("crv")
        .and_then(|v| v.as_str())
        .and_then(Curve::from_name)
        .ok_or_else(|| CaError::InvalidSubject("JWK curve must be P-256 or P-384".into()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
}

impl PublicKey {
    pub fn from_jwk(jwk: &str) -> Result<Self, CaError> {
        let invalid = |e: p256::elliptic_curve::Error| {
            CaError::InvalidSubject(format!("invalid public JWK: {e}"))
        };

        Ok(match curve_of_jwk(jwk)? {
            Curve::P256 => PublicKey::P256(p256::PublicKey::from_jwk_str(jwk).map_err(invalid)?),
            Curve::P384 => PublicKey::P384(p384::PublicKey::from_jwk_str(jwk).map_err(invalid)?),
        })
    }

    pub fn to_jwk(&self) -> String {
        match self {
            PublicKey::P256(key) => key.to_jwk_string(),
            PublicKey::P384(key) => key.to_jwk_string(),
        }
    }

    pub fn curve(&self) -> Curve {
        match self {
            PublicKey::P256(_) => Curve::P256,
            PublicKey::P384(_) => Curve::P384,
        }
    }

    /// DER SubjectPublicKeyInfo.
    pub fn spki_der(&self) -> Result<Vec<u8>, CaError> {
        let der = match self {
            PublicKey::P256(key) => key.to_public_key_der(),
            PublicKey::P384(key) => key.to_public_key_der(),
        }
        .map_err(|e| CaError::InvalidSubject(format!("cannot encode public key: {e}")))?;

        Ok(der.as_bytes().to_vec())
    }

    /// The uncompressed point, i.e. the contents of the SPKI bit string.
    pub fn raw_bytes(&self) -> Vec<u8> {
        use p256::elliptic_curve::sec1::ToEncodedPoint;

        match self {
            PublicKey::P256(key) => key.to_encoded_point(false).as_bytes().to_vec(),
            PublicKey::P384(key) => key.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// SHA-1 of the raw public key, as used for subject and authority key
    /// identifiers.
    pub fn key_identifier(&self) -> Vec<u8> {
        Sha1::digest(self.raw_bytes()).to_vec()
    }
}

/// A private key ready to sign.
#[derive(Clone)]
pub enum SigningKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("curve", &self.curve().name())
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    pub fn generate(curve: Curve) -> Self {
        match curve {
            Curve::P256 => SigningKey::P256(p256::SecretKey::random(&mut OsRng)),
            Curve::P384 => SigningKey::P384(p384::SecretKey::random(&mut OsRng)),
        }
    }

    /// Import a private key from its JWK form.
    pub fn from_jwk(jwk: &str) -> Result<Self, CaError> {
        let invalid =
            |e: p256::elliptic_curve::Error| CaError::SigningFailure(format!("invalid private JWK: {e}"));

        Ok(match curve_of_jwk(jwk).map_err(|e| CaError::SigningFailure(e.to_string()))? {
            Curve::P256 => SigningKey::P256(p256::SecretKey::from_jwk_str(jwk).map_err(invalid)?),
            Curve::P384 => SigningKey::P384(p384::SecretKey::from_jwk_str(jwk).map_err(invalid)?),
        })
    }

    pub fn to_jwk(&self) -> String {
        match self {
            SigningKey::P256(key) => key.to_jwk_string().as_str().to_string(),
            SigningKey::P384(key) => key.to_jwk_string().as_str().to_string(),
        }
    }

    pub fn curve(&self) -> Curve {
        match self {
            SigningKey::P256(_) => Curve::P256,
            SigningKey::P384(_) => Curve::P384,
        }
    }

    pub fn algorithm(&self) -> Oid {
        self.curve().signature_algorithm()
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            SigningKey::P256(key) => PublicKey::P256(key.public_key()),
            SigningKey::P384(key) => PublicKey::P384(key.public_key()),
        }
    }

    /// DER-encoded ECDSA signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CaError> {
        match self {
            SigningKey::P256(key) => {
                let signer = p256::ecdsa::SigningKey::from(key);
                let signature: p256::ecdsa::Signature =
                    signer.try_sign(message).map_err(CaError::signing)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            SigningKey::P384(key) => {
                let signer = p384::ecdsa::SigningKey::from(key);
                let signature: p384::ecdsa::Signature =
                    signer.try_sign(message).map_err(CaError::signing)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

/// Exported key pair in JWK interchange form.
#[derive(Clone)]
pub struct KeyPair {
    pub public: String,
    pub private: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &"<redacted>")
            .finish()
    }
}

impl KeyPair {
    pub fn public_key(&self) -> Result<PublicKey, CaError> {
        PublicKey::from_jwk(&self.public)
    }
}

/// Generates, stores and loads key pairs. Loaded signing keys are cached by
/// certificate fingerprint for the life of the manager; issued keys never
/// rotate.
pub struct KeyManager {
    storage: Arc<dyn Storage>,
    sealing_key: Option<[u8; KEY_SIZE]>,
    cache: Mutex<HashMap<String, Arc<SigningKey>>>,
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("sealed", &self.sealing_key.is_some())
            .finish_non_exhaustive()
    }
}

impl KeyManager {
    /// With a `sealing_key`, private keys are stored AES-256-GCM sealed and
    /// bound to their record id.
    pub fn new(storage: Arc<dyn Storage>, sealing_key: Option<[u8; KEY_SIZE]>) -> Self {
        Self {
            storage,
            sealing_key,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn generate_key_pair(curve: Curve) -> KeyPair {
        let key = SigningKey::generate(curve);
        KeyPair {
            public: key.public_key().to_jwk(),
            private: key.to_jwk(),
        }
    }

    pub fn import_for_signing(private_jwk: &str) -> Result<SigningKey, CaError> {
        SigningKey::from_jwk(private_jwk)
    }

    /// Fetch the key pair stored for the certificate with `fingerprint`.
    pub async fn load_key_pair(&self, fingerprint: &str) -> Result<KeyPair, CaError> {
        let record = self
            .storage
            .get_key(fingerprint)
            .await?
            .ok_or_else(|| CaError::KeyNotFound {
                fingerprint: fingerprint.to_string(),
            })?;

        let private = match (record.private, record.sealed_private, &self.sealing_key) {
            (_, Some(sealed), Some(key)) => {
                let opened = aes::open(key, &sealed, &record.id)?;
                String::from_utf8(opened)
                    .map_err(|e| CaError::KeySealing(format!("sealed key is not UTF-8: {e}")))?
            }
            (_, Some(_), None) => {
                return Err(CaError::KeySealing(format!(
                    "key {fingerprint} is sealed but no key-encryption key is configured"
                )));
            }
            (Some(private), None, _) => private,
            (None, None, _) => {
                return Err(CaError::KeyNotFound {
                    fingerprint: fingerprint.to_string(),
                });
            }
        };

        Ok(KeyPair {
            public: record.public,
            private,
        })
    }

    /// The signing key for the certificate with `fingerprint`, loading it on
    /// first use. Concurrent callers wait on the same lock, so a key is
    /// imported at most once.
    pub async fn signing_key(&self, fingerprint: &str) -> Result<Arc<SigningKey>, CaError> {
        let mut cache = self.cache.lock().await;
        if let Some(key) = cache.get(fingerprint) {
            return Ok(key.clone());
        }

        let pair = self.load_key_pair(fingerprint).await?;
        let key = Arc::new(Self::import_for_signing(&pair.private)?);
        debug!(fingerprint, curve = key.curve().name(), "Loaded signing key");

        cache.insert(fingerprint.to_string(), key.clone());
        Ok(key)
    }

    /// Persist `pair` as the key of the certificate with `fingerprint`.
    pub async fn store_key_pair(&self, fingerprint: &str, pair: &KeyPair) -> Result<(), CaError> {
        let (private, sealed_private) = match &self.sealing_key {
            Some(key) => (None, Some(aes::seal(key, pair.private.as_bytes(), fingerprint)?)),
            None => (Some(pair.private.clone()), None),
        };

        self.storage
            .insert_key(DbKey {
                id: fingerprint.to_string(),
                public: pair.public.clone(),
                private,
                sealed_private,
                created_at: Utc::now(),
            })
            .await?;

        info!(fingerprint, sealed = self.sealing_key.is_some(), "Stored key pair");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mir_db::storage::{KeyStore, memory::MemoryStorage};
    use p256::ecdsa::signature::Verifier;

    use super::*;

    #[test]
    fn curve_picks_signature_algorithm() {
        assert_eq!(Curve::P256.signature_algorithm(), oid::ECDSA_WITH_SHA256);
        assert_eq!(Curve::P384.signature_algorithm(), oid::ECDSA_WITH_SHA384);

        let pair = KeyManager::generate_key_pair(Curve::P384);
        let key = KeyManager::import_for_signing(&pair.private).unwrap();
        assert_eq!(key.algorithm(), oid::ECDSA_WITH_SHA384);
    }

    #[test]
    fn jwk_export_imports_back_to_the_same_key() {
        let pair = KeyManager::generate_key_pair(Curve::P256);
        let key = SigningKey::from_jwk(&pair.private).unwrap();

        assert_eq!(key.public_key(), pair.public_key().unwrap());
        assert!(pair.public.contains("\"crv\":\"P-256\""));
        assert!(!pair.public.contains("\"d\""));
    }

    #[test]
    fn signatures_verify_with_the_public_key() {
        let key = SigningKey::generate(Curve::P384);
        let signature = key.sign(b"to be signed").unwrap();

        let PublicKey::P384(public) = key.public_key() else {
            panic!("expected a P-384 key");
        };
        let verifier = p384::ecdsa::VerifyingKey::from(&public);
        let signature = p384::ecdsa::Signature::from_der(&signature).unwrap();
        assert!(verifier.verify(b"to be signed", &signature).is_ok());
    }

    #[test]
    fn key_identifier_is_sha1_of_the_point() {
        let key = SigningKey::generate(Curve::P256).public_key();
        let raw = key.raw_bytes();

        assert_eq!(raw.len(), 65);
        assert_eq!(raw[0], 0x04);
        assert_eq!(key.key_identifier(), Sha1::digest(&raw).to_vec());
    }

    #[test]
    fn rejects_non_ec_jwk() {
        let err = PublicKey::from_jwk(r#"{"kty":"OKP","crv":"Ed25519","x":"abc"}"#).unwrap_err();
        assert!(matches!(err, CaError::InvalidSubject(_)));
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let keys = KeyManager::new(Arc::new(MemoryStorage::new()), None);
        let err = keys.signing_key("nope").await.unwrap_err();
        assert!(matches!(err, CaError::KeyNotFound { .. }));
    }

    #[tokio::test]
    async fn stored_keys_load_sealed_and_unsealed() {
        let storage = Arc::new(MemoryStorage::new());
        let plain = KeyManager::new(storage.clone(), None);
        let sealed = KeyManager::new(storage.clone(), Some([7u8; KEY_SIZE]));

        let a = KeyManager::generate_key_pair(Curve::P384);
        plain.store_key_pair("fp-a", &a).await.unwrap();
        let b = KeyManager::generate_key_pair(Curve::P384);
        sealed.store_key_pair("fp-b", &b).await.unwrap();

        let record = storage.get_key("fp-b").await.unwrap().unwrap();
        assert!(record.private.is_none());
        assert!(record.sealed_private.is_some());

        assert_eq!(plain.load_key_pair("fp-a").await.unwrap().private, a.private);
        assert_eq!(sealed.load_key_pair("fp-b").await.unwrap().private, b.private);
        assert!(plain.load_key_pair("fp-b").await.is_err());

        let first = sealed.signing_key("fp-b").await.unwrap();
        let second = sealed.signing_key("fp-b").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}

//! In-memory storage backend
//!
//! Keeps every collection in a hashmap and enforces the same unique
//! constraints as the MongoDB backend. Used by tests and throwaway
//! deployments; data is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    models::{DbCertStatus, DbCertificate, DbEntity, DbKey},
    storage::{
        CertificateStore, EntityStore, KeyStore, StoreError, Storage, in_namespace,
        mongodb::{
            MONGODB_COLLECTION_CERTIFICATES, MONGODB_COLLECTION_ENTITIES, MONGODB_COLLECTION_KEYS,
        },
    },
};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    keys: RwLock<HashMap<String, DbKey>>,
    certificates: RwLock<HashMap<String, DbCertificate>>,
    entities: RwLock<HashMap<String, DbEntity>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ipid_taken(entities: &HashMap<String, DbEntity>, entity: &DbEntity) -> bool {
    match entity.ipid.as_deref() {
        Some(ipid) => entities
            .values()
            .any(|e| e.uid != entity.uid && e.ipid.as_deref() == Some(ipid)),
        None => false,
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl KeyStore for MemoryStorage {
    async fn insert_key(&self, key: DbKey) -> Result<(), StoreError> {
        let mut keys = self.keys.write().await;
        if keys.contains_key(&key.id) {
            return Err(StoreError::Duplicate {
                collection: MONGODB_COLLECTION_KEYS,
                id: key.id,
            });
        }
        keys.insert(key.id.clone(), key);
        Ok(())
    }

    async fn get_key(&self, id: &str) -> Result<Option<DbKey>, StoreError> {
        Ok(self.keys.read().await.get(id).cloned())
    }
}

#[async_trait]
impl CertificateStore for MemoryStorage {
    async fn insert_certificate(&self, cert: DbCertificate) -> Result<(), StoreError> {
        let mut certificates = self.certificates.write().await;
        if certificates.contains_key(&cert.id) {
            return Err(StoreError::Duplicate {
                collection: MONGODB_COLLECTION_CERTIFICATES,
                id: cert.id,
            });
        }
        debug!(id = %cert.id, serial = %cert.serial, "Storing certificate");
        certificates.insert(cert.id.clone(), cert);
        Ok(())
    }

    async fn get_certificate(&self, id: &str) -> Result<Option<DbCertificate>, StoreError> {
        Ok(self.certificates.read().await.get(id).cloned())
    }

    async fn find_in_namespace(
        &self,
        serial: &str,
        namespace: &str,
    ) -> Result<Option<DbCertificate>, StoreError> {
        Ok(self
            .certificates
            .read()
            .await
            .values()
            .find(|c| c.serial == serial && in_namespace(&c.mrn, namespace))
            .cloned())
    }

    async fn find_by_serials(&self, serials: &[String]) -> Result<Vec<DbCertificate>, StoreError> {
        Ok(self
            .certificates
            .read()
            .await
            .values()
            .filter(|c| serials.contains(&c.serial))
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: &str, status: DbCertStatus) -> Result<(), StoreError> {
        let mut certificates = self.certificates.write().await;
        let cert = certificates.get_mut(id).ok_or(StoreError::NotFound)?;
        cert.status = Some(status);
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MemoryStorage {
    async fn insert_entity(&self, entity: DbEntity) -> Result<(), StoreError> {
        let mut entities = self.entities.write().await;
        if entities.contains_key(&entity.uid) || ipid_taken(&entities, &entity) {
            return Err(StoreError::Duplicate {
                collection: MONGODB_COLLECTION_ENTITIES,
                id: entity.uid,
            });
        }
        entities.insert(entity.uid.clone(), entity);
        Ok(())
    }

    async fn upsert_entity(&self, entity: DbEntity) -> Result<(), StoreError> {
        let mut entities = self.entities.write().await;
        if ipid_taken(&entities, &entity) {
            return Err(StoreError::Duplicate {
                collection: MONGODB_COLLECTION_ENTITIES,
                id: entity.uid,
            });
        }
        entities.insert(entity.uid.clone(), entity);
        Ok(())
    }

    async fn get_entity(&self, uid: &str) -> Result<Option<DbEntity>, StoreError> {
        Ok(self.entities.read().await.get(uid).cloned())
    }

    async fn find_by_ipid(&self, ipid: &str) -> Result<Option<DbEntity>, StoreError> {
        Ok(self
            .entities
            .read()
            .await
            .values()
            .find(|e| e.ipid.as_deref() == Some(ipid))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::EntityKind;

    fn cert(id: &str, serial: &str, mrn: &str) -> DbCertificate {
        DbCertificate {
            id: id.into(),
            serial: serial.into(),
            mrn: mrn.into(),
            pem: String::new(),
            not_after: Utc::now(),
            parent: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn entity_uid_and_ipid_are_unique() {
        let stg = MemoryStorage::new();

        let mut acme = DbEntity::new("urn:mrn:mcp:id:acme", EntityKind::Organization);
        acme.ipid = Some("acme".into());
        stg.insert_entity(acme.clone()).await.unwrap();

        let err = stg.insert_entity(acme).await.unwrap_err();
        assert!(err.is_duplicate());

        let mut other = DbEntity::new("urn:mrn:mcp:id:other", EntityKind::Organization);
        other.ipid = Some("acme".into());
        assert!(stg.insert_entity(other).await.unwrap_err().is_duplicate());

        let found = stg.find_by_ipid("acme").await.unwrap().unwrap();
        assert_eq!(found.uid, "urn:mrn:mcp:id:acme");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_entity() {
        let stg = MemoryStorage::new();
        let mut ship = DbEntity::new("urn:mrn:mcp:id:acme:ship", EntityKind::Entity);
        stg.insert_entity(ship.clone()).await.unwrap();

        ship.certificates.insert(0, "abc".into());
        stg.upsert_entity(ship).await.unwrap();

        let stored = stg.get_entity("urn:mrn:mcp:id:acme:ship").await.unwrap().unwrap();
        assert_eq!(stored.fingerprint(), Some("abc"));
    }

    #[tokio::test]
    async fn namespace_lookup_ignores_other_organizations() {
        let stg = MemoryStorage::new();
        stg.insert_certificate(cert("a", "01", "urn:mrn:mcp:id:acme:ship")).await.unwrap();
        stg.insert_certificate(cert("b", "02", "urn:mrn:mcp:id:other:ship")).await.unwrap();

        let found = stg.find_in_namespace("01", "urn:mrn:mcp:id:acme").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some("a".to_string()));

        let missing = stg.find_in_namespace("02", "urn:mrn:mcp:id:acme").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn set_status_on_missing_certificate_fails() {
        let stg = MemoryStorage::new();
        let err = stg.set_status("nope", DbCertStatus::Unknown).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tracing::{debug, info};

use crate::{
    models::{DbCertStatus, DbCertificate, DbEntity, DbKey},
    storage::{CertificateStore, EntityStore, KeyStore, StoreError, Storage},
};

pub const MONGODB_COLLECTION_KEYS: &str = "keys";
pub const MONGODB_COLLECTION_CERTIFICATES: &str = "certificates";
pub const MONGODB_COLLECTION_ENTITIES: &str = "entities";

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug)]
pub struct MongoDBStorage(Client);

impl MongoDBStorage {
    pub async fn new(uri: &str) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self(client))
    }

    fn get_db(&self) -> Database {
        self.0
            .default_database()
            .unwrap_or_else(|| self.0.database("mir"))
    }

    fn keys(&self) -> Collection<DbKey> {
        self.get_db().collection(MONGODB_COLLECTION_KEYS)
    }

    fn certificates(&self) -> Collection<DbCertificate> {
        self.get_db().collection(MONGODB_COLLECTION_CERTIFICATES)
    }

    fn entities(&self) -> Collection<DbEntity> {
        self.get_db().collection(MONGODB_COLLECTION_ENTITIES)
    }

    /// Create the secondary indexes the CA relies on. Safe to call on every
    /// start; existing indexes are left alone.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let certificates = self.certificates();
        certificates
            .create_index(IndexModel::builder().keys(doc! { "serial": 1 }).build())
            .await?;
        certificates
            .create_index(IndexModel::builder().keys(doc! { "mrn": 1 }).build())
            .await?;

        let entities = self.entities();
        entities
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "ipid": 1 })
                    .options(IndexOptions::builder().unique(true).sparse(true).build())
                    .build(),
            )
            .await?;
        entities
            .create_index(IndexModel::builder().keys(doc! { "type": 1 }).build())
            .await?;

        info!("MongoDB indexes in place");
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

fn insert_error(err: mongodb::error::Error, collection: &'static str, id: &str) -> StoreError {
    if is_duplicate_key(&err) {
        debug!(collection, id, "Duplicate key on insert");
        StoreError::Duplicate {
            collection,
            id: id.to_string(),
        }
    } else {
        StoreError::MongoDB(err)
    }
}

/// Escape `value` for use as a literal inside a MongoDB regular expression.
fn regex_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\.^$|?*+()[]{}/".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Storage for MongoDBStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        self.get_db().run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyStore for MongoDBStorage {
    async fn insert_key(&self, key: DbKey) -> Result<(), StoreError> {
        self.keys()
            .insert_one(&key)
            .await
            .map_err(|e| insert_error(e, MONGODB_COLLECTION_KEYS, &key.id))?;
        Ok(())
    }

    async fn get_key(&self, id: &str) -> Result<Option<DbKey>, StoreError> {
        Ok(self.keys().find_one(doc! { "_id": id }).await?)
    }
}

#[async_trait]
impl CertificateStore for MongoDBStorage {
    async fn insert_certificate(&self, cert: DbCertificate) -> Result<(), StoreError> {
        self.certificates()
            .insert_one(&cert)
            .await
            .map_err(|e| insert_error(e, MONGODB_COLLECTION_CERTIFICATES, &cert.id))?;
        Ok(())
    }

    async fn get_certificate(&self, id: &str) -> Result<Option<DbCertificate>, StoreError> {
        Ok(self.certificates().find_one(doc! { "_id": id }).await?)
    }

    async fn find_in_namespace(
        &self,
        serial: &str,
        namespace: &str,
    ) -> Result<Option<DbCertificate>, StoreError> {
        let pattern = format!("^{}:.+", regex_escape(namespace));

        Ok(self
            .certificates()
            .find_one(doc! { "serial": serial, "mrn": { "$regex": pattern } })
            .await?)
    }

    async fn find_by_serials(&self, serials: &[String]) -> Result<Vec<DbCertificate>, StoreError> {
        self.certificates()
            .find(doc! { "serial": { "$in": serials.to_vec() } })
            .await?
            .try_collect()
            .await
            .map_err(StoreError::MongoDB)
    }

    async fn set_status(&self, id: &str, status: DbCertStatus) -> Result<(), StoreError> {
        let status =
            mongodb::bson::to_bson(&status).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = self
            .certificates()
            .update_one(doc! { "_id": id }, doc! { "$set": { "status": status } })
            .await?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MongoDBStorage {
    async fn insert_entity(&self, entity: DbEntity) -> Result<(), StoreError> {
        self.entities()
            .insert_one(&entity)
            .await
            .map_err(|e| insert_error(e, MONGODB_COLLECTION_ENTITIES, &entity.uid))?;
        Ok(())
    }

    async fn upsert_entity(&self, entity: DbEntity) -> Result<(), StoreError> {
        self.entities()
            .replace_one(doc! { "_id": &entity.uid }, &entity)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get_entity(&self, uid: &str) -> Result<Option<DbEntity>, StoreError> {
        Ok(self.entities().find_one(doc! { "_id": uid }).await?)
    }

    async fn find_by_ipid(&self, ipid: &str) -> Result<Option<DbEntity>, StoreError> {
        Ok(self.entities().find_one(doc! { "ipid": ipid }).await?)
    }
}

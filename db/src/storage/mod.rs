use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DbCertStatus, DbCertificate, DbEntity, DbKey};

pub mod memory;
pub mod mongodb;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query Error: {0}")]
    MongoDB(#[from] ::mongodb::error::Error),

    /// A unique constraint rejected an insert.
    #[error("Duplicate {collection} record: {id}")]
    Duplicate { collection: &'static str, id: String },

    #[error("Record not found")]
    NotFound,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

#[async_trait]
pub trait Storage: KeyStore + CertificateStore + EntityStore + Send + Sync + 'static {
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait KeyStore {
    /// Fails with [`StoreError::Duplicate`] when a key for that certificate
    /// already exists.
    async fn insert_key(&self, key: DbKey) -> Result<(), StoreError>;

    async fn get_key(&self, id: &str) -> Result<Option<DbKey>, StoreError>;
}

#[async_trait]
pub trait CertificateStore {
    async fn insert_certificate(&self, cert: DbCertificate) -> Result<(), StoreError>;

    async fn get_certificate(&self, id: &str) -> Result<Option<DbCertificate>, StoreError>;

    /// Find the certificate with `serial` whose subject MRN lies strictly
    /// below `namespace` (`{namespace}:` followed by at least one character).
    async fn find_in_namespace(
        &self,
        serial: &str,
        namespace: &str,
    ) -> Result<Option<DbCertificate>, StoreError>;

    async fn find_by_serials(&self, serials: &[String]) -> Result<Vec<DbCertificate>, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no certificate has that id.
    async fn set_status(&self, id: &str, status: DbCertStatus) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EntityStore {
    /// Fails with [`StoreError::Duplicate`] when the uid, or a non-empty ipid,
    /// is already taken.
    async fn insert_entity(&self, entity: DbEntity) -> Result<(), StoreError>;

    async fn upsert_entity(&self, entity: DbEntity) -> Result<(), StoreError>;

    async fn get_entity(&self, uid: &str) -> Result<Option<DbEntity>, StoreError>;

    async fn find_by_ipid(&self, ipid: &str) -> Result<Option<DbEntity>, StoreError>;
}

/// Whether `mrn` lies strictly below `namespace`.
pub fn in_namespace(mrn: &str, namespace: &str) -> bool {
    mrn.strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix(':'))
        .is_some_and(|rest| !rest.is_empty())
}

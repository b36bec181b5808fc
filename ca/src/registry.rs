//! The registry of organizations, and issuance on behalf of them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mir_common::params::SubjectAttributes;
use mir_db::{
    models::{DbCertStatus, DbEntity, EntityKind},
    storage::{Storage, StoreError},
};
use tracing::{info, instrument, warn};

use crate::{
    authority::{self, BootstrapConfig, CertificateAuthority, DEFAULT_VALIDITY_DAYS, SubjectKind},
    certificate::IssuedCertificate,
    error::CaError,
    keys::KeyManager,
    naming::{claim_first, mrn_for, suggest_candidates},
    request,
};

#[derive(Clone)]
pub struct Registry {
    storage: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
    /// ipid of the top-level organization.
    top: String,
    /// Organization ipids created on first lookup.
    auto_create: Vec<String>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("top", &self.top)
            .field("auto_create", &self.auto_create)
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn new(
        storage: Arc<dyn Storage>,
        keys: Arc<KeyManager>,
        top: impl Into<String>,
        auto_create: Vec<String>,
    ) -> Self {
        Self {
            storage,
            keys,
            top: top.into(),
            auto_create,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Bootstrap the top-level organization.
    pub async fn initialize(&self, config: &BootstrapConfig) -> Result<DbEntity, CaError> {
        authority::initialize(self.storage.clone(), self.keys.clone(), config).await
    }

    fn authority(&self, org: DbEntity) -> CertificateAuthority {
        CertificateAuthority::new(org, self.storage.clone(), self.keys.clone())
    }

    async fn find_organization(&self, ipid: &str) -> Result<Option<DbEntity>, CaError> {
        match self.storage.find_by_ipid(ipid).await? {
            Some(entity) if entity.is_organization() => Ok(Some(entity)),
            Some(_) => Err(CaError::IdentifierUnavailable),
            None => Ok(None),
        }
    }

    /// The organization with `ipid`, as an authority. Organizations on the
    /// auto-create list are created under the top-level organization on
    /// first use.
    #[instrument(skip(self))]
    pub async fn organization(&self, ipid: &str) -> Result<CertificateAuthority, CaError> {
        if let Some(org) = self.find_organization(ipid).await? {
            return Ok(self.authority(self.complete(org).await?));
        }

        if !self.auto_create.iter().any(|candidate| candidate == ipid) {
            return Err(CaError::OrganizationNotFound(ipid.to_string()));
        }

        let top = self
            .find_organization(&self.top)
            .await?
            .ok_or_else(|| CaError::OrganizationNotFound(self.top.clone()))?;
        let created = self
            .create_organization(&self.authority(top), Some(ipid), SubjectAttributes::default())
            .await?;
        Ok(self.authority(created))
    }

    /// Create an organization in the namespace of `parent`, under the first
    /// free identifier suggested by `ipid` and `attributes`. An organization
    /// that names its own `organization` inherits the parent's contact
    /// details; otherwise it becomes an organizational unit of the parent.
    #[instrument(skip(self, parent, attributes), fields(parent = %parent.uid()))]
    pub async fn create_organization(
        &self,
        parent: &CertificateAuthority,
        ipid: Option<&str>,
        attributes: SubjectAttributes,
    ) -> Result<DbEntity, CaError> {
        let attributes = attributes.without_blanks();
        let candidates: Vec<String> = suggest_candidates(ipid, &attributes).collect();
        let owner = parent.organization();

        let mut org = claim_first(candidates, |candidate| {
            let mut template = SubjectAttributes {
                country: owner.attributes.country.clone(),
                domain: owner.attributes.domain.clone(),
                email: owner.attributes.email.clone(),
                organization: owner.attributes.organization.clone(),
                ..Default::default()
            };
            if attributes.organization.is_none() {
                template.organization = owner
                    .attributes
                    .organization
                    .clone()
                    .or_else(|| owner.ipid.clone());
                template.unit = Some(candidate.clone());
            }

            let mut org = DbEntity::new(mrn_for(parent.uid(), &candidate), EntityKind::Organization);
            org.ipid = Some(candidate);
            org.attributes = attributes.clone().or(&template);
            org.owners = org.attributes.email.iter().cloned().collect();

            let storage = self.storage.clone();
            async move {
                storage.insert_entity(org.clone()).await?;
                Ok(org)
            }
        })
        .await?;

        let org = self.certify(parent, org).await?;
        info!(uid = %org.uid, ipid = ?org.ipid, "Created organization");
        Ok(org)
    }

    /// Issue the Mir certificate of `org` from `parent` and store the result.
    async fn certify(
        &self,
        parent: &CertificateAuthority,
        mut org: DbEntity,
    ) -> Result<DbEntity, CaError> {
        parent
            .issue_certificate(&mut org, SubjectKind::Mir, DEFAULT_VALIDITY_DAYS, None)
            .await?;
        self.storage.upsert_entity(org.clone()).await?;
        Ok(org)
    }

    /// An organization claimed by a creation whose issuance failed has no
    /// certificate yet. Issue it from the organization one level up.
    async fn complete(&self, org: DbEntity) -> Result<DbEntity, CaError> {
        if org.fingerprint().is_some() {
            return Ok(org);
        }

        let parent = match org.uid.rsplit_once(':') {
            Some((parent_uid, _)) => self.storage.get_entity(parent_uid).await?,
            None => None,
        };
        let Some(parent) = parent.filter(DbEntity::is_organization) else {
            return Err(CaError::OrganizationNotFound(org.uid.clone()));
        };

        warn!(uid = %org.uid, parent = %parent.uid, "Organization has no certificate, issuing one");
        self.certify(&self.authority(parent), org).await
    }

    /// Verify a signed certificate request and issue an entity certificate
    /// for it in `org`'s namespace. Returns the new entity and certificate.
    #[instrument(skip(self, org, body), fields(org = %org.uid()))]
    pub async fn issue_for_request(
        &self,
        org: &CertificateAuthority,
        body: &str,
    ) -> Result<(DbEntity, IssuedCertificate), CaError> {
        let request = request::verify(body)?;
        let owner = org.organization();
        let defaults = SubjectAttributes {
            email: owner.attributes.email.clone(),
            ..Default::default()
        };

        let candidates: Vec<String> = suggest_candidates(None, &request.attributes)
            .map(|candidate| mrn_for(org.uid(), &candidate))
            .collect();

        let mut entity = claim_first(candidates, |uid| {
            let mut entity = DbEntity::new(uid, EntityKind::Entity);
            entity.mir = owner.ipid.clone();
            entity.attributes = request.attributes.clone().or(&defaults);

            let storage = self.storage.clone();
            async move {
                storage.insert_entity(entity.clone()).await?;
                Ok(entity)
            }
        })
        .await?;

        let cert = org
            .issue_certificate(
                &mut entity,
                SubjectKind::Entity,
                DEFAULT_VALIDITY_DAYS,
                Some(&request.public_key),
            )
            .await?;
        self.storage.upsert_entity(entity.clone()).await?;

        Ok((entity, cert))
    }

    /// Mark the certificate with `serial` in `org`'s namespace as revoked
    /// from `at`.
    #[instrument(skip(self, org), fields(org = %org.uid()))]
    pub async fn revoke(
        &self,
        org: &CertificateAuthority,
        serial: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CaError> {
        let cert = self
            .storage
            .find_in_namespace(&serial.to_ascii_lowercase(), org.uid())
            .await?
            .ok_or(CaError::Storage(StoreError::NotFound))?;

        self.storage
            .set_status(&cert.id, DbCertStatus::Revoked { at })
            .await?;
        info!(serial = %cert.serial, mrn = %cert.mrn, "Revoked certificate");
        Ok(())
    }
}

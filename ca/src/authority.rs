//! The certificate authority role of an organization: preparing subjects,
//! issuing and recording certificates, walking chains and answering OCSP.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use mir_common::params::{DistinguishedName, NameAttribute, SubjectAttributes};
use mir_db::{
    models::{DbCertStatus, DbCertificate, DbEntity, EntityKind, ROOT_MRN},
    storage::{Storage, in_namespace},
};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    certificate::{
        AltNames, BasicConstraints, CertificateBuilder, IssuedCertificate, Issuer, KeyUsage,
        ParsedCertificate, SubjectDescription,
    },
    error::CaError,
    keys::{Curve, KeyManager, PublicKey},
    naming::MCP_ID_NAMESPACE,
    ocsp::{CertStatus, OcspRequest, Responder},
};

pub use crate::certificate::DEFAULT_VALIDITY_DAYS;

/// Validity of the self-signed root.
pub const ROOT_VALIDITY_DAYS: i64 = 10 * 365 + 2;

/// Validity of the top-level organization's certificate issued at bootstrap.
pub const MIR_VALIDITY_DAYS: i64 = 5 * 365 + 1;

const CA_PATH_LEN: u8 = 4;

/// The three classes of certificate an authority issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    /// Self-signed trust anchor.
    Root,
    /// An organization that issues in its own namespace.
    Mir,
    /// A leaf: vessel, device, service or person.
    Entity,
}

/// Identity of the top-level organization created by [`initialize`].
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub ipid: String,
    pub domain: String,
    pub country: String,
    /// Email in the root certificate. Defaults to `mir-admin@{domain}`.
    pub admin: Option<String>,
    /// Email of the organization. Defaults to `mir@{domain}`.
    pub email: Option<String>,
    /// Home page of the organization. Defaults to `https://{domain}/{ipid}.html`.
    pub url: Option<String>,
}

/// What an authority needs at signing time, loaded once.
#[derive(Debug)]
struct IssuerIdentity {
    issuer: Issuer,
    certificate: ParsedCertificate,
}

/// An organization acting as a certificate authority.
pub struct CertificateAuthority {
    org: DbEntity,
    storage: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
    identity: OnceCell<IssuerIdentity>,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("uid", &self.org.uid)
            .field("ipid", &self.org.ipid)
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// An organization without explicit CRL and OCSP locations gets them
    /// derived from its domain and ipid.
    pub fn new(mut org: DbEntity, storage: Arc<dyn Storage>, keys: Arc<KeyManager>) -> Self {
        if let (Some(domain), Some(ipid)) = (org.attributes.domain.clone(), org.ipid.clone()) {
            org.crl.get_or_insert_with(|| format!("https://{domain}/{ipid}/crl"));
            org.ocsp.get_or_insert_with(|| format!("https://{domain}/{ipid}/ocsp"));
        }

        Self {
            org,
            storage,
            keys,
            identity: OnceCell::new(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.org.uid
    }

    pub fn organization(&self) -> &DbEntity {
        &self.org
    }

    pub fn into_organization(self) -> DbEntity {
        self.org
    }

    /// The name placed in the issuer field of certificates this authority
    /// signs.
    pub fn issuer_name(&self) -> DistinguishedName {
        self.org
            .dn
            .clone()
            .unwrap_or_else(|| DistinguishedName::from_uid(&self.org.uid))
    }

    async fn identity(&self) -> Result<&IssuerIdentity, CaError> {
        self.identity
            .get_or_try_init(|| async {
                let fingerprint =
                    self.org
                        .fingerprint()
                        .ok_or_else(|| CaError::KeyNotFound {
                            fingerprint: format!("<no certificate for {}>", self.org.uid),
                        })?;

                let key = self.keys.signing_key(fingerprint).await?;
                let record = self
                    .storage
                    .get_certificate(fingerprint)
                    .await?
                    .ok_or_else(|| CaError::KeyNotFound {
                        fingerprint: fingerprint.to_string(),
                    })?;
                let certificate = ParsedCertificate::from_pem(&record.pem)?;
                debug!(uid = %self.org.uid, %fingerprint, "Loaded issuer identity");

                Ok::<_, CaError>(IssuerIdentity {
                    issuer: Issuer {
                        name: self.issuer_name(),
                        key,
                    },
                    certificate,
                })
            })
            .await
    }

    /// Describe `entity` as the subject of a certificate of `kind`, filling
    /// in whatever the entity does not specify itself.
    pub fn prepare_subject(
        &self,
        entity: &DbEntity,
        kind: SubjectKind,
    ) -> Result<SubjectDescription, CaError> {
        match kind {
            SubjectKind::Root => prepare_root(entity),
            SubjectKind::Mir => prepare_mir(entity),
            SubjectKind::Entity => self.prepare_entity(entity),
        }
    }

    fn prepare_entity(&self, entity: &DbEntity) -> Result<SubjectDescription, CaError> {
        let uid = if entity.uid.is_empty() {
            format!("{}:{}", self.org.uid, Uuid::new_v4())
        } else {
            entity.uid.clone()
        };

        Ok(SubjectDescription {
            name: DistinguishedName::from_uid(uid),
            alt_names: AltNames::from_attributes(&entity.attributes),
            key_usage: vec![
                KeyUsage::DigitalSignature,
                KeyUsage::AnyKeyUsage,
                KeyUsage::ClientAuth,
            ],
            basic_constraints: None,
            crl: entity.crl.clone().or_else(|| self.org.crl.clone()),
            ocsp: entity.ocsp.clone().or_else(|| self.org.ocsp.clone()),
            x5u_base: self.certificates_url(),
            matp: entity.matp.clone(),
        })
    }

    fn certificates_url(&self) -> Option<String> {
        match (&self.org.attributes.domain, &self.org.ipid) {
            (Some(domain), Some(ipid)) => Some(format!("https://{domain}/{ipid}/certificates")),
            _ => None,
        }
    }

    /// Issue a certificate of `kind` to `entity`, record it, and update the
    /// entity with its new name, fingerprint and expiry. Without a
    /// `public_key` a fresh P-384 key pair is generated and stored once the
    /// certificate is.
    #[instrument(skip(self, entity, public_key), fields(issuer = %self.org.uid))]
    pub async fn issue_certificate(
        &self,
        entity: &mut DbEntity,
        kind: SubjectKind,
        validity_days: i64,
        public_key: Option<&PublicKey>,
    ) -> Result<IssuedCertificate, CaError> {
        let identity = self.identity().await?;
        let subject = self.prepare_subject(entity, kind)?;

        let (public_key, generated) = match public_key {
            Some(key) => (key.clone(), None),
            None => {
                let pair = KeyManager::generate_key_pair(Curve::P384);
                (pair.public_key()?, Some(pair))
            }
        };

        let cert = CertificateBuilder::new(&subject, &public_key)
            .validity_days(validity_days)
            .sign(&identity.issuer)?;

        let parent = identity.certificate.fingerprint.clone();
        self.storage
            .insert_certificate(DbCertificate {
                id: cert.fingerprint.clone(),
                serial: cert.serial.clone(),
                mrn: cert.mrn().unwrap_or(ROOT_MRN).to_string(),
                pem: cert.pem.clone(),
                not_after: cert.not_after,
                parent: Some(parent.clone()),
                status: None,
            })
            .await?;

        if let Some(pair) = generated {
            self.keys.store_key_pair(&cert.fingerprint, &pair).await?;
        }

        info!(
            serial = %cert.serial,
            mrn = cert.mrn().unwrap_or(ROOT_MRN),
            %parent,
            "Issued certificate"
        );

        if let Some(uid) = cert.mrn() {
            entity.uid = uid.to_string();
        }
        entity.dn = Some(cert.subject.clone());
        if cert.x5u.is_some() {
            entity.x5u = cert.x5u.clone();
        }
        entity.certificates.insert(0, cert.fingerprint.clone());
        entity.certificate_expires = Some(cert.not_after);

        Ok(cert)
    }

    /// The certificate with `serial` issued in this organization's namespace
    /// followed by its ancestors, ending at the root. Empty when no such
    /// certificate exists.
    pub async fn certificate_chain(&self, serial: &str) -> Result<Vec<DbCertificate>, CaError> {
        let serial = serial.to_ascii_lowercase();
        let Some(leaf) = self
            .storage
            .find_in_namespace(&serial, &self.org.uid)
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::from([leaf.id.clone()]);
        let mut next = leaf.parent.clone();
        let mut chain = vec![leaf];

        while let Some(id) = next.take() {
            if !seen.insert(id.clone()) {
                break;
            }
            if let Some(cert) = self.storage.get_certificate(&id).await? {
                next = cert.parent.clone();
                chain.push(cert);
            }
        }

        Ok(chain)
    }

    /// Answer a DER OCSP request for certificates issued by this
    /// organization.
    #[instrument(skip_all, fields(issuer = %self.org.uid))]
    pub async fn respond_to_ocsp(&self, request: &[u8]) -> Result<Vec<u8>, CaError> {
        let request = OcspRequest::parse(request, &self.org.uid)?;

        let statuses: HashMap<String, CertStatus> = if request.ids.is_empty() {
            HashMap::new()
        } else {
            self.storage
                .find_by_serials(&request.serials())
                .await?
                .into_iter()
                .filter(|record| in_namespace(&record.mrn, &self.org.uid))
                .map(|record| {
                    let status = match record.status {
                        None | Some(DbCertStatus::Good) => CertStatus::Good,
                        Some(DbCertStatus::Revoked { at }) => CertStatus::Revoked { at },
                        Some(DbCertStatus::Unknown) => CertStatus::Unknown,
                    };
                    (record.serial, status)
                })
                .collect()
        };

        let identity = self.identity().await?;
        let responder = Responder {
            name: identity.issuer.name.clone(),
            certificate: identity.certificate.der.clone(),
            key: identity.issuer.key.clone(),
        };
        responder.respond(&request, &statuses)
    }
}

fn prepare_root(entity: &DbEntity) -> Result<SubjectDescription, CaError> {
    let attrs = &entity.attributes;
    let organization = attrs
        .organization
        .as_deref()
        .or(entity.ipid.as_deref())
        .ok_or_else(|| CaError::InvalidSubject("root needs an organization or ipid".into()))?;
    let url = match (&attrs.url, &attrs.domain) {
        (Some(url), _) => url.clone(),
        (None, Some(domain)) => format!("https://{domain}"),
        (None, None) => {
            return Err(CaError::InvalidSubject("root needs a URL or domain".into()));
        }
    };

    Ok(SubjectDescription {
        name: DistinguishedName::new()
            .with(NameAttribute::Organization, organization)
            .with_opt(NameAttribute::Country, attrs.country.as_deref())
            .with_opt(NameAttribute::Email, attrs.email.as_deref()),
        alt_names: AltNames::new().with("URL", url),
        key_usage: vec![KeyUsage::KeyCertSign],
        basic_constraints: Some(BasicConstraints::ca(CA_PATH_LEN)),
        ..Default::default()
    })
}

fn prepare_mir(entity: &DbEntity) -> Result<SubjectDescription, CaError> {
    let attrs = &entity.attributes;
    let (Some(domain), Some(ipid)) = (attrs.domain.as_deref(), entity.ipid.as_deref()) else {
        return Err(CaError::InvalidSubject(format!(
            "organization {} needs a domain and an ipid",
            entity.uid
        )));
    };

    let uid = if entity.uid.is_empty() {
        let local = attrs.organization.as_deref().unwrap_or(ipid);
        format!("{MCP_ID_NAMESPACE}:{local}")
    } else {
        entity.uid.clone()
    };

    let san = SubjectAttributes {
        name: attrs.name.clone().or_else(|| Some(ipid.to_string())),
        organization: attrs.organization.clone().or_else(|| Some(ipid.to_string())),
        unit: attrs.unit.clone(),
        country: attrs.country.clone(),
        email: attrs.email.clone(),
        url: attrs.url.clone(),
        ..Default::default()
    };
    let base = format!("https://{domain}/{ipid}");

    Ok(SubjectDescription {
        name: DistinguishedName::from_uid(uid),
        alt_names: AltNames::from_attributes(&san),
        key_usage: vec![
            KeyUsage::DigitalSignature,
            KeyUsage::KeyCertSign,
            KeyUsage::ClientAuth,
        ],
        basic_constraints: Some(BasicConstraints::ca(CA_PATH_LEN)),
        crl: Some(entity.crl.clone().unwrap_or_else(|| format!("{base}/crl"))),
        ocsp: Some(entity.ocsp.clone().unwrap_or_else(|| format!("{base}/ocsp"))),
        x5u_base: Some(format!("{base}/certificates")),
        matp: Some(entity.matp.clone().unwrap_or_else(|| format!("{base}/matp"))),
    })
}

/// Create the top-level organization: a self-signed root, and a certificate
/// for the organization issued by that root. Returns the existing
/// organization when there already is one with the configured ipid.
#[instrument(skip_all, fields(ipid = %config.ipid))]
pub async fn initialize(
    storage: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
    config: &BootstrapConfig,
) -> Result<DbEntity, CaError> {
    if let Some(existing) = storage.find_by_ipid(&config.ipid).await? {
        if !existing.is_organization() {
            return Err(CaError::IdentifierUnavailable);
        }
        debug!(uid = %existing.uid, "Top-level organization already exists");
        return Ok(existing);
    }

    let domain = &config.domain;
    let ipid = &config.ipid;

    let root_attributes = SubjectAttributes {
        domain: Some(domain.clone()),
        country: Some(config.country.clone()),
        email: Some(
            config
                .admin
                .clone()
                .unwrap_or_else(|| format!("mir-admin@{domain}")),
        ),
        ..Default::default()
    };
    let mut root = DbEntity::new(ROOT_MRN, EntityKind::Organization);
    root.ipid = Some(ipid.clone());
    root.attributes = root_attributes.clone();

    let mut mir = DbEntity::new(format!("{MCP_ID_NAMESPACE}:{ipid}"), EntityKind::Organization);
    mir.ipid = Some(ipid.clone());
    mir.attributes = SubjectAttributes {
        email: Some(
            config
                .email
                .clone()
                .unwrap_or_else(|| format!("mir@{domain}")),
        ),
        url: Some(
            config
                .url
                .clone()
                .unwrap_or_else(|| format!("https://{domain}/{ipid}.html")),
        ),
        ..Default::default()
    }
    .or(&root_attributes);
    mir.owners = mir.attributes.email.iter().cloned().collect();

    let pair = KeyManager::generate_key_pair(Curve::P384);
    let root_key = Arc::new(KeyManager::import_for_signing(&pair.private)?);
    let subject = prepare_root(&root)?;
    let issuer = Issuer {
        name: subject.name.clone(),
        key: root_key.clone(),
    };
    let root_cert = CertificateBuilder::new(&subject, &root_key.public_key())
        .validity_days(ROOT_VALIDITY_DAYS)
        .sign(&issuer)?;

    storage
        .insert_certificate(DbCertificate {
            id: root_cert.fingerprint.clone(),
            serial: root_cert.serial.clone(),
            mrn: ROOT_MRN.to_string(),
            pem: root_cert.pem.clone(),
            not_after: root_cert.not_after,
            parent: None,
            status: None,
        })
        .await?;
    keys.store_key_pair(&root_cert.fingerprint, &pair).await?;
    info!(fingerprint = %root_cert.fingerprint, "Created root certificate");

    root.dn = Some(root_cert.subject.clone());
    root.certificates = vec![root_cert.fingerprint.clone()];
    let root_ca = CertificateAuthority::new(root, storage.clone(), keys);
    root_ca
        .issue_certificate(&mut mir, SubjectKind::Mir, MIR_VALIDITY_DAYS, None)
        .await?;

    mir.root = Some(root_cert.fingerprint);
    storage.upsert_entity(mir.clone()).await?;
    info!(uid = %mir.uid, "Initialized top-level organization");

    Ok(mir)
}

#[cfg(test)]
mod tests {
    use mir_db::storage::memory::MemoryStorage;
    use x509_parser::parse_x509_certificate;

    use super::*;

    fn config() -> BootstrapConfig {
        BootstrapConfig {
            ipid: "acme".into(),
            domain: "acme.example".into(),
            country: "US".into(),
            admin: None,
            email: None,
            url: None,
        }
    }

    async fn bootstrap() -> (Arc<dyn Storage>, Arc<KeyManager>, DbEntity) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let keys = Arc::new(KeyManager::new(storage.clone(), None));
        let mir = initialize(storage.clone(), keys.clone(), &config()).await.unwrap();
        (storage, keys, mir)
    }

    #[tokio::test]
    async fn bootstrap_creates_root_and_mir() {
        let (storage, keys, mir) = bootstrap().await;

        assert_eq!(mir.uid, "urn:mrn:mcp:id:acme");
        assert_eq!(mir.attributes.email.as_deref(), Some("mir@acme.example"));
        assert_eq!(mir.attributes.url.as_deref(), Some("https://acme.example/acme.html"));
        assert_eq!(mir.owners, vec!["mir@acme.example".to_string()]);
        assert_eq!(mir.certificates.len(), 1);

        let root_fp = mir.root.clone().unwrap();
        let root = storage.get_certificate(&root_fp).await.unwrap().unwrap();
        assert_eq!(root.mrn, ROOT_MRN);
        assert!(root.parent.is_none());
        assert!(keys.load_key_pair(&root_fp).await.is_ok());

        let der = ParsedCertificate::from_pem(&root.pem).unwrap().der;
        let (_, cert) = parse_x509_certificate(&der).unwrap();
        let constraints = cert.basic_constraints().unwrap().unwrap().value;
        assert!(constraints.ca);
        assert_eq!(constraints.path_len_constraint, Some(4));

        let own = storage.get_certificate(&mir.certificates[0]).await.unwrap().unwrap();
        assert_eq!(own.parent.as_deref(), Some(root_fp.as_str()));
        assert_eq!(own.mrn, "urn:mrn:mcp:id:acme");
        assert!(keys.load_key_pair(&own.id).await.is_ok());

        let stored = storage.find_by_ipid("acme").await.unwrap().unwrap();
        assert_eq!(stored.uid, mir.uid);
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let (storage, keys, mir) = bootstrap().await;
        let again = initialize(storage, keys, &config()).await.unwrap();
        assert_eq!(again.uid, mir.uid);
        assert_eq!(again.certificates, mir.certificates);
    }

    #[tokio::test]
    async fn root_certificate_is_a_signing_only_ca() {
        let (storage, _, mir) = bootstrap().await;
        let root = storage
            .get_certificate(mir.root.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        let der = ParsedCertificate::from_pem(&root.pem).unwrap().der;
        let (_, cert) = parse_x509_certificate(&der).unwrap();

        let ku = cert.key_usage().unwrap().unwrap().value;
        assert!(ku.key_cert_sign());
        assert!(!ku.digital_signature());
        assert!(cert.extended_key_usage().unwrap().is_none());
        assert_eq!(cert.subject(), cert.issuer());
    }

    #[tokio::test]
    async fn entity_certificates_inherit_issuer_locations() {
        let (storage, keys, mir) = bootstrap().await;
        let ca = CertificateAuthority::new(mir, storage.clone(), keys.clone());

        let mut ship = DbEntity::new("urn:mrn:mcp:id:acme:ship", EntityKind::Entity);
        ship.attributes.mmsi = Some("230999999".into());
        ship.attributes.call_sign = Some("ABCDEF".into());
        ship.mir = Some("acme".into());

        let cert = ca
            .issue_certificate(&mut ship, SubjectKind::Entity, DEFAULT_VALIDITY_DAYS, None)
            .await
            .unwrap();

        assert_eq!(ship.certificates, vec![cert.fingerprint.clone()]);
        assert_eq!(ship.certificate_expires, Some(cert.not_after));
        assert_eq!(
            ship.x5u.as_deref(),
            Some(format!("https://acme.example/acme/certificates/{}.x5u", cert.serial).as_str())
        );
        assert_eq!(ship.dn, Some(DistinguishedName::from_uid("urn:mrn:mcp:id:acme:ship")));

        let subject = ca.prepare_subject(&ship, SubjectKind::Entity).unwrap();
        assert_eq!(subject.crl.as_deref(), Some("https://acme.example/acme/crl"));
        assert_eq!(subject.ocsp.as_deref(), Some("https://acme.example/acme/ocsp"));

        // generated key stored under the new certificate
        assert!(keys.load_key_pair(&cert.fingerprint).await.is_ok());
        let record = storage.get_certificate(&cert.fingerprint).await.unwrap().unwrap();
        assert_eq!(record.parent.as_deref(), ca.organization().fingerprint());
    }

    #[tokio::test]
    async fn supplied_keys_are_not_stored() {
        let (storage, keys, mir) = bootstrap().await;
        let ca = CertificateAuthority::new(mir, storage, keys.clone());

        let requester = KeyManager::generate_key_pair(Curve::P256);
        let mut device = DbEntity::new("urn:mrn:mcp:id:acme:device", EntityKind::Entity);
        let cert = ca
            .issue_certificate(
                &mut device,
                SubjectKind::Entity,
                30,
                Some(&requester.public_key().unwrap()),
            )
            .await
            .unwrap();

        assert!(matches!(
            keys.load_key_pair(&cert.fingerprint).await,
            Err(CaError::KeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn entity_without_uid_gets_one_in_the_namespace() {
        let (storage, keys, mir) = bootstrap().await;
        let ca = CertificateAuthority::new(mir, storage, keys);

        let mut anonymous = DbEntity::new("", EntityKind::Entity);
        ca.issue_certificate(&mut anonymous, SubjectKind::Entity, 30, None)
            .await
            .unwrap();
        let local = anonymous.uid.strip_prefix("urn:mrn:mcp:id:acme:").unwrap();
        assert!(Uuid::parse_str(local).is_ok());
    }

    #[tokio::test]
    async fn chain_walks_to_the_root() {
        let (storage, keys, mir) = bootstrap().await;
        let root_fp = mir.root.clone().unwrap();
        let mir_fp = mir.certificates[0].clone();
        let ca = CertificateAuthority::new(mir, storage, keys);

        let mut ship = DbEntity::new("urn:mrn:mcp:id:acme:ship", EntityKind::Entity);
        let cert = ca
            .issue_certificate(&mut ship, SubjectKind::Entity, 30, None)
            .await
            .unwrap();

        let chain = ca.certificate_chain(&cert.serial.to_uppercase()).await.unwrap();
        let ids: Vec<&str> = chain.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![cert.fingerprint.as_str(), mir_fp.as_str(), root_fp.as_str()]);

        assert!(ca.certificate_chain("00").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chain_is_scoped_to_the_namespace() {
        let (storage, keys, mir) = bootstrap().await;
        let ca = CertificateAuthority::new(mir.clone(), storage.clone(), keys);

        // the organization's own certificate is not below its namespace
        let own = storage.get_certificate(&mir.certificates[0]).await.unwrap().unwrap();
        assert!(ca.certificate_chain(&own.serial).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_issuer_key_fails_issuance() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let keys = Arc::new(KeyManager::new(storage.clone(), None));
        let mut org = DbEntity::new("urn:mrn:mcp:id:ghost", EntityKind::Organization);
        org.certificates = vec!["deadbeef".into()];
        let ca = CertificateAuthority::new(org, storage, keys);

        let mut ship = DbEntity::new("urn:mrn:mcp:id:ghost:ship", EntityKind::Entity);
        let err = ca
            .issue_certificate(&mut ship, SubjectKind::Entity, 30, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CaError::KeyNotFound { .. }));
        assert!(ship.certificates.is_empty());
    }

    #[test]
    fn mir_subject_defaults_and_overrides() {
        let mut sub = DbEntity::new("urn:mrn:mcp:id:acme:sub", EntityKind::Organization);
        sub.ipid = Some("sub".into());
        sub.attributes.domain = Some("acme.example".into());
        sub.matp = Some("https://elsewhere.example/matp".into());

        let subject = prepare_mir(&sub).unwrap();
        assert_eq!(subject.name.uid(), Some("urn:mrn:mcp:id:acme:sub"));
        assert_eq!(subject.crl.as_deref(), Some("https://acme.example/sub/crl"));
        assert_eq!(subject.ocsp.as_deref(), Some("https://acme.example/sub/ocsp"));
        assert_eq!(
            subject.x5u_base.as_deref(),
            Some("https://acme.example/sub/certificates")
        );
        assert_eq!(subject.matp.as_deref(), Some("https://elsewhere.example/matp"));
        assert_eq!(subject.basic_constraints, Some(BasicConstraints::ca(4)));
        assert_eq!(
            subject.alt_names,
            AltNames::new().with("name", "sub").with("organization", "sub")
        );

        sub.attributes.name = Some("Sub Fleet".into());
        let subject = prepare_mir(&sub).unwrap();
        assert_eq!(
            subject.alt_names,
            AltNames::new().with("name", "Sub Fleet").with("organization", "sub")
        );

        sub.attributes.domain = None;
        assert!(matches!(prepare_mir(&sub), Err(CaError::InvalidSubject(_))));
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;
use mir_ca::{authority::BootstrapConfig, keys::KeyManager, registry::Registry};
use mir_common::params::SubjectAttributes;
use mir_db::storage::Storage;

#[derive(Clone, Parser)]
pub struct InitParams {
    #[clap(long)]
    pub ipid: String,

    #[clap(long)]
    pub domain: String,

    #[clap(long)]
    pub country: String,

    /// Email placed in the root certificate.
    #[clap(long)]
    pub admin_email: Option<String>,

    #[clap(long)]
    pub email: Option<String>,

    #[clap(long)]
    pub url: Option<String>,
}

#[derive(Clone, Parser)]
pub struct CreateOrgParams {
    /// ipid of the issuing organization.
    #[clap(long)]
    pub parent: String,

    /// Preferred ipid. Falls back to the name, organization, then a UUID.
    #[clap(long)]
    pub ipid: Option<String>,

    #[clap(long)]
    pub name: Option<String>,

    /// Without one, the new organization is a unit of the parent.
    #[clap(long)]
    pub organization: Option<String>,

    #[clap(long)]
    pub email: Option<String>,
}

#[derive(Clone, Parser)]
pub struct RevokeParams {
    /// ipid of the organization that issued the certificate.
    #[clap(long)]
    pub ipid: String,

    /// Serial number in hex.
    #[clap(long)]
    pub serial: String,

    /// Revocation time, RFC 3339. Defaults to now.
    #[clap(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Clone, Parser)]
pub struct ChainParams {
    #[clap(long)]
    pub ipid: String,

    #[clap(long)]
    pub serial: String,
}

pub async fn init(
    storage: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
    InitParams {
        ipid,
        domain,
        country,
        admin_email,
        email,
        url,
    }: InitParams,
) -> anyhow::Result<()> {
    let registry = Registry::new(storage, keys, ipid.clone(), Vec::new());
    let org = registry
        .initialize(&BootstrapConfig {
            ipid,
            domain,
            country,
            admin: admin_email,
            email,
            url,
        })
        .await?;

    println!("Top-level organization {}", org.uid);
    if let Some(root) = &org.root {
        println!("Root certificate {}", root);
    }

    Ok(())
}

pub async fn create_org(
    storage: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
    CreateOrgParams {
        parent,
        ipid,
        name,
        organization,
        email,
    }: CreateOrgParams,
) -> anyhow::Result<()> {
    let registry = Registry::new(storage, keys, parent.clone(), Vec::new());
    let parent = registry.organization(&parent).await?;

    let org = registry
        .create_organization(
            &parent,
            ipid.as_deref(),
            SubjectAttributes {
                name,
                organization,
                email,
                ..Default::default()
            },
        )
        .await?;

    println!(
        "Created organization {} with ipid {}",
        org.uid,
        org.ipid.as_deref().unwrap_or_default()
    );
    if let Some(fingerprint) = org.fingerprint() {
        println!("Certificate {}", fingerprint);
    }

    Ok(())
}

pub async fn revoke(
    storage: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
    RevokeParams { ipid, serial, at }: RevokeParams,
) -> anyhow::Result<()> {
    let registry = Registry::new(storage, keys, ipid.clone(), Vec::new());
    let org = registry.organization(&ipid).await?;
    let at = at.unwrap_or_else(Utc::now);

    registry.revoke(&org, &serial, at).await?;
    println!("Revoked {} as of {}", serial, at.to_rfc3339());

    Ok(())
}

pub async fn chain(
    storage: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
    ChainParams { ipid, serial }: ChainParams,
) -> anyhow::Result<()> {
    let registry = Registry::new(storage, keys, ipid.clone(), Vec::new());
    let org = registry.organization(&ipid).await?;

    let chain = org.certificate_chain(&serial).await?;
    if chain.is_empty() {
        anyhow::bail!("no certificate with serial {} issued by {}", serial, ipid);
    }
    for cert in chain {
        print!("{}", cert.pem);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use mir_db::{models::DbCertStatus, storage::memory::MemoryStorage};

    use super::*;

    fn setup() -> (Arc<dyn Storage>, Arc<KeyManager>) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let keys = Arc::new(KeyManager::new(storage.clone(), None));
        (storage, keys)
    }

    fn init_params() -> InitParams {
        InitParams {
            ipid: "acme".into(),
            domain: "acme.example".into(),
            country: "US".into(),
            admin_email: None,
            email: None,
            url: None,
        }
    }

    #[tokio::test]
    async fn init_then_create_org() {
        let (storage, keys) = setup();
        init(storage.clone(), keys.clone(), init_params()).await.unwrap();
        // repeated init is a no-op
        init(storage.clone(), keys.clone(), init_params()).await.unwrap();

        create_org(
            storage.clone(),
            keys.clone(),
            CreateOrgParams {
                parent: "acme".into(),
                ipid: Some("fleet".into()),
                name: None,
                organization: None,
                email: None,
            },
        )
        .await
        .unwrap();

        let org = storage.find_by_ipid("fleet").await.unwrap().unwrap();
        assert_eq!(org.uid, "urn:mrn:mcp:id:acme:fleet");
        assert_eq!(org.attributes.unit.as_deref(), Some("fleet"));
    }

    #[tokio::test]
    async fn revoke_and_chain_need_a_known_serial() {
        let (storage, keys) = setup();
        init(storage.clone(), keys.clone(), init_params()).await.unwrap();
        create_org(
            storage.clone(),
            keys.clone(),
            CreateOrgParams {
                parent: "acme".into(),
                ipid: Some("fleet".into()),
                name: None,
                organization: None,
                email: None,
            },
        )
        .await
        .unwrap();

        let fleet = storage.find_by_ipid("fleet").await.unwrap().unwrap();
        let cert = storage
            .get_certificate(fleet.fingerprint().unwrap())
            .await
            .unwrap()
            .unwrap();

        chain(
            storage.clone(),
            keys.clone(),
            ChainParams {
                ipid: "acme".into(),
                serial: cert.serial.clone(),
            },
        )
        .await
        .unwrap();

        revoke(
            storage.clone(),
            keys.clone(),
            RevokeParams {
                ipid: "acme".into(),
                serial: cert.serial.clone(),
                at: None,
            },
        )
        .await
        .unwrap();
        let revoked = storage.get_certificate(&cert.id).await.unwrap().unwrap();
        assert!(matches!(revoked.status, Some(DbCertStatus::Revoked { .. })));

        let missing = chain(
            storage,
            keys,
            ChainParams {
                ipid: "acme".into(),
                serial: "00".into(),
            },
        )
        .await;
        assert!(missing.is_err());
    }
}

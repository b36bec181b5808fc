use std::sync::Arc;

use anyhow::Context;
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, Subcommand};
use mir_ca::keys::KeyManager;
use mir_db::storage::{Storage, mongodb::MongoDBStorage};
use tracing_subscriber::EnvFilter;

use crate::commands::{ChainParams, CreateOrgParams, InitParams, RevokeParams};

mod commands;

#[derive(Parser)]
#[command(name = "mirctl", version, about = "Operate a MIR certificate authority")]
pub struct Args {
    #[clap(subcommand)]
    command: Command,

    #[clap(
        short = 'D',
        long,
        global = true,
        env = "MIR_DB_URL",
        default_value = "mongodb://localhost:27017/mir"
    )]
    db_url: String,

    /// Base64 encoded 32 byte AES key sealing private keys at rest. Must
    /// match the key the API runs with.
    #[clap(long, global = true, env = "MIR_KEY_ENCRYPTION_KEY")]
    key_encryption_key: Option<String>,
}

#[derive(Clone, Subcommand)]
pub enum Command {
    /// Create the root certificate and top-level organization.
    #[command(name = "init")]
    Init(InitParams),

    /// Create an organization under an existing one.
    #[command(name = "create-org")]
    CreateOrg(CreateOrgParams),

    /// Revoke a certificate issued by an organization.
    #[command(name = "revoke")]
    Revoke(RevokeParams),

    /// Print the PEM chain of a certificate.
    #[command(name = "chain")]
    Chain(ChainParams),
}

fn sealing_key(encoded: Option<&str>) -> anyhow::Result<Option<[u8; 32]>> {
    let Some(encoded) = encoded else {
        return Ok(None);
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("key-encryption key is not valid base64")?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow::anyhow!("key-encryption key must be 32 bytes, got {}", bytes.len()))?;
    Ok(Some(key))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or("mir_ca=info,mir_db=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let stg = MongoDBStorage::new(&args.db_url)
        .await
        .context("failed to connect to MongoDB")?;
    stg.ensure_indexes().await?;

    let storage: Arc<dyn Storage> = Arc::new(stg);
    let keys = Arc::new(KeyManager::new(
        storage.clone(),
        sealing_key(args.key_encryption_key.as_deref())?,
    ));

    match args.command {
        Command::Init(params) => commands::init(storage, keys, params).await,
        Command::CreateOrg(params) => commands::create_org(storage, keys, params).await,
        Command::Revoke(params) => commands::revoke(storage, keys, params).await,
        Command::Chain(params) => commands::chain(storage, keys, params).await,
    }
}

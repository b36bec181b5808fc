use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mir_api::{config::MirApiConfig, context::ApiContext, server};
use mir_ca::{keys::KeyManager, registry::Registry};
use mir_db::storage::{Storage, memory::MemoryStorage, mongodb::MongoDBStorage};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MirApiConfig::parse();

    if config.dump_openapi {
        print!("{}", server::openapi().to_pretty_json()?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or("mir_api=info,mir_ca=info,mir_db=info".into()),
        )
        .pretty()
        .init();

    let storage: Arc<dyn Storage> = if config.in_memory {
        warn!("Using in-memory storage, nothing will be persisted");
        Arc::new(MemoryStorage::new())
    } else {
        let storage = MongoDBStorage::new(&config.mongodb_uri)
            .await
            .context("failed to connect to MongoDB")?;
        storage.ensure_indexes().await?;
        Arc::new(storage)
    };

    let sealing_key = config.key_encryption_key()?;
    if sealing_key.is_none() {
        warn!("No key-encryption key configured, private keys are stored unsealed");
    }
    let keys = Arc::new(KeyManager::new(storage.clone(), sealing_key));

    let ipid = config
        .ipid
        .clone()
        .context("no top-level organization configured (set MIR_IPID)")?;
    let registry = Registry::new(storage, keys, ipid, config.auto_create.clone());

    if let Some(bootstrap) = config.bootstrap() {
        let org = registry.initialize(&bootstrap).await?;
        info!(uid = %org.uid, "Top-level organization ready");
    }

    let (router, _) = server::make(ApiContext::new(registry), &config)?;

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .context("failed to bind to address")?;

    info!("Listening on http://{:?}", config.bind_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

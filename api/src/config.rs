use base64::{Engine, engine::general_purpose::STANDARD};
use clap::Parser;
use mir_ca::authority::BootstrapConfig;
use std::{net::SocketAddr, path::PathBuf};

#[derive(Clone, Debug, Parser)]
pub struct MirApiConfig {
    #[clap(
        short,
        long,
        env = "MIR_API_BIND_ADDR",
        default_value = "0.0.0.0:4000"
    )]
    pub bind_addr: SocketAddr,

    #[clap(
        long,
        env = "MIR_API_PUBLIC_URL",
        default_value = "http://localhost:4000"
    )]
    pub public_url: String,

    #[clap(long, default_value_t = false)]
    pub dump_openapi: bool,

    #[clap(
        long,
        env = "MIR_API_MONGODB_URI",
        default_value = "mongodb://localhost:27017/mir"
    )]
    pub mongodb_uri: String,

    /// Keep everything in memory instead of MongoDB. Nothing survives a
    /// restart.
    #[clap(long, env = "MIR_API_IN_MEMORY", default_value_t = false)]
    pub in_memory: bool,

    /// ipid of the top-level organization.
    #[clap(long, env = "MIR_IPID")]
    pub ipid: Option<String>,

    /// Domain of the top-level organization. Together with `ipid` and
    /// `country`, bootstraps the organization on start if it does not exist.
    #[clap(long, env = "MIR_DOMAIN")]
    pub domain: Option<String>,

    #[clap(long, env = "MIR_COUNTRY")]
    pub country: Option<String>,

    /// Email placed in the root certificate.
    #[clap(long, env = "MIR_ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    #[clap(long, env = "MIR_EMAIL")]
    pub email: Option<String>,

    #[clap(long, env = "MIR_URL")]
    pub url: Option<String>,

    /// Organization ipids created under the top-level organization the
    /// first time they are used.
    #[clap(long, env = "MIR_AUTO_CREATE", value_delimiter = ',')]
    pub auto_create: Vec<String>,

    /// Base64 encoded 32 byte AES key sealing private keys at rest.
    ///
    /// Generate one using:
    /// ```bash
    /// openssl rand -base64 32
    /// ```
    ///
    /// Mutually exclusive with `key_encryption_key_file`.
    #[clap(long, env = "MIR_KEY_ENCRYPTION_KEY", conflicts_with = "key_encryption_key_file")]
    pub key_encryption_key: Option<String>,

    /// Path to a file holding the base64 encoded key-encryption key.
    #[clap(long, env = "MIR_KEY_ENCRYPTION_KEY_FILE")]
    pub key_encryption_key_file: Option<PathBuf>,
}

impl MirApiConfig {
    /// The key-encryption key from either inline config or file. Without
    /// either, private keys are stored unsealed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, or the key is not base64
    /// of exactly 32 bytes.
    pub fn key_encryption_key(&self) -> anyhow::Result<Option<[u8; 32]>> {
        let encoded = match (&self.key_encryption_key, &self.key_encryption_key_file) {
            (Some(key), _) => key.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read key-encryption key file: {}", e))?,
            (None, None) => return Ok(None),
        };

        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| anyhow::anyhow!("key-encryption key is not valid base64: {}", e))?;
        let key: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            anyhow::anyhow!("key-encryption key must be 32 bytes, got {}", bytes.len())
        })?;

        Ok(Some(key))
    }

    /// The bootstrap identity, when enough of it is configured.
    pub fn bootstrap(&self) -> Option<BootstrapConfig> {
        Some(BootstrapConfig {
            ipid: self.ipid.clone()?,
            domain: self.domain.clone()?,
            country: self.country.clone()?,
            admin: self.admin_email.clone(),
            email: self.email.clone(),
            url: self.url.clone(),
        })
    }
}

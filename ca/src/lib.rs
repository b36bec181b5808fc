//! Certificate authority for Maritime Identity Registries: naming, keys,
//! certificate issuance, OCSP and the organization registry.

pub mod authority;
pub mod certificate;
pub mod crypto;
mod der;
pub mod error;
pub mod keys;
pub mod naming;
pub mod ocsp;
pub mod oid;
pub mod registry;
pub mod request;

pub use error::CaError;

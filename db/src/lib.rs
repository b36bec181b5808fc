//! Persistence for the MIR certificate authority.
//!
//! Three collections back the CA: `keys` (by certificate fingerprint),
//! `certificates` (by fingerprint) and `entities` (by MRN). [`storage`]
//! defines the operations on them and provides a MongoDB and an in-memory
//! backend.

pub mod models;
pub mod storage;

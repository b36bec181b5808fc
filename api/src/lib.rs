//! MIR certificate authority HTTP service.
//!
//! Serves certificate requests, certificate chains and OCSP for every
//! organization in the registry. See [`config::MirApiConfig`] for
//! configuration options.

pub mod config;
pub mod context;
pub mod server;

pub(crate) mod error;
pub(crate) mod handlers;

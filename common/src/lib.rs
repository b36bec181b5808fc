//! Types shared between the MIR certificate authority crates.
//!
//! [`params`] holds the inputs describing a certificate subject, [`views`]
//! holds what the HTTP surface hands back to clients.

pub mod params;
pub mod views;

//! Hublist auto-registration over the NMDC transport.
//!
//! A hub announces itself to a hublist by connecting to it, answering the
//! hublist's `$Lock` challenge with a `$Key`, and then sending a fixed
//! sequence of pipe-terminated fields:
//!
//! ```text
//! hublist -> $Lock <challenge> Pk=<party-key>|
//! hub     -> $Key <derived-key>|
//! hub     -> <name>|<host:port>|<description>|<users>|<share bytes>|
//! ```
//!
//! Both sides live here: [`register`] for hubs and [`Server`] for hublists.

pub mod client;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod info;
pub mod server;

pub use client::{register, register_on, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{AutoregError, AutoregResult};
pub use framing::{scan_one, TokenReader, DELIMITER};
pub use handshake::{
    HandshakeState, Initiator, Key, KeyDerivation, Lock, LockChallenge, NmdcKeyDerivation,
    Responder,
};
pub use info::{HubInfo, Registry, RegistryFn};
pub use server::{Server, ServerConfig};

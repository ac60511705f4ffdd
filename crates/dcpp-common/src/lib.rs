//! Shared helpers for dcpp-rs.
//!
//! - `escape`: the ADC and NMDC escaping dialects
//! - `net`: target address normalisation

pub mod escape;
pub mod net;

pub use escape::{escape, nmdc_escape, nmdc_unescape, unescape};
pub use net::{normalize_target, split_host_port};

//! dcpp-rs
//!
//! Direct Connect protocol building blocks: the ADC field codec, NMDC
//! escaping helpers, and hublist auto-registration (hub client and
//! hublist server).

pub mod config;
pub mod registry;

pub use dcpp_adc as adc;
pub use dcpp_autoreg as autoreg;
pub use dcpp_common as common;

pub use registry::MemoryRegistry;

//! In-memory hublist registry.

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use dcpp_autoreg::{HubInfo, Registry};
use log::debug;

/// Registered hubs keyed by their advertised host.
///
/// A hub registering again under the same host replaces its entry.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    hubs: Arc<DashMap<String, HubInfo>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, host: &str) -> Option<HubInfo> {
        self.hubs.get(host).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }

    /// All registered hubs, sorted by name.
    pub fn list(&self) -> Vec<HubInfo> {
        let mut hubs: Vec<HubInfo> = self.hubs.iter().map(|e| e.value().clone()).collect();
        hubs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.host.cmp(&b.host)));
        hubs
    }
}

impl Registry for MemoryRegistry {
    fn register_hub(&self, info: HubInfo) -> Result<()> {
        if info.name.is_empty() {
            anyhow::bail!("hub at {} has an empty name", info.host);
        }
        if let Some(previous) = self.hubs.insert(info.host.clone(), info) {
            debug!("Replaced registration for {}", previous.host);
        }
        Ok(())
    }
}

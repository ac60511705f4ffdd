//! Registration record and the registry collaborator.

/// What a hub tells the hublist about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubInfo {
    pub name: String,
    /// Public `host:port` of the hub, sent verbatim.
    pub host: String,
    pub description: String,
    pub users: u32,
    /// Total shared bytes.
    pub share: u64,
}

/// Destination for successfully parsed registrations.
///
/// Called concurrently from every connection task, so implementations handle
/// their own synchronisation.
pub trait Registry: Send + Sync {
    fn register_hub(&self, info: HubInfo) -> anyhow::Result<()>;
}

/// Adapter turning a closure into a [`Registry`].
pub struct RegistryFn<F>(pub F);

impl<F> Registry for RegistryFn<F>
where
    F: Fn(HubInfo) -> anyhow::Result<()> + Send + Sync,
{
    fn register_hub(&self, info: HubInfo) -> anyhow::Result<()> {
        (self.0)(info)
    }
}

impl<R: Registry + ?Sized> Registry for std::sync::Arc<R> {
    fn register_hub(&self, info: HubInfo) -> anyhow::Result<()> {
        (**self).register_hub(info)
    }
}

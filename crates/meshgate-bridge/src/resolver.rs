//! Friendly name to canonical address resolution

use meshgate_core::{DeviceAddress, SettingsStore};
use std::sync::Arc;
use tracing::trace;

/// Resolves user-supplied device references
///
/// A reference is first looked up as a friendly name. On a miss it is
/// taken verbatim as a canonical address, without format checks, so
/// resolution itself never fails; an unknown address simply matches nothing
/// later on.
#[derive(Clone)]
pub struct DeviceResolver {
    settings: Arc<dyn SettingsStore>,
}

impl DeviceResolver {
    /// Create a resolver over a settings store
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Canonical address for a friendly name or raw address
    pub fn resolve(&self, reference: &str) -> DeviceAddress {
        match self.settings.resolve_address(reference) {
            Some(address) => {
                trace!("Resolved '{}' to {}", reference, address);
                address
            }
            None => DeviceAddress::from(reference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgate_state::MemorySettings;

    #[test]
    fn test_resolves_friendly_name() {
        let settings = Arc::new(MemorySettings::new());
        settings.add_device("0x00158d0001a2b3c4", "lamp1").unwrap();
        let resolver = DeviceResolver::new(settings);

        assert_eq!(resolver.resolve("lamp1"), DeviceAddress::from("0x00158d0001a2b3c4"));
    }

    #[test]
    fn test_falls_back_to_raw_reference() {
        let resolver = DeviceResolver::new(Arc::new(MemorySettings::new()));
        assert_eq!(resolver.resolve("0xdeadbeef"), DeviceAddress::from("0xdeadbeef"));
        assert_eq!(resolver.resolve("not an address"), DeviceAddress::from("not an address"));
    }
}

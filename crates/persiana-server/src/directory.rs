use indexmap::IndexMap;

use persiana_bridge::gateway::{Credentials, DeviceLookup};

use tracing::warn;

use crate::config::DeviceConfig;

/// A deterministic device directory built from the configuration.
///
/// The single lookup contract of the service: a caller is authorized when
/// the presented key matches the configured one for the device identifier,
/// nothing else. Iteration order follows the configuration file, so startup
/// logs are reproducible.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct StaticDirectory {
    devices: IndexMap<String, String>,
}

impl StaticDirectory {
    /// Builds the directory from the configured device entries.
    ///
    /// On a duplicated identifier the last key wins, with a warning.
    pub(crate) fn from_devices(devices: &[DeviceConfig]) -> Self {
        let mut table = IndexMap::new();
        for device in devices {
            if table.insert(device.id.clone(), device.key.clone()).is_some() {
                warn!("Duplicate device `{}` in the configuration, the last key wins", device.id);
            }
        }
        Self { devices: table }
    }

    /// Returns the number of configured devices.
    pub(crate) fn len(&self) -> usize {
        self.devices.len()
    }

    /// Checks whether no device is configured.
    pub(crate) fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceLookup for StaticDirectory {
    fn authorize(&self, credentials: &Credentials) -> bool {
        self.devices
            .get(&credentials.device_id)
            .is_some_and(|key| *key == credentials.key)
    }
}

#[cfg(test)]
mod tests {
    use persiana_bridge::gateway::{Credentials, DeviceLookup};

    use crate::config::DeviceConfig;

    use super::StaticDirectory;

    fn device(id: &str, key: &str) -> DeviceConfig {
        DeviceConfig {
            id: id.to_owned(),
            key: key.to_owned(),
        }
    }

    fn credentials(id: &str, key: &str) -> Credentials {
        Credentials {
            device_id: id.to_owned(),
            key: key.to_owned(),
        }
    }

    #[test]
    fn a_matching_key_authorizes_the_caller() {
        let directory = StaticDirectory::from_devices(&[device("veranda", "shutter-secret")]);

        assert!(directory.authorize(&credentials("veranda", "shutter-secret")));
        assert!(!directory.authorize(&credentials("veranda", "wrong")));
        assert!(!directory.authorize(&credentials("kitchen", "shutter-secret")));
    }

    #[test]
    fn an_empty_directory_authorizes_nobody() {
        let directory = StaticDirectory::from_devices(&[]);

        assert_eq!(directory.len(), 0);
        assert!(!directory.authorize(&credentials("veranda", "")));
    }

    #[test]
    fn the_last_duplicate_key_wins() {
        let directory = StaticDirectory::from_devices(&[
            device("veranda", "old-key"),
            device("veranda", "new-key"),
        ]);

        assert_eq!(directory.len(), 1);
        assert!(directory.authorize(&credentials("veranda", "new-key")));
        assert!(!directory.authorize(&credentials("veranda", "old-key")));
    }
}

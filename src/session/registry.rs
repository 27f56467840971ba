//! Registry mapping device family tags to session factories.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{DeviceParams, DeviceSession, EosSession, IosSession, JunosSession, MockSession};
use crate::config::Config;
use crate::error::{Error, Result};

/// Builds a session for one device.
pub trait SessionFactory: Send + Sync {
    /// Create an unopened session
    fn create(&self, params: &DeviceParams, config: &Config) -> Result<Box<dyn DeviceSession>>;
}

impl<F> SessionFactory for F
where
    F: Fn(&DeviceParams, &Config) -> Result<Box<dyn DeviceSession>> + Send + Sync,
{
    fn create(&self, params: &DeviceParams, config: &Config) -> Result<Box<dyn DeviceSession>> {
        self(params, config)
    }
}

/// Description of a registered family
#[derive(Debug, Clone, Serialize)]
pub struct FamilyInfo {
    /// Canonical tag
    pub name: String,
    /// Alternative tags
    pub aliases: Vec<String>,
    /// One-line description
    pub description: String,
}

struct Entry {
    info: FamilyInfo,
    factory: Arc<dyn SessionFactory>,
}

/// Registry of device family drivers
pub struct DriverRegistry {
    families: HashMap<String, Entry>,
    aliases: HashMap<String, String>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            families: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(
            "mock",
            &[],
            "In-memory device for tests and dry runs",
            Arc::new(create_mock),
        );
        registry.register(
            "junos",
            &["juniper", "juniper_junos"],
            "Juniper Junos (candidate database, load override/merge)",
            Arc::new(create_junos),
        );
        registry.register(
            "eos",
            &["arista", "arista_eos"],
            "Arista EOS (configure sessions)",
            Arc::new(create_eos),
        );
        registry.register(
            "ios",
            &["cisco_ios", "iosxe", "ios_xe"],
            "Cisco IOS/IOS-XE (local candidate, configure terminal)",
            Arc::new(create_ios),
        );

        registry
    }

    /// Register a driver under `name` and its aliases
    pub fn register(
        &mut self,
        name: &str,
        aliases: &[&str],
        description: &str,
        factory: Arc<dyn SessionFactory>,
    ) {
        let name = normalize_tag(name);
        for alias in aliases {
            self.aliases.insert(normalize_tag(alias), name.clone());
        }
        self.families.insert(
            name.clone(),
            Entry {
                info: FamilyInfo {
                    name,
                    aliases: aliases.iter().map(|a| a.to_string()).collect(),
                    description: description.to_string(),
                },
                factory,
            },
        );
    }

    /// Canonical tag for `tag`, following aliases
    pub fn resolve(&self, tag: &str) -> Option<&str> {
        let tag = normalize_tag(tag);
        if let Some((name, _)) = self.families.get_key_value(&tag) {
            return Some(name.as_str());
        }
        self.aliases.get(&tag).map(String::as_str)
    }

    /// Check if a family (or alias) is registered
    pub fn contains(&self, tag: &str) -> bool {
        self.resolve(tag).is_some()
    }

    /// All registered families, sorted by name
    pub fn families(&self) -> Vec<&FamilyInfo> {
        let mut infos: Vec<&FamilyInfo> = self.families.values().map(|e| &e.info).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Create an unopened session for `params.family`
    pub fn create(&self, params: &DeviceParams, config: &Config) -> Result<Box<dyn DeviceSession>> {
        let entry = self
            .resolve(&params.family)
            .and_then(|name| self.families.get(name))
            .ok_or_else(|| Error::UnknownDeviceFamily {
                family: params.family.clone(),
                known: self
                    .families()
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
        entry.factory.create(params, config)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn create_mock(params: &DeviceParams, config: &Config) -> Result<Box<dyn DeviceSession>> {
    Ok(Box::new(MockSession::from_params(params, config)?))
}

fn create_junos(params: &DeviceParams, config: &Config) -> Result<Box<dyn DeviceSession>> {
    Ok(Box::new(JunosSession::from_params(params, config)?))
}

fn create_eos(params: &DeviceParams, config: &Config) -> Result<Box<dyn DeviceSession>> {
    Ok(Box::new(EosSession::from_params(params, config)?))
}

fn create_ios(params: &DeviceParams, config: &Config) -> Result<Box<dyn DeviceSession>> {
    Ok(Box::new(IosSession::from_params(params, config)?))
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_families() {
        let registry = DriverRegistry::with_builtins();
        let names: Vec<&str> = registry.families().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["eos", "ios", "junos", "mock"]);
    }

    #[test]
    fn test_resolve_aliases() {
        let registry = DriverRegistry::with_builtins();
        assert_eq!(registry.resolve("Juniper"), Some("junos"));
        assert_eq!(registry.resolve("arista-eos"), Some("eos"));
        assert_eq!(registry.resolve("IOS"), Some("ios"));
        assert_eq!(registry.resolve("nxos"), None);
        assert!(registry.contains("cisco_ios"));
    }

    #[test]
    fn test_create_unknown_family() {
        let registry = DriverRegistry::with_builtins();
        let params = DeviceParams::new("r1", "admin", "vyos");
        let err = registry.create(&params, &Config::default()).err().unwrap();
        assert!(matches!(err, Error::UnknownDeviceFamily { .. }));
        assert!(err.to_string().contains("junos"));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_create_by_alias() {
        let registry = DriverRegistry::with_builtins();
        let params =
            DeviceParams::new("r1", "admin", "juniper").with_optional_arg("transport", "local");
        let session = registry.create(&params, &Config::default()).unwrap();
        assert_eq!(session.family(), "junos");
        assert_eq!(session.hostname(), "r1");
    }

    #[test]
    fn test_register_custom_factory() {
        let mut registry = DriverRegistry::new();
        let device = crate::session::MockDevice::new("hostname lab\n");
        registry.register(
            "lab",
            &["testbed"],
            "Shared lab device",
            Arc::new(
                move |params: &DeviceParams, _config: &Config| -> Result<Box<dyn DeviceSession>> {
                    Ok(Box::new(device.session(params.hostname.clone())))
                },
            ),
        );
        let params = DeviceParams::new("r9", "admin", "testbed");
        let session = registry.create(&params, &Config::default()).unwrap();
        assert_eq!(session.family(), "mock");
    }
}

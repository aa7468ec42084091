//! Input documents and file locations.
//!
//! The topology document is YAML (JSON is accepted as a subset) with a
//! `network_config` list. The optional mapping document carries an
//! `interface_mapping` table of `alias: device-or-mac` entries.

use std::path::{Path, PathBuf};

use osnet_common::{files, CommonError};
use serde_json::Value;
use tracing::debug;

use crate::dpdk::DPDK_MAPPING_FILE;
use crate::error::{ConfigError, OsNetResult};
use crate::nic::{NicMapping, SYS_CLASS_NET};

/// Default topology document.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/os-net-config/config.yaml";

/// Default mapping document.
pub const DEFAULT_MAPPING_FILE: &str = "/etc/os-net-config/mapping.yaml";

/// VPP startup configuration.
pub const VPP_CONFIG_FILE: &str = "/etc/vpp/startup.conf";

/// Script VPP runs at startup (`unix { exec ... }`).
pub const VPP_EXEC_FILE: &str = "/etc/vpp/vpp-exec";

/// Host file locations, optionally below an alternate root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// sysfs network class directory.
    pub sys_class_net: PathBuf,
    /// Binding table.
    pub dpdk_mapping: PathBuf,
    /// VPP startup configuration.
    pub vpp_config: PathBuf,
    /// VPP exec script as seen on the host.
    pub vpp_exec: PathBuf,
}

impl Paths {
    /// Locations below `root`. An empty root means the real filesystem.
    pub fn with_root(root: &Path) -> Self {
        Self {
            sys_class_net: rooted(root, SYS_CLASS_NET),
            dpdk_mapping: rooted(root, DPDK_MAPPING_FILE),
            vpp_config: rooted(root, VPP_CONFIG_FILE),
            vpp_exec: rooted(root, VPP_EXEC_FILE),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::with_root(Path::new(""))
    }
}

/// Places an absolute `path` below `root`.
pub fn rooted(root: &Path, path: &str) -> PathBuf {
    if root.as_os_str().is_empty() {
        return PathBuf::from(path);
    }
    root.join(path.trim_start_matches('/'))
}

/// Converts a `nic_mapping` value into a mapping. `null` means none.
pub fn nic_mapping_from_value(value: &Value) -> Result<Option<NicMapping>, ConfigError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(entries) => entries
            .iter()
            .map(|(alias, target)| match target {
                Value::String(s) => Ok((alias.clone(), s.clone())),
                Value::Number(n) => Ok((alias.clone(), n.to_string())),
                _ => Err(ConfigError::invalid_value(
                    "interface_mapping",
                    format!("entry '{alias}' must be a device name or MAC address"),
                )),
            })
            .collect::<Result<NicMapping, _>>()
            .map(Some),
        _ => Err(ConfigError::invalid_value(
            "interface_mapping",
            "expected a mapping of aliases",
        )),
    }
}

fn parse_yaml(text: &str, path: &Path) -> OsNetResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_yaml::from_str(text).map_err(|e| CommonError::yaml(path, e))?)
}

/// Extracts the `network_config` list from a topology document.
pub fn parse_network_config(text: &str, path: &Path) -> OsNetResult<Vec<Value>> {
    let document = parse_yaml(text, path)?;
    match document.get("network_config") {
        Some(Value::Array(items)) => {
            debug!(path = %path.display(), count = items.len(), "Loaded network_config");
            Ok(items.clone())
        }
        Some(_) => Err(ConfigError::not_a_list("network_config").into()),
        None => Err(ConfigError::missing_field("Configuration", "network_config").into()),
    }
}

/// Reads the topology document at `path`.
pub fn load_network_config(path: &Path) -> OsNetResult<Vec<Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| CommonError::io(path, e))?;
    parse_network_config(&text, path)
}

/// Extracts the `interface_mapping` table from a mapping document.
pub fn parse_interface_mapping(text: &str, path: &Path) -> OsNetResult<Option<NicMapping>> {
    let document = parse_yaml(text, path)?;
    let mapping = match document.get("interface_mapping") {
        Some(value) => nic_mapping_from_value(value)?,
        None => None,
    };
    debug!(path = %path.display(), mapping = ?mapping, "Loaded interface_mapping");
    Ok(mapping)
}

/// Reads the mapping document at `path`; a missing file means no mapping.
pub fn load_interface_mapping(path: &Path) -> OsNetResult<Option<NicMapping>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = files::read_or_empty(path)?;
    parse_interface_mapping(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OsNetError;

    #[test]
    fn test_paths_with_root() {
        let paths = Paths::with_root(Path::new("/tmp/root"));
        assert_eq!(paths.sys_class_net, PathBuf::from("/tmp/root/sys/class/net"));
        assert_eq!(
            paths.dpdk_mapping,
            PathBuf::from("/tmp/root/var/lib/os-net-config/dpdk_mapping.yaml")
        );
        assert_eq!(Paths::default().vpp_config, PathBuf::from(VPP_CONFIG_FILE));
    }

    #[test]
    fn test_parse_network_config() {
        let text = "network_config:\n  - type: interface\n    name: nic1\n    use_dhcp: true\n";
        let items = parse_network_config(text, Path::new("config.yaml")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "nic1");
    }

    #[test]
    fn test_parse_network_config_json() {
        let text = r#"{"network_config": [{"type": "ovs_bridge", "name": "br-ex"}]}"#;
        let items = parse_network_config(text, Path::new("config.json")).unwrap();
        assert_eq!(items[0]["type"], "ovs_bridge");
    }

    #[test]
    fn test_network_config_must_be_list() {
        let err = parse_network_config("network_config: eth0\n", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, OsNetError::Config(ConfigError::NotAList { .. })));

        let err = parse_network_config("", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, OsNetError::Config(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_parse_interface_mapping() {
        let text = "interface_mapping:\n  nic1: em2\n  nic2: '52:54:00:00:00:01'\n";
        let mapping = parse_interface_mapping(text, Path::new("m.yaml"))
            .unwrap()
            .unwrap();
        assert_eq!(mapping.get("nic1").map(String::as_str), Some("em2"));
        assert_eq!(mapping.get("nic2").map(String::as_str), Some("52:54:00:00:00:01"));
    }

    #[test]
    fn test_missing_mapping_file() {
        let mapping = load_interface_mapping(Path::new("/nonexistent/mapping.yaml")).unwrap();
        assert_eq!(mapping, None);
    }

    #[test]
    fn test_invalid_mapping_entry() {
        let err = parse_interface_mapping("interface_mapping:\n  nic1: [em1]\n", Path::new("m.yaml"))
            .unwrap_err();
        assert!(matches!(err, OsNetError::Config(ConfigError::InvalidValue { .. })));
    }
}

//! Alias table computation.
//!
//! Candidates are grouped (`em*`, then `eth*`, then the rest), each group is
//! naturally sorted, and the concatenation is the device ordering. Explicit
//! user entries are resolved first; the remaining devices are numbered
//! `nic<k>` by their position in the ordering.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use super::natural::natural_sort;
use crate::error::ConfigError;

/// User-supplied `alias -> device name or MAC` entries.
pub type NicMapping = BTreeMap<String, String>;

static MAC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}$").expect("Invalid regex pattern")
});

/// Returns true when `token` looks like a MAC address (six hex octets
/// separated by `:` or `-`).
pub fn is_mac_address(token: &str) -> bool {
    MAC_RE.is_match(token)
}

/// Lower-cases a MAC and uses `:` separators so differently written
/// addresses compare equal.
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_ascii_lowercase().replace('-', ":")
}

/// Alias to physical device name. No device is the target of two aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical device for `alias`.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    /// Returns true when `alias` is taken.
    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Returns true when some alias points at `device`.
    pub fn contains_device(&self, device: &str) -> bool {
        self.entries.values().any(|d| d == device)
    }

    /// Iterates `(alias, device)` pairs sorted by alias.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.entries.iter()
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no aliases.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, alias: &str, device: &str) -> Result<(), ConfigError> {
        if self.contains_device(device) {
            return Err(ConfigError::DuplicateNicMapping {
                nic: device.to_string(),
            });
        }
        self.entries.insert(alias.to_string(), device.to_string());
        Ok(())
    }
}

impl<'a> IntoIterator for &'a AliasTable {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Orders candidate devices: `em*`, then `eth*`, then everything else, each
/// group in natural order. Duplicates are dropped.
pub fn order_nics<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let unique: BTreeSet<String> = names.into_iter().collect();
    let (mut embedded, rest): (Vec<String>, Vec<String>) =
        unique.into_iter().partition(|n| n.starts_with("em"));
    let (mut eth, mut other): (Vec<String>, Vec<String>) =
        rest.into_iter().partition(|n| n.starts_with("eth"));

    natural_sort(&mut embedded);
    natural_sort(&mut eth);
    natural_sort(&mut other);

    embedded.into_iter().chain(eth).chain(other).collect()
}

/// Builds the alias table over an already ordered candidate list.
///
/// `mac_of` returns the hardware address of a candidate, or `None` when it
/// cannot be read.
pub fn build_alias_table<F>(
    ordered: &[String],
    mapping: Option<&NicMapping>,
    mac_of: F,
) -> Result<AliasTable, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut table = AliasTable::new();

    if let Some(mapping) = mapping {
        let macs: Vec<(&String, String)> = if mapping.values().any(|t| is_mac_address(t)) {
            ordered
                .iter()
                .filter_map(|nic| mac_of(nic).map(|mac| (nic, normalize_mac(&mac))))
                .collect()
        } else {
            Vec::new()
        };

        for (alias, token) in mapping {
            let device = if is_mac_address(token) {
                let wanted = normalize_mac(token);
                macs.iter().find(|(_, mac)| *mac == wanted).map(|(nic, _)| nic.as_str())
            } else {
                ordered.iter().find(|nic| *nic == token).map(String::as_str)
            };

            match device {
                Some(device) => {
                    table.insert(alias, device)?;
                    info!(alias = %alias, nic = device, "Using mapped interface");
                }
                None => {
                    error!(alias = %alias, target = %token, "Interface mapping skipped, no active or bound NIC matches");
                }
            }
        }
    }

    for (idx, nic) in ordered.iter().enumerate() {
        if table.contains_device(nic) {
            continue;
        }
        let alias = format!("nic{}", idx + 1);
        if table.contains_alias(&alias) {
            warn!(
                alias = %alias,
                nic = %nic,
                "Interface name already mapped explicitly, leaving NIC unaliased"
            );
            continue;
        }
        debug!(alias = %alias, nic = %nic, "Assigned numbered alias");
        table.entries.insert(alias, nic.clone());
    }

    if table.is_empty() {
        warn!("No active nics found.");
    }
    Ok(table)
}

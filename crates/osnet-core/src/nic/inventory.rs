//! Host NIC interrogation.
//!
//! [`NicInventory`] is the only surface the resolver uses to look at the
//! machine. [`SysfsInventory`] reads `/sys/class/net`; [`StaticInventory`]
//! serves a fixed device list for dry runs and tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Default location of the kernel's network class directory.
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Source of NIC names and hardware addresses.
pub trait NicInventory {
    /// Physical, non-VF devices with a hardware address, in any order.
    fn available_nics(&self) -> Vec<String>;

    /// Available devices whose link is up, in any order.
    fn active_nics(&self) -> Vec<String>;

    /// Hardware address of a kernel-visible device.
    ///
    /// Bond slaves report their permanent address rather than the one the
    /// bond assigned.
    fn hardware_address(&self, name: &str) -> Option<String>;
}

/// Reads NIC state from a sysfs `class/net` directory.
#[derive(Debug, Clone)]
pub struct SysfsInventory {
    root: PathBuf,
}

impl SysfsInventory {
    /// Creates an inventory over `root` (normally [`SYS_CLASS_NET`]).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the sysfs directory being read.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_attr(&self, name: &str, attr: &str) -> Option<String> {
        fs::read_to_string(self.root.join(name).join(attr))
            .ok()
            .map(|value| value.trim().to_string())
    }

    fn is_available(&self, name: &str, check_active: bool) -> bool {
        if name == "lo" || name == "vnet" {
            return false;
        }
        let dev = self.root.join(name);
        if !dev.join("device").is_dir() {
            return false;
        }
        if check_active && self.read_attr(name, "operstate").as_deref() != Some("up") {
            return false;
        }
        if self
            .read_attr(name, "address")
            .map_or(true, |addr| addr.is_empty())
        {
            return false;
        }
        // SR-IOV virtual functions are configured through their parent.
        if dev.join("device").join("physfn").is_dir() {
            debug!(nic = name, "Skipping SR-IOV virtual function");
            return false;
        }
        true
    }

    fn scan(&self, check_active: bool) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "Cannot list NICs");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| self.is_available(name, check_active))
            .collect()
    }
}

impl Default for SysfsInventory {
    fn default() -> Self {
        Self::new(SYS_CLASS_NET)
    }
}

impl NicInventory for SysfsInventory {
    fn available_nics(&self) -> Vec<String> {
        self.scan(false)
    }

    fn active_nics(&self) -> Vec<String> {
        self.scan(true)
    }

    fn hardware_address(&self, name: &str) -> Option<String> {
        self.read_attr(name, "bonding_slave/perm_hwaddr")
            .filter(|addr| !addr.is_empty())
            .or_else(|| self.read_attr(name, "address").filter(|addr| !addr.is_empty()))
    }
}

/// A fixed device list.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    nics: BTreeMap<String, StaticNic>,
}

#[derive(Debug, Clone, Default)]
struct StaticNic {
    active: bool,
    mac: Option<String>,
}

impl StaticInventory {
    /// Creates an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device with link up.
    pub fn with_active(mut self, name: &str, mac: Option<&str>) -> Self {
        self.insert(name, true, mac);
        self
    }

    /// Adds a device with link down.
    pub fn with_inactive(mut self, name: &str, mac: Option<&str>) -> Self {
        self.insert(name, false, mac);
        self
    }

    fn insert(&mut self, name: &str, active: bool, mac: Option<&str>) {
        self.nics.insert(
            name.to_string(),
            StaticNic {
                active,
                mac: mac.map(str::to_string),
            },
        );
    }
}

impl NicInventory for StaticInventory {
    fn available_nics(&self) -> Vec<String> {
        self.nics.keys().cloned().collect()
    }

    fn active_nics(&self) -> Vec<String> {
        self.nics
            .iter()
            .filter(|(_, nic)| nic.active)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn hardware_address(&self, name: &str) -> Option<String> {
        self.nics.get(name).and_then(|nic| nic.mac.clone())
    }
}

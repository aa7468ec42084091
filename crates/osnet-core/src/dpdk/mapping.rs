//! Persisted DPDK/VPP binding records.
//!
//! Once a NIC is moved to a userspace driver it disappears from the kernel,
//! so its PCI address, MAC and driver are kept in a YAML file across runs:
//!
//! ```yaml
//! - name: eth1
//!   pci_address: 0000:00:09.0
//!   mac_address: 01:02:03:04:05:06
//!   driver: vfio-pci
//! ```

use std::path::{Path, PathBuf};

use osnet_common::{files, CommonError, CommonResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default location of the binding table.
pub const DPDK_MAPPING_FILE: &str = "/var/lib/os-net-config/dpdk_mapping.yaml";

/// A NIC bound to a userspace driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRecord {
    /// Kernel name the NIC had before binding.
    pub name: String,
    /// PCI bus address (`0000:00:09.0`).
    pub pci_address: String,
    /// Hardware address; absent in records written by older releases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Userspace driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

impl BindingRecord {
    /// Creates a record.
    pub fn new(name: &str, pci_address: &str, mac_address: Option<&str>, driver: &str) -> Self {
        Self {
            name: name.to_string(),
            pci_address: pci_address.to_string(),
            mac_address: mac_address.map(str::to_string),
            driver: Some(driver.to_string()),
        }
    }
}

/// The binding table file. Every operation re-reads the file, so the table
/// never caches stale state; callers serialize concurrent writers.
#[derive(Debug, Clone)]
pub struct BindingTable {
    path: PathBuf,
}

impl BindingTable {
    /// Creates a table backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records. A missing or empty file is an empty table.
    pub fn load(&self) -> CommonResult<Vec<BindingRecord>> {
        let data = files::read_or_empty(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Option<Vec<BindingRecord>> =
            serde_yaml::from_str(&data).map_err(|e| CommonError::yaml(&self.path, e))?;
        Ok(records.unwrap_or_default())
    }

    /// Rewrites the file with `records`.
    pub fn store(&self, records: &[BindingRecord]) -> CommonResult<()> {
        let data = serde_yaml::to_string(records).map_err(|e| CommonError::yaml(&self.path, e))?;
        files::write(&self.path, &data)
    }

    /// Record for `name`.
    pub fn find(&self, name: &str) -> CommonResult<Option<BindingRecord>> {
        Ok(self.load()?.into_iter().find(|r| r.name == name))
    }

    /// Names of all bound NICs.
    pub fn names(&self) -> CommonResult<Vec<String>> {
        Ok(self.load()?.into_iter().map(|r| r.name).collect())
    }

    /// Replaces the record named `name` with a new one, or appends it.
    ///
    /// The replacement is whole: fields of the previous record are not
    /// carried over.
    pub fn upsert(
        &self,
        name: &str,
        pci_address: &str,
        mac_address: Option<&str>,
        driver: &str,
    ) -> CommonResult<()> {
        let mut records = self.load()?;
        let record = BindingRecord::new(name, pci_address, mac_address, driver);

        match records.iter_mut().find(|r| r.name == name) {
            Some(existing) => {
                debug!(nic = name, "Replacing binding record");
                *existing = record;
            }
            None => records.push(record),
        }

        self.store(&records)?;
        info!(
            nic = name,
            pci_address = pci_address,
            driver = driver,
            path = %self.path.display(),
            "Updated DPDK mapping"
        );
        Ok(())
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new(DPDK_MAPPING_FILE)
    }
}

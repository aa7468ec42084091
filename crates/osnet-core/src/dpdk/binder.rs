//! Moving NICs to userspace poll-mode drivers.

use osnet_common::shell::{DRIVERCTL_CMD, ETHTOOL_CMD, MODPROBE_CMD};
use osnet_common::CommandRunner;
use tracing::{debug, info, warn};

use super::mapping::BindingTable;
use crate::error::BindError;
use crate::nic::NicInventory;

/// Driver whose kernel module must be loaded before binding.
pub const VFIO_PCI_DRIVER: &str = "vfio-pci";

/// Extracts the `bus-info:` value from `ethtool -i` output.
pub fn parse_bus_info(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("bus-info:"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Binds NICs to userspace drivers and records the result.
pub struct DeviceBinder<'a> {
    runner: &'a dyn CommandRunner,
    inventory: &'a dyn NicInventory,
    bindings: &'a BindingTable,
}

impl<'a> DeviceBinder<'a> {
    /// Creates a binder.
    pub fn new(
        runner: &'a dyn CommandRunner,
        inventory: &'a dyn NicInventory,
        bindings: &'a BindingTable,
    ) -> Self {
        Self {
            runner,
            inventory,
            bindings,
        }
    }

    /// PCI address of a kernel-visible NIC, from `ethtool -i`.
    ///
    /// Any failure yields `None`. In dry-run mode nothing is executed.
    pub fn get_live_pci_address(&self, name: &str, dry_run: bool) -> Option<String> {
        if dry_run {
            info!(nic = name, "Fetch the PCI address of the interface using ethtool");
            return None;
        }

        match self.runner.exec(ETHTOOL_CMD, &["-i", name]) {
            Ok(result) if result.success() && result.stderr.is_empty() => {
                let pci = parse_bus_info(&result.stdout);
                debug!(nic = name, pci_address = ?pci, "Read bus info");
                pci
            }
            Ok(result) => {
                debug!(nic = name, output = %result.combined_output(), "ethtool failed");
                None
            }
            Err(e) => {
                debug!(nic = name, error = %e, "ethtool could not run");
                None
            }
        }
    }

    /// PCI address recorded for an already bound NIC.
    pub fn get_persisted_pci_address(&self, name: &str, dry_run: bool) -> Option<String> {
        if dry_run {
            info!(nic = name, "Fetch the PCI address of the interface from the DPDK mapping");
            return None;
        }

        match self.bindings.find(name) {
            Ok(record) => record.map(|r| r.pci_address),
            Err(e) => {
                warn!(nic = name, error = %e, "Unable to read DPDK mapping");
                None
            }
        }
    }

    /// Binds `name` to `driver` and records the binding.
    ///
    /// A NIC that already has a record is left alone.
    pub fn bind(&self, name: &str, driver: &str, dry_run: bool) -> Result<(), BindError> {
        if dry_run {
            info!(nic = name, driver = driver, "Would bind interface to userspace driver");
            return Ok(());
        }

        if let Some(record) = self.bindings.find(name)? {
            info!(
                nic = name,
                pci_address = %record.pci_address,
                "Interface already bound, skipping"
            );
            return Ok(());
        }

        let pci_address = self
            .get_live_pci_address(name, dry_run)
            .ok_or_else(|| BindError::DeviceNotFound(name.to_string()))?;
        let mac_address = self
            .inventory
            .hardware_address(name)
            .ok_or_else(|| BindError::MacUnavailable(name.to_string()))?;

        if driver.contains(VFIO_PCI_DRIVER) {
            self.load_module(VFIO_PCI_DRIVER)?;
        }

        let result = self
            .runner
            .exec(DRIVERCTL_CMD, &["set-override", &pci_address, driver])
            .map_err(|e| BindError::ToolFailed {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        if !result.success() || !result.stderr.is_empty() {
            return Err(BindError::ToolFailed {
                name: name.to_string(),
                message: result.combined_output(),
            });
        }

        info!(
            nic = name,
            pci_address = %pci_address,
            driver = driver,
            "Bound interface to userspace driver"
        );
        self.bindings
            .upsert(name, &pci_address, Some(&mac_address), driver)?;
        Ok(())
    }

    /// Loads a kernel module with `modprobe`.
    pub fn load_module(&self, module: &str) -> Result<(), BindError> {
        let result = self
            .runner
            .exec(MODPROBE_CMD, &[module])
            .map_err(|e| BindError::ModuleLoad {
                module: module.to_string(),
                message: e.to_string(),
            })?;
        if !result.success() {
            return Err(BindError::ModuleLoad {
                module: module.to_string(),
                message: result.combined_output(),
            });
        }
        Ok(())
    }
}

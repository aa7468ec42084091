//! Queries and service control for a running VPP.
//!
//! `vppctl` output is plain text meant for humans. The parsers here are
//! pure functions over that text so they can be tested without a VPP.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use osnet_common::shell::{MODPROBE_CMD, SYSTEMCTL_CMD, VPPCTL_CMD};
use osnet_common::{CommandRunner, CommonError};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::dpdk::VFIO_PCI_DRIVER;
use crate::error::VppError;

/// systemd unit of the VPP service.
pub const VPP_SERVICE: &str = "vpp";

static PCI_TAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":([0-9a-fA-F]{2}):([0-9a-fA-F]{2})\.([0-9a-fA-F])").expect("Invalid regex pattern")
});

static BOND_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(BondEthernet\d+)\s+(\d+)\s+.*Slave-Idx:\s*((?:\d+\s*)+)$")
        .expect("Invalid regex pattern")
});

/// An interface as listed by `vppctl show interface`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VppInterfaceInfo {
    pub name: String,
    pub index: String,
}

/// A bond as listed by `vppctl show hardware-interfaces bond brief`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VppBondInfo {
    pub name: String,
    pub index: String,
}

/// Converts a PCI address into the `bus/device/function` suffix VPP puts in
/// interface names, with hex fields printed without leading zeros.
///
/// ```
/// use osnet_core::vpp::pci_suffix;
/// assert_eq!(pci_suffix("0000:00:09.0").unwrap(), "0/9/0");
/// assert_eq!(pci_suffix("0000:82:0a.1").unwrap(), "82/a/1");
/// ```
pub fn pci_suffix(pci_address: &str) -> Result<String, VppError> {
    let caps = PCI_TAIL_RE
        .captures(pci_address)
        .ok_or_else(|| VppError::MalformedPciAddress(pci_address.to_string()))?;
    let field = |i: usize| -> Result<String, VppError> {
        let text = caps.get(i).map_or("", |m| m.as_str());
        u32::from_str_radix(text, 16)
            .map(|value| format!("{value:x}"))
            .map_err(|_| VppError::MalformedPciAddress(pci_address.to_string()))
    };
    Ok(format!("{}/{}/{}", field(1)?, field(2)?, field(3)?))
}

/// Finds the row for `pci_address` in `vppctl show interface` output.
pub fn parse_interface_row(
    output: &str,
    pci_address: &str,
) -> Result<Option<VppInterfaceInfo>, VppError> {
    let suffix = pci_suffix(pci_address)?;
    // The suffix must follow a non-digit so bus 10 never matches bus 0.
    let pattern = format!(r"(?m)^(\w*[^\W\d]{})\s+(\d+)", regex::escape(&suffix));
    let row = Regex::new(&pattern).map_err(|e| VppError::Control(e.to_string()))?;
    Ok(row.captures(output).map(|caps| VppInterfaceInfo {
        name: caps[1].to_string(),
        index: caps[2].to_string(),
    }))
}

/// Finds the bond whose member index set equals `member_indices`.
pub fn parse_bond_row(output: &str, member_indices: &[String]) -> Option<VppBondInfo> {
    let wanted: BTreeSet<&str> = member_indices.iter().map(String::as_str).collect();
    output.lines().find_map(|line| {
        let caps = BOND_ROW_RE.captures(line)?;
        let members: BTreeSet<&str> = caps.get(3)?.as_str().split_whitespace().collect();
        (members == wanted).then(|| VppBondInfo {
            name: caps[1].to_string(),
            index: caps[2].to_string(),
        })
    })
}

/// Talks to VPP through `vppctl` and to systemd through `systemctl`.
pub struct VppControl<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> VppControl<'a> {
    /// Creates a controller.
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn vppctl(&self, args: &[&str]) -> Result<String, VppError> {
        let result = self.runner.exec(VPPCTL_CMD, args)?;
        if result.success() || result.terminated_by_sigpipe() {
            Ok(result.stdout)
        } else {
            Err(VppError::Control(format!(
                "{VPPCTL_CMD} {}: {}",
                args.join(" "),
                result.combined_output()
            )))
        }
    }

    /// Looks up the VPP interface backed by `pci_address`.
    ///
    /// No address yields `Ok(None)` without querying VPP.
    pub fn lookup_interface(
        &self,
        pci_address: Option<&str>,
    ) -> Result<Option<VppInterfaceInfo>, VppError> {
        let Some(pci_address) = pci_address else {
            return Ok(None);
        };
        // Validate before running anything.
        pci_suffix(pci_address)?;

        let output = self.vppctl(&["show", "interface"])?;
        let info = parse_interface_row(&output, pci_address)?;
        match &info {
            Some(found) => debug!(
                pci_address = pci_address,
                vpp_name = %found.name,
                vpp_idx = %found.index,
                "Found VPP interface"
            ),
            None => debug!(pci_address = pci_address, "No VPP interface for device"),
        }
        Ok(info)
    }

    /// Looks up the VPP bond whose members are exactly `member_indices`.
    ///
    /// No indices yields `Ok(None)` without querying VPP.
    pub fn lookup_bond(&self, member_indices: &[String]) -> Result<Option<VppBondInfo>, VppError> {
        if member_indices.is_empty() {
            return Ok(None);
        }
        let output = self.vppctl(&["show", "hardware-interfaces", "bond", "brief"])?;
        let info = parse_bond_row(&output, member_indices);
        debug!(members = ?member_indices, bond = ?info, "Looked up VPP bond");
        Ok(info)
    }

    /// Restarts VPP, loading vfio-pci first when a device needs it.
    pub fn restart(&self, uio_drivers: &[&str]) -> Result<(), VppError> {
        if uio_drivers.iter().any(|d| d.contains(VFIO_PCI_DRIVER)) {
            self.service_command(MODPROBE_CMD, &[VFIO_PCI_DRIVER])?;
        }
        info!("Restarting VPP");
        self.service_command(SYSTEMCTL_CMD, &["restart", VPP_SERVICE])
    }

    /// Enables VPP at boot.
    pub fn enable(&self) -> Result<(), VppError> {
        self.service_command(SYSTEMCTL_CMD, &["enable", VPP_SERVICE])
    }

    fn service_command(&self, program: &str, args: &[&str]) -> Result<(), VppError> {
        match self.runner.exec_or_throw(program, args) {
            Ok(_) => Ok(()),
            Err(CommonError::ShellCommandFailed {
                command,
                exit_code,
                output,
            }) => {
                warn!(command = %command, exit_code = exit_code, "Command failed");
                Err(VppError::Control(format!("{command}: {output}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

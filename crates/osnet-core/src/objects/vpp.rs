//! VPP-owned interfaces and bonds.
//!
//! The `name` of a [`VppInterface`] is the kernel NIC to hand to VPP. Once
//! bound, the NIC vanishes from the kernel, so its PCI address is resolved
//! live or from the binding table and stored in `pci_dev`; the VPP-side name
//! and index are filled in after VPP has picked the device up.

use super::base::{optional_string, required_string, BaseOpts, Document};
use super::{build_members, tags, BuildContext, NetworkObject};
use crate::dpdk::VFIO_PCI_DRIVER;
use crate::error::ConfigError;

/// A NIC driven by VPP through a DPDK poll-mode driver.
#[derive(Debug, Clone, PartialEq)]
pub struct VppInterface {
    pub base: BaseOpts,
    /// Poll-mode driver, `vfio-pci` or `uio_pci_generic`.
    pub uio_driver: String,
    /// DPDK device options, e.g. `vlan-strip-offload off`.
    pub options: String,
    /// Resolved PCI address.
    pub pci_dev: Option<String>,
    /// Interface name inside VPP.
    pub vpp_name: Option<String>,
    /// Interface index inside VPP.
    pub vpp_idx: Option<String>,
}

impl VppInterface {
    /// Creates an interface with default driver and no options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: BaseOpts::named(name),
            uio_driver: VFIO_PCI_DRIVER.to_string(),
            options: String::new(),
            pci_dev: None,
            vpp_name: None,
            vpp_idx: None,
        }
    }

    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "VppInterface")?;
        Ok(Self {
            base: BaseOpts::from_doc(&name, doc, ctx, true)?,
            uio_driver: optional_string(doc, "uio_driver")
                .unwrap_or_else(|| VFIO_PCI_DRIVER.to_string()),
            options: optional_string(doc, "options").unwrap_or_default(),
            pci_dev: None,
            vpp_name: None,
            vpp_idx: None,
        })
    }
}

/// A VPP bond over [`VppInterface`] members.
#[derive(Debug, Clone, PartialEq)]
pub struct VppBond {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    /// Bond options appended to the `vdev` line, e.g. `mode=2`.
    pub bonding_options: String,
}

impl VppBond {
    /// Creates a bond over `members`.
    pub fn new(name: impl Into<String>, members: Vec<VppInterface>, bonding_options: &str) -> Self {
        Self {
            base: BaseOpts::named(name),
            members: members.into_iter().map(NetworkObject::VppInterface).collect(),
            bonding_options: bonding_options.to_string(),
        }
    }

    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "VppBond")?;
        let base = BaseOpts::from_doc(&name, doc, ctx, false)?;
        let members = build_members(doc, ctx)?;
        if members
            .iter()
            .any(|m| !matches!(m, NetworkObject::VppInterface(_)))
        {
            return Err(ConfigError::invalid_member("VppBond", tags::VPP_INTERFACE));
        }
        Ok(Self {
            base,
            members,
            bonding_options: optional_string(doc, "bonding_options").unwrap_or_default(),
        })
    }

    /// The member interfaces.
    pub fn interfaces(&self) -> impl Iterator<Item = &VppInterface> {
        self.members.iter().filter_map(|m| match m {
            NetworkObject::VppInterface(iface) => Some(iface),
            _ => None,
        })
    }
}

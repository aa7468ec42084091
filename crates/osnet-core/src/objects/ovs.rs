//! Open vSwitch ports: tunnels, patch ports and DPDK ports/bonds.

use super::base::{
    format_ovs_extra, format_ovs_options, optional_string, required_string, string_list,
    u32_field, BaseOpts, Document,
};
use super::interface::Interface;
use super::{bond_primary_member, build_members, tags, BuildContext, NetworkObject};
use crate::dpdk::VFIO_PCI_DRIVER;
use crate::error::ConfigError;

/// An OVS tunnel port (vxlan, gre, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct OvsTunnel {
    pub base: BaseOpts,
    pub tunnel_type: String,
    /// `options:<key>=<value>` settings.
    pub ovs_options: Vec<String>,
    pub ovs_extra: Vec<String>,
}

impl OvsTunnel {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "OvsTunnel")?;
        let tunnel_type = required_string(doc, "tunnel_type", "OvsTunnel")?;
        let base = BaseOpts::from_doc(&name, doc, ctx, true)?;
        let ovs_extra = format_ovs_extra(&string_list(doc, "ovs_extra")?, &base.name);
        Ok(Self {
            base,
            tunnel_type,
            ovs_options: format_ovs_options(&string_list(doc, "ovs_options")?),
            ovs_extra,
        })
    }
}

/// One end of an OVS patch link between two bridges.
///
/// The bridge it lives on is kept in `base.membership.bridge_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct OvsPatchPort {
    pub base: BaseOpts,
    pub peer: String,
    pub ovs_options: Vec<String>,
    pub ovs_extra: Vec<String>,
}

impl OvsPatchPort {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "OvsPatchPort")?;
        let bridge_name = required_string(doc, "bridge_name", "OvsPatchPort")?;
        let peer = required_string(doc, "peer", "OvsPatchPort")?;
        let mut base = BaseOpts::from_doc(&name, doc, ctx, true)?;
        base.membership.bridge_name = Some(bridge_name);
        let ovs_extra = format_ovs_extra(&string_list(doc, "ovs_extra")?, &base.name);
        Ok(Self {
            base,
            peer,
            ovs_options: format_ovs_options(&string_list(doc, "ovs_options")?),
            ovs_extra,
        })
    }

    /// The bridge this port is attached to.
    pub fn bridge_name(&self) -> Option<&str> {
        self.base.membership.bridge_name.as_deref()
    }
}

/// An OVS port backed by a NIC handed to a DPDK driver.
///
/// Has exactly one member, the [`Interface`] being bound.
#[derive(Debug, Clone, PartialEq)]
pub struct OvsDpdkPort {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    pub driver: String,
    pub rx_queue: Option<u32>,
    pub ovs_options: Vec<String>,
    pub ovs_extra: Vec<String>,
}

impl OvsDpdkPort {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "OvsDpdkPort")?;
        let base = BaseOpts::from_doc(&name, doc, ctx, true)?;

        let members = build_members(doc, ctx)?;
        match members.as_slice() {
            [] => {
                return Err(ConfigError::NoMembers {
                    entity: "OvsDpdkPort".to_string(),
                    name: base.name,
                })
            }
            [NetworkObject::Interface(_)] => {}
            [_] => return Err(ConfigError::invalid_member("OvsDpdkPort", tags::INTERFACE)),
            _ => {
                return Err(ConfigError::invalid_value(
                    "members",
                    "OVS DPDK Port should have only one member",
                ))
            }
        }

        let ovs_extra = format_ovs_extra(&string_list(doc, "ovs_extra")?, &base.name);
        Ok(Self {
            base,
            members,
            driver: optional_string(doc, "driver").unwrap_or_else(|| VFIO_PCI_DRIVER.to_string()),
            rx_queue: u32_field(doc, "rx_queue")?,
            ovs_options: format_ovs_options(&string_list(doc, "ovs_options")?),
            ovs_extra,
        })
    }

    /// The NIC bound to DPDK.
    pub fn interface(&self) -> Option<&Interface> {
        self.members.iter().find_map(|m| match m {
            NetworkObject::Interface(iface) => Some(iface),
            _ => None,
        })
    }
}

/// An OVS bond over DPDK ports.
#[derive(Debug, Clone, PartialEq)]
pub struct OvsDpdkBond {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    pub ovs_options: Option<String>,
    pub ovs_extra: Vec<String>,
    pub rx_queue: Option<u32>,
}

impl OvsDpdkBond {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "OvsDpdkBond")?;
        let mut base = BaseOpts::from_doc(&name, doc, ctx, false)?;
        let members = build_members(doc, ctx)?;
        if members
            .iter()
            .any(|m| !matches!(m, NetworkObject::OvsDpdkPort(_)))
        {
            return Err(ConfigError::invalid_member("OvsDpdkBond", tags::OVS_DPDK_PORT));
        }
        base.primary_interface_name = Some(bond_primary_member(
            &members,
            "bond (dpdk)",
            "OvsDpdkBond",
            &base.name,
        )?);
        let ovs_extra = format_ovs_extra(&string_list(doc, "ovs_extra")?, &base.name);
        Ok(Self {
            base,
            members,
            ovs_options: optional_string(doc, "ovs_options"),
            ovs_extra,
            rx_queue: u32_field(doc, "rx_queue")?,
        })
    }

    /// The DPDK ports of the bond.
    pub fn ports(&self) -> impl Iterator<Item = &OvsDpdkPort> {
        self.members.iter().filter_map(|m| match m {
            NetworkObject::OvsDpdkPort(port) => Some(port),
            _ => None,
        })
    }
}

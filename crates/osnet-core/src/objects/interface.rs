//! Leaf entities backed by a single kernel device.

use super::base::{
    bool_field, optional_string, required_field, required_string, u32_field, BaseOpts, Document,
};
use super::BuildContext;
use crate::error::ConfigError;

/// MTU given to IVS and NFVSwitch internal ports when none is set.
pub const DEFAULT_INTERNAL_MTU: u32 = 1500;

/// A physical or virtual NIC.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub base: BaseOpts,
    pub ethtool_opts: Option<String>,
    pub hotplug: bool,
}

impl Interface {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "Interface")?;
        Ok(Self {
            base: BaseOpts::from_doc(&name, doc, ctx, true)?,
            ethtool_opts: optional_string(doc, "ethtool_opts"),
            hotplug: bool_field(doc, "hotplug", false),
        })
    }
}

/// An 802.1Q VLAN, named `vlan<id>`.
///
/// Without a `device` the VLAN is an OVS internal port.
#[derive(Debug, Clone, PartialEq)]
pub struct Vlan {
    pub base: BaseOpts,
    pub device: Option<String>,
    pub vlan_id: u32,
}

impl Vlan {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let vlan_id = vlan_id(doc, "Vlan")?;
        let device = optional_string(doc, "device")
            .map(|device| ctx.resolve_device(&device))
            .transpose()?;
        Ok(Self {
            base: BaseOpts::from_doc(&format!("vlan{vlan_id}"), doc, ctx, true)?,
            device,
            vlan_id,
        })
    }
}

/// Internal port of the IVS switch, named `<name><vlan_id>`.
#[derive(Debug, Clone, PartialEq)]
pub struct IvsInterface {
    pub base: BaseOpts,
    pub vlan_id: u32,
}

impl IvsInterface {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let (base, vlan_id) = internal_port(doc, ctx, "IvsInterface", "ivs")?;
        Ok(Self { base, vlan_id })
    }
}

/// Internal port of NFVSwitch, named `<name><vlan_id>`.
#[derive(Debug, Clone, PartialEq)]
pub struct NfvswitchInternal {
    pub base: BaseOpts,
    pub vlan_id: u32,
}

impl NfvswitchInternal {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let (base, vlan_id) = internal_port(doc, ctx, "NfvswitchInternal", "nfvswitch")?;
        Ok(Self { base, vlan_id })
    }
}

/// An InfiniBand NIC.
#[derive(Debug, Clone, PartialEq)]
pub struct IbInterface {
    pub base: BaseOpts,
    pub ethtool_opts: Option<String>,
}

impl IbInterface {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "IbInterface")?;
        Ok(Self {
            base: BaseOpts::from_doc(&name, doc, ctx, true)?,
            ethtool_opts: optional_string(doc, "ethtool_opts"),
        })
    }
}

fn vlan_id(doc: &Document, entity: &str) -> Result<u32, ConfigError> {
    required_field(doc, "vlan_id", entity)?;
    u32_field(doc, "vlan_id")?.ok_or_else(|| ConfigError::missing_field(entity, "vlan_id"))
}

fn internal_port(
    doc: &Document,
    ctx: &BuildContext<'_>,
    entity: &str,
    default_name: &str,
) -> Result<(BaseOpts, u32), ConfigError> {
    let vlan_id = vlan_id(doc, entity)?;
    let prefix = optional_string(doc, "name").unwrap_or_else(|| default_name.to_string());
    let mut base = BaseOpts::from_doc(&format!("{prefix}{vlan_id}"), doc, ctx, true)?;
    if base.mtu.is_none() {
        base.mtu = Some(DEFAULT_INTERNAL_MTU);
    }
    Ok((base, vlan_id))
}

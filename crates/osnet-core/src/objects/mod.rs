//! Topology object graph.
//!
//! A topology document is a list of nested, untyped nodes, each carrying a
//! `type` tag. [`NetworkObject::from_value`] looks the tag up in a
//! registration table and hands the node to that entity's constructor.
//! Containers build their members the same way, so a whole tree is
//! constructed top-down in one pass. Every invariant (required fields, one
//! primary member, member types, bond restrictions) is checked where it is
//! violated and reported as a [`ConfigError`].
//!
//! Every entity embeds a [`BaseOpts`] block; the per-type structs add only
//! their own fields.

mod base;
mod bond;
mod bridge;
mod interface;
mod ovs;
mod vpp;

pub use base::{
    bool_field, bool_from_value, bridge_ovs_extra, format_ovs_extra, format_ovs_options,
    is_falsy, list_field, optional_string, required_field, required_string, string_list,
    u32_field, Address, BaseOpts, Document, Membership, Route, DEFAULT_OVS_FAIL_MODE,
};
pub use bond::{LinuxBond, LinuxTeam, OvsBond};
pub use bridge::{IvsBridge, LinuxBridge, NfvswitchBridge, OvsBridge, OvsUserBridge};
pub use interface::{IbInterface, Interface, IvsInterface, NfvswitchInternal, Vlan};
pub use ovs::{OvsDpdkBond, OvsDpdkPort, OvsPatchPort, OvsTunnel};
pub use vpp::{VppBond, VppInterface};

use serde_json::Value;
use tracing::debug;

use crate::config::nic_mapping_from_value;
use crate::error::ConfigError;
use crate::nic::{NicContext, NicMapping};

/// Type tags.
pub mod tags {
    pub const INTERFACE: &str = "interface";
    pub const VLAN: &str = "vlan";
    pub const IVS_INTERFACE: &str = "ivs_interface";
    pub const NFVSWITCH_INTERNAL: &str = "nfvswitch_internal";
    pub const IB_INTERFACE: &str = "ib_interface";
    pub const OVS_BRIDGE: &str = "ovs_bridge";
    pub const OVS_USER_BRIDGE: &str = "ovs_user_bridge";
    pub const LINUX_BRIDGE: &str = "linux_bridge";
    pub const IVS_BRIDGE: &str = "ivs_bridge";
    pub const NFVSWITCH_BRIDGE: &str = "nfvswitch_bridge";
    pub const LINUX_BOND: &str = "linux_bond";
    pub const LINUX_TEAM: &str = "team";
    pub const OVS_BOND: &str = "ovs_bond";
    pub const OVS_TUNNEL: &str = "ovs_tunnel";
    pub const OVS_PATCH_PORT: &str = "ovs_patch_port";
    pub const OVS_DPDK_PORT: &str = "ovs_dpdk_port";
    pub const OVS_DPDK_BOND: &str = "ovs_dpdk_bond";
    pub const VPP_INTERFACE: &str = "vpp_interface";
    pub const VPP_BOND: &str = "vpp_bond";
}

/// Constructor signature stored in the registration table.
type Constructor = fn(&Document, &BuildContext<'_>) -> Result<NetworkObject, ConfigError>;

static CONSTRUCTORS: &[(&str, Constructor)] = &[
    (tags::INTERFACE, |d, c| Interface::from_doc(d, c).map(NetworkObject::Interface)),
    (tags::VLAN, |d, c| Vlan::from_doc(d, c).map(NetworkObject::Vlan)),
    (tags::IVS_INTERFACE, |d, c| IvsInterface::from_doc(d, c).map(NetworkObject::IvsInterface)),
    (tags::NFVSWITCH_INTERNAL, |d, c| {
        NfvswitchInternal::from_doc(d, c).map(NetworkObject::NfvswitchInternal)
    }),
    (tags::IB_INTERFACE, |d, c| IbInterface::from_doc(d, c).map(NetworkObject::IbInterface)),
    (tags::OVS_BRIDGE, |d, c| OvsBridge::from_doc(d, c).map(NetworkObject::OvsBridge)),
    (tags::OVS_USER_BRIDGE, |d, c| OvsUserBridge::from_doc(d, c).map(NetworkObject::OvsUserBridge)),
    (tags::LINUX_BRIDGE, |d, c| LinuxBridge::from_doc(d, c).map(NetworkObject::LinuxBridge)),
    (tags::IVS_BRIDGE, |d, c| IvsBridge::from_doc(d, c).map(NetworkObject::IvsBridge)),
    (tags::NFVSWITCH_BRIDGE, |d, c| {
        NfvswitchBridge::from_doc(d, c).map(NetworkObject::NfvswitchBridge)
    }),
    (tags::LINUX_BOND, |d, c| LinuxBond::from_doc(d, c).map(NetworkObject::LinuxBond)),
    (tags::LINUX_TEAM, |d, c| LinuxTeam::from_doc(d, c).map(NetworkObject::LinuxTeam)),
    (tags::OVS_BOND, |d, c| OvsBond::from_doc(d, c).map(NetworkObject::OvsBond)),
    (tags::OVS_TUNNEL, |d, c| OvsTunnel::from_doc(d, c).map(NetworkObject::OvsTunnel)),
    (tags::OVS_PATCH_PORT, |d, c| OvsPatchPort::from_doc(d, c).map(NetworkObject::OvsPatchPort)),
    (tags::OVS_DPDK_PORT, |d, c| OvsDpdkPort::from_doc(d, c).map(NetworkObject::OvsDpdkPort)),
    (tags::OVS_DPDK_BOND, |d, c| OvsDpdkBond::from_doc(d, c).map(NetworkObject::OvsDpdkBond)),
    (tags::VPP_INTERFACE, |d, c| VppInterface::from_doc(d, c).map(NetworkObject::VppInterface)),
    (tags::VPP_BOND, |d, c| VppBond::from_doc(d, c).map(NetworkObject::VppBond)),
];

/// Tags whose entities are bonds of some kind.
pub const BOND_TAGS: &[&str] = &[
    tags::LINUX_BOND,
    tags::OVS_BOND,
    tags::OVS_DPDK_BOND,
    tags::LINUX_TEAM,
    tags::VPP_BOND,
];

/// State threaded through construction: the NIC context and the mapping
/// settings inherited from enclosing nodes.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    nics: &'a NicContext,
    nic_mapping: Option<NicMapping>,
    persist_mapping: bool,
}

impl<'a> BuildContext<'a> {
    /// Creates the root context.
    pub fn new(nics: &'a NicContext, nic_mapping: Option<NicMapping>, persist_mapping: bool) -> Self {
        Self {
            nics,
            nic_mapping,
            persist_mapping,
        }
    }

    /// The NIC context.
    pub fn nics(&self) -> &'a NicContext {
        self.nics
    }

    /// The NIC mapping in effect.
    pub fn nic_mapping(&self) -> Option<&NicMapping> {
        self.nic_mapping.as_ref()
    }

    /// Whether aliases are kept as device names.
    pub fn persist_mapping(&self) -> bool {
        self.persist_mapping
    }

    /// Context for `doc`: its own `nic_mapping` / `persist_mapping` keys
    /// override the inherited ones.
    pub fn scoped(&self, doc: &Document) -> Result<Self, ConfigError> {
        let mut scope = self.clone();
        if let Some(value) = doc.get("nic_mapping") {
            scope.nic_mapping = nic_mapping_from_value(value)?;
        }
        if let Some(value) = doc.get("persist_mapping") {
            scope.persist_mapping = bool_from_value(value);
        }
        Ok(scope)
    }

    /// Physical device for an alias, or `name` unchanged.
    pub fn resolve_device(&self, name: &str) -> Result<String, ConfigError> {
        let aliases = self.nics.mapped_nics(self.nic_mapping())?;
        Ok(aliases.get(name).unwrap_or(name).to_string())
    }
}

/// Any entity of the topology.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkObject {
    Interface(Interface),
    Vlan(Vlan),
    IvsInterface(IvsInterface),
    NfvswitchInternal(NfvswitchInternal),
    IbInterface(IbInterface),
    OvsBridge(OvsBridge),
    OvsUserBridge(OvsUserBridge),
    LinuxBridge(LinuxBridge),
    IvsBridge(IvsBridge),
    NfvswitchBridge(NfvswitchBridge),
    LinuxBond(LinuxBond),
    LinuxTeam(LinuxTeam),
    OvsBond(OvsBond),
    OvsTunnel(OvsTunnel),
    OvsPatchPort(OvsPatchPort),
    OvsDpdkPort(OvsDpdkPort),
    OvsDpdkBond(OvsDpdkBond),
    VppInterface(VppInterface),
    VppBond(VppBond),
}

macro_rules! dispatch {
    ($value:expr, $obj:ident => $body:expr) => {
        match $value {
            NetworkObject::Interface($obj) => $body,
            NetworkObject::Vlan($obj) => $body,
            NetworkObject::IvsInterface($obj) => $body,
            NetworkObject::NfvswitchInternal($obj) => $body,
            NetworkObject::IbInterface($obj) => $body,
            NetworkObject::OvsBridge($obj) => $body,
            NetworkObject::OvsUserBridge($obj) => $body,
            NetworkObject::LinuxBridge($obj) => $body,
            NetworkObject::IvsBridge($obj) => $body,
            NetworkObject::NfvswitchBridge($obj) => $body,
            NetworkObject::LinuxBond($obj) => $body,
            NetworkObject::LinuxTeam($obj) => $body,
            NetworkObject::OvsBond($obj) => $body,
            NetworkObject::OvsTunnel($obj) => $body,
            NetworkObject::OvsPatchPort($obj) => $body,
            NetworkObject::OvsDpdkPort($obj) => $body,
            NetworkObject::OvsDpdkBond($obj) => $body,
            NetworkObject::VppInterface($obj) => $body,
            NetworkObject::VppBond($obj) => $body,
        }
    };
}

impl NetworkObject {
    /// Builds an entity from a document node.
    ///
    /// The node's own mapping settings are applied on top of `ctx` before
    /// its constructor runs.
    pub fn from_value(value: &Value, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let doc = value
            .as_object()
            .ok_or_else(|| ConfigError::invalid_value("network_config", "expected a mapping"))?;
        let tag = doc
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::UnknownType(String::new()))?;
        let constructor = CONSTRUCTORS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, c)| *c)
            .ok_or_else(|| ConfigError::UnknownType(tag.to_string()))?;

        let scope = ctx.scoped(doc)?;
        let object = constructor(doc, &scope)?;
        debug!(kind = tag, name = %object.name(), "Built network object");
        Ok(object)
    }

    /// The type tag.
    pub fn tag(&self) -> &'static str {
        match self {
            NetworkObject::Interface(_) => tags::INTERFACE,
            NetworkObject::Vlan(_) => tags::VLAN,
            NetworkObject::IvsInterface(_) => tags::IVS_INTERFACE,
            NetworkObject::NfvswitchInternal(_) => tags::NFVSWITCH_INTERNAL,
            NetworkObject::IbInterface(_) => tags::IB_INTERFACE,
            NetworkObject::OvsBridge(_) => tags::OVS_BRIDGE,
            NetworkObject::OvsUserBridge(_) => tags::OVS_USER_BRIDGE,
            NetworkObject::LinuxBridge(_) => tags::LINUX_BRIDGE,
            NetworkObject::IvsBridge(_) => tags::IVS_BRIDGE,
            NetworkObject::NfvswitchBridge(_) => tags::NFVSWITCH_BRIDGE,
            NetworkObject::LinuxBond(_) => tags::LINUX_BOND,
            NetworkObject::LinuxTeam(_) => tags::LINUX_TEAM,
            NetworkObject::OvsBond(_) => tags::OVS_BOND,
            NetworkObject::OvsTunnel(_) => tags::OVS_TUNNEL,
            NetworkObject::OvsPatchPort(_) => tags::OVS_PATCH_PORT,
            NetworkObject::OvsDpdkPort(_) => tags::OVS_DPDK_PORT,
            NetworkObject::OvsDpdkBond(_) => tags::OVS_DPDK_BOND,
            NetworkObject::VppInterface(_) => tags::VPP_INTERFACE,
            NetworkObject::VppBond(_) => tags::VPP_BOND,
        }
    }

    /// Common options.
    pub fn base(&self) -> &BaseOpts {
        dispatch!(self, obj => &obj.base)
    }

    /// Common options, mutably.
    pub fn base_mut(&mut self) -> &mut BaseOpts {
        dispatch!(self, obj => &mut obj.base)
    }

    /// Resolved name.
    pub fn name(&self) -> &str {
        &self.base().name
    }

    /// Returns true for bonds and teams.
    pub fn is_bond(&self) -> bool {
        BOND_TAGS.contains(&self.tag())
    }

    /// Direct members; empty for leaf entities.
    pub fn members(&self) -> &[NetworkObject] {
        match self {
            NetworkObject::OvsBridge(o) => &o.members,
            NetworkObject::OvsUserBridge(o) => &o.members,
            NetworkObject::LinuxBridge(o) => &o.members,
            NetworkObject::IvsBridge(o) => &o.members,
            NetworkObject::NfvswitchBridge(o) => &o.members,
            NetworkObject::LinuxBond(o) => &o.members,
            NetworkObject::LinuxTeam(o) => &o.members,
            NetworkObject::OvsBond(o) => &o.members,
            NetworkObject::OvsDpdkPort(o) => &o.members,
            NetworkObject::OvsDpdkBond(o) => &o.members,
            NetworkObject::VppBond(o) => &o.members,
            _ => &[],
        }
    }

    /// Direct members, mutably.
    pub fn members_mut(&mut self) -> &mut [NetworkObject] {
        match self {
            NetworkObject::OvsBridge(o) => &mut o.members,
            NetworkObject::OvsUserBridge(o) => &mut o.members,
            NetworkObject::LinuxBridge(o) => &mut o.members,
            NetworkObject::IvsBridge(o) => &mut o.members,
            NetworkObject::NfvswitchBridge(o) => &mut o.members,
            NetworkObject::LinuxBond(o) => &mut o.members,
            NetworkObject::LinuxTeam(o) => &mut o.members,
            NetworkObject::OvsBond(o) => &mut o.members,
            NetworkObject::OvsDpdkPort(o) => &mut o.members,
            NetworkObject::OvsDpdkBond(o) => &mut o.members,
            NetworkObject::VppBond(o) => &mut o.members,
            _ => &mut [],
        }
    }

    /// Visits this object and every nested member, depth first.
    pub fn visit_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut NetworkObject),
    {
        f(self);
        for member in self.members_mut() {
            member.visit_mut(f);
        }
    }
}

/// Builds the members of a container node.
pub(crate) fn build_members(
    doc: &Document,
    ctx: &BuildContext<'_>,
) -> Result<Vec<NetworkObject>, ConfigError> {
    list_field(doc, "members", "Members")?
        .iter()
        .map(|member| NetworkObject::from_value(member, ctx))
        .collect()
}

/// Finds the primary member: the first with `primary` set, named by its own
/// primary interface when it has one. A second primary is an error.
pub(crate) fn primary_member(
    members: &[NetworkObject],
    container: &str,
) -> Result<Option<String>, ConfigError> {
    let mut primary: Option<String> = None;
    for member in members.iter().map(NetworkObject::base) {
        if !member.primary {
            continue;
        }
        if primary.is_some() {
            return Err(ConfigError::duplicate_primary(container));
        }
        primary = Some(
            member
                .primary_interface_name
                .clone()
                .unwrap_or_else(|| member.name.clone()),
        );
    }
    Ok(primary)
}

/// Primary member of an OVS bond: the flagged member, else the member with
/// the smallest name.
pub(crate) fn bond_primary_member(
    members: &[NetworkObject],
    container: &str,
    entity: &str,
    name: &str,
) -> Result<String, ConfigError> {
    if let Some(primary) = primary_member(members, container)? {
        return Ok(primary);
    }
    members
        .iter()
        .map(NetworkObject::name)
        .min()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::NoMembers {
            entity: entity.to_string(),
            name: name.to_string(),
        })
}

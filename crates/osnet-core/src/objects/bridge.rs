//! Bridges and software switches.

use super::base::{bridge_ovs_extra, optional_string, required_string, BaseOpts, Document};
use super::{build_members, primary_member, BuildContext, NetworkObject};
use crate::error::ConfigError;

/// Name IVS always uses for its bridge.
pub const IVS_BRIDGE_NAME: &str = "ivs";

/// Name NFVSwitch always uses for its bridge.
pub const NFVSWITCH_BRIDGE_NAME: &str = "nfvswitch";

/// Fields shared by both OVS bridge flavours.
struct BridgeParts {
    base: BaseOpts,
    members: Vec<NetworkObject>,
    ovs_options: Option<String>,
    ovs_extra: Vec<String>,
}

fn ovs_bridge_parts(
    doc: &Document,
    ctx: &BuildContext<'_>,
    entity: &str,
) -> Result<BridgeParts, ConfigError> {
    let name = required_string(doc, "name", entity)?;
    let mut base = BaseOpts::from_doc(&name, doc, ctx, false)?;
    let members = build_members(doc, ctx)?;
    base.primary_interface_name = primary_member(&members, "bridge")?;
    let ovs_extra = bridge_ovs_extra(doc, &base.name)?;
    Ok(BridgeParts {
        base,
        members,
        ovs_options: optional_string(doc, "ovs_options"),
        ovs_extra,
    })
}

fn reject_bonds(members: &[NetworkObject], switch: &str) -> Result<(), ConfigError> {
    if members.iter().any(NetworkObject::is_bond) {
        return Err(ConfigError::BondNotSupported {
            switch: switch.to_string(),
        });
    }
    Ok(())
}

/// An Open vSwitch bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct OvsBridge {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    pub ovs_options: Option<String>,
    pub ovs_extra: Vec<String>,
}

impl OvsBridge {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let mut parts = ovs_bridge_parts(doc, ctx, "OvsBridge")?;
        for member in &mut parts.members {
            let is_tunnel = matches!(member, NetworkObject::OvsTunnel(_));
            let membership = &mut member.base_mut().membership;
            membership.bridge_name = Some(parts.base.name.clone());
            if !is_tunnel {
                membership.ovs_port = true;
            }
        }
        Ok(Self {
            base: parts.base,
            members: parts.members,
            ovs_options: parts.ovs_options,
            ovs_extra: parts.ovs_extra,
        })
    }
}

/// An Open vSwitch bridge on the userspace (netdev) datapath.
#[derive(Debug, Clone, PartialEq)]
pub struct OvsUserBridge {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    pub ovs_options: Option<String>,
    pub ovs_extra: Vec<String>,
}

impl OvsUserBridge {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let mut parts = ovs_bridge_parts(doc, ctx, "OvsUserBridge")?;
        for member in &mut parts.members {
            // DPDK ports and bonds attach themselves with their own port type.
            let own_port = matches!(
                member,
                NetworkObject::OvsTunnel(_)
                    | NetworkObject::OvsDpdkPort(_)
                    | NetworkObject::OvsDpdkBond(_)
            );
            let membership = &mut member.base_mut().membership;
            membership.bridge_name = Some(parts.base.name.clone());
            if !own_port {
                membership.ovs_port = true;
            }
        }
        Ok(Self {
            base: parts.base,
            members: parts.members,
            ovs_options: parts.ovs_options,
            ovs_extra: parts.ovs_extra,
        })
    }
}

/// A Linux kernel bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct LinuxBridge {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
}

impl LinuxBridge {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "LinuxBridge")?;
        let mut base = BaseOpts::from_doc(&name, doc, ctx, false)?;
        let mut members = build_members(doc, ctx)?;
        base.primary_interface_name = primary_member(&members, "bridge")?;
        for member in &mut members {
            let membership = &mut member.base_mut().membership;
            membership.linux_bridge_name = Some(base.name.clone());
            membership.ovs_port = false;
        }
        Ok(Self { base, members })
    }
}

/// The Indigo Virtual Switch bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct IvsBridge {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
}

impl IvsBridge {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let base = BaseOpts::from_doc(IVS_BRIDGE_NAME, doc, ctx, false)?;
        let mut members = build_members(doc, ctx)?;
        reject_bonds(&members, "IVS")?;
        for member in &mut members {
            let membership = &mut member.base_mut().membership;
            membership.ivs_bridge_name = Some(base.name.clone());
            membership.ovs_port = false;
        }
        Ok(Self { base, members })
    }
}

/// The NFVSwitch bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct NfvswitchBridge {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    /// Switch options (core and memory settings).
    pub options: String,
}

impl NfvswitchBridge {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let options = optional_string(doc, "options").ok_or_else(|| ConfigError::MissingOptions {
            entity: "NfvswitchBridge".to_string(),
        })?;
        let base = BaseOpts::from_doc(NFVSWITCH_BRIDGE_NAME, doc, ctx, false)?;
        let mut members = build_members(doc, ctx)?;
        reject_bonds(&members, "NFVSwitch")?;
        for member in &mut members {
            let membership = &mut member.base_mut().membership;
            membership.nfvswitch_bridge_name = Some(base.name.clone());
            membership.ovs_port = false;
        }
        Ok(Self {
            base,
            members,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpdk::BindingTable;
    use crate::nic::{NicContext, StaticInventory};
    use serde_json::{json, Value};

    fn build(value: Value) -> Result<NetworkObject, ConfigError> {
        let inventory = StaticInventory::new()
            .with_active("em1", None)
            .with_active("em2", None);
        let nics = NicContext::new(Box::new(inventory), BindingTable::new("/nonexistent/dpdk_mapping.yaml"));
        let ctx = BuildContext::new(&nics, None, false);
        NetworkObject::from_value(&value, &ctx)
    }

    #[test]
    fn test_ovs_bridge_members_and_primary() {
        let obj = build(json!({
            "type": "ovs_bridge",
            "name": "br-ex",
            "use_dhcp": true,
            "members": [
                {"type": "interface", "name": "nic1", "primary": true},
                {"type": "ovs_tunnel", "name": "tun0", "tunnel_type": "vxlan"},
            ],
        }))
        .unwrap();

        let NetworkObject::OvsBridge(bridge) = obj else {
            panic!("expected an OVS bridge");
        };
        assert_eq!(bridge.base.primary_interface_name.as_deref(), Some("em1"));
        assert!(!bridge.base.primary);
        assert_eq!(
            bridge.ovs_extra,
            vec!["set bridge br-ex fail_mode=standalone", "del-controller br-ex"]
        );

        let iface = bridge.members[0].base();
        assert_eq!(iface.membership.bridge_name.as_deref(), Some("br-ex"));
        assert!(iface.membership.ovs_port);
        let tunnel = bridge.members[1].base();
        assert_eq!(tunnel.membership.bridge_name.as_deref(), Some("br-ex"));
        assert!(!tunnel.membership.ovs_port);
    }

    #[test]
    fn test_bridge_duplicate_primary() {
        let err = build(json!({
            "type": "linux_bridge",
            "name": "br0",
            "members": [
                {"type": "interface", "name": "em1", "primary": true},
                {"type": "interface", "name": "em2", "primary": true},
            ],
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Only one primary interface allowed per bridge.");
    }

    #[test]
    fn test_bridge_primary_from_nested_bond() {
        let obj = build(json!({
            "type": "ovs_bridge",
            "name": "br-bond",
            "members": [{
                "type": "ovs_bond",
                "name": "bond1",
                "primary": true,
                "members": [
                    {"type": "interface", "name": "em1"},
                    {"type": "interface", "name": "em2", "primary": true},
                ],
            }],
        }))
        .unwrap();
        // Containers ignore `primary` on themselves.
        assert_eq!(obj.base().primary_interface_name, None);
        assert_eq!(obj.members()[0].base().primary_interface_name.as_deref(), Some("em2"));
    }

    #[test]
    fn test_members_must_be_list() {
        let err = build(json!({"type": "ovs_bridge", "name": "br-ex", "members": "em1"})).unwrap_err();
        assert!(matches!(err, ConfigError::NotAList { .. }));
    }

    #[test]
    fn test_user_bridge_dpdk_members_keep_own_port() {
        let obj = build(json!({
            "type": "ovs_user_bridge",
            "name": "br-link",
            "members": [{
                "type": "ovs_dpdk_port",
                "name": "dpdk0",
                "members": [{"type": "interface", "name": "nic1"}],
            }],
        }))
        .unwrap();
        let port = obj.members()[0].base();
        assert_eq!(port.membership.bridge_name.as_deref(), Some("br-link"));
        assert!(!port.membership.ovs_port);
    }

    #[test]
    fn test_linux_bridge_back_reference() {
        let obj = build(json!({
            "type": "linux_bridge",
            "name": "br-ctl",
            "members": [{"type": "interface", "name": "nic2"}],
        }))
        .unwrap();
        let member = obj.members()[0].base();
        assert_eq!(member.name, "em2");
        assert_eq!(member.membership.linux_bridge_name.as_deref(), Some("br-ctl"));
        assert!(!member.membership.ovs_port);
    }

    #[test]
    fn test_ivs_rejects_bonds() {
        let err = build(json!({
            "type": "ivs_bridge",
            "members": [{
                "type": "linux_bond",
                "name": "bond0",
                "members": [{"type": "interface", "name": "em1"}],
            }],
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "IVS does not support bond interfaces.");
    }

    #[test]
    fn test_ivs_bridge_name_and_members() {
        let obj = build(json!({
            "type": "ivs_bridge",
            "members": [
                {"type": "interface", "name": "em1", "primary": true},
                {"type": "ivs_interface", "vlan_id": 10},
            ],
        }))
        .unwrap();
        assert_eq!(obj.name(), IVS_BRIDGE_NAME);
        assert_eq!(obj.base().primary_interface_name, None);
        assert_eq!(
            obj.members()[1].base().membership.ivs_bridge_name.as_deref(),
            Some(IVS_BRIDGE_NAME)
        );
    }

    #[test]
    fn test_nfvswitch_requires_options() {
        let err = build(json!({"type": "nfvswitch_bridge", "members": []})).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOptions { .. }));

        let err = build(json!({
            "type": "nfvswitch_bridge",
            "options": "-c 2,3,4,5",
            "members": [{"type": "team", "name": "team0"}],
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::BondNotSupported { ref switch } if switch == "NFVSwitch"));
    }
}

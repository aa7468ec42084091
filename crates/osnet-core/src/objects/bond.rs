//! Link aggregation: Linux bonds, teams and OVS bonds.

use super::base::{format_ovs_extra, optional_string, required_string, string_list, BaseOpts, Document};
use super::{bond_primary_member, build_members, primary_member, BuildContext, NetworkObject};
use crate::error::ConfigError;

/// A Linux kernel bond.
#[derive(Debug, Clone, PartialEq)]
pub struct LinuxBond {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    pub bonding_options: Option<String>,
}

impl LinuxBond {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "LinuxBond")?;
        let mut base = BaseOpts::from_doc(&name, doc, ctx, false)?;
        let mut members = build_members(doc, ctx)?;
        base.primary_interface_name = primary_member(&members, "bond")?;
        for member in &mut members {
            member.base_mut().membership.linux_bond_name = Some(base.name.clone());
        }
        Ok(Self {
            base,
            members,
            bonding_options: optional_string(doc, "bonding_options"),
        })
    }
}

/// A teamd team.
#[derive(Debug, Clone, PartialEq)]
pub struct LinuxTeam {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    pub bonding_options: Option<String>,
}

impl LinuxTeam {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "LinuxTeam")?;
        let mut base = BaseOpts::from_doc(&name, doc, ctx, false)?;
        let mut members = build_members(doc, ctx)?;
        base.primary_interface_name = primary_member(&members, "team")?;
        for member in &mut members {
            member.base_mut().membership.linux_team_name = Some(base.name.clone());
        }
        Ok(Self {
            base,
            members,
            bonding_options: optional_string(doc, "bonding_options"),
        })
    }
}

/// An Open vSwitch bond port.
///
/// Always has a primary member: when none is flagged, the member with the
/// smallest name is used.
#[derive(Debug, Clone, PartialEq)]
pub struct OvsBond {
    pub base: BaseOpts,
    pub members: Vec<NetworkObject>,
    pub ovs_options: Option<String>,
    pub ovs_extra: Vec<String>,
}

impl OvsBond {
    pub(crate) fn from_doc(doc: &Document, ctx: &BuildContext<'_>) -> Result<Self, ConfigError> {
        let name = required_string(doc, "name", "OvsBond")?;
        let mut base = BaseOpts::from_doc(&name, doc, ctx, false)?;
        let members = build_members(doc, ctx)?;
        base.primary_interface_name =
            Some(bond_primary_member(&members, "bond", "OvsBond", &base.name)?);
        let ovs_extra = format_ovs_extra(&string_list(doc, "ovs_extra")?, &base.name);
        Ok(Self {
            base,
            members,
            ovs_options: optional_string(doc, "ovs_options"),
            ovs_extra,
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
            .with_active("em2", None)
            .with_active("em3", None);
        let nics = NicContext::new(Box::new(inventory), BindingTable::new("/nonexistent/dpdk_mapping.yaml"));
        let ctx = BuildContext::new(&nics, None, false);
        NetworkObject::from_value(&value, &ctx)
    }

    #[test]
    fn test_ovs_bond_duplicate_primary() {
        let err = build(json!({
            "type": "ovs_bond",
            "name": "bond0",
            "members": [
                {"type": "interface", "name": "em1", "primary": true},
                {"type": "interface", "name": "em2", "primary": true},
            ],
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Only one primary interface allowed per bond"));
    }

    #[test]
    fn test_ovs_bond_primary_fallback() {
        let obj = build(json!({
            "type": "ovs_bond",
            "name": "bond0",
            "ovs_extra": ["set port {name} bond_mode=balance-slb"],
            "members": [
                {"type": "interface", "name": "em2"},
                {"type": "interface", "name": "em1"},
            ],
        }))
        .unwrap();

        let NetworkObject::OvsBond(bond) = obj else {
            panic!("expected an OVS bond");
        };
        assert_eq!(bond.base.primary_interface_name.as_deref(), Some("em1"));
        assert_eq!(bond.ovs_extra, vec!["set port bond0 bond_mode=balance-slb"]);
    }

    #[test]
    fn test_ovs_bond_flagged_primary() {
        let obj = build(json!({
            "type": "ovs_bond",
            "name": "bond0",
            "members": [
                {"type": "interface", "name": "em1"},
                {"type": "interface", "name": "em3", "primary": true},
            ],
        }))
        .unwrap();
        assert_eq!(obj.base().primary_interface_name.as_deref(), Some("em3"));
    }

    #[test]
    fn test_ovs_bond_without_members() {
        let err = build(json!({"type": "ovs_bond", "name": "bond0"})).unwrap_err();
        assert!(matches!(err, ConfigError::NoMembers { ref name, .. } if name == "bond0"));
    }

    #[test]
    fn test_linux_bond_members() {
        let obj = build(json!({
            "type": "linux_bond",
            "name": "bond1",
            "bonding_options": "mode=active-backup",
            "members": [
                {"type": "interface", "name": "nic1", "primary": true},
                {"type": "interface", "name": "nic2"},
            ],
        }))
        .unwrap();

        let NetworkObject::LinuxBond(bond) = obj else {
            panic!("expected a Linux bond");
        };
        assert_eq!(bond.base.primary_interface_name.as_deref(), Some("em1"));
        assert_eq!(bond.bonding_options.as_deref(), Some("mode=active-backup"));
        for member in &bond.members {
            assert_eq!(member.base().membership.linux_bond_name.as_deref(), Some("bond1"));
        }
    }

    #[test]
    fn test_team_members() {
        let obj = build(json!({
            "type": "team",
            "name": "team0",
            "members": [
                {"type": "interface", "name": "em1", "primary": true},
                {"type": "interface", "name": "em2", "primary": true},
            ],
        }))
        .unwrap_err();
        assert_eq!(obj.to_string(), "Only one primary interface allowed per team.");

        let team = build(json!({
            "type": "team",
            "name": "team0",
            "members": [{"type": "interface", "name": "em1"}],
        }))
        .unwrap();
        assert_eq!(team.base().primary_interface_name, None);
        assert_eq!(
            team.members()[0].base().membership.linux_team_name.as_deref(),
            Some("team0")
        );
    }
}

//! Flattened view of a built object tree.
//!
//! DPDK ports and VPP interfaces can sit at any depth (inside a bridge, a
//! bond, a bridge inside a bond...). [`Topology::add_object`] walks each
//! tree once and sorts references by kind so the driver can act on them
//! without re-walking.

use std::collections::BTreeMap;

use tracing::debug;

use crate::objects::{tags, NetworkObject, OvsDpdkBond, OvsDpdkPort, VppBond, VppInterface};

/// References to every object of a topology, grouped by type tag.
#[derive(Debug, Default)]
pub struct Topology<'a> {
    by_tag: BTreeMap<&'static str, Vec<&'a NetworkObject>>,
}

impl<'a> Topology<'a> {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a topology from top-level objects.
    pub fn from_objects(objects: &'a [NetworkObject]) -> Self {
        let mut topology = Self::new();
        for object in objects {
            topology.add_object(object);
        }
        topology
    }

    /// Adds `object` and, for containers, its members.
    ///
    /// The interface inside a DPDK port and the ports inside a DPDK bond are
    /// not added on their own: they are configured through their owner.
    pub fn add_object(&mut self, object: &'a NetworkObject) {
        debug!(kind = object.tag(), name = %object.name(), "Adding object to topology");
        self.by_tag.entry(object.tag()).or_default().push(object);

        match object {
            NetworkObject::OvsDpdkPort(_) | NetworkObject::OvsDpdkBond(_) => {}
            _ => {
                for member in object.members() {
                    self.add_object(member);
                }
            }
        }
    }

    /// All objects with the given tag, in visit order.
    pub fn objects(&self, tag: &str) -> &[&'a NetworkObject] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of objects per tag.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        self.by_tag.iter().map(|(tag, objs)| (*tag, objs.len())).collect()
    }

    /// OVS DPDK ports, including those inside DPDK bonds.
    pub fn ovs_dpdk_ports(&self) -> Vec<&'a OvsDpdkPort> {
        let direct = self
            .objects(tags::OVS_DPDK_PORT)
            .iter()
            .filter_map(|&o| match o {
                NetworkObject::OvsDpdkPort(port) => Some(port),
                _ => None,
            });
        let bonded = self.ovs_dpdk_bonds().into_iter().flat_map(|bond| bond.ports());
        direct.chain(bonded).collect()
    }

    /// OVS DPDK bonds.
    pub fn ovs_dpdk_bonds(&self) -> Vec<&'a OvsDpdkBond> {
        self.objects(tags::OVS_DPDK_BOND)
            .iter()
            .filter_map(|&o| match o {
                NetworkObject::OvsDpdkBond(bond) => Some(bond),
                _ => None,
            })
            .collect()
    }

    /// VPP interfaces, including bond members.
    pub fn vpp_interfaces(&self) -> Vec<&'a VppInterface> {
        self.objects(tags::VPP_INTERFACE)
            .iter()
            .filter_map(|&o| match o {
                NetworkObject::VppInterface(iface) => Some(iface),
                _ => None,
            })
            .collect()
    }

    /// VPP bonds.
    pub fn vpp_bonds(&self) -> Vec<&'a VppBond> {
        self.objects(tags::VPP_BOND)
            .iter()
            .filter_map(|&o| match o {
                NetworkObject::VppBond(bond) => Some(bond),
                _ => None,
            })
            .collect()
    }

    /// Returns true when nothing was added.
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpdk::BindingTable;
    use crate::nic::{NicContext, StaticInventory};
    use crate::objects::BuildContext;
    use serde_json::json;

    #[test]
    fn test_nested_objects_flattened() {
        let nics = NicContext::new(
            Box::new(StaticInventory::new().with_active("eth0", None)),
            BindingTable::new("/nonexistent/dpdk_mapping.yaml"),
        );
        let ctx = BuildContext::new(&nics, None, false);
        let docs = [
            json!({
                "type": "ovs_user_bridge",
                "name": "br-link",
                "members": [{
                    "type": "ovs_dpdk_bond",
                    "name": "dpdkbond0",
                    "members": [
                        {"type": "ovs_dpdk_port", "name": "dpdk0",
                         "members": [{"type": "interface", "name": "eth1"}]},
                        {"type": "ovs_dpdk_port", "name": "dpdk1",
                         "members": [{"type": "interface", "name": "eth2"}]},
                    ],
                }],
            }),
            json!({"type": "ovs_dpdk_port", "name": "dpdk2",
                   "members": [{"type": "interface", "name": "eth3"}]}),
            json!({"type": "vpp_bond", "name": "net_bonding0", "members": [
                {"type": "vpp_interface", "name": "eth4"},
                {"type": "vpp_interface", "name": "eth5"},
            ]}),
        ];
        let objects: Vec<NetworkObject> = docs
            .iter()
            .map(|d| NetworkObject::from_value(d, &ctx).unwrap())
            .collect();

        let topology = Topology::from_objects(&objects);
        let ports: Vec<&str> = topology
            .ovs_dpdk_ports()
            .iter()
            .map(|p| p.base.name.as_str())
            .collect();
        assert_eq!(ports, vec!["dpdk2", "dpdk0", "dpdk1"]);
        assert_eq!(topology.vpp_interfaces().len(), 2);
        assert_eq!(topology.vpp_bonds().len(), 1);
        // Interfaces inside DPDK ports are not configured on their own.
        assert!(topology.objects(tags::INTERFACE).is_empty());
        assert_eq!(topology.summary().get("ovs_user_bridge"), Some(&1));
    }
}

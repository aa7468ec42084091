//! Building object trees from topology documents

use std::path::Path;

use osnet_core::config::{parse_interface_mapping, parse_network_config};
use osnet_core::dpdk::BindingTable;
use osnet_core::nic::{NicContext, StaticInventory};
use osnet_core::objects::tags;
use osnet_core::{BuildContext, ConfigError, NetworkObject, Topology};
use osnet_test::topology_fixtures;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn nics() -> NicContext {
    let inventory = StaticInventory::new()
        .with_active("em1", Some("52:54:00:00:00:a1"))
        .with_active("em2", Some("52:54:00:00:00:a2"))
        .with_active("eth0", Some("52:54:00:00:00:00"))
        .with_active("eth1", Some("52:54:00:00:00:01"));
    NicContext::new(Box::new(inventory), BindingTable::new("/nonexistent/dpdk_mapping.yaml"))
}

fn build_all(nics: &NicContext, docs: &[Value]) -> Result<Vec<NetworkObject>, ConfigError> {
    let ctx = BuildContext::new(nics, None, false);
    docs.iter()
        .map(|doc| NetworkObject::from_value(doc, &ctx))
        .collect()
}

/// A document round-trips from text to a resolved object tree
#[test]
fn test_build_from_document() {
    let text = topology_fixtures::network_config(vec![
        topology_fixtures::ovs_bridge("br-ex", "nic1"),
        topology_fixtures::ovs_bond("bond1", "nic4", "nic3"),
    ]);
    let docs = parse_network_config(&text, Path::new("config.json")).unwrap();
    let nics = nics();
    let objects = build_all(&nics, &docs).unwrap();

    let NetworkObject::OvsBridge(bridge) = &objects[0] else {
        panic!("expected an OVS bridge");
    };
    assert_eq!(bridge.base.primary_interface_name.as_deref(), Some("em1"));
    assert_eq!(
        bridge.ovs_extra,
        vec!["set bridge br-ex fail_mode=standalone", "del-controller br-ex"]
    );
    let member = &bridge.members[0];
    assert_eq!(member.name(), "em1");
    assert_eq!(member.base().membership.bridge_name.as_deref(), Some("br-ex"));
    assert!(member.base().membership.ovs_port);

    // Without a flagged primary the smallest member name wins.
    assert_eq!(
        objects[1].base().primary_interface_name.as_deref(),
        Some("eth0")
    );
}

/// Aliases from the mapping document take precedence
#[test]
fn test_build_with_mapping() {
    let mapping = parse_interface_mapping(
        "interface_mapping:\n  nic1: eth1\n  uplink: '52:54:00:00:00:00'\n",
        Path::new("mapping.yaml"),
    )
    .unwrap();
    let nics = nics();
    let ctx = BuildContext::new(&nics, mapping, false);

    let obj = NetworkObject::from_value(&json!({"type": "interface", "name": "uplink"}), &ctx).unwrap();
    assert_eq!(obj.name(), "eth0");
    let obj = NetworkObject::from_value(&json!({"type": "interface", "name": "nic1"}), &ctx).unwrap();
    assert_eq!(obj.name(), "eth1");
    let obj = NetworkObject::from_value(&json!({"type": "interface", "name": "nic2"}), &ctx).unwrap();
    assert_eq!(obj.name(), "em2");
}

/// Two primary members in one OVS bond are rejected
#[test]
fn test_ovs_bond_duplicate_primary() {
    let nics = nics();
    let err = build_all(
        &nics,
        &[json!({
            "type": "ovs_bond",
            "name": "bond1",
            "members": [
                {"type": "interface", "name": "nic1", "primary": true},
                {"type": "interface", "name": "nic2", "primary": true},
            ],
        })],
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Only one primary interface allowed per bond.");
}

/// IVS and NFVSwitch bridges cannot carry bonds
#[test]
fn test_switch_bond_rejection() {
    let nics = nics();
    let bond = topology_fixtures::ovs_bond("bond1", "nic1", "nic2");

    let err = build_all(
        &nics,
        &[json!({"type": "ivs_bridge", "members": [bond.clone()]})],
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::BondNotSupported { .. }));
    assert_eq!(err.to_string(), "IVS does not support bond interfaces.");

    let err = build_all(
        &nics,
        &[json!({"type": "nfvswitch_bridge", "options": "-c 2,3,4,5", "members": [bond]})],
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "NFVSwitch does not support bond interfaces.");
}

/// Unknown types and missing names are reported
#[test]
fn test_invalid_objects() {
    let nics = nics();

    let err = build_all(&nics, &[json!({"type": "token_ring", "name": "tr0"})]).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownType(ref t) if t == "token_ring"));

    let err = build_all(&nics, &[json!({"type": "ovs_bridge"})]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "OvsBridge JSON objects require 'name' to be configured."
    );

    let err = build_all(&nics, &[json!({"type": "linux_bridge", "name": "br0", "members": "em1"})]).unwrap_err();
    assert_eq!(err.to_string(), "Members must be a list.");
}

/// DPDK ports and VPP devices are found at any depth
#[test]
fn test_topology_flattening() {
    let nics = nics();
    let objects = build_all(
        &nics,
        &[
            json!({
                "type": "ovs_user_bridge",
                "name": "br-link",
                "members": [
                    topology_fixtures::ovs_dpdk_port("dpdk0", "nic3"),
                    {"type": "ovs_dpdk_bond", "name": "dpdkbond0", "members": [
                        topology_fixtures::ovs_dpdk_port("dpdk1", "nic4"),
                    ]},
                ],
            }),
            topology_fixtures::vpp_bond("net_bonding0", "nic1", "nic2", "192.0.2.10/24"),
        ],
    )
    .unwrap();

    let topology = Topology::from_objects(&objects);
    let ports: Vec<(&str, &str)> = topology
        .ovs_dpdk_ports()
        .iter()
        .map(|port| {
            let nic = port.interface().map_or("", |i| i.base.name.as_str());
            (port.base.name.as_str(), nic)
        })
        .collect();
    assert_eq!(ports, vec![("dpdk0", "eth0"), ("dpdk1", "eth1")]);

    let vpp: Vec<&str> = topology
        .vpp_interfaces()
        .iter()
        .map(|i| i.base.name.as_str())
        .collect();
    assert_eq!(vpp, vec!["em1", "em2"]);
    assert_eq!(topology.vpp_bonds().len(), 1);
    assert!(topology.objects(tags::INTERFACE).is_empty());
}

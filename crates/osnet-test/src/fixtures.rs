//! Test fixtures for host tool output, VPP files and topology documents
//!
//! Tool output mirrors what the real tools print, including the header
//! rows and blank lines parsers have to skip.

use osnet_common::ExecResult;
use serde_json::{json, Value};

/// `vppctl show interface` with one DPDK device at 0000:00:09.0.
pub const VPPCTL_SHOW_INTERFACE: &str = "\n            Name               Idx       State          Counter          Count\nGigabitEthernet0/9/0              1        down\nlocal0                            0        down\n\n";

/// `vppctl show interface` with the two members of a bond.
pub const VPPCTL_SHOW_INTERFACE_BONDED: &str = "\n              Name               Idx    State  MTU (L3/IP4/IP6/MPLS)     Counter          Count\nBondEthernet0                     3      up          9000/0/0/0\nTenGigabitEthernet2/0/0           1      up          9000/0/0/0\nTenGigabitEthernet2/0/1           2      up          9000/0/0/0\nlocal0                            0     down          0/0/0/0\n";

/// `vppctl show hardware-interfaces bond brief` with one bond over
/// interfaces 1 and 2.
pub const VPPCTL_SHOW_BOND: &str = "\n              Name                Idx   Link  Hardware\nBondEthernet0                      3     up   Slave-Idx: 1 2\nTenGigabitEthernet2/0/0            1    slave TenGigabitEthernet2/0/0\nTenGigabitEthernet2/0/1            2    slave TenGigabitEthernet2/0/1\n";

/// A stock VPP `startup.conf`.
pub const VPP_STARTUP_CONF: &str = "\nunix {\n  nodaemon\n  log /tmp/vpp.log\n  full-coredump\n}\n\n\napi-trace {\n  on\n}\n\napi-segment {\n  gid vpp\n}\n\ndpdk {\n}\n";

/// `ethtool -i` output for a device at `pci_address`.
pub fn ethtool_driver_info(pci_address: &str) -> String {
    format!(
        "driver: virtio_net\nversion: 1.0.0\nfirmware-version: \nexpansion-rom-version: \nbus-info: {pci_address}\nsupports-statistics: yes\nsupports-test: no\nsupports-eeprom-access: no\nsupports-register-dump: no\nsupports-priv-flags: no\n"
    )
}

/// A successful `ethtool -i` run.
pub fn ethtool_ok(pci_address: &str) -> ExecResult {
    ExecResult::ok(ethtool_driver_info(pci_address))
}

/// `ethtool -i` against a device the kernel no longer owns.
pub fn ethtool_no_device(name: &str) -> ExecResult {
    ExecResult::failed(
        71,
        format!("Cannot get driver information: No such device ({name})"),
    )
}

/// Common topology document fixtures
pub mod topology_fixtures {
    use super::*;

    /// OVS bridge with one NIC member.
    pub fn ovs_bridge(name: &str, nic: &str) -> Value {
        json!({
            "type": "ovs_bridge",
            "name": name,
            "use_dhcp": true,
            "members": [{"type": "interface", "name": nic, "primary": true}],
        })
    }

    /// OVS bond over two NICs.
    pub fn ovs_bond(name: &str, first: &str, second: &str) -> Value {
        json!({
            "type": "ovs_bond",
            "name": name,
            "members": [
                {"type": "interface", "name": first},
                {"type": "interface", "name": second},
            ],
        })
    }

    /// OVS DPDK port over one NIC.
    pub fn ovs_dpdk_port(name: &str, nic: &str) -> Value {
        json!({
            "type": "ovs_dpdk_port",
            "name": name,
            "members": [{"type": "interface", "name": nic}],
        })
    }

    /// VPP interface with one address.
    pub fn vpp_interface(nic: &str, ip_netmask: &str) -> Value {
        json!({
            "type": "vpp_interface",
            "name": nic,
            "addresses": [{"ip_netmask": ip_netmask}],
        })
    }

    /// VPP bond over two VPP interfaces.
    pub fn vpp_bond(name: &str, first: &str, second: &str, ip_netmask: &str) -> Value {
        json!({
            "type": "vpp_bond",
            "name": name,
            "bonding_options": "mode=2",
            "addresses": [{"ip_netmask": ip_netmask}],
            "members": [
                {"type": "vpp_interface", "name": first},
                {"type": "vpp_interface", "name": second},
            ],
        })
    }

    /// Wraps objects into a topology document.
    pub fn network_config(objects: Vec<Value>) -> String {
        json!({ "network_config": objects }).to_string()
    }
}

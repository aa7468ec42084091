//! DPDK binding and the binding table

use osnet_common::shell::{DRIVERCTL_CMD, ETHTOOL_CMD, MODPROBE_CMD};
use osnet_common::ExecResult;
use osnet_core::dpdk::{BindingRecord, BindingTable, DeviceBinder};
use osnet_core::nic::SysfsInventory;
use osnet_core::BindError;
use osnet_test::{ethtool_no_device, ethtool_ok, FakeNic, FakeSysfs, MockRunner};
use pretty_assertions::assert_eq;

fn host() -> FakeSysfs {
    let sysfs = FakeSysfs::new().expect("Failed to create sysfs");
    sysfs
        .add_nic(FakeNic::up("eth1", "52:54:00:00:00:01"))
        .expect("Failed to add NIC");
    sysfs
}

/// Upserting the same record twice leaves one record
#[test]
fn test_upsert_is_idempotent() {
    let sysfs = host();
    let table = BindingTable::new(sysfs.paths().dpdk_mapping);

    table
        .upsert("eth1", "0000:00:09.0", Some("52:54:00:00:00:01"), "vfio-pci")
        .unwrap();
    table
        .upsert("eth1", "0000:00:09.0", Some("52:54:00:00:00:01"), "vfio-pci")
        .unwrap();
    table.upsert("eth2", "0000:00:09.1", None, "uio_pci_generic").unwrap();

    assert_eq!(
        table.load().unwrap(),
        vec![
            BindingRecord::new("eth1", "0000:00:09.0", Some("52:54:00:00:00:01"), "vfio-pci"),
            BindingRecord::new("eth2", "0000:00:09.1", None, "uio_pci_generic"),
        ]
    );
}

/// A second upsert for a name replaces the whole record
#[test]
fn test_upsert_replaces_record() {
    let sysfs = host();
    let table = BindingTable::new(sysfs.paths().dpdk_mapping);

    table
        .upsert("eth1", "0000:00:09.0", Some("52:54:00:00:00:01"), "vfio-pci")
        .unwrap();
    table.upsert("eth1", "0000:00:0a.0", None, "vfio-pci").unwrap();

    let record = table.find("eth1").unwrap().unwrap();
    assert_eq!(record.pci_address, "0000:00:0a.0");
    assert_eq!(record.mac_address, None);
    assert_eq!(table.load().unwrap().len(), 1);
}

/// Upserting over a record without a MAC stores exactly the new fields
#[test]
fn test_upsert_over_record_without_mac() {
    let sysfs = host();
    let table = BindingTable::new(sysfs.paths().dpdk_mapping);

    table.upsert("eth1", "0000:00:09.0", None, "uio_pci_generic").unwrap();
    table
        .upsert("eth1", "0000:00:09.1", Some("52:54:00:00:00:01"), "vfio-pci")
        .unwrap();

    assert_eq!(
        table.load().unwrap(),
        vec![BindingRecord {
            name: "eth1".to_string(),
            pci_address: "0000:00:09.1".to_string(),
            mac_address: Some("52:54:00:00:00:01".to_string()),
            driver: Some("vfio-pci".to_string()),
        }]
    );
}

/// Binding runs modprobe, then driverctl, then records the NIC
#[test]
fn test_bind_vfio() {
    let sysfs = host();
    let paths = sysfs.paths();
    let inventory = SysfsInventory::new(&paths.sys_class_net);
    let table = BindingTable::new(&paths.dpdk_mapping);
    let runner = MockRunner::new().with_reply(ETHTOOL_CMD, &["-i", "eth1"], ethtool_ok("0000:00:09.0"));

    DeviceBinder::new(&runner, &inventory, &table)
        .bind("eth1", "vfio-pci", false)
        .unwrap();

    assert_eq!(
        runner.captured_commands(),
        vec![
            "ethtool -i eth1",
            "modprobe vfio-pci",
            "driverctl set-override 0000:00:09.0 vfio-pci",
        ]
    );
    assert_eq!(
        table.find("eth1").unwrap(),
        Some(BindingRecord::new(
            "eth1",
            "0000:00:09.0",
            Some("52:54:00:00:00:01"),
            "vfio-pci"
        ))
    );
}

/// Other drivers skip the module load
#[test]
fn test_bind_generic_driver() {
    let sysfs = host();
    let paths = sysfs.paths();
    let inventory = SysfsInventory::new(&paths.sys_class_net);
    let table = BindingTable::new(&paths.dpdk_mapping);
    let runner = MockRunner::new().with_reply(ETHTOOL_CMD, &["-i", "eth1"], ethtool_ok("0000:00:09.0"));

    DeviceBinder::new(&runner, &inventory, &table)
        .bind("eth1", "uio_pci_generic", false)
        .unwrap();

    assert_eq!(runner.count(MODPROBE_CMD), 0);
    assert!(runner.ran("driverctl set-override 0000:00:09.0 uio_pci_generic"));
}

/// A NIC with a binding record is not touched again
#[test]
fn test_bind_short_circuits_on_record() {
    let sysfs = host();
    let paths = sysfs.paths();
    let inventory = SysfsInventory::new(&paths.sys_class_net);
    let table = BindingTable::new(&paths.dpdk_mapping);
    table.upsert("eth1", "0000:00:09.0", None, "vfio-pci").unwrap();
    let runner = MockRunner::new();

    DeviceBinder::new(&runner, &inventory, &table)
        .bind("eth1", "vfio-pci", false)
        .unwrap();

    assert!(runner.captured_commands().is_empty());
}

/// Without a PCI address the bind fails and nothing is recorded
#[test]
fn test_bind_unknown_device() {
    let sysfs = host();
    let paths = sysfs.paths();
    let inventory = SysfsInventory::new(&paths.sys_class_net);
    let table = BindingTable::new(&paths.dpdk_mapping);
    let runner = MockRunner::new().with_reply(ETHTOOL_CMD, &["-i", "eth9"], ethtool_no_device("eth9"));

    let err = DeviceBinder::new(&runner, &inventory, &table)
        .bind("eth9", "vfio-pci", false)
        .unwrap_err();

    assert!(matches!(err, BindError::DeviceNotFound(ref name) if name == "eth9"));
    assert_eq!(runner.count(DRIVERCTL_CMD), 0);
    assert!(table.load().unwrap().is_empty());
}

/// driverctl complaining on stderr is a failure even with exit 0
#[test]
fn test_bind_tool_failure() {
    let sysfs = host();
    let paths = sysfs.paths();
    let inventory = SysfsInventory::new(&paths.sys_class_net);
    let table = BindingTable::new(&paths.dpdk_mapping);
    let runner = MockRunner::new()
        .with_reply(ETHTOOL_CMD, &["-i", "eth1"], ethtool_ok("0000:00:09.0"))
        .with_program_reply(
            DRIVERCTL_CMD,
            ExecResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: "driverctl: failed to bind device".to_string(),
            },
        );

    let err = DeviceBinder::new(&runner, &inventory, &table)
        .bind("eth1", "vfio-pci", false)
        .unwrap_err();

    assert!(matches!(err, BindError::ToolFailed { .. }));
    assert!(table.find("eth1").unwrap().is_none());
}

/// A failed module load stops the bind
#[test]
fn test_bind_module_failure() {
    let sysfs = host();
    let paths = sysfs.paths();
    let inventory = SysfsInventory::new(&paths.sys_class_net);
    let table = BindingTable::new(&paths.dpdk_mapping);
    let runner = MockRunner::new()
        .with_reply(ETHTOOL_CMD, &["-i", "eth1"], ethtool_ok("0000:00:09.0"))
        .with_program_reply(MODPROBE_CMD, ExecResult::failed(1, "FATAL: Module vfio-pci not found"));

    let err = DeviceBinder::new(&runner, &inventory, &table)
        .bind("eth1", "vfio-pci", false)
        .unwrap_err();

    assert!(matches!(err, BindError::ModuleLoad { .. }));
    assert_eq!(runner.count(DRIVERCTL_CMD), 0);
}

/// Dry runs neither execute nor record anything
#[test]
fn test_dry_run() {
    let sysfs = host();
    let paths = sysfs.paths();
    let inventory = SysfsInventory::new(&paths.sys_class_net);
    let table = BindingTable::new(&paths.dpdk_mapping);
    let runner = MockRunner::new();
    let binder = DeviceBinder::new(&runner, &inventory, &table);

    binder.bind("eth1", "vfio-pci", true).unwrap();
    assert_eq!(binder.get_live_pci_address("eth1", true), None);
    assert!(runner.captured_commands().is_empty());
    assert!(!paths.dpdk_mapping.exists());
}

/// Persisted addresses come from the table
#[test]
fn test_persisted_pci_address() {
    let sysfs = host();
    let paths = sysfs.paths();
    let inventory = SysfsInventory::new(&paths.sys_class_net);
    let table = BindingTable::new(&paths.dpdk_mapping);
    table.upsert("eth1", "0000:00:09.0", None, "vfio-pci").unwrap();
    let runner = MockRunner::new();
    let binder = DeviceBinder::new(&runner, &inventory, &table);

    assert_eq!(
        binder.get_persisted_pci_address("eth1", false).as_deref(),
        Some("0000:00:09.0")
    );
    assert_eq!(binder.get_persisted_pci_address("eth2", false), None);
}

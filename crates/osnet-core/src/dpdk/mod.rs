//! Device binding tracking for DPDK and VPP.
//!
//! [`BindingTable`] persists which NICs have been handed to a userspace
//! driver; [`DeviceBinder`] performs the handover with `driverctl` and
//! answers PCI address queries from live state or the table.

mod binder;
mod mapping;

pub use binder::{parse_bus_info, DeviceBinder, VFIO_PCI_DRIVER};
pub use mapping::{BindingRecord, BindingTable, DPDK_MAPPING_FILE};

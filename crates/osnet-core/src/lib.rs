//! os-net-config core.
//!
//! Turns a declarative network topology into host configuration:
//!
//! - [`nic`]: stable logical NIC names (`nic1`, `nic2`, ... or aliases)
//! - [`dpdk`]: binding NICs to userspace drivers and persisting the result
//! - [`objects`]: the typed object tree built from the topology document
//! - [`topology`]: flattened, by-kind view of a built tree
//! - [`vpp`]: VPP `startup.conf` rendering and post-start reconciliation
//! - [`config`]: document loading and host file locations
//!
//! # Example
//!
//! ```ignore
//! use osnet_core::config::{load_network_config, Paths};
//! use osnet_core::dpdk::BindingTable;
//! use osnet_core::nic::{NicContext, SysfsInventory};
//! use osnet_core::objects::{BuildContext, NetworkObject};
//!
//! let paths = Paths::default();
//! let nics = NicContext::new(
//!     Box::new(SysfsInventory::new(&paths.sys_class_net)),
//!     BindingTable::new(&paths.dpdk_mapping),
//! );
//! let ctx = BuildContext::new(&nics, None, false);
//! for doc in load_network_config("/etc/os-net-config/config.yaml".as_ref())? {
//!     let object = NetworkObject::from_value(&doc, &ctx)?;
//!     println!("{} {}", object.tag(), object.name());
//! }
//! ```

pub mod config;
pub mod dpdk;
pub mod error;
pub mod nic;
pub mod objects;
pub mod topology;
pub mod vpp;

pub use error::{BindError, ConfigError, OsNetError, OsNetResult, VppError};
pub use objects::{BuildContext, NetworkObject};
pub use topology::Topology;

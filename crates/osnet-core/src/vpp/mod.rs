//! VPP configuration generation and reconciliation.
//!
//! [`render`] produces `startup.conf` from the existing text and the VPP
//! objects of a topology. Once VPP runs, [`VppManager::update_mapping`]
//! looks the devices up through [`VppControl`], records them in the binding
//! table and writes the exec script that assigns addresses.

mod config;
mod control;
mod manager;

pub use config::{dpdk_stanza, ensure_exec_file, render};
pub use control::{
    parse_bond_row, parse_interface_row, pci_suffix, VppBondInfo, VppControl, VppInterfaceInfo,
    VPP_SERVICE,
};
pub use manager::{address_commands, append_exec_commands, resolve_vpp_pci, VppManager};

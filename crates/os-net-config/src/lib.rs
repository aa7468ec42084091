//! os-net-config driver.
//!
//! Glues the core together for one run: load the documents, build the
//! object trees, bind DPDK devices and bring VPP in line.

pub mod apply;
pub mod cli;

pub use apply::{apply, ApplyOptions, ApplyReport};
pub use cli::Args;

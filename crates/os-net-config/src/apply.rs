//! One configuration run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use osnet_common::{files, CommandRunner};
use osnet_core::config::{load_interface_mapping, load_network_config, Paths, VPP_EXEC_FILE};
use osnet_core::dpdk::{BindingTable, DeviceBinder};
use osnet_core::nic::{NicContext, SysfsInventory};
use osnet_core::objects::{VppBond, VppInterface};
use osnet_core::vpp::{ensure_exec_file, render, resolve_vpp_pci, VppControl, VppManager};
use osnet_core::{BuildContext, NetworkObject, Topology, VppError};
use tracing::{debug, info, warn};

/// Inputs of a run.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub config_file: PathBuf,
    pub mapping_file: PathBuf,
    /// Prefix for host state files; empty for the real filesystem.
    pub root_dir: PathBuf,
    pub noop: bool,
    pub persist_mapping: bool,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Files written (or, with `noop`, files that would be written).
    pub changed_files: Vec<PathBuf>,
    /// NICs handed to a DPDK driver.
    pub bound_nics: Vec<String>,
    /// The VPP startup configuration, when VPP devices are configured.
    pub vpp_config: Option<String>,
}

impl ApplyReport {
    /// Returns true when any file changed.
    pub fn changed(&self) -> bool {
        !self.changed_files.is_empty()
    }
}

/// Builds the object trees for `opts` and applies the DPDK and VPP parts.
pub fn apply(opts: &ApplyOptions, runner: &dyn CommandRunner) -> Result<ApplyReport> {
    let paths = Paths::with_root(&opts.root_dir);
    let mut report = ApplyReport::default();

    let docs = load_network_config(&opts.config_file)
        .with_context(|| format!("Failed to load {}", opts.config_file.display()))?;
    let mapping = load_interface_mapping(&opts.mapping_file)
        .with_context(|| format!("Failed to load {}", opts.mapping_file.display()))?;
    let persist_mapping = opts.persist_mapping && opts.mapping_file.exists();
    if opts.persist_mapping && !persist_mapping {
        warn!(
            mapping_file = %opts.mapping_file.display(),
            "No mapping file, not persisting interface names"
        );
    }

    let nics = NicContext::new(
        Box::new(SysfsInventory::new(&paths.sys_class_net)),
        BindingTable::new(&paths.dpdk_mapping),
    );
    let ctx = BuildContext::new(&nics, mapping, persist_mapping);
    let mut objects = docs
        .iter()
        .map(|doc| NetworkObject::from_value(doc, &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let binder = DeviceBinder::new(runner, nics.inventory(), nics.bindings());
    for object in &mut objects {
        resolve_tree_pci(&binder, object)?;
    }

    let topology = Topology::from_objects(&objects);
    debug!(objects = ?topology.summary(), "Built topology");

    let bindings_before = files::read_or_empty(&paths.dpdk_mapping)?;
    for port in topology.ovs_dpdk_ports() {
        let Some(iface) = port.interface() else {
            continue;
        };
        binder
            .bind(&iface.base.name, &port.driver, opts.noop)
            .with_context(|| format!("Failed to bind {} for {}", iface.base.name, port.base.name))?;
        report.bound_nics.push(iface.base.name.clone());
    }

    let vpp_interfaces = topology.vpp_interfaces();
    let vpp_bonds = topology.vpp_bonds();
    if !vpp_interfaces.is_empty() || !vpp_bonds.is_empty() {
        let existing = files::read_or_empty(&paths.vpp_config)?;
        let rendered = render(&existing, &vpp_interfaces, &vpp_bonds, VPP_EXEC_FILE)?;
        let config_changed = rendered != existing;
        if config_changed {
            report.changed_files.push(paths.vpp_config.clone());
        }

        if !opts.noop {
            if config_changed {
                files::write(&paths.vpp_config, &rendered)?;
                info!(path = %paths.vpp_config.display(), "Wrote VPP configuration");
            }
            ensure_exec_file(&paths.vpp_exec)?;
            if config_changed {
                let drivers: Vec<&str> = vpp_interfaces.iter().map(|i| i.uio_driver.as_str()).collect();
                VppControl::new(runner).restart(&drivers)?;
            }

            let mut interfaces: Vec<VppInterface> = vpp_interfaces.into_iter().cloned().collect();
            let bonds: Vec<VppBond> = vpp_bonds.into_iter().cloned().collect();
            let manager = VppManager::new(runner, &nics, &paths.vpp_exec);
            if manager.update_mapping(&mut interfaces, &bonds)? {
                report.changed_files.push(paths.vpp_exec.clone());
            }
        }
        report.vpp_config = Some(rendered);
    }

    if !opts.noop && files::differs(&paths.dpdk_mapping, &bindings_before)? {
        report.changed_files.push(paths.dpdk_mapping.clone());
    }

    info!(changed = ?report.changed_files, "Configuration applied");
    Ok(report)
}

/// Resolves the PCI address of every VPP interface in a tree.
fn resolve_tree_pci(binder: &DeviceBinder<'_>, object: &mut NetworkObject) -> Result<(), VppError> {
    let mut failure = None;
    object.visit_mut(&mut |node| {
        if failure.is_some() {
            return;
        }
        if let NetworkObject::VppInterface(iface) = node {
            if let Err(e) = resolve_vpp_pci(binder, iface) {
                failure = Some(e);
            }
        }
    });
    failure.map_or(Ok(()), Err)
}

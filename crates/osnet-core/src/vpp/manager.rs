//! Post-start reconciliation of VPP state.

use std::path::{Path, PathBuf};

use osnet_common::{files, CommandRunner};
use tracing::{debug, info};

use super::control::VppControl;
use crate::dpdk::DeviceBinder;
use crate::error::VppError;
use crate::nic::NicContext;
use crate::objects::{BaseOpts, VppBond, VppInterface};

/// Fills in `pci_dev` for a VPP interface.
///
/// The kernel is asked first; a NIC VPP already owns is only known to the
/// binding table.
pub fn resolve_vpp_pci(binder: &DeviceBinder<'_>, iface: &mut VppInterface) -> Result<(), VppError> {
    if iface.pci_dev.is_some() {
        return Ok(());
    }
    let name = iface.base.name.as_str();
    let pci = binder
        .get_live_pci_address(name, false)
        .or_else(|| binder.get_persisted_pci_address(name, false))
        .ok_or_else(|| VppError::MissingPciAddress(name.to_string()))?;
    debug!(nic = name, pci_address = %pci, "Resolved VPP interface PCI address");
    iface.pci_dev = Some(pci);
    Ok(())
}

/// Startup commands bringing up `vpp_name` with the addresses of `base`.
pub fn address_commands(vpp_name: &str, base: &BaseOpts) -> Vec<String> {
    let mut commands = vec![format!("set interface state {vpp_name} up")];
    commands.extend(base.addresses.iter().map(|address| {
        format!(
            "set interface ip address {vpp_name} {}/{}",
            address.ip(),
            address.prefix_len()
        )
    }));
    commands
}

/// Appends the commands missing from the exec script.
///
/// Returns true when the file content changed.
pub fn append_exec_commands(path: &Path, commands: &[String]) -> Result<bool, VppError> {
    let current = files::read_or_empty(path)?;
    let mut updated = current.clone();
    for command in commands {
        if updated.lines().any(|line| line.trim() == command.as_str()) {
            continue;
        }
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(command);
        updated.push('\n');
    }

    if updated == current {
        return Ok(false);
    }
    files::write(path, &updated)?;
    info!(path = %path.display(), "Updated VPP exec file");
    Ok(true)
}

/// Confirms VPP picked up the configured devices and records the result.
pub struct VppManager<'a> {
    control: VppControl<'a>,
    nics: &'a NicContext,
    exec_file: PathBuf,
}

impl<'a> VppManager<'a> {
    /// Creates a manager writing startup commands to `exec_file`.
    pub fn new(runner: &'a dyn CommandRunner, nics: &'a NicContext, exec_file: impl Into<PathBuf>) -> Self {
        Self {
            control: VppControl::new(runner),
            nics,
            exec_file: exec_file.into(),
        }
    }

    /// Looks up every interface and bond in VPP, records the interfaces in
    /// the binding table and refreshes the exec script.
    ///
    /// Interfaces get their `vpp_name` and `vpp_idx` filled in. Bond members
    /// are matched to `interfaces` by name. When bonds exist, addresses are
    /// configured on the bonds only. VPP is restarted when the exec script
    /// changed and is always enabled at boot. Returns whether the script
    /// changed.
    pub fn update_mapping(
        &self,
        interfaces: &mut [VppInterface],
        bonds: &[VppBond],
    ) -> Result<bool, VppError> {
        let mut commands = Vec::new();

        for iface in interfaces.iter_mut() {
            let name = iface.base.name.clone();
            let pci = iface
                .pci_dev
                .clone()
                .ok_or_else(|| VppError::MissingPciAddress(name.clone()))?;
            let found = self
                .control
                .lookup_interface(Some(&pci))?
                .ok_or_else(|| VppError::NotBound {
                    name: name.clone(),
                    pci_address: pci.clone(),
                })?;

            if bonds.is_empty() {
                commands.extend(address_commands(&found.name, &iface.base));
            }

            let mac = iface
                .base
                .hwaddr
                .clone()
                .or_else(|| self.nics.interface_mac(&name));
            info!(
                nic = %name,
                pci_address = %pci,
                mac_address = ?mac,
                uio_driver = %iface.uio_driver,
                vpp_name = %found.name,
                "Updating mapping for VPP interface"
            );
            self.nics
                .bindings()
                .upsert(&name, &pci, mac.as_deref(), &iface.uio_driver)?;

            iface.vpp_name = Some(found.name);
            iface.vpp_idx = Some(found.index);
        }

        for bond in bonds {
            let indices = bond
                .interfaces()
                .map(|member| {
                    interfaces
                        .iter()
                        .find(|i| i.base.name == member.base.name)
                        .and_then(|i| i.vpp_idx.clone())
                        .ok_or_else(|| VppError::NotBound {
                            name: member.base.name.clone(),
                            pci_address: member.pci_dev.clone().unwrap_or_default(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let found = self
                .control
                .lookup_bond(&indices)?
                .ok_or_else(|| VppError::BondNotFound(bond.base.name.clone()))?;
            debug!(bond = %bond.base.name, vpp_name = %found.name, "Found VPP bond");
            commands.extend(address_commands(&found.name, &bond.base));
        }

        let changed = append_exec_commands(&self.exec_file, &commands)?;
        if changed {
            let drivers: Vec<&str> = interfaces.iter().map(|i| i.uio_driver.as_str()).collect();
            self.control.restart(&drivers)?;
        }
        self.control.enable()?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Address;

    #[test]
    fn test_address_commands() {
        let mut base = BaseOpts::named("em1");
        base.addresses = vec![
            Address::parse("192.0.2.1/24").unwrap(),
            Address::parse("2001:db8::1/64").unwrap(),
        ];
        assert_eq!(
            address_commands("GigabitEthernet0/9/0", &base),
            vec![
                "set interface state GigabitEthernet0/9/0 up",
                "set interface ip address GigabitEthernet0/9/0 192.0.2.1/24",
                "set interface ip address GigabitEthernet0/9/0 2001:db8::1/64",
            ]
        );
    }

    #[test]
    fn test_append_exec_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vpp-exec");
        std::fs::write(&path, "set interface state local0 up").unwrap();

        let commands = vec![
            "set interface state local0 up".to_string(),
            "set interface state BondEthernet0 up".to_string(),
        ];
        assert!(append_exec_commands(&path, &commands).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "set interface state local0 up\nset interface state BondEthernet0 up\n"
        );
        assert!(!append_exec_commands(&path, &commands).unwrap());
    }
}

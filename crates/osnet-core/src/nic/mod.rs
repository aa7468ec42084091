//! NIC identity resolution.
//!
//! Physical NICs get stable logical names (`nic1`, `nic2`, ... or user
//! chosen aliases) that do not depend on kernel naming. The table is
//! computed from the link-active devices plus every NIC recorded in the
//! binding table, since a NIC bound to a userspace driver is no longer
//! visible to the kernel but must keep its position.
//!
//! The alias table lives in a [`NicContext`] and is computed at most once;
//! later lookups return the cached table whatever mapping they pass.

mod inventory;
mod mapping;
mod natural;

pub use inventory::{NicInventory, StaticInventory, SysfsInventory, SYS_CLASS_NET};
pub use mapping::{
    build_alias_table, is_mac_address, normalize_mac, order_nics, AliasTable, NicMapping,
};
pub use natural::{natural_cmp, natural_sort};

use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

use crate::dpdk::BindingTable;
use crate::error::ConfigError;

/// Host view used while building one topology: the NIC inventory, the
/// binding table and the memoized alias table.
pub struct NicContext {
    inventory: Box<dyn NicInventory>,
    bindings: BindingTable,
    aliases: OnceCell<AliasTable>,
}

impl NicContext {
    /// Creates a context.
    pub fn new(inventory: Box<dyn NicInventory>, bindings: BindingTable) -> Self {
        Self {
            inventory,
            bindings,
            aliases: OnceCell::new(),
        }
    }

    /// The NIC inventory.
    pub fn inventory(&self) -> &dyn NicInventory {
        self.inventory.as_ref()
    }

    /// The binding table.
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Names of NICs recorded in the binding table. An unreadable table
    /// counts as empty here; binding reports the error.
    pub fn bound_nics(&self) -> Vec<String> {
        match self.bindings.names() {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Unable to read DPDK mapping");
                Vec::new()
            }
        }
    }

    /// Link-active and bound NICs in alias order.
    pub fn ordered_active_nics(&self) -> Vec<String> {
        let active = self.inventory.active_nics();
        let bound = self.bound_nics();
        debug!(active = ?active, bound = ?bound, "Collecting NIC candidates");
        order_nics(active.into_iter().chain(bound))
    }

    /// Returns the alias table, computing it on first use.
    ///
    /// Only the first call's `mapping` is honoured.
    pub fn mapped_nics(&self, mapping: Option<&NicMapping>) -> Result<&AliasTable, ConfigError> {
        self.aliases.get_or_try_init(|| {
            let ordered = self.ordered_active_nics();
            build_alias_table(&ordered, mapping, |nic| self.interface_mac(nic))
        })
    }

    /// Returns the cached alias table, if computed.
    pub fn cached_aliases(&self) -> Option<&AliasTable> {
        self.aliases.get()
    }

    /// Hardware address of `name`: the kernel's view first, then the
    /// binding table for NICs already handed to a userspace driver.
    pub fn interface_mac(&self, name: &str) -> Option<String> {
        if let Some(mac) = self.inventory.hardware_address(name) {
            return Some(mac);
        }
        match self.bindings.find(name) {
            Ok(Some(record)) => record.mac_address,
            Ok(None) => None,
            Err(e) => {
                warn!(nic = name, error = %e, "Unable to read DPDK mapping");
                None
            }
        }
    }
}

impl std::fmt::Debug for NicContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NicContext")
            .field("bindings", &self.bindings)
            .field("aliases", &self.aliases.get())
            .finish_non_exhaustive()
    }
}

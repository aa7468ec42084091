//! Error types for the os-net-config core.
//!
//! Two families exist. [`ConfigError`] covers deterministic, caller-fixable
//! problems in the topology or mapping documents; it is raised at the point
//! of violation and never collected. [`BindError`] and [`VppError`] depend on
//! host state at run time. Lookups report "not found" as `None` rather than
//! through these types.

use osnet_common::CommonError;
use thiserror::Error;

/// Result type alias for core operations.
pub type OsNetResult<T> = Result<T, OsNetError>;

/// Invalid topology, mapping or schema content.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is absent or falsy.
    #[error("{entity} JSON objects require '{field}' to be configured.")]
    MissingField {
        /// Entity type being built (e.g. "OvsBridge").
        entity: String,
        /// The missing field.
        field: String,
    },

    /// A field that must hold a list holds something else.
    #[error("{field} must be a list.")]
    NotAList {
        /// The offending field ("Members", "Addresses", ...).
        field: String,
    },

    /// Two members of one container are flagged primary.
    #[error("Only one primary interface allowed per {container}.")]
    DuplicatePrimary {
        /// Container kind ("bridge", "bond", "team", "bond (dpdk)").
        container: String,
    },

    /// A bond-type member was attached to a switch that cannot carry one.
    #[error("{switch} does not support bond interfaces.")]
    BondNotSupported {
        /// Switch kind ("IVS", "NFVSwitch").
        switch: String,
    },

    /// Two aliases in the NIC mapping resolve to the same device.
    #[error("interface {nic} already mapped, check mapping file for duplicates")]
    DuplicateNicMapping {
        /// The physical device mapped twice.
        nic: String,
    },

    /// A mandatory option block is missing.
    #[error("Config \"options\" is mandatory for {entity}.")]
    MissingOptions {
        /// Entity type being built.
        entity: String,
    },

    /// The `type` discriminator names no known entity.
    #[error("Unknown network object type '{0}'")]
    UnknownType(String),

    /// A member has the wrong entity type for its container.
    #[error("{container} members must be of type {expected}")]
    InvalidMember {
        /// Container entity type.
        container: String,
        /// Required member type.
        expected: String,
    },

    /// A container that needs members has none.
    #[error("{entity} '{name}' requires at least one member")]
    NoMembers {
        /// Entity type.
        entity: String,
        /// Entity name.
        name: String,
    },

    /// An `ip_netmask` could not be parsed.
    #[error("Invalid IP network '{0}'")]
    InvalidAddress(String),

    /// A field holds a value of the wrong shape.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// The hardware address of a renamed NIC could not be read.
    #[error("Unable to read mac address of {nic}")]
    HardwareAddress {
        /// The physical device.
        nic: String,
    },
}

impl ConfigError {
    /// Creates a missing field error.
    pub fn missing_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates a not-a-list error.
    pub fn not_a_list(field: impl Into<String>) -> Self {
        Self::NotAList {
            field: field.into(),
        }
    }

    /// Creates a duplicate primary error.
    pub fn duplicate_primary(container: impl Into<String>) -> Self {
        Self::DuplicatePrimary {
            container: container.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid member error.
    pub fn invalid_member(container: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidMember {
            container: container.into(),
            expected: expected.into(),
        }
    }
}

/// A device could not be moved to the requested userspace driver.
#[derive(Debug, Error)]
pub enum BindError {
    /// Neither introspection nor the binding table knows the device.
    #[error("Interface {0} cannot be found")]
    DeviceNotFound(String),

    /// The device's MAC address could not be read.
    #[error("Unable to read mac address of {0}")]
    MacUnavailable(String),

    /// Loading the driver's kernel module failed.
    #[error("Failed to modprobe {module} module: {message}")]
    ModuleLoad {
        /// The module.
        module: String,
        /// Tool output.
        message: String,
    },

    /// The binding tool failed or reported an error.
    #[error("Failed to bind interface {name} with dpdk: {message}")]
    ToolFailed {
        /// The device.
        name: String,
        /// Tool output.
        message: String,
    },

    /// The binding table could not be read or written.
    #[error("DPDK mapping update failed: {0}")]
    Mapping(#[from] CommonError),
}

/// VPP control-plane or configuration failure.
#[derive(Debug, Error)]
pub enum VppError {
    /// A PCI address lacks the bus:device.function shape.
    #[error("Invalid PCI address format: {0}")]
    MalformedPciAddress(String),

    /// An interface has no resolved PCI address.
    #[error("Interface {0} has no PCI address and is not found in mapping file")]
    MissingPciAddress(String),

    /// VPP does not list an interface for the device.
    #[error("Interface {name} with pci address {pci_address} not bound to vpp")]
    NotBound {
        /// The kernel name.
        name: String,
        /// The PCI address.
        pci_address: String,
    },

    /// VPP does not list the bond.
    #[error("Bond {0} not found in VPP.")]
    BondNotFound(String),

    /// `vppctl`/`systemctl` failed.
    #[error("VPP control command failed: {0}")]
    Control(String),

    /// File or tool plumbing failed.
    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Umbrella error for callers driving the whole core.
#[derive(Debug, Error)]
pub enum OsNetError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Driver binding failure.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// VPP failure.
    #[error(transparent)]
    Vpp(#[from] VppError),

    /// File or tool plumbing failure.
    #[error(transparent)]
    Common(#[from] CommonError),
}

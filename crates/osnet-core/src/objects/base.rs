//! Shared pieces of every network entity: the common options block,
//! addresses, routes, and the field readers used by all constructors.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net};
use serde_json::{Map, Value};

use super::BuildContext;
use crate::error::ConfigError;

/// An untyped topology document node.
pub type Document = Map<String, Value>;

/// Strings accepted as boolean true (case-insensitive).
const TRUE_STRINGS: &[&str] = &["1", "t", "true", "on", "y", "yes"];

/// Default fail mode for OVS bridges.
pub const DEFAULT_OVS_FAIL_MODE: &str = "standalone";

/// Returns true for values a required field may not hold:
/// `null`, `false`, `0`, `""`, `[]` and `{}`.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Interprets a JSON value as a boolean flag.
pub fn bool_from_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => TRUE_STRINGS.contains(&s.trim().to_ascii_lowercase().as_str()),
        Value::Number(n) => TRUE_STRINGS.contains(&n.to_string().as_str()),
        _ => false,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Returns a required field, rejecting absent and falsy values.
pub fn required_field<'d>(
    doc: &'d Document,
    field: &str,
    entity: &str,
) -> Result<&'d Value, ConfigError> {
    doc.get(field)
        .filter(|value| !is_falsy(value))
        .ok_or_else(|| ConfigError::missing_field(entity, field))
}

/// Returns a required scalar field as a string.
pub fn required_string(doc: &Document, field: &str, entity: &str) -> Result<String, ConfigError> {
    let value = required_field(doc, field, entity)?;
    scalar_string(value).ok_or_else(|| ConfigError::invalid_value(field, "expected a string"))
}

/// Returns an optional, non-empty scalar field as a string.
pub fn optional_string(doc: &Document, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(scalar_string)
        .filter(|s| !s.is_empty())
}

/// Reads a boolean flag; an absent field yields `default`.
pub fn bool_field(doc: &Document, field: &str, default: bool) -> bool {
    doc.get(field).map_or(default, bool_from_value)
}

/// Reads an unsigned integer given as a number or numeric string.
pub fn u32_field(doc: &Document, field: &str) -> Result<Option<u32>, ConfigError> {
    let invalid = || ConfigError::invalid_value(field, "expected a non-negative integer");
    match doc.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u32>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Reads a list of strings. A scalar is a one-element list.
pub fn string_list(doc: &Document, field: &str) -> Result<Vec<String>, ConfigError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                scalar_string(item)
                    .ok_or_else(|| ConfigError::invalid_value(field, "expected a list of strings"))
            })
            .collect(),
        Some(value) => scalar_string(value)
            .map(|s| vec![s])
            .ok_or_else(|| ConfigError::invalid_value(field, "expected a string or a list")),
    }
}

/// Reads a list field, reporting `label` when it is not a list.
pub fn list_field<'d>(
    doc: &'d Document,
    field: &str,
    label: &str,
) -> Result<&'d [Value], ConfigError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ConfigError::not_a_list(label)),
    }
}

/// Views a value as a document node.
pub fn as_document<'d>(value: &'d Value, what: &str) -> Result<&'d Document, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| ConfigError::invalid_value(what, "expected a mapping"))
}

/// Substitutes `{name}` in `ovs_extra` templates.
pub fn format_ovs_extra(templates: &[String], name: &str) -> Vec<String> {
    templates.iter().map(|t| t.replace("{name}", name)).collect()
}

/// Prefixes each OVS option with `options:`.
pub fn format_ovs_options(options: &[String]) -> Vec<String> {
    options.iter().map(|o| format!("options:{o}")).collect()
}

/// Builds `ovs_extra` for a bridge: the user templates followed by the
/// fail mode directives, all with `{name}` substituted.
pub fn bridge_ovs_extra(doc: &Document, name: &str) -> Result<Vec<String>, ConfigError> {
    let mut extra = string_list(doc, "ovs_extra")?;
    let fail_mode = match doc.get("ovs_fail_mode") {
        None => Some(DEFAULT_OVS_FAIL_MODE.to_string()),
        Some(value) => scalar_string(value).filter(|s| !s.is_empty()),
    };
    if let Some(mode) = fail_mode {
        extra.push(format!("set bridge {{name}} fail_mode={mode}"));
        if mode == DEFAULT_OVS_FAIL_MODE {
            extra.push("del-controller {name}".to_string());
        }
    }
    Ok(format_ovs_extra(&extra, name))
}

/// An IP address with its network prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    network: IpNet,
}

impl Address {
    /// Parses `a.b.c.d/len`, `a.b.c.d/netmask`, `x::y/len` or a bare
    /// address (host prefix).
    pub fn parse(ip_netmask: &str) -> Result<Self, ConfigError> {
        let text = ip_netmask.trim();
        let invalid = || ConfigError::InvalidAddress(ip_netmask.to_string());

        if let Ok(network) = IpNet::from_str(text) {
            return Ok(Self { network });
        }
        match text.split_once('/') {
            Some((ip, mask)) => {
                let ip = Ipv4Addr::from_str(ip).map_err(|_| invalid())?;
                let mask = Ipv4Addr::from_str(mask).map_err(|_| invalid())?;
                let prefix = ipnet::ipv4_mask_to_prefix(mask).map_err(|_| invalid())?;
                let network = Ipv4Net::new(ip, prefix).map_err(|_| invalid())?;
                Ok(Self {
                    network: IpNet::V4(network),
                })
            }
            None => {
                let ip = IpAddr::from_str(text).map_err(|_| invalid())?;
                Ok(Self {
                    network: IpNet::from(ip),
                })
            }
        }
    }

    fn from_doc(value: &Value) -> Result<Self, ConfigError> {
        let doc = as_document(value, "addresses")?;
        Self::parse(&required_string(doc, "ip_netmask", "Address")?)
    }

    /// The host address.
    pub fn ip(&self) -> IpAddr {
        self.network.addr()
    }

    /// The prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.network.prefix_len()
    }

    /// The netmask in address form.
    pub fn netmask(&self) -> IpAddr {
        self.network.netmask()
    }

    /// 4 or 6.
    pub fn version(&self) -> u8 {
        match self.network {
            IpNet::V4(_) => 4,
            IpNet::V6(_) => 6,
        }
    }

    /// `address/prefix`.
    pub fn ip_netmask(&self) -> String {
        self.network.to_string()
    }
}

/// A static route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Gateway address.
    pub next_hop: String,
    /// Destination network; empty for the default route.
    pub ip_netmask: String,
    /// Marks a default route.
    pub default: bool,
    /// Extra options passed through to the route.
    pub route_options: String,
}

impl Route {
    fn from_doc(value: &Value) -> Result<Self, ConfigError> {
        let doc = as_document(value, "routes")?;
        Ok(Self {
            next_hop: required_string(doc, "next_hop", "Route")?,
            ip_netmask: optional_string(doc, "ip_netmask").unwrap_or_default(),
            default: bool_field(doc, "default", false),
            route_options: optional_string(doc, "route_options").unwrap_or_default(),
        })
    }
}

/// Back-references from a member to its containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    /// Owning OVS bridge.
    pub bridge_name: Option<String>,
    /// Owning Linux bridge.
    pub linux_bridge_name: Option<String>,
    /// Owning IVS bridge.
    pub ivs_bridge_name: Option<String>,
    /// Owning NFVSwitch bridge.
    pub nfvswitch_bridge_name: Option<String>,
    /// Owning Linux bond.
    pub linux_bond_name: Option<String>,
    /// Owning Linux team.
    pub linux_team_name: Option<String>,
    /// Attached to an OVS bridge as a port.
    pub ovs_port: bool,
}

/// Options every network entity carries.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseOpts {
    /// Resolved name.
    pub name: String,
    pub use_dhcp: bool,
    pub use_dhcpv6: bool,
    pub addresses: Vec<Address>,
    pub routes: Vec<Route>,
    pub mtu: Option<u32>,
    /// Requested as the primary member of its container.
    pub primary: bool,
    pub persist_mapping: bool,
    pub defroute: bool,
    pub dhclient_args: Option<String>,
    pub dns_servers: Vec<String>,
    pub nm_controlled: bool,
    /// Physical name behind a persisted alias.
    pub hwname: Option<String>,
    /// MAC of the physical NIC behind a persisted alias.
    pub hwaddr: Option<String>,
    /// The alias is kept as the device name.
    pub renamed: bool,
    /// Name of the primary member, for containers.
    pub primary_interface_name: Option<String>,
    pub membership: Membership,
}

impl BaseOpts {
    /// Options with defaults for `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            use_dhcp: false,
            use_dhcpv6: false,
            addresses: Vec::new(),
            routes: Vec::new(),
            mtu: None,
            primary: false,
            persist_mapping: false,
            defroute: true,
            dhclient_args: None,
            dns_servers: Vec::new(),
            nm_controlled: false,
            hwname: None,
            hwaddr: None,
            renamed: false,
            primary_interface_name: None,
            membership: Membership::default(),
        }
    }

    /// Reads the common options of an entity called `name`.
    ///
    /// A `name` found in the alias table is replaced by the physical device,
    /// unless mappings persist, in which case the alias stays and the
    /// physical name and MAC are kept alongside. Containers pass
    /// `with_primary = false` since `primary` only applies to members.
    pub fn from_doc(
        name: &str,
        doc: &Document,
        ctx: &BuildContext<'_>,
        with_primary: bool,
    ) -> Result<Self, ConfigError> {
        let mut opts = Self::named(name);

        let aliases = ctx.nics().mapped_nics(ctx.nic_mapping())?;
        if let Some(device) = aliases.get(name) {
            if ctx.persist_mapping() {
                let hwaddr = ctx.nics().interface_mac(device).ok_or_else(|| {
                    ConfigError::HardwareAddress {
                        nic: device.to_string(),
                    }
                })?;
                opts.hwname = Some(device.to_string());
                opts.hwaddr = Some(hwaddr);
                opts.renamed = true;
            } else {
                opts.name = device.to_string();
            }
        }

        opts.use_dhcp = bool_field(doc, "use_dhcp", false);
        opts.use_dhcpv6 = bool_field(doc, "use_dhcpv6", false);
        opts.addresses = list_field(doc, "addresses", "Addresses")?
            .iter()
            .map(Address::from_doc)
            .collect::<Result<_, _>>()?;
        opts.routes = list_field(doc, "routes", "Routes")?
            .iter()
            .map(Route::from_doc)
            .collect::<Result<_, _>>()?;
        opts.mtu = u32_field(doc, "mtu")?;
        opts.primary = with_primary && bool_field(doc, "primary", false);
        opts.persist_mapping = ctx.persist_mapping();
        opts.defroute = bool_field(doc, "defroute", true);
        opts.dhclient_args = optional_string(doc, "dhclient_args");
        opts.dns_servers = string_list(doc, "dns_servers")?;
        opts.nm_controlled = bool_field(doc, "nm_controlled", false);
        Ok(opts)
    }

    /// IPv4 addresses.
    pub fn v4_addresses(&self) -> impl Iterator<Item = &Address> {
        self.addresses.iter().filter(|a| a.version() == 4)
    }

    /// IPv6 addresses.
    pub fn v6_addresses(&self) -> impl Iterator<Item = &Address> {
        self.addresses.iter().filter(|a| a.version() == 6)
    }
}

//! Rendering of the VPP startup configuration.
//!
//! Only two blocks are touched. The `dpdk` block gets one stanza describing
//! every device handed to VPP, and the `unix` block gets an `exec` line
//! pointing at the script that configures addresses after startup. All other
//! content is copied through untouched.

use std::path::Path;

use itertools::Itertools;
use once_cell::sync::Lazy;
use osnet_common::files;
use regex::Regex;
use tracing::{debug, info};

use crate::error::VppError;
use crate::objects::{VppBond, VppInterface};

static DPDK_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*dpdk\s*\{").expect("Invalid regex pattern"));

static UNIX_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*unix\s*\{").expect("Invalid regex pattern"));

/// Single-line device entries owned by the renderer.
static DEVICE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:dev\s+[0-9a-fA-F]{4}:[0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-9a-fA-F](?:\s*\{[^}]*\})?|uio-driver\s+\S+)\s*$",
    )
    .expect("Invalid regex pattern")
});

static VDEV_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*vdev\s+([^,\s]+)").expect("Invalid regex pattern"));

static EXEC_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:exec|startup-config)(?:\s|$)").expect("Invalid regex pattern")
});

const INDENT: &str = "  ";

/// Builds the `dpdk` stanza lines for the given devices.
///
/// Order is fixed: one `vdev` line per bond, plain `dev` lines, the
/// `uio-driver` line, then `dev` lines carrying options.
pub fn dpdk_stanza(interfaces: &[&VppInterface], bonds: &[&VppBond]) -> Result<Vec<String>, VppError> {
    let pci_of = |iface: &VppInterface| {
        iface
            .pci_dev
            .clone()
            .ok_or_else(|| VppError::MissingPciAddress(iface.base.name.clone()))
    };

    let mut lines = Vec::new();
    for bond in bonds {
        let slaves = bond
            .interfaces()
            .map(|member| pci_of(member).map(|pci| format!("slave={pci}")))
            .collect::<Result<Vec<_>, _>>()?;
        if slaves.is_empty() {
            debug!(bond = %bond.base.name, "Bond has no members, skipping vdev");
            continue;
        }
        let mut fields = vec![bond.base.name.clone()];
        fields.extend(slaves);
        let options = bond.bonding_options.trim_matches(|c| c == ' ' || c == ',');
        if !options.is_empty() {
            fields.push(options.to_string());
        }
        lines.push(format!("{INDENT}vdev {}", fields.iter().join(",")));
    }

    let (plain, with_options): (Vec<&VppInterface>, Vec<&VppInterface>) = interfaces
        .iter()
        .copied()
        .partition(|iface| iface.options.trim().is_empty());

    for &iface in &plain {
        lines.push(format!("{INDENT}dev {}", pci_of(iface)?));
    }
    if let Some(first) = interfaces.first() {
        lines.push(format!("{INDENT}uio-driver {}", first.uio_driver));
    }
    for &iface in &with_options {
        lines.push(format!(
            "{INDENT}dev {} {{{}}}",
            pci_of(iface)?,
            iface.options.trim()
        ));
    }
    Ok(lines)
}

/// Renders a new startup configuration from `existing`.
///
/// The result is a pure function of the inputs: rendering twice yields the
/// same text. `exec_path` is the exec script path as VPP sees it.
pub fn render(
    existing: &str,
    interfaces: &[&VppInterface],
    bonds: &[&VppBond],
    exec_path: &str,
) -> Result<String, VppError> {
    let stanza = dpdk_stanza(interfaces, bonds)?;
    let bond_names: Vec<&str> = bonds.iter().map(|b| b.base.name.as_str()).collect();

    let mut lines: Vec<String> = existing.lines().map(str::to_string).collect();

    if !stanza.is_empty() {
        let start = find_or_append_block(&mut lines, &DPDK_BLOCK_RE, "dpdk");
        let end = block_end(&lines, start);
        let mut body: Vec<String> = lines[start + 1..end]
            .iter()
            .filter(|line| !is_rendered_device_line(line, &bond_names))
            .cloned()
            .collect();
        let needs_separator = body.first().map_or(true, |line| !line.trim().is_empty());
        if needs_separator {
            body.insert(0, String::new());
        }
        for line in stanza.iter().rev() {
            body.insert(0, line.clone());
        }
        lines.splice(start + 1..end, body);
    }

    let start = find_or_append_block(&mut lines, &UNIX_BLOCK_RE, "unix");
    let end = block_end(&lines, start);
    let mut body: Vec<String> = lines[start + 1..end]
        .iter()
        .filter(|line| !EXEC_LINE_RE.is_match(line))
        .cloned()
        .collect();
    body.insert(0, format!("{INDENT}exec {exec_path}"));
    lines.splice(start + 1..end, body);

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    Ok(rendered)
}

/// Creates the exec script if it does not exist yet.
pub fn ensure_exec_file(path: &Path) -> Result<(), VppError> {
    if !path.exists() {
        info!(path = %path.display(), "Creating VPP exec file");
    }
    files::touch(path)?;
    Ok(())
}

fn is_rendered_device_line(line: &str, bond_names: &[&str]) -> bool {
    if DEVICE_LINE_RE.is_match(line) {
        return true;
    }
    VDEV_LINE_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .is_some_and(|name| bond_names.contains(&name.as_str()))
}

/// Index of the line opening a block, appending an empty block when absent.
///
/// A block opened and closed on one line (`dpdk { socket-mem 1024 }`) is
/// split into header, body and closing lines, keeping its settings.
fn find_or_append_block(lines: &mut Vec<String>, opener: &Regex, name: &str) -> usize {
    match lines.iter().position(|line| opener.is_match(line)) {
        Some(index) => {
            if brace_balance(&lines[index]) == 0 {
                if let Some(split) = split_inline_block(&lines[index]) {
                    lines.splice(index..=index, split);
                }
            }
            index
        }
        None => {
            debug!(block = name, "Appending missing block");
            lines.push(String::new());
            lines.push(format!("{name} {{"));
            lines.push("}".to_string());
            lines.len() - 2
        }
    }
}

fn split_inline_block(line: &str) -> Option<Vec<String>> {
    let open = line.find('{')?;
    let close = line.rfind('}')?;
    if close < open {
        return None;
    }
    let mut split = vec![line[..=open].trim_end().to_string()];
    let inner = line[open + 1..close].trim();
    if !inner.is_empty() {
        split.push(format!("{INDENT}{inner}"));
    }
    split.push(line[close..].trim_end().to_string());
    Some(split)
}

/// Index of the line closing the block opened at `start`.
///
/// An unterminated block runs to the end of the text.
fn block_end(lines: &[String], start: usize) -> usize {
    let mut depth = brace_balance(&lines[start]);
    for (index, line) in lines.iter().enumerate().skip(start + 1) {
        depth += brace_balance(line);
        if depth <= 0 {
            return index;
        }
    }
    lines.len()
}

fn brace_balance(line: &str) -> i32 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EXEC: &str = "/etc/vpp/vpp-exec";

    const STARTUP_CONF: &str = "\nunix {\n  nodaemon\n  log /tmp/vpp.log\n  full-coredump\n}\n\n\napi-trace {\n  on\n}\n\napi-segment {\n  gid vpp\n}\n\ndpdk {\n}\n";

    fn iface(name: &str, pci: &str, options: &str) -> VppInterface {
        let mut iface = VppInterface::new(name);
        iface.pci_dev = Some(pci.to_string());
        iface.options = options.to_string();
        iface
    }

    #[test]
    fn test_render_interfaces() {
        let int1 = iface("em1", "0000:00:09.0", "vlan-strip-offload off");
        let int2 = iface("em2", "0000:00:09.1", "");

        let rendered = render(STARTUP_CONF, &[&int1, &int2], &[], EXEC).unwrap();
        let expected = "\nunix {\n  exec /etc/vpp/vpp-exec\n  nodaemon\n  log /tmp/vpp.log\n  full-coredump\n}\n\n\napi-trace {\n  on\n}\n\napi-segment {\n  gid vpp\n}\n\ndpdk {\n  dev 0000:00:09.1\n  uio-driver vfio-pci\n  dev 0000:00:09.0 {vlan-strip-offload off}\n\n}\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_bond() {
        let int1 = iface("em1", "0000:00:09.0", "vlan-strip-offload off");
        let int2 = iface("em2", "0000:00:09.1", "");
        let bond = VppBond::new("net_bonding0", vec![int1.clone(), int2.clone()], "mode=2");

        let rendered = render(STARTUP_CONF, &[&int1, &int2], &[&bond], EXEC).unwrap();
        assert!(rendered.contains(
            "dpdk {\n  vdev net_bonding0,slave=0000:00:09.0,slave=0000:00:09.1,mode=2\n  dev 0000:00:09.1\n"
        ));
    }

    #[test]
    fn test_render_is_idempotent() {
        let int1 = iface("em1", "0000:00:09.0", "vlan-strip-offload off");
        let int2 = iface("em2", "0000:00:09.1", "");
        let bond = VppBond::new("net_bonding0", vec![int1.clone(), int2.clone()], "mode=2");

        let once = render(STARTUP_CONF, &[&int1, &int2], &[&bond], EXEC).unwrap();
        let twice = render(&once, &[&int1, &int2], &[&bond], EXEC).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_render_replaces_stale_devices() {
        let existing = "unix {\n  startup-config /etc/vpp/old\n  nodaemon\n}\ndpdk {\n  dev 0000:00:05.0\n  uio-driver uio_pci_generic\n  dev default {\n    num-rx-descs 512\n  }\n}\n";
        let int1 = iface("em1", "0000:00:09.0", "");

        let rendered = render(existing, &[&int1], &[], EXEC).unwrap();
        assert_eq!(
            rendered,
            "unix {\n  exec /etc/vpp/vpp-exec\n  nodaemon\n}\ndpdk {\n  dev 0000:00:09.0\n  uio-driver vfio-pci\n\n  dev default {\n    num-rx-descs 512\n  }\n}\n"
        );
    }

    #[test]
    fn test_render_appends_missing_blocks() {
        let int1 = iface("em1", "0000:00:09.0", "");
        let rendered = render("api-trace {\n  on\n}\n", &[&int1], &[], EXEC).unwrap();
        assert_eq!(
            rendered,
            "api-trace {\n  on\n}\n\ndpdk {\n  dev 0000:00:09.0\n  uio-driver vfio-pci\n\n}\n\nunix {\n  exec /etc/vpp/vpp-exec\n}\n"
        );
    }

    #[test]
    fn test_render_inline_empty_block() {
        let int1 = iface("em1", "0000:00:09.0", "");
        let rendered = render("unix {\n}\ndpdk {}\n", &[&int1], &[], EXEC).unwrap();
        assert_eq!(
            rendered,
            "unix {\n  exec /etc/vpp/vpp-exec\n}\ndpdk {\n  dev 0000:00:09.0\n  uio-driver vfio-pci\n\n}\n"
        );
    }

    #[test]
    fn test_render_inline_blocks_keep_settings() {
        let int1 = iface("em1", "0000:00:09.0", "");
        let existing = "unix {\n  nodaemon\n}\ndpdk { socket-mem 1024 }\n";

        let rendered = render(existing, &[&int1], &[], EXEC).unwrap();
        assert_eq!(
            rendered,
            "unix {\n  exec /etc/vpp/vpp-exec\n  nodaemon\n}\ndpdk {\n  dev 0000:00:09.0\n  uio-driver vfio-pci\n\n  socket-mem 1024\n}\n"
        );
        assert_eq!(render(&rendered, &[&int1], &[], EXEC).unwrap(), rendered);

        let rendered = render("unix { nodaemon }\n", &[], &[], EXEC).unwrap();
        assert_eq!(rendered, "unix {\n  exec /etc/vpp/vpp-exec\n  nodaemon\n}\n");
    }

    #[test]
    fn test_render_missing_pci() {
        let mut int1 = iface("em1", "0000:00:09.0", "");
        int1.pci_dev = None;
        let err = render(STARTUP_CONF, &[&int1], &[], EXEC).unwrap_err();
        assert!(matches!(err, VppError::MissingPciAddress(ref name) if name == "em1"));
    }

    #[test]
    fn test_render_without_devices_only_sets_exec() {
        let rendered = render(STARTUP_CONF, &[], &[], EXEC).unwrap();
        assert!(rendered.ends_with("dpdk {\n}\n"));
        assert!(rendered.starts_with("\nunix {\n  exec /etc/vpp/vpp-exec\n  nodaemon\n"));
    }

    #[test]
    fn test_ensure_exec_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc/vpp/vpp-exec");
        ensure_exec_file(&path).unwrap();
        assert!(path.exists());
        std::fs::write(&path, "set interface state X up\n").unwrap();
        ensure_exec_file(&path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "set interface state X up\n"
        );
    }
}

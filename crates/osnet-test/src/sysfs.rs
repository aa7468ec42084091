//! Throwaway host root with a fake `/sys/class/net`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use osnet_core::config::{rooted, Paths};
use osnet_core::nic::SYS_CLASS_NET;
use tempfile::TempDir;

/// A NIC to create under the fake sysfs.
#[derive(Debug, Clone)]
pub struct FakeNic {
    pub name: String,
    pub mac: String,
    pub up: bool,
    pub virtual_function: bool,
    pub perm_hwaddr: Option<String>,
}

impl FakeNic {
    /// A physical NIC with link up.
    pub fn up(name: &str, mac: &str) -> Self {
        Self {
            name: name.to_string(),
            mac: mac.to_string(),
            up: true,
            virtual_function: false,
            perm_hwaddr: None,
        }
    }

    /// A physical NIC with link down.
    pub fn down(name: &str, mac: &str) -> Self {
        Self {
            up: false,
            ..Self::up(name, mac)
        }
    }

    /// Marks the NIC as an SR-IOV virtual function.
    pub fn virtual_function(mut self) -> Self {
        self.virtual_function = true;
        self
    }

    /// Marks the NIC as a bond slave with the given permanent address.
    pub fn bond_slave(mut self, perm_hwaddr: &str) -> Self {
        self.perm_hwaddr = Some(perm_hwaddr.to_string());
        self
    }
}

/// A temporary directory used as the host root.
///
/// Removed when dropped.
#[derive(Debug)]
pub struct FakeSysfs {
    dir: TempDir,
}

impl FakeSysfs {
    /// Creates an empty root with the `class/net` directory in place.
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir_all(rooted(dir.path(), SYS_CLASS_NET))?;
        Ok(Self { dir })
    }

    /// The host root, suitable for `--root-dir`.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The fake `/sys/class/net`.
    pub fn class_net(&self) -> PathBuf {
        rooted(self.root(), SYS_CLASS_NET)
    }

    /// All host file locations below the root.
    pub fn paths(&self) -> Paths {
        Paths::with_root(self.root())
    }

    /// Creates the sysfs entries for `nic`.
    pub fn add_nic(&self, nic: FakeNic) -> io::Result<&Self> {
        let dev = self.class_net().join(&nic.name);
        fs::create_dir_all(dev.join("device"))?;
        fs::write(dev.join("address"), format!("{}\n", nic.mac))?;
        fs::write(
            dev.join("operstate"),
            if nic.up { "up\n" } else { "down\n" },
        )?;
        if nic.virtual_function {
            fs::create_dir_all(dev.join("device").join("physfn"))?;
        }
        if let Some(perm) = &nic.perm_hwaddr {
            fs::create_dir_all(dev.join("bonding_slave"))?;
            fs::write(dev.join("bonding_slave").join("perm_hwaddr"), format!("{perm}\n"))?;
        }
        Ok(self)
    }

    /// Creates a non-physical link (no `device` directory), like a bridge.
    pub fn add_virtual_link(&self, name: &str, mac: &str) -> io::Result<&Self> {
        let dev = self.class_net().join(name);
        fs::create_dir_all(&dev)?;
        fs::write(dev.join("address"), format!("{mac}\n"))?;
        fs::write(dev.join("operstate"), "up\n")?;
        Ok(self)
    }

    /// Writes a file below the root, creating parent directories.
    pub fn write_file(&self, path: &str, contents: &str) -> io::Result<PathBuf> {
        let full = rooted(self.root(), path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, contents)?;
        Ok(full)
    }
}

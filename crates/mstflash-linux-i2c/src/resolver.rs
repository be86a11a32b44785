//! DP-AUX device to I2C bus resolution
//!
//! The RTD2142 answers on the I2C bus that DisplayPort tunnels as the
//! DDC channel of one of its ports. The kernel exposes that bus as an
//! i2c adapter sitting next to the port's drm_dp_aux_dev node, with an
//! i2c-dev child naming the character device. Given the aux device's
//! name, this module walks sysfs to the matching /dev/i2c-N path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LinuxI2cError, Result};

/// Class directory listing all DP-AUX character devices
const DRM_DP_AUX_CLASS: &str = "/sys/class/drm_dp_aux_dev";

/// Find the i2c-dev node carrying the DDC channel of the named DP-AUX
/// device
///
/// Extra aux devices with the same name are logged and ignored; the
/// first match wins. Fails with [`LinuxI2cError::BusNotFound`] when no
/// matching aux device has an i2c-dev sibling.
pub fn find_i2c_bus(aux_name: &str) -> Result<PathBuf> {
    find_i2c_bus_in(Path::new(DRM_DP_AUX_CLASS), aux_name)
}

fn find_i2c_bus_in(class_dir: &Path, aux_name: &str) -> Result<PathBuf> {
    let mut bus: Option<PathBuf> = None;

    for entry in fs::read_dir(class_dir)
        .map_err(LinuxI2cError::Sysfs)?
        .flatten()
    {
        let aux_path = entry.path();
        let name = match fs::read_to_string(aux_path.join("name")) {
            Ok(name) => name,
            Err(_) => continue,
        };
        if name.trim() != aux_name {
            continue;
        }
        if bus.is_some() {
            log::debug!("ignoring additional aux device {}", aux_path.display());
            continue;
        }

        // the adapter carrying DDC for the same port sits next to the
        // aux dev; hop to the shared parent and scan its children
        let port = match fs::canonicalize(aux_path.join("device")) {
            Ok(port) => port,
            Err(err) => {
                log::debug!("cannot resolve parent of {}: {err}", aux_path.display());
                continue;
            }
        };
        bus = find_sibling_i2c_dev(&port);
    }

    bus.ok_or_else(|| LinuxI2cError::BusNotFound(aux_name.to_string()))
}

fn find_sibling_i2c_dev(port: &Path) -> Option<PathBuf> {
    for entry in fs::read_dir(port).ok()?.flatten() {
        let sibling = entry.path();
        if subsystem_name(&sibling).as_deref() != Some("i2c") {
            continue;
        }
        match i2c_dev_node(&sibling) {
            Some(node) => {
                log::debug!("found I2C bus at {}", sibling.display());
                return Some(node);
            }
            None => log::debug!("no i2c-dev found under {}", sibling.display()),
        }
    }
    None
}

/// The i2c-dev child of an adapter names the character device
fn i2c_dev_node(adapter: &Path) -> Option<PathBuf> {
    for entry in fs::read_dir(adapter.join("i2c-dev")).ok()?.flatten() {
        let name = entry.file_name();
        let name = name.to_str()?;
        if name.starts_with("i2c-") {
            return Some(Path::new("/dev").join(name));
        }
    }
    None
}

fn subsystem_name(device: &Path) -> Option<String> {
    let target = fs::read_link(device.join("subsystem")).ok()?;
    Some(target.file_name()?.to_string_lossy().into_owned())
}

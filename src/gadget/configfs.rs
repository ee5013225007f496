//! ConfigFS file operations for USB Gadget

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{GadgetError, Result};

/// ConfigFS base path for USB gadgets
pub const CONFIGFS_PATH: &str = "/sys/kernel/config/usb_gadget";

/// Sysfs class directory listing USB Device Controllers
pub const UDC_CLASS_PATH: &str = "/sys/class/udc";

/// Language ID for US English string tables
pub const LANG_US_ENG: u16 = 0x0409;

pub const CONFIGS_DIR: &str = "configs";
pub const FUNCTIONS_DIR: &str = "functions";
pub const STRINGS_DIR: &str = "strings";

/// Directory name of a string table, e.g. `0x409`
pub fn lang_dir(lang: u16) -> String {
    format!("0x{:x}", lang)
}

/// Enumerate available UDCs, sorted by name
pub fn list_udcs(class_path: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(class_path).map_err(|e| GadgetError::io(class_path, e))?;

    let mut udcs: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    udcs.sort();
    Ok(udcs)
}

/// Write string content to an attribute file
///
/// A trailing newline is appended when missing. The whole buffer goes out
/// in a single write() since configfs parses the value on the first call.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| GadgetError::io(path, e))?;

    let data: std::borrow::Cow<[u8]> = if content.ends_with('\n') {
        content.as_bytes().into()
    } else {
        let mut buf = content.as_bytes().to_vec();
        buf.push(b'\n');
        buf.into()
    };

    file.write_all(&data).map_err(|e| GadgetError::io(path, e))?;
    file.flush().map_err(|e| GadgetError::io(path, e))?;

    Ok(())
}

/// Write a 16-bit value as `0x%04x`
pub fn write_hex16(path: &Path, value: u16) -> Result<()> {
    write_file(path, &format!("0x{:04x}", value))
}

/// Write an 8-bit value as `0x%02x`
pub fn write_hex8(path: &Path, value: u8) -> Result<()> {
    write_file(path, &format!("0x{:02x}", value))
}

/// Write a decimal value
pub fn write_dec(path: &Path, value: impl Into<u64>) -> Result<()> {
    write_file(path, &value.into().to_string())
}

/// Read string content from a file, trimmed
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| GadgetError::io(path, e))
}

/// Create directory (and parents) if it does not exist
pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| GadgetError::io(path, e))
}

/// Subdirectories the kernel creates along with gadgets, configs and functions
pub const DEFAULT_GROUPS: &[&str] = &[CONFIGS_DIR, FUNCTIONS_DIR, STRINGS_DIR, "os_desc", "webusb"];

/// Check that a gadget, config, function or link name is a single path component
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(GadgetError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Remove a gadget directory with rmdir, never recursively
///
/// A missing directory is not an error. configfs drops attribute files and
/// default groups together with their directory. Outside configfs the default
/// groups are plain directories, so empty ones are cleared and rmdir retried.
pub fn remove_dir(path: &Path) -> Result<()> {
    match fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {
            let cleared = DEFAULT_GROUPS
                .iter()
                .filter(|group| fs::remove_dir(path.join(group)).is_ok())
                .count();
            if cleared == 0 {
                return Err(GadgetError::io(path, e));
            }
            fs::remove_dir(path).map_err(|e| GadgetError::io(path, e))
        }
        Err(e) => Err(GadgetError::io(path, e)),
    }
}

/// Remove a binding symlink; a missing link is reported
pub fn remove_link(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| GadgetError::io(path, e))
}

/// Create symlink `dest -> src`
pub fn create_symlink(src: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, dest).map_err(|e| GadgetError::io(dest, e))
}

/// Names of the subdirectories (or symlinks) of `path`, sorted
///
/// An unreadable or missing directory yields an empty list.
pub fn list_entries(path: &Path, want_links: bool) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(path) else {
        return Vec::new();
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type()
                .map(|t| if want_links { t.is_symlink() } else { t.is_dir() })
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect();
    found.sort();
    found
}

/// Delete every regular file below `path`, leaving directories and symlinks
///
/// On configfs attribute files go away with their directory; test roots on a
/// plain filesystem need them cleared before a teardown can rmdir anything.
#[cfg(test)]
pub(crate) fn clear_attributes(path: &Path) {
    let Ok(entries) = fs::read_dir(path) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            clear_attributes(&entry.path());
        } else if file_type.is_file() {
            let _ = fs::remove_file(entry.path());
        }
    }
}

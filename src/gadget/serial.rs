//! Serial (CDC-ACM) Function implementation for USB Gadget

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::configfs::read_file;
use super::function::{function_name, GadgetFunction};
use crate::error::{GadgetError, Result};

/// Type tag of the CDC-ACM function
pub const SERIAL_FUNCTION_TYPE: &str = "acm";

/// Serial Function for USB Gadget
///
/// Needs nothing beyond its directory; the kernel allocates a
/// `/dev/ttyGS<n>` port once the directory exists.
#[derive(Debug, Clone)]
pub struct SerialFunction {
    /// Instance identifier (usb0, 0, ...)
    instance: String,
    /// Cached function name
    name: String,
}

impl SerialFunction {
    pub fn new(instance: impl Into<String>) -> Self {
        let instance = instance.into();
        Self {
            name: function_name(SERIAL_FUNCTION_TYPE, &instance),
            instance,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Resolve the host-facing tty from the kernel-assigned `port_num`
    pub fn tty_path(function_path: &Path) -> Result<PathBuf> {
        let port_path = function_path.join("port_num");
        let port = read_file(&port_path)?;
        let port: u32 = port.parse().map_err(|_| {
            GadgetError::io(
                &port_path,
                io::Error::new(ErrorKind::InvalidData, format!("invalid port_num {:?}", port)),
            )
        })?;
        Ok(PathBuf::from(format!("/dev/ttyGS{}", port)))
    }
}

impl GadgetFunction for SerialFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, function_path: &Path) -> Result<()> {
        debug!(
            "Serial function {} ready at {}",
            self.name,
            function_path.display()
        );
        Ok(())
    }
}

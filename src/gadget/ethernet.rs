//! Ethernet (CDC-ECM / CDC-NCM) Function implementation for USB Gadget

use std::path::Path;
use tracing::debug;

use super::configfs::{read_file, write_dec, write_file};
use super::function::{function_name, GadgetFunction};
use crate::error::Result;

/// Ethernet function protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EthernetProtocol {
    /// CDC-ECM
    Ecm,
    /// CDC-NCM
    Ncm,
}

impl EthernetProtocol {
    /// configfs type tag
    pub fn type_name(&self) -> &'static str {
        match self {
            EthernetProtocol::Ecm => "ecm",
            EthernetProtocol::Ncm => "ncm",
        }
    }
}

/// Ethernet Function for USB Gadget
#[derive(Debug, Clone)]
pub struct EthernetFunction {
    protocol: EthernetProtocol,
    instance: String,
    /// MAC address of the device end
    dev_addr: Option<String>,
    /// MAC address of the host end
    host_addr: Option<String>,
    /// Queue length multiplier for high/super speed
    qmult: Option<u32>,
    name: String,
}

impl EthernetFunction {
    /// Create a CDC-ECM function
    pub fn ecm(instance: impl Into<String>) -> Self {
        Self::new(EthernetProtocol::Ecm, instance)
    }

    /// Create a CDC-NCM function
    pub fn ncm(instance: impl Into<String>) -> Self {
        Self::new(EthernetProtocol::Ncm, instance)
    }

    pub fn new(protocol: EthernetProtocol, instance: impl Into<String>) -> Self {
        let instance = instance.into();
        Self {
            name: function_name(protocol.type_name(), &instance),
            protocol,
            instance,
            dev_addr: None,
            host_addr: None,
            qmult: None,
        }
    }

    pub fn with_dev_addr(mut self, addr: impl Into<String>) -> Self {
        self.dev_addr = Some(addr.into());
        self
    }

    pub fn with_host_addr(mut self, addr: impl Into<String>) -> Self {
        self.host_addr = Some(addr.into());
        self
    }

    pub fn with_qmult(mut self, qmult: u32) -> Self {
        self.qmult = Some(qmult);
        self
    }

    pub fn protocol(&self) -> EthernetProtocol {
        self.protocol
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Network interface the kernel created for this function (e.g. "usb0")
    pub fn interface_name(function_path: &Path) -> Result<String> {
        read_file(&function_path.join("ifname"))
    }
}

impl GadgetFunction for EthernetFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, function_path: &Path) -> Result<()> {
        if let Some(addr) = &self.host_addr {
            write_file(&function_path.join("host_addr"), addr)?;
        }
        if let Some(addr) = &self.dev_addr {
            write_file(&function_path.join("dev_addr"), addr)?;
        }
        if let Some(qmult) = self.qmult {
            write_dec(&function_path.join("qmult"), qmult)?;
        }

        debug!(
            "Created Ethernet function: {} at {}",
            self.name,
            function_path.display()
        );
        Ok(())
    }
}

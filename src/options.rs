//! Gadget description loaded from JSON

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GadgetError, Result};
use crate::gadget::config::{ConfigAttributes, DEFAULT_CONFIG_LABEL};
use crate::gadget::ethernet::{EthernetFunction, EthernetProtocol};
use crate::gadget::function::{function_name, GadgetFunction};
use crate::gadget::serial::{SerialFunction, SERIAL_FUNCTION_TYPE};

/// Complete gadget description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GadgetOptions {
    /// Directory name under the configfs root
    pub name: String,
    /// Manufacturer string
    pub manufacturer: String,
    /// Product string (defaults to the gadget name)
    pub product: Option<String>,
    /// Serial number (optional, generated if not set)
    pub serial_number: Option<String>,
    /// UDC to bind, e.g. "dummy_udc.0"
    pub controller: Option<String>,
    /// Device descriptor values
    pub descriptor: DescriptorOptions,
    /// Configurations, in creation order
    pub configs: Vec<ConfigOptions>,
}

impl GadgetOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GadgetError::Config(format!("Invalid gadget options: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| GadgetError::io(path, e))?;
        Self::from_json(&json)
    }
}

/// USB device descriptor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorOptions {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// USB spec version
    pub bcd_usb: u16,
    /// Device release number
    pub bcd_device: u16,
    pub device_class: Option<u8>,
    pub device_subclass: Option<u8>,
    pub device_protocol: Option<u8>,
    pub max_packet_size0: Option<u8>,
}

impl Default for DescriptorOptions {
    fn default() -> Self {
        Self {
            vendor_id: 0x1d6b,  // Linux Foundation
            product_id: 0x0104, // Multifunction Composite Gadget
            bcd_usb: 0x0300,    // USB 3.0
            bcd_device: 0x0100, // v1.0.0
            device_class: None,
            device_subclass: None,
            device_protocol: None,
            max_packet_size0: None,
        }
    }
}

/// One configuration and the functions bound into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOptions {
    pub label: String,
    pub number: u8,
    pub attributes: ConfigAttributes,
    pub functions: Vec<FunctionOptions>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            label: DEFAULT_CONFIG_LABEL.to_string(),
            number: 1,
            attributes: ConfigAttributes::default(),
            functions: Vec::new(),
        }
    }
}

/// Function description, tagged by configfs type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FunctionOptions {
    Acm(SerialOptions),
    Ecm(EthernetOptions),
    Ncm(EthernetOptions),
}

impl FunctionOptions {
    /// configfs name of the function, `<type>.<instance>`
    pub fn name(&self) -> String {
        match self {
            FunctionOptions::Acm(opts) => function_name(SERIAL_FUNCTION_TYPE, &opts.instance),
            FunctionOptions::Ecm(opts) => {
                function_name(EthernetProtocol::Ecm.type_name(), &opts.instance)
            }
            FunctionOptions::Ncm(opts) => {
                function_name(EthernetProtocol::Ncm.type_name(), &opts.instance)
            }
        }
    }

    pub fn to_function(&self) -> Box<dyn GadgetFunction> {
        match self {
            FunctionOptions::Acm(opts) => Box::new(SerialFunction::new(&opts.instance)),
            FunctionOptions::Ecm(opts) => Box::new(opts.to_function(EthernetProtocol::Ecm)),
            FunctionOptions::Ncm(opts) => Box::new(opts.to_function(EthernetProtocol::Ncm)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialOptions {
    pub instance: String,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            instance: "usb0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EthernetOptions {
    pub instance: String,
    pub dev_addr: Option<String>,
    pub host_addr: Option<String>,
    pub qmult: Option<u32>,
}

impl Default for EthernetOptions {
    fn default() -> Self {
        Self {
            instance: "usb0".to_string(),
            dev_addr: None,
            host_addr: None,
            qmult: None,
        }
    }
}

impl EthernetOptions {
    fn to_function(&self, protocol: EthernetProtocol) -> EthernetFunction {
        let mut func = EthernetFunction::new(protocol, &self.instance);
        if let Some(addr) = &self.dev_addr {
            func = func.with_dev_addr(addr);
        }
        if let Some(addr) = &self.host_addr {
            func = func.with_host_addr(addr);
        }
        if let Some(qmult) = self.qmult {
            func = func.with_qmult(qmult);
        }
        func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_options() {
        let opts = GadgetOptions::from_json(
            r#"{
                "name": "foo",
                "manufacturer": "calin",
                "serial_number": "foobar123",
                "controller": "dummy_udc.0",
                "configs": [{
                    "number": 1,
                    "attributes": { "max_power": 120 },
                    "functions": [
                        { "type": "acm", "instance": "usb0" },
                        { "type": "ecm", "instance": "usb0",
                          "dev_addr": "06:00:0d:ea:f7:12",
                          "host_addr": "02:00:0d:ea:f7:12" }
                    ]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(opts.name, "foo");
        assert_eq!(opts.product, None);
        assert_eq!(opts.descriptor, DescriptorOptions::default());

        let cfg = &opts.configs[0];
        assert_eq!(cfg.label, "cfg");
        assert_eq!(cfg.attributes.max_power, Some(120));
        assert_eq!(cfg.attributes.bm_attributes, None);

        let names: Vec<String> = cfg.functions.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["acm.usb0", "ecm.usb0"]);
    }

    #[test]
    fn test_function_defaults() {
        let f: FunctionOptions = serde_json::from_str(r#"{ "type": "ncm" }"#).unwrap();
        assert_eq!(f, FunctionOptions::Ncm(EthernetOptions::default()));
        assert_eq!(f.name(), "ncm.usb0");
    }

    #[test]
    fn test_name_matches_built_function() {
        let funcs = [
            FunctionOptions::Acm(SerialOptions {
                instance: "gs0".to_string(),
            }),
            FunctionOptions::Ecm(EthernetOptions::default()),
            FunctionOptions::Ncm(EthernetOptions {
                instance: "1".to_string(),
                qmult: Some(5),
                ..Default::default()
            }),
        ];
        let names: Vec<String> = funcs.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["acm.gs0", "ecm.usb0", "ncm.1"]);
        for f in &funcs {
            assert_eq!(f.name(), f.to_function().name());
        }
    }

    #[test]
    fn test_invalid_options() {
        let err = GadgetOptions::from_json(r#"{ "configs": [{ "functions": [{ "type": "hid" }] }] }"#)
            .unwrap_err();
        assert!(matches!(err, GadgetError::Config(_)));

        let err = GadgetOptions::from_file(Path::new("/nonexistent/gadget.json")).unwrap_err();
        assert!(matches!(err, GadgetError::Io { .. }));
    }
}

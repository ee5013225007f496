//! Gadget lifecycle: construction, UDC binding and teardown

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::config::{
    configuration_string, Config, ConfigId, ConfigStrings, DEFAULT_MAX_POWER,
};
use super::configfs::{
    create_dir, lang_dir, read_file, validate_name, write_dec, write_file, write_hex16,
    write_hex8, CONFIGS_DIR, FUNCTIONS_DIR, LANG_US_ENG, STRINGS_DIR,
};
use super::function::{FunctionId, GadgetFunction};
use super::teardown::TeardownPlan;
use crate::error::{GadgetError, Result};
use crate::options::{DescriptorOptions, GadgetOptions};

/// Read the controller a gadget is bound to; unreadable or empty means none
pub fn bound_udc(udc_path: &Path) -> Option<String> {
    read_file(udc_path).ok().filter(|udc| !udc.is_empty())
}

/// Release the controller by writing an empty value
pub fn unbind_udc(udc_path: &Path) -> Result<()> {
    write_file(udc_path, "")
}

/// Lifecycle state of a gadget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GadgetState {
    /// Descriptors written, nothing bound yet
    Unconfigured,
    /// At least one config or binding exists
    Configured,
    /// Bound to a UDC
    Enabled,
    /// Unbound from its UDC after being enabled
    Disabled,
    /// Removed from configfs; terminal
    TornDown,
}

/// Gadget string table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GadgetStrings {
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
}

#[derive(Debug)]
struct FunctionEntry {
    function: Box<dyn GadgetFunction>,
    path: PathBuf,
    /// Directory exists and attributes have been written
    applied: bool,
}

/// A USB gadget under a configfs root
///
/// Owns its configs and functions. Bindings live in their config and refer to
/// functions by [`FunctionId`].
#[derive(Debug)]
pub struct Gadget {
    name: String,
    path: PathBuf,
    udc: Option<String>,
    configs: Vec<Config>,
    functions: Vec<FunctionEntry>,
    string_dirs: Vec<PathBuf>,
    state: GadgetState,
}

impl Gadget {
    /// Create the gadget directory with its descriptors and strings
    ///
    /// Stops at the first failed write. Whatever was already written stays on
    /// disk; use [`Gadget::remove_stale`] before retrying.
    pub fn create(root: impl AsRef<Path>, options: &GadgetOptions) -> Result<Self> {
        validate_name(&options.name)?;
        let path = root.as_ref().join(&options.name);

        info!("Creating USB gadget {} at {}", options.name, path.display());
        create_dir(&path)?;

        let mut gadget = Self {
            name: options.name.clone(),
            path,
            udc: None,
            configs: Vec::new(),
            functions: Vec::new(),
            string_dirs: Vec::new(),
            state: GadgetState::Unconfigured,
        };

        gadget.set_device_descriptors(&options.descriptor)?;

        let strings = GadgetStrings {
            manufacturer: options.manufacturer.clone(),
            product: options
                .product
                .clone()
                .unwrap_or_else(|| options.name.clone()),
            serial_number: options
                .serial_number
                .clone()
                .unwrap_or_else(generate_serial),
        };
        gadget.set_strings(&strings, LANG_US_ENG)?;

        Ok(gadget)
    }

    /// Create the gadget and every config and function it describes
    ///
    /// A function listed in several configs is created once and bound into
    /// each of them.
    pub fn build(root: impl AsRef<Path>, options: &GadgetOptions) -> Result<Self> {
        let mut gadget = Self::create(root, options)?;

        for cfg in &options.configs {
            let config = gadget.create_config(&cfg.label, cfg.number)?;

            let mut members = Vec::with_capacity(cfg.functions.len());
            for func in &cfg.functions {
                let id = match gadget.function_id(&func.name()) {
                    Some(id) => id,
                    None => gadget.add_boxed_function(func.to_function())?,
                };
                members.push(id);
            }

            gadget.apply_config(config, &members)?;
            gadget.config(config)?.set_attributes(&cfg.attributes)?;
        }

        info!(
            "USB gadget {} built with {} config(s)",
            gadget.name,
            gadget.configs.len()
        );
        Ok(gadget)
    }

    /// Remove a gadget left on disk, discovering its layout by scanning
    ///
    /// A gadget that does not exist is not an error.
    pub fn remove_stale(root: impl AsRef<Path>, name: &str) -> Result<()> {
        validate_name(name)?;
        let path = root.as_ref().join(name);
        if !path.exists() {
            return Ok(());
        }

        info!("Removing stale USB gadget {}", name);
        TeardownPlan::scan(&path).execute()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> GadgetState {
        self.state
    }

    /// Controller this gadget was last enabled on
    pub fn udc(&self) -> Option<&str> {
        self.udc.as_deref()
    }

    pub fn configs(&self) -> &[Config] {
        &self.configs
    }

    pub fn config(&self, id: ConfigId) -> Result<&Config> {
        self.configs
            .get(id.0)
            .ok_or_else(|| GadgetError::NotFound(format!("config #{}", id.0)))
    }

    pub fn config_mut(&mut self, id: ConfigId) -> Result<&mut Config> {
        self.ensure_live()?;
        self.configs
            .get_mut(id.0)
            .ok_or_else(|| GadgetError::NotFound(format!("config #{}", id.0)))
    }

    pub fn config_id(&self, name: &str) -> Option<ConfigId> {
        self.configs
            .iter()
            .position(|c| c.name() == name)
            .map(ConfigId)
    }

    pub fn function(&self, id: FunctionId) -> Result<&dyn GadgetFunction> {
        self.function_entry(id).map(|f| f.function.as_ref())
    }

    /// Directory of a function under `functions/`
    pub fn function_path(&self, id: FunctionId) -> Result<&Path> {
        self.function_entry(id).map(|f| f.path.as_path())
    }

    pub fn function_id(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.function.name() == name)
            .map(FunctionId)
    }

    /// Write an additional string table
    pub fn set_strings(&mut self, strings: &GadgetStrings, lang: u16) -> Result<()> {
        self.ensure_live()?;
        let dir = self.path.join(STRINGS_DIR).join(lang_dir(lang));
        create_dir(&dir)?;
        if !self.string_dirs.contains(&dir) {
            self.string_dirs.push(dir.clone());
        }

        write_file(&dir.join("manufacturer"), &strings.manufacturer)?;
        write_file(&dir.join("serialnumber"), &strings.serial_number)?;
        write_file(&dir.join("product"), &strings.product)?;
        debug!("Created USB strings {}", dir.display());
        Ok(())
    }

    /// Create (or reuse) the config `<label>.<number>`
    pub fn create_config(&mut self, label: &str, number: u8) -> Result<ConfigId> {
        self.ensure_live()?;
        let config = Config::create(&self.path.join(CONFIGS_DIR), label, number)?;

        if let Some(id) = self.config_id(config.name()) {
            return Ok(id);
        }
        self.configs.push(config);
        self.mark_configured();
        Ok(ConfigId(self.configs.len() - 1))
    }

    /// Register a function; nothing is written until it is bound
    pub fn add_function(&mut self, function: impl GadgetFunction + 'static) -> Result<FunctionId> {
        self.add_boxed_function(Box::new(function))
    }

    pub fn add_boxed_function(&mut self, function: Box<dyn GadgetFunction>) -> Result<FunctionId> {
        self.ensure_live()?;
        validate_name(function.name())?;
        if self.function_id(function.name()).is_some() {
            return Err(GadgetError::DuplicateFunction(function.name().to_string()));
        }

        let path = self.path.join(FUNCTIONS_DIR).join(function.name());
        self.functions.push(FunctionEntry {
            function,
            path,
            applied: false,
        });
        Ok(FunctionId(self.functions.len() - 1))
    }

    /// Prepare a config and bind the given functions into it, in order
    ///
    /// Writes the default MaxPower and a description string naming the
    /// functions. Every function is attempted; failures come back together.
    pub fn apply_config(&mut self, config: ConfigId, functions: &[FunctionId]) -> Result<()> {
        self.ensure_live()?;
        let names = functions
            .iter()
            .map(|&id| self.function(id).map(|f| f.name().to_string()))
            .collect::<Result<Vec<_>>>()?;

        let cfg = self.config_mut(config)?;
        create_dir(cfg.path())?;
        write_dec(&cfg.path().join("MaxPower"), DEFAULT_MAX_POWER)?;
        cfg.set_strings(
            &ConfigStrings {
                configuration: configuration_string(&names),
            },
            LANG_US_ENG,
        )?;

        let errors: Vec<GadgetError> = functions
            .iter()
            .filter_map(|&id| self.apply_function(config, id).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GadgetError::Apply {
                config: self.config(config)?.name().to_string(),
                errors,
            })
        }
    }

    /// Bind a function into a config under its own name
    pub fn apply_function(&mut self, config: ConfigId, function: FunctionId) -> Result<()> {
        let name = self.function(function)?.name().to_string();
        self.create_binding(config, function, &name)
    }

    /// Materialize a function and link it into a config as `link_name`
    ///
    /// The function directory is created and its attributes written only the
    /// first time it is bound.
    pub fn create_binding(
        &mut self,
        config: ConfigId,
        function: FunctionId,
        link_name: &str,
    ) -> Result<()> {
        self.ensure_live()?;
        validate_name(link_name)?;
        if config.0 >= self.configs.len() {
            return Err(GadgetError::NotFound(format!("config #{}", config.0)));
        }

        let entry = self
            .functions
            .get_mut(function.0)
            .ok_or_else(|| GadgetError::NotFound(format!("function #{}", function.0)))?;

        if !entry.applied {
            create_dir(&entry.path)?;
            entry.function.apply(&entry.path)?;
            entry.applied = true;
        }

        self.configs[config.0].bind(function, entry.function.name(), &entry.path, link_name)?;
        self.mark_configured();
        Ok(())
    }

    /// Bind the gadget to a UDC
    ///
    /// Binding to the controller already in use is a no-op.
    pub fn enable(&mut self, udc: &str) -> Result<()> {
        self.ensure_live()?;
        let udc_path = self.udc_path();
        if bound_udc(&udc_path).as_deref() == Some(udc) {
            debug!("Gadget {} already bound to {}", self.name, udc);
            self.udc = Some(udc.to_string());
            self.state = GadgetState::Enabled;
            return Ok(());
        }

        info!("Binding gadget {} to UDC: {}", self.name, udc);
        write_file(&udc_path, udc)?;
        self.udc = Some(udc.to_string());
        self.state = GadgetState::Enabled;
        Ok(())
    }

    /// Unbind the gadget from its UDC; a no-op when nothing is bound
    pub fn disable(&mut self) -> Result<()> {
        self.ensure_live()?;
        let udc_path = self.udc_path();
        if bound_udc(&udc_path).is_some() {
            unbind_udc(&udc_path)?;
            info!("Unbound gadget {} from UDC", self.name);
        }
        if self.state == GadgetState::Enabled {
            self.state = GadgetState::Disabled;
        }
        Ok(())
    }

    /// Whether the UDC file names the controller this gadget was enabled on
    pub fn is_enabled(&self) -> bool {
        match (&self.udc, bound_udc(&self.udc_path())) {
            (Some(ours), Some(bound)) => *ours == bound,
            _ => false,
        }
    }

    /// Unbind and remove everything this gadget created
    ///
    /// Best effort: every removal is attempted, and all failures are returned
    /// together. Calling it again is safe.
    pub fn teardown(&mut self) -> Result<()> {
        info!("Tearing down USB gadget: {}", self.name);

        let plan = TeardownPlan {
            gadget_path: self.path.clone(),
            links: self
                .configs
                .iter()
                .flat_map(|c| c.bindings().iter().map(|b| b.path().to_path_buf()))
                .collect(),
            config_strings: self
                .configs
                .iter()
                .flat_map(|c| c.string_dirs().iter().cloned())
                .collect(),
            configs: self.configs.iter().map(|c| c.path().to_path_buf()).collect(),
            functions: self.functions.iter().map(|f| f.path.clone()).collect(),
            gadget_strings: self.string_dirs.clone(),
        };

        self.state = GadgetState::TornDown;
        self.udc = None;

        let result = plan.execute();
        if result.is_ok() {
            info!("USB gadget {} removed", self.name);
        }
        result
    }

    fn set_device_descriptors(&self, descriptor: &DescriptorOptions) -> Result<()> {
        write_hex16(&self.path.join("idVendor"), descriptor.vendor_id)?;
        write_hex16(&self.path.join("idProduct"), descriptor.product_id)?;
        write_hex16(&self.path.join("bcdUSB"), descriptor.bcd_usb)?;
        write_hex16(&self.path.join("bcdDevice"), descriptor.bcd_device)?;

        let optional = [
            ("bDeviceClass", descriptor.device_class),
            ("bDeviceSubClass", descriptor.device_subclass),
            ("bDeviceProtocol", descriptor.device_protocol),
            ("bMaxPacketSize0", descriptor.max_packet_size0),
        ];
        for (attr, value) in optional {
            if let Some(value) = value {
                write_hex8(&self.path.join(attr), value)?;
            }
        }

        debug!("Set device descriptors");
        Ok(())
    }

    fn function_entry(&self, id: FunctionId) -> Result<&FunctionEntry> {
        self.functions
            .get(id.0)
            .ok_or_else(|| GadgetError::NotFound(format!("function #{}", id.0)))
    }

    fn udc_path(&self) -> PathBuf {
        self.path.join("UDC")
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state == GadgetState::TornDown {
            return Err(GadgetError::TornDown(self.name.clone()));
        }
        Ok(())
    }

    fn mark_configured(&mut self) {
        if self.state == GadgetState::Unconfigured {
            self.state = GadgetState::Configured;
        }
    }
}

fn generate_serial() -> String {
    let mut serial = uuid::Uuid::new_v4().simple().to_string();
    serial.truncate(16);
    serial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gadget::config::ConfigAttributes;
    use crate::gadget::configfs::clear_attributes;
    use crate::gadget::ethernet::EthernetFunction;
    use crate::gadget::serial::SerialFunction;
    use crate::options::{ConfigOptions, EthernetOptions, FunctionOptions, SerialOptions};
    use std::fs;
    use tempfile::TempDir;

    fn options(name: &str) -> GadgetOptions {
        GadgetOptions {
            name: name.to_string(),
            manufacturer: "calin".to_string(),
            serial_number: Some("foobar123".to_string()),
            controller: Some("dummy_udc.0".to_string()),
            ..Default::default()
        }
    }

    fn scenario_options() -> GadgetOptions {
        GadgetOptions {
            configs: vec![ConfigOptions {
                number: 1,
                functions: vec![
                    FunctionOptions::Acm(SerialOptions {
                        instance: "usb0".to_string(),
                    }),
                    FunctionOptions::Ecm(EthernetOptions {
                        instance: "usb0".to_string(),
                        dev_addr: Some("06:00:0d:ea:f7:12".to_string()),
                        host_addr: Some("02:00:0d:ea:f7:12".to_string()),
                        qmult: None,
                    }),
                ],
                ..Default::default()
            }],
            ..options("foo")
        }
    }

    #[test]
    fn test_create_writes_descriptors_and_strings() {
        let root = TempDir::new().unwrap();
        let gadget = Gadget::create(root.path(), &options("g1")).unwrap();

        let base = root.path().join("g1");
        assert_eq!(gadget.path(), base);
        assert_eq!(gadget.state(), GadgetState::Unconfigured);
        assert_eq!(read_file(&base.join("idVendor")).unwrap(), "0x1d6b");
        assert_eq!(read_file(&base.join("idProduct")).unwrap(), "0x0104");
        assert_eq!(read_file(&base.join("bcdUSB")).unwrap(), "0x0300");
        assert_eq!(read_file(&base.join("bcdDevice")).unwrap(), "0x0100");
        assert!(!base.join("bDeviceClass").exists());

        let strings = base.join("strings/0x409");
        assert_eq!(read_file(&strings.join("manufacturer")).unwrap(), "calin");
        assert_eq!(read_file(&strings.join("serialnumber")).unwrap(), "foobar123");
        assert_eq!(read_file(&strings.join("product")).unwrap(), "g1");
    }

    #[test]
    fn test_create_generates_serial_and_optional_descriptors() {
        let root = TempDir::new().unwrap();
        let mut opts = options("g2");
        opts.serial_number = None;
        opts.product = Some("Widget".to_string());
        opts.descriptor.device_class = Some(0xef);

        Gadget::create(root.path(), &opts).unwrap();

        let base = root.path().join("g2");
        let serial = read_file(&base.join("strings/0x409/serialnumber")).unwrap();
        assert_eq!(serial.len(), 16);
        assert_eq!(read_file(&base.join("strings/0x409/product")).unwrap(), "Widget");
        assert_eq!(read_file(&base.join("bDeviceClass")).unwrap(), "0xef");
    }

    #[test]
    fn test_create_rejects_bad_names() {
        let root = TempDir::new().unwrap();
        for name in ["", ".", "..", "a/b"] {
            let err = Gadget::create(root.path(), &options(name)).unwrap_err();
            assert!(matches!(err, GadgetError::InvalidName(_)));
        }
    }

    #[test]
    fn test_create_fails_fast_on_unwritable_root() {
        let root = TempDir::new().unwrap();
        let file_root = root.path().join("not_a_dir");
        fs::write(&file_root, "").unwrap();

        let err = Gadget::create(&file_root, &options("g1")).unwrap_err();
        assert!(matches!(err, GadgetError::Io { .. }));
    }

    #[test]
    fn test_scenario() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::build(root.path(), &scenario_options()).unwrap();
        let base = root.path().join("foo");

        assert!(base.join("configs/cfg.1/acm.usb0").exists());
        assert!(base.join("configs/cfg.1/ecm.usb0").exists());
        assert_eq!(
            read_file(&base.join("functions/ecm.usb0/dev_addr")).unwrap(),
            "06:00:0d:ea:f7:12"
        );
        assert_eq!(
            read_file(&base.join("functions/ecm.usb0/host_addr")).unwrap(),
            "02:00:0d:ea:f7:12"
        );
        assert_eq!(
            read_file(&base.join("configs/cfg.1/strings/0x409/configuration")).unwrap(),
            "Configuration [ acm.usb0, ecm.usb0 ]"
        );
        assert_eq!(read_file(&base.join("configs/cfg.1/MaxPower")).unwrap(), "250");
        assert_eq!(gadget.state(), GadgetState::Configured);

        gadget.enable("dummy_udc.0").unwrap();
        assert_eq!(fs::read_to_string(base.join("UDC")).unwrap(), "dummy_udc.0\n");
        assert!(gadget.is_enabled());
        assert_eq!(gadget.state(), GadgetState::Enabled);

        gadget.disable().unwrap();
        assert_eq!(fs::read_to_string(base.join("UDC")).unwrap(), "\n");
        assert!(!gadget.is_enabled());
        assert_eq!(gadget.state(), GadgetState::Disabled);

        clear_attributes(&base);
        gadget.teardown().unwrap();
        assert!(!base.exists());
        assert_eq!(gadget.state(), GadgetState::TornDown);
    }

    #[test]
    fn test_build_applies_config_attributes() {
        let root = TempDir::new().unwrap();
        let mut opts = scenario_options();
        opts.configs[0].attributes = ConfigAttributes {
            bm_attributes: Some(0x80),
            max_power: Some(120),
        };

        Gadget::build(root.path(), &opts).unwrap();

        let cfg = root.path().join("foo/configs/cfg.1");
        assert_eq!(read_file(&cfg.join("MaxPower")).unwrap(), "120");
        assert_eq!(read_file(&cfg.join("bmAttributes")).unwrap(), "0x80");
    }

    #[test]
    fn test_enable_is_idempotent_and_is_enabled_checks_controller() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();
        assert!(!gadget.is_enabled());

        gadget.enable("dummy_udc.0").unwrap();
        gadget.enable("dummy_udc.0").unwrap();
        assert!(gadget.is_enabled());

        // Someone else rebinds the gadget
        write_file(&gadget.path().join("UDC"), "other_udc.1").unwrap();
        assert!(!gadget.is_enabled());
    }

    #[test]
    fn test_disable_when_never_enabled() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();

        gadget.disable().unwrap();
        gadget.disable().unwrap();
        assert!(!gadget.is_enabled());
        assert_eq!(gadget.state(), GadgetState::Unconfigured);
    }

    #[test]
    fn test_manual_binding_flow() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();

        let cfg = gadget.create_config("c", 1).unwrap();
        assert_eq!(gadget.create_config("c", 1).unwrap(), cfg);

        gadget
            .config(cfg)
            .unwrap()
            .set_attributes(&ConfigAttributes::default())
            .unwrap();
        assert!(!gadget.config(cfg).unwrap().path().join("MaxPower").exists());

        gadget
            .config_mut(cfg)
            .unwrap()
            .set_strings(
                &ConfigStrings {
                    configuration: "Serial".to_string(),
                },
                LANG_US_ENG,
            )
            .unwrap();

        let acm = gadget.add_function(SerialFunction::new("0")).unwrap();
        assert_eq!(gadget.function(acm).unwrap().name(), "acm.0");
        assert_eq!(
            gadget.function_path(acm).unwrap(),
            root.path().join("g1/functions/acm.0")
        );
        assert!(!gadget.function_path(acm).unwrap().exists());

        gadget.create_binding(cfg, acm, "serial").unwrap();
        let config = gadget.config(cfg).unwrap();
        assert_eq!(config.bindings()[0].name(), "serial");
        assert_eq!(config.bindings()[0].function(), acm);
        assert!(config.path().join("serial").exists());

        let err = gadget.create_binding(cfg, acm, "serial").unwrap_err();
        assert!(matches!(err, GadgetError::DuplicateBinding { .. }));

        clear_attributes(gadget.path());
        gadget.teardown().unwrap();
        assert!(!root.path().join("g1").exists());
    }

    #[test]
    fn test_duplicate_function_rejected() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();

        gadget.add_function(EthernetFunction::ecm("usb0")).unwrap();
        let err = gadget.add_function(EthernetFunction::ecm("usb0")).unwrap_err();
        assert!(matches!(err, GadgetError::DuplicateFunction(ref n) if n == "ecm.usb0"));
    }

    #[test]
    fn test_function_names_cannot_escape_gadget() {
        let root = TempDir::new().unwrap();
        let victim = root.path().join("victim");
        fs::create_dir(&victim).unwrap();
        fs::write(victim.join("precious.txt"), "keep").unwrap();

        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();
        let err = gadget
            .add_function(
                EthernetFunction::ecm("../../../victim").with_host_addr("02:00:0d:ea:f7:12"),
            )
            .unwrap_err();
        assert!(matches!(err, GadgetError::InvalidName(ref n) if n == "ecm.../../../victim"));
        assert!(gadget.function_id("ecm.../../../victim").is_none());

        clear_attributes(gadget.path());
        gadget.teardown().unwrap();
        assert!(!gadget.path().exists());
        assert_eq!(read_file(&victim.join("precious.txt")).unwrap(), "keep");
    }

    #[test]
    fn test_build_rejects_traversal_instance() {
        let root = TempDir::new().unwrap();
        let mut opts = scenario_options();
        opts.configs[0].functions = vec![FunctionOptions::Ecm(EthernetOptions {
            instance: "../victim".to_string(),
            ..Default::default()
        })];

        let err = Gadget::build(root.path(), &opts).unwrap_err();
        assert!(matches!(err, GadgetError::InvalidName(_)));
        assert!(!root.path().join("foo/victim").exists());

        opts.configs[0].functions.clear();
        opts.configs[0].label = "../cfg".to_string();
        let err = Gadget::build(root.path(), &opts).unwrap_err();
        assert!(matches!(err, GadgetError::InvalidName(_)));
        assert!(!root.path().join("foo/cfg.1").exists());
    }

    #[test]
    fn test_bad_link_names_are_invalid_not_duplicate() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();
        let cfg = gadget.create_config("c", 1).unwrap();
        let acm = gadget.add_function(SerialFunction::new("usb0")).unwrap();

        for link in ["", ".", "..", "a/b", "../../escape"] {
            let err = gadget.create_binding(cfg, acm, link).unwrap_err();
            assert!(matches!(err, GadgetError::InvalidName(_)), "{link:?}");
        }
        assert!(gadget.config(cfg).unwrap().bindings().is_empty());
        assert!(!root.path().join("escape").exists());

        gadget.create_binding(cfg, acm, "acm.usb0").unwrap();
        assert_eq!(gadget.config(cfg).unwrap().bindings().len(), 1);
    }

    #[test]
    fn test_apply_config_aggregates_function_failures() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();
        let cfg = gadget.create_config("c", 1).unwrap();
        let acm = gadget.add_function(SerialFunction::new("usb0")).unwrap();
        let ecm = gadget.add_function(EthernetFunction::ecm("usb0")).unwrap();

        // Occupy both link names so every binding collides
        fs::write(gadget.config(cfg).unwrap().path().join("acm.usb0"), "").unwrap();
        fs::write(gadget.config(cfg).unwrap().path().join("ecm.usb0"), "").unwrap();

        let err = gadget.apply_config(cfg, &[acm, ecm]).unwrap_err();
        assert!(matches!(err, GadgetError::Apply { ref config, .. } if config == "c.1"));
        assert_eq!(err.failures().len(), 2);
        assert!(err
            .failures()
            .iter()
            .all(|e| matches!(e, GadgetError::DuplicateBinding { .. })));

        // Function directories were still materialized
        assert!(gadget.function_path(ecm).unwrap().is_dir());
    }

    #[test]
    fn test_teardown_twice_aggregates_errors() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::build(root.path(), &scenario_options()).unwrap();
        gadget.enable("dummy_udc.0").unwrap();

        clear_attributes(gadget.path());
        gadget.teardown().unwrap();
        assert!(!root.path().join("foo").exists());

        // Both binding links are already gone
        let err = gadget.teardown().unwrap_err();
        assert!(matches!(err, GadgetError::Teardown { .. }));
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_operations_after_teardown_fail() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();
        clear_attributes(gadget.path());
        gadget.teardown().unwrap();

        assert!(matches!(
            gadget.enable("dummy_udc.0"),
            Err(GadgetError::TornDown(_))
        ));
        assert!(matches!(
            gadget.create_config("c", 1),
            Err(GadgetError::TornDown(_))
        ));
        assert!(!gadget.is_enabled());
    }

    #[test]
    fn test_shared_function_across_configs() {
        let root = TempDir::new().unwrap();
        let serial = FunctionOptions::Acm(SerialOptions::default());
        let opts = GadgetOptions {
            configs: vec![
                ConfigOptions {
                    number: 1,
                    functions: vec![serial.clone()],
                    ..Default::default()
                },
                ConfigOptions {
                    number: 2,
                    functions: vec![serial],
                    ..Default::default()
                },
            ],
            ..options("shared")
        };

        let mut gadget = Gadget::build(root.path(), &opts).unwrap();
        let base = root.path().join("shared");
        assert!(base.join("configs/cfg.1/acm.usb0").exists());
        assert!(base.join("configs/cfg.2/acm.usb0").exists());
        assert_eq!(gadget.function_id("acm.usb0"), Some(FunctionId(0)));

        clear_attributes(&base);
        gadget.teardown().unwrap();
        assert!(!base.exists());
    }

    #[test]
    fn test_remove_stale() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::build(root.path(), &scenario_options()).unwrap();
        gadget.enable("dummy_udc.0").unwrap();
        drop(gadget);

        clear_attributes(&root.path().join("foo"));
        Gadget::remove_stale(root.path(), "foo").unwrap();
        assert!(!root.path().join("foo").exists());

        // Nothing left to remove
        Gadget::remove_stale(root.path(), "foo").unwrap();
        assert!(Gadget::remove_stale(root.path(), "").is_err());
    }

    #[test]
    fn test_stale_handles_are_not_found() {
        let root = TempDir::new().unwrap();
        let mut gadget = Gadget::create(root.path(), &options("g1")).unwrap();

        assert!(matches!(
            gadget.config(ConfigId(3)),
            Err(GadgetError::NotFound(_))
        ));
        let cfg = gadget.create_config("c", 1).unwrap();
        assert!(matches!(
            gadget.create_binding(cfg, FunctionId(7), "x"),
            Err(GadgetError::NotFound(_))
        ));
    }
}

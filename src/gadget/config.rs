//! USB configuration entity

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::binding::Binding;
use super::configfs::{
    create_dir, create_symlink, lang_dir, validate_name, write_dec, write_file, write_hex8,
    STRINGS_DIR,
};
use super::function::FunctionId;
use crate::error::{GadgetError, Result};

/// Default config label, giving names like `cfg.1`
pub const DEFAULT_CONFIG_LABEL: &str = "cfg";

/// MaxPower written when a config is applied (500mA)
pub const DEFAULT_MAX_POWER: u16 = 250;

/// Handle to a config owned by a gadget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigId(pub(crate) usize);

/// Optional config attributes
///
/// Absent values are never written, so the kernel defaults stay in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigAttributes {
    pub bm_attributes: Option<u8>,
    pub max_power: Option<u16>,
}

/// Per-language config strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStrings {
    pub configuration: String,
}

/// Build the description string listing functions in binding order
pub fn configuration_string<S: AsRef<str>>(function_names: &[S]) -> String {
    let names: Vec<&str> = function_names.iter().map(|n| n.as_ref()).collect();
    format!("Configuration [ {} ]", names.join(", "))
}

/// A USB configuration, `configs/<label>.<number>`
#[derive(Debug, Clone)]
pub struct Config {
    label: String,
    number: u8,
    name: String,
    path: PathBuf,
    string_dirs: Vec<PathBuf>,
    bindings: Vec<Binding>,
}

impl Config {
    /// Create the config directory; an existing directory is reused
    pub(crate) fn create(configs_path: &Path, label: &str, number: u8) -> Result<Self> {
        validate_name(label)?;
        let name = format!("{}.{}", label, number);
        let path = configs_path.join(&name);
        create_dir(&path)?;
        debug!("Created configuration {}", name);

        Ok(Self {
            label: label.to_string(),
            number,
            name,
            path,
            string_dirs: Vec::new(),
            bindings: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// String table directories created for this config
    pub fn string_dirs(&self) -> &[PathBuf] {
        &self.string_dirs
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    /// Write the attributes that are present
    pub fn set_attributes(&self, attrs: &ConfigAttributes) -> Result<()> {
        if let Some(max_power) = attrs.max_power {
            write_dec(&self.path.join("MaxPower"), max_power)?;
        }
        if let Some(bm_attributes) = attrs.bm_attributes {
            write_hex8(&self.path.join("bmAttributes"), bm_attributes)?;
        }
        Ok(())
    }

    /// Create `strings/<lang>/` and write the configuration description
    pub fn set_strings(&mut self, strings: &ConfigStrings, lang: u16) -> Result<()> {
        let dir = self.path.join(STRINGS_DIR).join(lang_dir(lang));
        create_dir(&dir)?;
        if !self.string_dirs.contains(&dir) {
            self.string_dirs.push(dir.clone());
        }

        write_file(&dir.join("configuration"), &strings.configuration)
    }

    /// Link a materialized function directory into this config
    pub(crate) fn bind(
        &mut self,
        function: FunctionId,
        function_name: &str,
        function_path: &Path,
        link_name: &str,
    ) -> Result<&Binding> {
        if self.binding(link_name).is_some() {
            return Err(self.duplicate(link_name));
        }

        let binding = Binding::new(link_name, function, function_name, &self.path);
        if let Err(e) = create_symlink(function_path, binding.path()) {
            return Err(match e {
                GadgetError::Io { ref source, .. } if source.kind() == ErrorKind::AlreadyExists => {
                    self.duplicate(link_name)
                }
                other => other,
            });
        }

        debug!("Linked function {} into {}", function_name, self.name);
        self.bindings.push(binding);
        Ok(&self.bindings[self.bindings.len() - 1])
    }

    fn duplicate(&self, link_name: &str) -> GadgetError {
        GadgetError::DuplicateBinding {
            config: self.name.clone(),
            name: link_name.to_string(),
        }
    }
}

//! Ordered, best-effort gadget removal
//!
//! The kernel refuses to remove a function while a config still links it, and
//! refuses to touch configs or functions while a UDC is bound. Removal
//! therefore always runs in this order:
//!
//! 1. unbind the UDC
//! 2. binding symlinks, across every config
//! 3. config string tables
//! 4. config directories
//! 5. function directories
//! 6. gadget string tables
//! 7. the gadget directory
//!
//! Every step is attempted even if earlier ones failed.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::configfs::{
    list_entries, remove_dir, remove_link, CONFIGS_DIR, FUNCTIONS_DIR, STRINGS_DIR,
};
use super::manager::{bound_udc, unbind_udc};
use crate::error::{GadgetError, Result};

/// Kind of removal, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TeardownStep {
    Unlink,
    ConfigStrings,
    Config,
    Function,
    GadgetStrings,
    Gadget,
}

impl TeardownStep {
    fn label(&self) -> &'static str {
        match self {
            TeardownStep::Unlink => "unlink",
            TeardownStep::ConfigStrings => "config strings",
            TeardownStep::Config => "config",
            TeardownStep::Function => "function",
            TeardownStep::GadgetStrings => "gadget strings",
            TeardownStep::Gadget => "gadget",
        }
    }
}

/// Paths to remove, grouped by step
#[derive(Debug, Clone, Default)]
pub struct TeardownPlan {
    pub gadget_path: PathBuf,
    pub links: Vec<PathBuf>,
    pub config_strings: Vec<PathBuf>,
    pub configs: Vec<PathBuf>,
    pub functions: Vec<PathBuf>,
    pub gadget_strings: Vec<PathBuf>,
}

impl TeardownPlan {
    /// Discover what to remove by walking an existing gadget directory
    pub fn scan(gadget_path: &Path) -> Self {
        let configs = list_entries(&gadget_path.join(CONFIGS_DIR), false);

        let links = configs
            .iter()
            .flat_map(|c| list_entries(c, true))
            .collect();
        let config_strings = configs
            .iter()
            .flat_map(|c| list_entries(&c.join(STRINGS_DIR), false))
            .collect();

        Self {
            gadget_path: gadget_path.to_path_buf(),
            links,
            config_strings,
            configs,
            functions: list_entries(&gadget_path.join(FUNCTIONS_DIR), false),
            gadget_strings: list_entries(&gadget_path.join(STRINGS_DIR), false),
        }
    }

    /// Every removal after the UDC unbind, in the order it runs
    pub fn steps(&self) -> Vec<(TeardownStep, &Path)> {
        let groups = [
            (TeardownStep::Unlink, &self.links),
            (TeardownStep::ConfigStrings, &self.config_strings),
            (TeardownStep::Config, &self.configs),
            (TeardownStep::Function, &self.functions),
            (TeardownStep::GadgetStrings, &self.gadget_strings),
        ];

        groups
            .into_iter()
            .flat_map(|(step, paths)| paths.iter().map(move |p| (step, p.as_path())))
            .chain(std::iter::once((
                TeardownStep::Gadget,
                self.gadget_path.as_path(),
            )))
            .collect()
    }

    /// Run every step; failures are collected into one error
    pub fn execute(&self) -> Result<()> {
        let mut errors = Vec::new();

        let udc_path = self.gadget_path.join("UDC");
        if bound_udc(&udc_path).is_some() {
            if let Err(e) = unbind_udc(&udc_path) {
                warn!("Teardown step 'unbind' failed: {}", e);
                errors.push(e);
            }
        }

        for (step, path) in self.steps() {
            let result = match step {
                TeardownStep::Unlink => remove_link(path),
                _ => remove_dir(path),
            };
            if let Err(e) = result {
                warn!("Teardown step '{}' failed: {}", step.label(), e);
                errors.push(e);
            }
        }

        if errors.is_empty() {
            debug!("Removed gadget at {}", self.gadget_path.display());
            Ok(())
        } else {
            Err(GadgetError::Teardown { errors })
        }
    }
}

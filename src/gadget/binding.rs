//! Config to function bindings

use std::path::{Path, PathBuf};

use super::function::FunctionId;

/// A function linked into a config, realized as the symlink
/// `configs/<config>/<name> -> functions/<function>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    name: String,
    function: FunctionId,
    function_name: String,
    link_path: PathBuf,
}

impl Binding {
    pub(crate) fn new(
        name: &str,
        function: FunctionId,
        function_name: &str,
        config_path: &Path,
    ) -> Self {
        Self {
            name: name.to_string(),
            function,
            function_name: function_name.to_string(),
            link_path: config_path.join(name),
        }
    }

    /// Link name inside the config directory
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> FunctionId {
        self.function
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn path(&self) -> &Path {
        &self.link_path
    }
}

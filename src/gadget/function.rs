//! USB Gadget Function trait definition

use std::fmt;
use std::path::Path;

use crate::error::Result;

/// USB Gadget Function trait
///
/// A function is identified by its `"{type}.{instance}"` name, which is also
/// the name of its directory under `functions/`. The gadget creates that
/// directory; `apply` fills in whatever type-specific attributes it needs.
pub trait GadgetFunction: fmt::Debug + Send + Sync {
    /// Get function name (e.g., "acm.usb0", "ecm.usb0")
    fn name(&self) -> &str;

    /// Write type-specific attributes into an existing function directory
    fn apply(&self, function_path: &Path) -> Result<()>;
}

/// Handle to a function registered with a gadget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub(crate) usize);

/// Build a function name from its type tag and instance
pub fn function_name(type_name: &str, instance: &str) -> String {
    format!("{}.{}", type_name, instance)
}

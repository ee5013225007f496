//! usb-gadgets - composite USB gadget lifecycle over Linux configfs
//!
//! Builds the gadget/config/function tree the kernel turns into USB
//! descriptors, binds it to a USB Device Controller, and tears it down again.

pub mod error;
pub mod gadget;
pub mod options;

pub use error::{GadgetError, Result};
pub use gadget::Gadget;
pub use options::GadgetOptions;

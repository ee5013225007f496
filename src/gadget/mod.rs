//! Composite USB gadget management over configfs
//!
//! Architecture:
//! ```text
//! Gadget (lifecycle: create, enable/disable, teardown)
//!     ├── Config (configs/<label>.<n>, attributes, strings)
//!     │       └── Binding (symlink into functions/)
//!     ├── GadgetFunction (SerialFunction, EthernetFunction)
//!     └── TeardownPlan (ordered best-effort removal)
//! ```
//!
//! Nothing here locks configfs. Callers must make sure only one process
//! builds or tears down a given gadget name at a time.

pub mod binding;
pub mod config;
pub mod configfs;
pub mod ethernet;
pub mod function;
pub mod manager;
pub mod serial;
pub mod teardown;

pub use binding::Binding;
pub use config::{Config, ConfigAttributes, ConfigId, ConfigStrings};
pub use configfs::{list_udcs, CONFIGFS_PATH, LANG_US_ENG, UDC_CLASS_PATH};
pub use ethernet::{EthernetFunction, EthernetProtocol};
pub use function::{FunctionId, GadgetFunction};
pub use manager::{Gadget, GadgetState, GadgetStrings};
pub use serial::SerialFunction;
pub use teardown::{TeardownPlan, TeardownStep};

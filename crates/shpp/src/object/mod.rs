//! The object system: type descriptors, classes, interfaces, instances

mod class;
mod instance;
mod registry;
mod types;

pub use class::{
    add_abstract_method, check_abstract_methods, check_interface_compatibility, new_decl_class,
    new_interface,
};
pub use instance::Instance;
pub use registry::{register_builtins, TypeRegistry};
pub use types::{construct, AbstractMethod, InterfaceDesc, TypeDesc, TypeKind};

use crate::error::{ErrorKind, Result, RuntimeError};
use crate::scope::TableRef;
use crate::value::Value;

/// An imported module: a name and an attribute table populated by the
/// out-of-scope loader.
#[derive(Debug)]
pub struct ModuleValue {
    /// Module name as imported
    pub name: String,
    /// Exported members
    pub attrs: TableRef,
}

impl ModuleValue {
    /// Read a module member.
    pub fn attr(&self, name: &str) -> Result<Value> {
        self.attrs.borrow().get(name).ok_or_else(|| {
            RuntimeError::new(
                ErrorKind::IdNotFound,
                format!("module '{}' has no member '{name}'", self.name),
            )
        })
    }
}

//! Operation catalog: every engine operation described by name, with typed
//! parameters, and callable generically through [`call`].
//!
//! Positional values bind to required parameters in declaration order; named
//! values may bind to any parameter not already bound. Every validation error
//! names the argument that was rejected.
pub mod catalog;
mod call;

pub use catalog::{OperationSpec, ParamKind, ParamSpec};

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::types::Value;

static CATALOG: Lazy<Vec<OperationSpec>> = Lazy::new(catalog::specs);

/// All operations, in catalog order.
pub fn catalog() -> &'static [OperationSpec] {
    &CATALOG
}

pub fn describe(name: &str) -> Option<&'static OperationSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

/// Pretty-printed JSON dump of the catalog.
pub fn to_json() -> Result<String> {
    Ok(serde_json::to_string_pretty(catalog())?)
}

/// Run operation `name`, e.g. `call("black", &[100.into(), 100.into()], &[])`.
pub fn call(name: &str, args: &[Value], options: &[(&str, Value)]) -> Result<Value> {
    let spec = describe(name).ok_or_else(|| Error::UnknownOperation {
        name: name.to_string(),
    })?;
    call::invoke(spec, args, options)
}

//! Module resolution, invocation, and manifest decoding.
pub mod invoker;
pub mod locator;
pub mod manifest;
pub mod mode;
pub mod schema;

pub use invoker::{ModuleOutput, ModulePayload, invoke};
pub use locator::{FsModuleResolver, ModuleResolver};
pub use manifest::{File, Manifest, Resource, Script, ScriptType};
pub use mode::{FileMode, ModePolicy};
pub use schema::manifest_schema;

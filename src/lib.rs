//! Source file generation from a declarative template definition.
//!
//! A `templates.yaml` definition inside a template directory lists candidate
//! output files, feature flags and per-deployment-target conditions, and the
//! parametrized template bodies to render. Selection narrows the definition
//! to an active file set, delimiter remapping lets a template emit the
//! engine's own markup verbatim, and change detection reports whether a
//! generation pass actually modified its output.

pub mod condition;
pub mod definition;
pub mod engine;
pub mod filters;
pub mod generate;
pub mod model;
pub mod remap;
pub mod run;
pub mod select;

pub use condition::EvalError;
pub use definition::{Definition, DefinitionError, FileSpec};
pub use engine::TemplateEngine;
pub use generate::{GenerateError, Generator};
pub use model::{RuntimeModel, SourceModel};
pub use remap::TagError;
pub use select::{SelectError, SelectedFileSet};

//! # Graph Translation
//!
//! Recursive-descent walk from a material's output node down to its leaves,
//! emitting native nodes through a [`TargetBackend`](crate::backend::TargetBackend).

mod dispatch;
mod graph_translator;
mod groups;
mod node_handlers;

pub use dispatch::{DispatchTable, Handler, TranslationRule};
pub use graph_translator::MaterialTranslator;
pub use groups::{GroupCallFrame, GroupStack};
pub use node_handlers::{ERROR_COLOR, FALLBACK_COLOR};

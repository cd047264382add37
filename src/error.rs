//! # Errors
//!
//! Failure taxonomy of one translation pass.

use crate::backend::ImageError;
use crate::rules::RuleError;
use thiserror::Error;

/// Reasons a material graph cannot be translated
///
/// Everything except [`TranslationError::ImageMaterializationFailed`]
/// propagates to the top-level call, where error recovery swaps in the
/// fallback shader. Image failures are recovered where they happen.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("material '{material}' has no valid output node")]
    MissingOutputNode { material: String },

    #[error("input '{socket}' of node '{node}' must be connected")]
    MissingRequiredLink { node: String, socket: String },

    #[error("node '{node}' has unsupported kind '{kind}'")]
    UnsupportedNodeKind { node: String, kind: String },

    #[error("group boundary at node '{node}' cannot be resolved: {reason}")]
    UnresolvableGroupBoundary { node: String, reason: String },

    #[error("image for node '{node}' failed to load")]
    ImageMaterializationFailed {
        node: String,
        #[source]
        source: ImageError,
    },

    #[error("cycle detected at node '{node}', output '{output}'")]
    CyclicGraph { node: String, output: String },

    #[error("node '{node}' has no input socket '{socket}'")]
    InvalidSocket { node: String, socket: String },

    #[error("invalid link into input '{socket}' of node '{node}'")]
    InvalidLink { node: String, socket: String },

    #[error("node '{node}' uses unsupported operation '{operation}'")]
    UnsupportedOperation { node: String, operation: String },

    #[error("rule error: {0}")]
    Rules(#[from] RuleError),
}

pub type Result<T, E = TranslationError> = std::result::Result<T, E>;

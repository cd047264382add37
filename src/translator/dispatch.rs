//! Node kind to translation rule lookup.

use super::graph_translator::MaterialTranslator;
use super::node_handlers;
use crate::error::Result;
use crate::kind::NodeKind;
use crate::rules::{NodeRules, RuleError, RuleSet};
use crate::source::NodeId;
use crate::value::Value;
use std::sync::OnceLock;

/// Procedural translation of one node output
pub type Handler = fn(&mut MaterialTranslator<'_>, NodeId, &str) -> Result<Value>;

/// How a node kind is translated
#[derive(Clone, Copy)]
pub enum TranslationRule<'t> {
    Declarative(&'t NodeRules),
    Procedural(Handler),
    /// Group call site, group input or group output
    GroupBoundary,
}

/// Read-only mapping from node kind to rule, shared by every translation
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    rules: RuleSet,
}

impl DispatchTable {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Process-wide table built from the shipped rule file on first use
    pub fn builtin() -> Result<&'static DispatchTable, RuleError> {
        static BUILTIN: OnceLock<DispatchTable> = OnceLock::new();

        if let Some(table) = BUILTIN.get() {
            return Ok(table);
        }
        let table = DispatchTable::new(RuleSet::builtin()?);
        tracing::info!("[TRANSLATE] Loaded {} declarative node rules", table.rules.len());
        Ok(BUILTIN.get_or_init(|| table))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Declarative rules win over procedural handlers; group boundaries come
    /// last. `None` means the kind is unsupported.
    pub fn resolve(&self, kind: &NodeKind) -> Option<TranslationRule<'_>> {
        if let Some(rules) = self.rules.get(kind) {
            return Some(TranslationRule::Declarative(rules));
        }
        if let Some(handler) = node_handlers::handler(kind) {
            return Some(TranslationRule::Procedural(handler));
        }
        match kind {
            NodeKind::Group | NodeKind::GroupInput | NodeKind::GroupOutput => {
                Some(TranslationRule::GroupBoundary)
            }
            _ => None,
        }
    }
}

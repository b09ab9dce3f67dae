//! Graph-to-text code generation.
//!
//! [`CodeGenerator::generate`] renders a workspace into source text in the
//! restricted surface grammar. Generation is deterministic and total over
//! graphs that satisfy the model invariants: type and connection errors were
//! prevented at edit time and cannot surface here. Only a violated structural
//! precondition (an unregistered kind, a required socket missing from the
//! static schema) propagates, as [`TangleError::MalformedGraph`].

mod emit;
mod names;
pub(crate) mod precedence;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{catalog::kinds, error::TangleError, graph::Workspace};

pub use names::NameTable;
pub use precedence::Precedence;

use emit::Emitter;

/// Output knobs. Serializable so hosts can persist generation preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// One indentation step.
    pub indent: String,
    /// When set, every loop body ends with a call to this host primitive,
    /// bounding how long a generated loop runs before yielding control.
    /// The parser does not re-read these calls; round-trip guarantees apply
    /// to default-mode output only.
    pub loop_pause: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> GeneratorConfig {
        GeneratorConfig {
            indent: "  ".to_string(),
            loop_pause: None,
        }
    }
}

/// Renders workspaces into source text.
#[derive(Debug, Default)]
pub struct CodeGenerator {
    config: GeneratorConfig,
}

impl CodeGenerator {
    pub fn new() -> CodeGenerator {
        CodeGenerator::default()
    }

    pub fn with_config(config: GeneratorConfig) -> CodeGenerator {
        CodeGenerator { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Render the whole workspace.
    ///
    /// Procedure definitions are hoisted and emitted once each, in name
    /// order, before the remaining root chains in creation order. Detached
    /// expressions and dialog marker chains do not render; they are edit
    /// scaffolding, not program content.
    pub fn generate(&self, ws: &Workspace) -> Result<String, TangleError> {
        debug!(
            "[CodeGenerator::generate] {} nodes, {} procedures",
            ws.len(),
            ws.procedures().len()
        );
        let mut emitter = Emitter::new(ws, &self.config);

        let mut definitions = Vec::new();
        let mut chains = Vec::new();
        for id in ws.roots() {
            let Some(node) = ws.node(id) else { continue };
            if node.shadow {
                continue;
            }
            match node.kind.as_str() {
                kinds::PROCEDURE_DEFINE => definitions.push(id),
                _ => {
                    if ws.is_chainable(id)? {
                        let is_marker = matches!(
                            node.kind.as_str(),
                            kinds::BRANCH_ROOT_MARKER
                                | kinds::BRANCH_ELSE_IF_MARKER
                                | kinds::BRANCH_ELSE_MARKER
                                | kinds::PROCEDURE_PARAMS_ROOT
                                | kinds::PROCEDURE_PARAM_MARKER
                        );
                        if !is_marker {
                            chains.push(id);
                        }
                    }
                }
            }
        }
        definitions.sort_by_key(|id| {
            ws.node(*id)
                .and_then(|n| n.signature())
                .map(|s| s.name.clone())
                .unwrap_or_default()
        });

        for id in definitions {
            if let Some(node) = ws.node(id) {
                emitter.emit_definition(node)?;
            }
        }
        for id in chains {
            emitter.emit_chain(id)?;
        }
        Ok(emitter.finish())
    }
}

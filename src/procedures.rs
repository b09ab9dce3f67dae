//! The procedure registry and the signature commit path.
//!
//! Signatures are the one piece of state deliberately shared between nodes:
//! a definition and its call sites all carry copies of the same
//! [`SignatureState`]. Every copy flows through [`Workspace::commit_signature`],
//! which updates the registry and resynchronizes every bound call site in
//! the same mutation, so no observer can ever see a stale call-site layout.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    catalog::{kinds, MutatorKind},
    error::TangleError,
    event::WorkspaceEvent,
    graph::{NodeId, SocketRole, Workspace},
    shape::{self, ReturnShape, ShapeState, SignatureState},
};

/// One registered procedure: its signature, the defining node, and every
/// call site currently bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureEntry {
    pub state: SignatureState,
    pub definition: NodeId,
    pub call_sites: BTreeSet<NodeId>,
}

/// Name-keyed registry of committed procedure signatures.
///
/// The registry itself is passive bookkeeping; all mutation goes through
/// the [`Workspace`] so that call-site layouts and events stay in step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcedureRegistry {
    entries: BTreeMap<String, ProcedureEntry>,
}

impl ProcedureRegistry {
    pub fn get(&self, name: &str) -> Option<&ProcedureEntry> {
        self.entries.get(name)
    }

    pub fn signature(&self, name: &str) -> Option<&SignatureState> {
        self.entries.get(name).map(|e| &e.state)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &ProcedureEntry)> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound call sites in creation order.
    pub fn call_sites(&self, name: &str) -> Vec<NodeId> {
        self.entries
            .get(name)
            .map(|e| e.call_sites.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn is_registered_definition(&self, name: &str, node: NodeId) -> bool {
        self.entries
            .get(name)
            .map(|e| e.definition == node)
            .unwrap_or(false)
    }

    pub(crate) fn upsert(&mut self, entry: ProcedureEntry) {
        self.entries.insert(entry.state.name.clone(), entry);
    }

    pub(crate) fn remove_entry(&mut self, name: &str) -> Option<ProcedureEntry> {
        self.entries.remove(name)
    }

    pub(crate) fn register_call_site(&mut self, name: &str, site: NodeId) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.call_sites.insert(site);
        }
    }

    /// Drop a call site from whichever entry holds it.
    pub(crate) fn unbind_call_site(&mut self, site: NodeId) {
        for entry in self.entries.values_mut() {
            entry.call_sites.remove(&site);
        }
    }
}

impl Workspace {
    /// Commit a signature for the given definition node.
    ///
    /// This is the only write path for signatures. In one mutation it
    /// updates the definition's cached state, the registry entry, the
    /// return/yield sockets inside the definition body, and the layout of
    /// every bound call site (argument edges preserved positionally,
    /// vacated defaultable arguments refilled with shadow literals). A
    /// single `ProcedureChanged` event fires after everything is in place.
    ///
    /// Renaming a procedure that still has bound call sites is refused
    /// with [`TangleError::DanglingProcedureReference`]; rebind or remove
    /// the sites first.
    pub fn commit_signature(
        &mut self,
        definition: NodeId,
        state: SignatureState,
    ) -> Result<(), TangleError> {
        let node = self.require(definition)?;
        if node.kind != kinds::PROCEDURE_DEFINE {
            return Err(TangleError::MalformedShapeState {
                kind: node.kind.clone(),
                detail: "signatures can only be committed on procedure definitions".to_string(),
            });
        }
        if state.name.is_empty() {
            return Err(TangleError::MalformedShapeState {
                kind: kinds::PROCEDURE_DEFINE.to_string(),
                detail: "procedure name cannot be empty".to_string(),
            });
        }
        if let Some(existing) = self.procedures.get(&state.name) {
            if existing.definition != definition {
                return Err(TangleError::DuplicateProcedure(state.name.clone()));
            }
        }

        let old_name = node.signature().map(|sig| sig.name.clone());
        let renamed_from = match old_name {
            Some(ref old) if !old.is_empty() && *old != state.name => {
                if self.procedures.is_registered_definition(old, definition) {
                    if !self.procedures.call_sites(old).is_empty() {
                        return Err(TangleError::DanglingProcedureReference(old.clone()));
                    }
                    Some(old.clone())
                } else {
                    None
                }
            }
            _ => None,
        };

        shape::apply(self, definition, ShapeState::Signature(state.clone()))?;

        if let Some(old) = renamed_from {
            self.procedures.remove_entry(&old);
            self.notify(WorkspaceEvent::ProcedureRemoved(old));
        }
        let call_sites = self
            .procedures
            .get(&state.name)
            .map(|e| e.call_sites.clone())
            .unwrap_or_default();
        self.procedures.upsert(ProcedureEntry {
            state: state.clone(),
            definition,
            call_sites: call_sites.clone(),
        });

        self.refresh_returns_under(definition, state.return_type)?;

        for site in call_sites {
            self.resync_call_site(site, &state)?;
        }

        debug!(
            "[Workspace::commit_signature] '{}' ({} params, returns {:?})",
            state.name,
            state.params.len(),
            state.return_type
        );
        self.notify(WorkspaceEvent::ProcedureChanged(state.name.clone(), state));
        Ok(())
    }

    /// Bind a call-site node to a registered procedure. The site adopts the
    /// signature's layout immediately; unfilled defaultable arguments get
    /// shadow literals.
    pub fn bind_call_site(&mut self, site: NodeId, name: &str) -> Result<(), TangleError> {
        let node = self.require(site)?;
        if node.kind != kinds::PROCEDURE_CALL {
            return Err(TangleError::MalformedShapeState {
                kind: node.kind.clone(),
                detail: "only call-site nodes can be bound to a procedure".to_string(),
            });
        }
        let state = self
            .procedures
            .signature(name)
            .cloned()
            .ok_or_else(|| TangleError::NotFound(format!("no procedure named '{name}'")))?;

        self.procedures.unbind_call_site(site);
        self.resync_call_site(site, &state)?;
        self.procedures.register_call_site(name, site);
        trace!("[Workspace::bind_call_site] {site} -> '{name}'");
        Ok(())
    }

    /// Unregister a procedure whose definition should stay in the graph.
    /// Refused while call sites remain bound.
    pub fn remove_procedure(&mut self, name: &str) -> Result<(), TangleError> {
        let entry = self
            .procedures
            .get(name)
            .ok_or_else(|| TangleError::NotFound(format!("no procedure named '{name}'")))?;
        if !entry.call_sites.is_empty() {
            return Err(TangleError::DanglingProcedureReference(name.to_string()));
        }
        self.procedures.remove_entry(name);
        self.notify(WorkspaceEvent::ProcedureRemoved(name.to_string()));
        Ok(())
    }

    /// Apply a signature to one call site and repair its attachment mode.
    fn resync_call_site(
        &mut self,
        site: NodeId,
        state: &SignatureState,
    ) -> Result<(), TangleError> {
        shape::apply(self, site, ShapeState::Signature(state.clone()))?;

        for (index, param) in state.params.iter().enumerate() {
            let socket_name = format!("ARG{index}");
            let vacant = self
                .require(site)?
                .socket(&socket_name)
                .map(|s| s.connection.is_none())
                .unwrap_or(false);
            if vacant {
                self.attach_default_literal(site, &socket_name, param.ty)?;
            }
        }

        // A return-type flip changes the site between statement and
        // expression; detach it from any now-invalid position.
        let is_expression = state.return_type.is_some();
        let (prev, next, parent) = {
            let node = self.require(site)?;
            (node.prev, node.next, node.parent.clone())
        };
        if is_expression {
            if let Some(prev) = prev {
                self.unlink(prev)?;
            }
            if next.is_some() {
                self.unlink(site)?;
            }
            if let Some((parent_id, socket_name)) = parent {
                let role = self
                    .node(parent_id)
                    .and_then(|p| p.socket(&socket_name))
                    .map(|s| s.role);
                if role == Some(SocketRole::Sequence) {
                    self.disconnect(parent_id, &socket_name)?;
                }
            }
        } else if let Some((parent_id, socket_name)) = parent {
            let role = self
                .node(parent_id)
                .and_then(|p| p.socket(&socket_name))
                .map(|s| s.role);
            if role == Some(SocketRole::Value) {
                self.disconnect(parent_id, &socket_name)?;
            }
        }
        Ok(())
    }

    /// Re-derive every return/yield socket inside a definition's subtree.
    fn refresh_returns_under(
        &mut self,
        definition: NodeId,
        return_type: Option<crate::types::SlotType>,
    ) -> Result<(), TangleError> {
        let mut stack = vec![definition];
        let mut returns: Vec<NodeId> = Vec::new();
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            if let Ok(spec) = self.spec_of(node) {
                if spec.mutator == Some(MutatorKind::ReturnValue) {
                    returns.push(id);
                }
            }
            for socket in &node.sockets {
                if let Some(child) = socket.connection {
                    stack.push(child);
                }
            }
            if id != definition {
                if let Some(next) = node.next {
                    stack.push(next);
                }
            }
        }
        for id in returns {
            shape::apply(
                self,
                id,
                ShapeState::Return(ReturnShape {
                    expects: return_type,
                }),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Parameter;
    use crate::types::SlotType;

    #[test]
    fn test_registry_entry_bookkeeping() {
        let mut registry = ProcedureRegistry::default();
        let definition = NodeId::new();
        let site_a = NodeId::new();
        let site_b = NodeId::new();
        registry.upsert(ProcedureEntry {
            state: SignatureState::new("jump").with_params(vec![Parameter::new(
                "height",
                SlotType::Number,
            )]),
            definition,
            call_sites: BTreeSet::new(),
        });
        registry.register_call_site("jump", site_a);
        registry.register_call_site("jump", site_b);
        assert_eq!(registry.call_sites("jump"), vec![site_a, site_b]);

        registry.unbind_call_site(site_a);
        assert_eq!(registry.call_sites("jump"), vec![site_b]);
        assert!(registry.contains("jump"));
        assert!(registry.is_registered_definition("jump", definition));
        assert!(!registry.is_registered_definition("jump", site_a));
    }

    #[test]
    fn test_registry_serde_round_trip() {
        let mut registry = ProcedureRegistry::default();
        registry.upsert(ProcedureEntry {
            state: SignatureState::new("score").returning(SlotType::Number),
            definition: NodeId::new(),
            call_sites: BTreeSet::new(),
        });
        let json = serde_json::to_string(&registry).unwrap();
        let back: ProcedureRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(registry, back);
    }
}

//! Branch shape: else-if/else clause layout and its edit dialog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::kinds,
    error::TangleError,
    graph::{NodeId, Socket, Workspace},
    shape::ShapeState,
    types::{SlotType, TypeSet},
};

/// How many else-if clauses a branch carries, and whether it ends with an
/// else clause. The clause sockets themselves are derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BranchState {
    pub else_if_count: usize,
    pub has_else: bool,
}

impl BranchState {
    pub fn with_clauses(else_if_count: usize, has_else: bool) -> BranchState {
        BranchState {
            else_if_count,
            has_else,
        }
    }

    /// Clause sockets appended after the primary `COND`/`THEN` pair:
    /// `IF1, DO1, ..., IFn, DOn`, then `ELSE0` (a marker row) and `ELSE`
    /// when an else clause is present.
    pub(crate) fn dynamic_sockets(&self) -> Vec<Socket> {
        let mut sockets = Vec::with_capacity(self.else_if_count * 2 + 2);
        for i in 1..=self.else_if_count {
            sockets.push(Socket::value(
                format!("IF{i}"),
                TypeSet::single(SlotType::Boolean),
            ));
            sockets.push(Socket::sequence(format!("DO{i}")));
        }
        if self.has_else {
            sockets.push(Socket::marker("ELSE0"));
            sockets.push(Socket::sequence("ELSE"));
        }
        sockets
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SavedClause {
    cond: Option<NodeId>,
    body: Option<NodeId>,
}

/// A decompose/compose session for editing a branch's clause list.
///
/// [`BranchDialog::open`] spawns a marker chain into the workspace: one
/// root marker whose `CLAUSES` socket holds a chain of else-if and else
/// markers mirroring the branch's current clauses. The host may create,
/// delete, and reorder markers in that chain. [`BranchDialog::commit`]
/// walks the chain, derives the new [`BranchState`], rebuilds the branch,
/// reconnects each surviving clause's recorded edges at the marker's new
/// position, and deletes the markers.
#[derive(Debug)]
pub struct BranchDialog {
    target: NodeId,
    root: NodeId,
    saved: BTreeMap<NodeId, SavedClause>,
    saved_else: SavedClause,
}

impl BranchDialog {
    pub fn open(ws: &mut Workspace, target: NodeId) -> Result<BranchDialog, TangleError> {
        let node = ws.require(target)?;
        let kind = node.kind.clone();
        let state = *node.branch_state().ok_or_else(|| {
            TangleError::MalformedShapeState {
                kind,
                detail: "node has no branch shape".to_string(),
            }
        })?;

        let mut saved = BTreeMap::new();
        let mut saved_else = SavedClause::default();
        {
            let node = ws.require(target)?;
            saved_else.body = node.socket("ELSE").and_then(|s| s.connection);
        }

        let root = ws.create_node(kinds::BRANCH_ROOT_MARKER)?;
        let mut tail: Option<NodeId> = None;
        for i in 1..=state.else_if_count {
            let marker = ws.create_node(kinds::BRANCH_ELSE_IF_MARKER)?;
            let clause = {
                let node = ws.require(target)?;
                SavedClause {
                    cond: node.socket(&format!("IF{i}")).and_then(|s| s.connection),
                    body: node.socket(&format!("DO{i}")).and_then(|s| s.connection),
                }
            };
            saved.insert(marker, clause);
            match tail {
                None => ws.connect(root, "CLAUSES", marker)?,
                Some(prev) => ws.link(prev, marker)?,
            }
            tail = Some(marker);
        }
        if state.has_else {
            let marker = ws.create_node(kinds::BRANCH_ELSE_MARKER)?;
            match tail {
                None => ws.connect(root, "CLAUSES", marker)?,
                Some(prev) => ws.link(prev, marker)?,
            }
        }
        debug!(
            "[BranchDialog::open] target {target}, {} else-if markers, else {}",
            state.else_if_count, state.has_else
        );
        Ok(BranchDialog {
            target,
            root,
            saved,
            saved_else,
        })
    }

    /// The root marker whose `CLAUSES` chain the host edits.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn commit(self, ws: &mut Workspace) -> Result<(), TangleError> {
        // Classify the chain before touching the branch. A marker of any
        // other kind means the chain was corrupted.
        let mut order: Vec<NodeId> = Vec::new();
        let mut has_else = false;
        let mut cursor = ws
            .require(self.root)?
            .socket("CLAUSES")
            .and_then(|s| s.connection);
        while let Some(marker) = cursor {
            let node = ws.require(marker)?;
            match node.kind.as_str() {
                kinds::BRANCH_ELSE_IF_MARKER => order.push(marker),
                kinds::BRANCH_ELSE_MARKER => {
                    if has_else {
                        return Err(TangleError::MalformedShapeState {
                            kind: kinds::IF_BLOCK.to_string(),
                            detail: "duplicate else clause in marker chain".to_string(),
                        });
                    }
                    has_else = true;
                }
                other => return Err(TangleError::UnknownClauseKind(other.to_string())),
            }
            cursor = node.next;
        }

        // Drop every dynamic clause edge so that the rebuild cannot carry
        // an edge into the wrong position after a reorder.
        let old_state = *ws.require(self.target)?.branch_state().ok_or_else(|| {
            TangleError::MalformedShapeState {
                kind: kinds::IF_BLOCK.to_string(),
                detail: "branch state disappeared during dialog".to_string(),
            }
        })?;
        for i in 1..=old_state.else_if_count {
            ws.disconnect(self.target, &format!("IF{i}"))?;
            ws.disconnect(self.target, &format!("DO{i}"))?;
        }
        if old_state.has_else {
            ws.disconnect(self.target, "ELSE")?;
        }

        let new_state = BranchState::with_clauses(order.len(), has_else);
        ws.set_shape(self.target, ShapeState::Branch(new_state))?;

        // Reattach recorded edges at each marker's final position. A child
        // that was deleted or re-homed while the dialog was open simply
        // stays detached.
        for (position, marker) in order.iter().enumerate() {
            let clause = self.saved.get(marker).copied().unwrap_or_default();
            let index = position + 1;
            if let Some(cond) = clause.cond {
                Self::reattach(ws, self.target, &format!("IF{index}"), cond);
            }
            if let Some(body) = clause.body {
                Self::reattach(ws, self.target, &format!("DO{index}"), body);
            }
        }
        if has_else {
            if let Some(body) = self.saved_else.body {
                Self::reattach(ws, self.target, "ELSE", body);
            }
        }

        ws.delete_subtree(self.root);
        debug!(
            "[BranchDialog::commit] target {}, now {} else-if clauses, else {}",
            self.target, new_state.else_if_count, new_state.has_else
        );
        Ok(())
    }

    fn reattach(ws: &mut Workspace, target: NodeId, socket: &str, child: NodeId) {
        let still_free = ws
            .node(child)
            .map(|n| n.parent.is_none() && n.prev.is_none())
            .unwrap_or(false);
        if !still_free {
            return;
        }
        if let Err(err) = ws.connect(target, socket, child) {
            debug!("[BranchDialog::commit] could not reattach {child} to {socket}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_socket_order() {
        let state = BranchState::with_clauses(2, true);
        let names: Vec<String> = state
            .dynamic_sockets()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["IF1", "DO1", "IF2", "DO2", "ELSE0", "ELSE"]);
    }

    #[test]
    fn test_else_marker_row_is_not_connectable() {
        let state = BranchState::with_clauses(0, true);
        let sockets = state.dynamic_sockets();
        assert_eq!(sockets.len(), 2);
        assert_eq!(sockets[0].name, "ELSE0");
        assert_eq!(sockets[0].role, crate::graph::SocketRole::Marker);
        assert_eq!(sockets[1].role, crate::graph::SocketRole::Sequence);
    }

    #[test]
    fn test_default_state_has_no_clauses() {
        assert!(BranchState::default().dynamic_sockets().is_empty());
    }
}

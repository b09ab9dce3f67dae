//! Shape mutators: serializable state records that drive dynamic socket
//! layouts for compound kinds.
//!
//! A node's shape state is the single source of truth for its dynamic
//! sockets. Rebuilding is name-keyed: an edge survives a rebuild when the
//! new layout has a socket of the same name and role whose type-set still
//! accepts the child. Everything else is disconnected (shadow children are
//! deleted outright).

pub mod branch;
pub mod collection;
pub mod procedure;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    catalog::{KindSpec, MutatorKind},
    error::TangleError,
    event::WorkspaceEvent,
    graph::{NodeId, Socket, SocketRole, Workspace},
    types::{SlotType, TypeSet},
};

pub use branch::{BranchDialog, BranchState};
pub use collection::{CollectionItem, CollectionState};
pub use procedure::{ParamDialog, Parameter, SignatureState};

/// Persisted mutator state, stored on the node and serialized with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ShapeState {
    Branch(BranchState),
    Collection(CollectionState),
    Signature(SignatureState),
    Return(ReturnShape),
}

/// Whether a return/yield statement carries a value socket, and of what
/// type. Re-derived from the enclosing procedure's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReturnShape {
    pub expects: Option<SlotType>,
}

/// The state a freshly created node of a mutator kind starts with.
pub(crate) fn default_state(mutator: MutatorKind) -> ShapeState {
    match mutator {
        MutatorKind::Branch => ShapeState::Branch(BranchState::default()),
        MutatorKind::Collection => ShapeState::Collection(CollectionState::default()),
        MutatorKind::ProcedureDefine | MutatorKind::ProcedureCall => {
            ShapeState::Signature(SignatureState::default())
        }
        MutatorKind::ReturnValue => ShapeState::Return(ReturnShape::default()),
    }
}

/// The full socket layout a kind takes under the given state.
pub(crate) fn layout(spec: &KindSpec, state: &ShapeState) -> Result<Vec<Socket>, TangleError> {
    let mut sockets = spec.static_sockets();
    match (spec.mutator, state) {
        (Some(MutatorKind::Branch), ShapeState::Branch(branch)) => {
            sockets.extend(branch.dynamic_sockets());
        }
        (Some(MutatorKind::Collection), ShapeState::Collection(collection)) => {
            sockets.extend(collection.dynamic_sockets());
        }
        // Parameters live in the state, not in sockets; the definition's
        // layout is fixed.
        (Some(MutatorKind::ProcedureDefine), ShapeState::Signature(_)) => {}
        (Some(MutatorKind::ProcedureCall), ShapeState::Signature(signature)) => {
            sockets.extend(signature.call_sockets());
        }
        (Some(MutatorKind::ReturnValue), ShapeState::Return(shape)) => {
            if let Some(tag) = shape.expects {
                sockets.push(Socket::value("VALUE", TypeSet::single(tag)));
            }
        }
        _ => {
            return Err(TangleError::MalformedShapeState {
                kind: spec.name.to_string(),
                detail: "state record does not match the kind's mutator".to_string(),
            });
        }
    }
    Ok(sockets)
}

/// Validate a state record against a kind spec without applying it.
pub(crate) fn check_state(spec: &KindSpec, state: &ShapeState) -> Result<(), TangleError> {
    layout(spec, state).map(|_| ())
}

/// Install `state` on the node and rebuild its socket layout.
///
/// Every rebuild preserves edges whose socket name and role survive with a
/// still-compatible type-set. Dropped non-shadow children detach and become
/// roots; dropped shadow children are deleted.
pub(crate) fn apply(
    ws: &mut Workspace,
    id: NodeId,
    state: ShapeState,
) -> Result<(), TangleError> {
    let old_sockets = {
        let node = ws.require(id)?;
        let spec = ws.spec_of(node)?;
        check_state(spec, &state)?;
        node.sockets.clone()
    };
    let new_layout = {
        let node = ws.require(id)?;
        let spec = ws.spec_of(node)?;
        layout(spec, &state)?
    };

    let mut carried: Vec<Option<NodeId>> = vec![None; new_layout.len()];
    let mut dropped: Vec<(String, NodeId)> = Vec::new();
    for old in &old_sockets {
        let Some(child) = old.connection else {
            continue;
        };
        let target = new_layout
            .iter()
            .position(|s| s.name == old.name && s.role == old.role);
        let keep = match target {
            Some(index) => match new_layout[index].role {
                SocketRole::Value => ws
                    .output_type(child)
                    .map(|out| new_layout[index].accepts.accepts(&out))
                    .unwrap_or(false),
                _ => true,
            },
            None => false,
        };
        match (keep, target) {
            (true, Some(index)) => carried[index] = Some(child),
            _ => dropped.push((old.name.clone(), child)),
        }
    }

    for (socket_name, child) in dropped {
        let is_shadow = ws.node(child).map(|n| n.shadow).unwrap_or(false);
        if is_shadow {
            ws.delete_subtree(child);
        } else {
            if let Some(c) = ws.node_mut(child) {
                c.parent = None;
            }
            ws.notify(WorkspaceEvent::EdgeDisconnected(id, socket_name, child));
        }
    }

    let mut sockets = new_layout;
    for (index, connection) in carried.iter().enumerate() {
        sockets[index].connection = *connection;
    }
    if let Some(node) = ws.node_mut(id) {
        node.sockets = sockets;
        node.shape = Some(state);
    }
    trace!("[shape::apply] rebuilt layout of {id}");
    ws.notify(WorkspaceEvent::ShapeRebuilt(id));
    Ok(())
}

/// Re-derive a return/yield statement's value socket from its enclosing
/// procedure definition. Outside any definition the socket disappears.
pub fn refresh_return_shape(ws: &mut Workspace, id: NodeId) -> Result<(), TangleError> {
    let node = ws.require(id)?;
    let spec = ws.spec_of(node)?;
    if spec.mutator != Some(MutatorKind::ReturnValue) {
        return Err(TangleError::MalformedShapeState {
            kind: spec.name.to_string(),
            detail: "node has no return-value shape".to_string(),
        });
    }
    let expects = ws.enclosing_signature(id).and_then(|sig| sig.return_type);
    apply(ws, id, ShapeState::Return(ReturnShape { expects }))
}

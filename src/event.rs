use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    graph::{FieldValue, NodeId},
    shape::SignatureState,
};

/// Change notifications broadcast by a [`Workspace`](crate::graph::Workspace)
/// after each committed mutation.
///
/// Events fire synchronously, in observer registration order, and only after
/// the mutation has fully applied. Refused mutations emit nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkspaceEvent {
    /// Node id, node kind.
    NodeCreated(NodeId, String),
    /// Node id, node kind.
    NodeRemoved(NodeId, String),
    /// Node id, field name, old value, new value.
    FieldChanged(NodeId, String, FieldValue, FieldValue),
    /// Parent id, socket name, child id.
    EdgeConnected(NodeId, String, NodeId),
    /// Parent id, socket name, child id.
    EdgeDisconnected(NodeId, String, NodeId),
    /// Predecessor id, successor id in a statement chain.
    SequenceLinked(NodeId, NodeId),
    /// Predecessor id, former successor id.
    SequenceUnlinked(NodeId, NodeId),
    /// A shape mutator recomputed the node's socket layout.
    ShapeRebuilt(NodeId),
    /// A signature was committed to the registry; all call sites have
    /// already been resynchronized when this fires.
    ProcedureChanged(String, SignatureState),
    /// A definition left the registry.
    ProcedureRemoved(String),
    /// The whole workspace was replaced, e.g. by a transactional re-parse.
    WorkspaceReplaced,
}

impl WorkspaceEvent {
    /// The node this event is about, when it is about a single node.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            WorkspaceEvent::NodeCreated(id, _) => Some(*id),
            WorkspaceEvent::NodeRemoved(id, _) => Some(*id),
            WorkspaceEvent::FieldChanged(id, _, _, _) => Some(*id),
            WorkspaceEvent::EdgeConnected(parent, _, _) => Some(*parent),
            WorkspaceEvent::EdgeDisconnected(parent, _, _) => Some(*parent),
            WorkspaceEvent::SequenceLinked(prev, _) => Some(*prev),
            WorkspaceEvent::SequenceUnlinked(prev, _) => Some(*prev),
            WorkspaceEvent::ShapeRebuilt(id) => Some(*id),
            WorkspaceEvent::ProcedureChanged(_, _) => None,
            WorkspaceEvent::ProcedureRemoved(_) => None,
            WorkspaceEvent::WorkspaceReplaced => None,
        }
    }
}

impl Display for WorkspaceEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            WorkspaceEvent::NodeCreated(_, _) => write!(f, "NodeCreated"),
            WorkspaceEvent::NodeRemoved(_, _) => write!(f, "NodeRemoved"),
            WorkspaceEvent::FieldChanged(_, _, _, _) => write!(f, "FieldChanged"),
            WorkspaceEvent::EdgeConnected(_, _, _) => write!(f, "EdgeConnected"),
            WorkspaceEvent::EdgeDisconnected(_, _, _) => write!(f, "EdgeDisconnected"),
            WorkspaceEvent::SequenceLinked(_, _) => write!(f, "SequenceLinked"),
            WorkspaceEvent::SequenceUnlinked(_, _) => write!(f, "SequenceUnlinked"),
            WorkspaceEvent::ShapeRebuilt(_) => write!(f, "ShapeRebuilt"),
            WorkspaceEvent::ProcedureChanged(_, _) => write!(f, "ProcedureChanged"),
            WorkspaceEvent::ProcedureRemoved(_) => write!(f, "ProcedureRemoved"),
            WorkspaceEvent::WorkspaceReplaced => write!(f, "WorkspaceReplaced"),
        }
    }
}

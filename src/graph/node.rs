//! Node, socket, and field primitives shared by the whole graph model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::{
    shape::{BranchState, CollectionState, ReturnShape, ShapeState, SignatureState},
    types::TypeSet,
};

/// Stable node identity. Time-ordered so that map iteration follows
/// creation order, which keeps generated text deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> NodeId {
        NodeId(Uuid::now_v7())
    }

    pub fn now_v7() -> NodeId {
        NodeId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl From<Uuid> for NodeId {
    fn from(src: Uuid) -> NodeId {
        NodeId(src)
    }
}

/// A field holds inline data rendered directly into text: names, operator
/// spellings, literal values, resource identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> FieldValue {
        FieldValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// What a socket row holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketRole {
    /// Accepts one expression child, gated by the socket's type-set.
    Value,
    /// Accepts the head of a statement chain.
    Sequence,
    /// A display-only row. Never connectable; type checks are not consulted.
    Marker,
}

/// One named connection point on a node. Sockets are ordered; layout order
/// is the order the generator walks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    pub name: String,
    pub role: SocketRole,
    #[serde(default)]
    pub accepts: TypeSet,
    #[serde(default)]
    pub connection: Option<NodeId>,
}

impl Socket {
    pub fn value(name: impl Into<String>, accepts: TypeSet) -> Socket {
        Socket {
            name: name.into(),
            role: SocketRole::Value,
            accepts,
            connection: None,
        }
    }

    pub fn sequence(name: impl Into<String>) -> Socket {
        Socket {
            name: name.into(),
            role: SocketRole::Sequence,
            accepts: TypeSet::Anything,
            connection: None,
        }
    }

    pub fn marker(name: impl Into<String>) -> Socket {
        Socket {
            name: name.into(),
            role: SocketRole::Marker,
            accepts: TypeSet::Anything,
            connection: None,
        }
    }
}

/// A single block in the graph.
///
/// Ownership links are stored redundantly in both directions: a parent's
/// socket records the child id, and the child records `(parent, socket)` in
/// `parent`. Statement order uses `prev`/`next` sibling links. The workspace
/// keeps both directions consistent; nodes never edit their own links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub sockets: Vec<Socket>,
    /// Owning value or sequence socket, as `(parent id, socket name)`.
    #[serde(default)]
    pub parent: Option<(NodeId, String)>,
    #[serde(default)]
    pub prev: Option<NodeId>,
    #[serde(default)]
    pub next: Option<NodeId>,
    /// Shadow nodes are canonical default literals owned by their socket.
    /// They render like ordinary children but are replaced silently when a
    /// real child connects.
    #[serde(default)]
    pub shadow: bool,
    /// Persisted mutator state for compound kinds.
    #[serde(default)]
    pub shape: Option<ShapeState>,
}

impl Node {
    /// Detached from every parent, predecessor, and socket.
    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.prev.is_none()
    }

    pub fn socket(&self, name: &str) -> Option<&Socket> {
        self.sockets.iter().find(|s| s.name == name)
    }

    pub fn socket_mut(&mut self, name: &str) -> Option<&mut Socket> {
        self.sockets.iter_mut().find(|s| s.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Field accessor for names that the kind schema guarantees to exist.
    /// Returns an empty string for text fields that were never set.
    pub fn text_field(&self, name: &str) -> &str {
        self.fields
            .get(name)
            .and_then(FieldValue::as_text)
            .unwrap_or("")
    }

    pub fn branch_state(&self) -> Option<&BranchState> {
        match &self.shape {
            Some(ShapeState::Branch(state)) => Some(state),
            _ => None,
        }
    }

    pub fn collection_state(&self) -> Option<&CollectionState> {
        match &self.shape {
            Some(ShapeState::Collection(state)) => Some(state),
            _ => None,
        }
    }

    pub fn signature(&self) -> Option<&SignatureState> {
        match &self.shape {
            Some(ShapeState::Signature(state)) => Some(state),
            _ => None,
        }
    }

    pub fn return_shape(&self) -> Option<&ReturnShape> {
        match &self.shape {
            Some(ShapeState::Return(state)) => Some(state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SlotType;

    #[test]
    fn test_field_value_serde_is_untagged() {
        let json = serde_json::to_string(&FieldValue::Number(3.0)).unwrap();
        assert_eq!(json, "3.0");
        let back: FieldValue = serde_json::from_str("true").unwrap();
        assert_eq!(back, FieldValue::Flag(true));
        let back: FieldValue = serde_json::from_str("\"score\"").unwrap();
        assert_eq!(back, FieldValue::text("score"));
    }

    #[test]
    fn test_socket_lookup_by_name() {
        let node = Node {
            id: NodeId::new(),
            kind: "arithmetic".into(),
            fields: BTreeMap::new(),
            sockets: vec![
                Socket::value("A", TypeSet::single(SlotType::Number)),
                Socket::value("B", TypeSet::single(SlotType::Number)),
            ],
            parent: None,
            prev: None,
            next: None,
            shadow: false,
            shape: None,
        };
        assert!(node.socket("A").is_some());
        assert!(node.socket("COND").is_none());
        assert!(node.is_root());
    }

    #[test]
    fn test_node_ids_are_creation_ordered() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert!(a < b);
    }
}

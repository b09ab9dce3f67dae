//! The mutable block graph and its editing rules.
//!
//! Every mutation is validated before any state changes, so a returned error
//! always means "nothing happened". Committed mutations broadcast
//! [`WorkspaceEvent`]s to registered observers in registration order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

use crate::{
    catalog::{KindMode, KindSpec, NodeCatalog},
    error::TangleError,
    event::WorkspaceEvent,
    procedures::ProcedureRegistry,
    shape::{self, ShapeState, SignatureState},
    types::{SlotType, TypeSet},
};

use super::node::{FieldValue, Node, NodeId, SocketRole};

/// Serializable image of a workspace: nodes plus the procedure registry.
/// Observers and the kind catalog are reattached on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub nodes: Vec<Node>,
    pub procedures: ProcedureRegistry,
}

/// A graph of nodes plus the procedure registry and observer list.
///
/// The workspace owns all structural links. Both directions of every edge
/// (socket to child, child to `(parent, socket)`) are updated together here,
/// which is what keeps cascade logic and cycle checks cheap.
#[derive(Debug)]
pub struct Workspace {
    catalog: Arc<NodeCatalog>,
    nodes: BTreeMap<NodeId, Node>,
    pub(crate) procedures: ProcedureRegistry,
    observers: Vec<UnboundedSender<WorkspaceEvent>>,
}

impl Workspace {
    pub fn new(catalog: Arc<NodeCatalog>) -> Workspace {
        Workspace {
            catalog,
            nodes: BTreeMap::new(),
            procedures: ProcedureRegistry::default(),
            observers: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<NodeCatalog> {
        &self.catalog
    }

    pub fn procedures(&self) -> &ProcedureRegistry {
        &self.procedures
    }

    /// Register a change observer. Closed channels are pruned on the next
    /// broadcast; there is no unsubscribe call.
    pub fn observe(&mut self, tx: UnboundedSender<WorkspaceEvent>) {
        self.observers.push(tx);
    }

    pub(crate) fn notify(&mut self, event: WorkspaceEvent) {
        trace!("[Workspace::notify] {event}");
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn require(&self, id: NodeId) -> Result<&Node, TangleError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| TangleError::NotFound(format!("no node with id {id}")))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Ids of nodes with no owner and no predecessor, in creation order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.id)
            .collect()
    }

    /// The kind spec backing a live node.
    pub(crate) fn spec_of(&self, node: &Node) -> Result<&KindSpec, TangleError> {
        self.catalog
            .get(&node.kind)
            .ok_or_else(|| TangleError::UnknownNodeKind(node.kind.clone()))
    }

    // ------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------

    /// Instantiate a node of a registered kind with default fields and the
    /// kind's initial socket layout.
    pub fn create_node(&mut self, kind: &str) -> Result<NodeId, TangleError> {
        let spec = self
            .catalog
            .get(kind)
            .ok_or_else(|| TangleError::UnknownNodeKind(kind.to_string()))?;

        let id = NodeId::new();
        let shape_state = spec.mutator.map(shape::default_state);
        let sockets = match &shape_state {
            Some(state) => shape::layout(spec, state)?,
            None => spec.static_sockets(),
        };
        let mut fields = BTreeMap::new();
        for field in &spec.fields {
            fields.insert(field.name.to_string(), field.default.clone());
        }

        let node = Node {
            id,
            kind: kind.to_string(),
            fields,
            sockets,
            parent: None,
            prev: None,
            next: None,
            shadow: false,
            shape: shape_state,
        };
        self.nodes.insert(id, node);
        debug!("[Workspace::create_node] {kind} {id}");
        self.notify(WorkspaceEvent::NodeCreated(id, kind.to_string()));
        Ok(id)
    }

    /// Remove a node. Children detach and become roots (shadow children are
    /// deleted with their owner); the surrounding statement chain heals
    /// around the gap.
    ///
    /// Removing a procedure definition with live call sites is refused with
    /// [`TangleError::DanglingProcedureReference`].
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), TangleError> {
        let node = self.require(id)?.clone();
        let kind = node.kind.clone();

        if let Some(state) = node.signature() {
            if self.procedures.is_registered_definition(&state.name, id)
                && !self.procedures.call_sites(&state.name).is_empty()
            {
                return Err(TangleError::DanglingProcedureReference(state.name.clone()));
            }
        }

        // Detach from the owning socket, healing sequence sockets by
        // promoting the successor into the vacated slot.
        if let Some((parent_id, socket_name)) = node.parent.clone() {
            let role = self
                .node(parent_id)
                .and_then(|p| p.socket(&socket_name))
                .map(|s| s.role);
            if let Some(parent) = self.node_mut(parent_id) {
                if let Some(socket) = parent.socket_mut(&socket_name) {
                    socket.connection = None;
                }
            }
            self.notify(WorkspaceEvent::EdgeDisconnected(
                parent_id,
                socket_name.clone(),
                id,
            ));
            if role == Some(SocketRole::Sequence) {
                if let Some(next) = node.next {
                    if let Some(parent) = self.node_mut(parent_id) {
                        if let Some(socket) = parent.socket_mut(&socket_name) {
                            socket.connection = Some(next);
                        }
                    }
                    if let Some(succ) = self.node_mut(next) {
                        succ.prev = None;
                        succ.parent = Some((parent_id, socket_name.clone()));
                    }
                    self.notify(WorkspaceEvent::SequenceUnlinked(id, next));
                    self.notify(WorkspaceEvent::EdgeConnected(parent_id, socket_name, next));
                }
            }
        }

        // Heal the sibling chain.
        if let Some(prev) = node.prev {
            if let Some(p) = self.node_mut(prev) {
                p.next = None;
            }
            self.notify(WorkspaceEvent::SequenceUnlinked(prev, id));
            if let Some(next) = node.next {
                if let Some(p) = self.node_mut(prev) {
                    p.next = Some(next);
                }
                if let Some(n) = self.node_mut(next) {
                    n.prev = Some(prev);
                }
                self.notify(WorkspaceEvent::SequenceUnlinked(id, next));
                self.notify(WorkspaceEvent::SequenceLinked(prev, next));
            }
        } else if node.parent.is_none() {
            if let Some(next) = node.next {
                if let Some(n) = self.node_mut(next) {
                    n.prev = None;
                }
                self.notify(WorkspaceEvent::SequenceUnlinked(id, next));
            }
        }

        // Detach children. Shadows are owned defaults and die with the node.
        for socket in &node.sockets {
            let Some(child_id) = socket.connection else {
                continue;
            };
            let is_shadow = self.node(child_id).map(|c| c.shadow).unwrap_or(false);
            if is_shadow {
                self.delete_subtree(child_id);
            } else if let Some(child) = self.node_mut(child_id) {
                child.parent = None;
                self.notify(WorkspaceEvent::EdgeDisconnected(
                    id,
                    socket.name.clone(),
                    child_id,
                ));
            }
        }

        if kind == crate::catalog::kinds::PROCEDURE_CALL {
            self.procedures.unbind_call_site(id);
        }
        let removed_procedure = node
            .signature()
            .filter(|state| self.procedures.is_registered_definition(&state.name, id))
            .map(|state| state.name.clone());

        self.nodes.remove(&id);
        debug!("[Workspace::remove_node] {kind} {id}");
        self.notify(WorkspaceEvent::NodeRemoved(id, kind));
        if let Some(name) = removed_procedure {
            self.procedures.remove_entry(&name);
            self.notify(WorkspaceEvent::ProcedureRemoved(name));
        }
        Ok(())
    }

    /// Remove a node and everything reachable through its sockets and
    /// successor links. Used for shadow replacement and marker cleanup.
    pub(crate) fn delete_subtree(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id).cloned() else {
            return;
        };
        for socket in &node.sockets {
            if let Some(child) = socket.connection {
                self.delete_subtree(child);
            }
        }
        if let Some(next) = node.next {
            self.delete_subtree(next);
        }
        self.nodes.remove(&id);
        self.notify(WorkspaceEvent::NodeRemoved(id, node.kind));
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Attach `child` to the named socket on `parent`.
    ///
    /// For value sockets the child must produce a value whose type-set is
    /// compatible with the socket's. For sequence sockets the child must be
    /// chainable. An occupied socket refuses the edit, except that a shadow
    /// occupant is deleted and replaced silently. Marker sockets never
    /// accept connections.
    pub fn connect(
        &mut self,
        parent: NodeId,
        socket_name: &str,
        child: NodeId,
    ) -> Result<(), TangleError> {
        let parent_node = self.require(parent)?;
        let socket = parent_node.socket(socket_name).ok_or_else(|| {
            TangleError::NotFound(format!(
                "node {parent} ({}) has no socket '{socket_name}'",
                parent_node.kind
            ))
        })?;
        let role = socket.role;
        let accepts = socket.accepts;
        let occupant = socket.connection;

        let child_node = self.require(child)?;
        if parent == child {
            return Err(TangleError::ConnectionIncompatible {
                socket: socket_name.to_string(),
                detail: "a node cannot own itself".to_string(),
            });
        }
        if child_node.parent.is_some() || child_node.prev.is_some() {
            return Err(TangleError::ConnectionIncompatible {
                socket: socket_name.to_string(),
                detail: format!("node {child} is already attached elsewhere"),
            });
        }
        if self.is_within(parent, child) {
            return Err(TangleError::ConnectionIncompatible {
                socket: socket_name.to_string(),
                detail: "connection would create a cycle".to_string(),
            });
        }

        match role {
            SocketRole::Marker => {
                return Err(TangleError::ConnectionIncompatible {
                    socket: socket_name.to_string(),
                    detail: "marker sockets are display-only".to_string(),
                });
            }
            SocketRole::Value => {
                if !self.is_expression(child)? {
                    return Err(TangleError::ConnectionIncompatible {
                        socket: socket_name.to_string(),
                        detail: "child does not produce a value".to_string(),
                    });
                }
                let offered = self.output_type(child)?;
                if !accepts.accepts(&offered) {
                    return Err(TangleError::ConnectionIncompatible {
                        socket: socket_name.to_string(),
                        detail: format!("socket accepts {accepts}, child produces {offered}"),
                    });
                }
            }
            SocketRole::Sequence => {
                if !self.is_chainable(child)? {
                    return Err(TangleError::ConnectionIncompatible {
                        socket: socket_name.to_string(),
                        detail: "child is not a statement".to_string(),
                    });
                }
            }
        }

        if let Some(existing) = occupant {
            let existing_shadow = self.node(existing).map(|n| n.shadow).unwrap_or(false);
            if !existing_shadow {
                return Err(TangleError::SocketAlreadyOccupied {
                    socket: socket_name.to_string(),
                });
            }
            self.delete_subtree(existing);
        }

        if let Some(p) = self.node_mut(parent) {
            if let Some(s) = p.socket_mut(socket_name) {
                s.connection = Some(child);
            }
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some((parent, socket_name.to_string()));
        }
        trace!("[Workspace::connect] {parent}.{socket_name} <- {child}");
        self.notify(WorkspaceEvent::EdgeConnected(
            parent,
            socket_name.to_string(),
            child,
        ));
        Ok(())
    }

    /// Detach the named socket's child, if any, returning its id.
    pub fn disconnect(
        &mut self,
        parent: NodeId,
        socket_name: &str,
    ) -> Result<Option<NodeId>, TangleError> {
        let parent_node = self.require(parent)?;
        let socket = parent_node.socket(socket_name).ok_or_else(|| {
            TangleError::NotFound(format!(
                "node {parent} ({}) has no socket '{socket_name}'",
                parent_node.kind
            ))
        })?;
        let Some(child) = socket.connection else {
            return Ok(None);
        };
        if let Some(p) = self.node_mut(parent) {
            if let Some(s) = p.socket_mut(socket_name) {
                s.connection = None;
            }
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = None;
        }
        trace!("[Workspace::disconnect] {parent}.{socket_name} -x- {child}");
        self.notify(WorkspaceEvent::EdgeDisconnected(
            parent,
            socket_name.to_string(),
            child,
        ));
        Ok(Some(child))
    }

    /// Append `next` after `prev` in a statement chain. `next` must be a
    /// detached root; `prev` must not already have a successor.
    pub fn link(&mut self, prev: NodeId, next: NodeId) -> Result<(), TangleError> {
        let prev_node = self.require(prev)?;
        if prev_node.next.is_some() {
            return Err(TangleError::SocketAlreadyOccupied {
                socket: "next".to_string(),
            });
        }
        let next_node = self.require(next)?;
        if prev == next || next_node.parent.is_some() || next_node.prev.is_some() {
            return Err(TangleError::ConnectionIncompatible {
                socket: "next".to_string(),
                detail: format!("node {next} is not a detached statement"),
            });
        }
        if !self.is_chainable(prev)? || !self.is_chainable(next)? {
            return Err(TangleError::ConnectionIncompatible {
                socket: "next".to_string(),
                detail: "only statements can be chained".to_string(),
            });
        }
        if self.is_within(prev, next) {
            return Err(TangleError::ConnectionIncompatible {
                socket: "next".to_string(),
                detail: "link would create a cycle".to_string(),
            });
        }

        if let Some(p) = self.node_mut(prev) {
            p.next = Some(next);
        }
        if let Some(n) = self.node_mut(next) {
            n.prev = Some(prev);
        }
        trace!("[Workspace::link] {prev} -> {next}");
        self.notify(WorkspaceEvent::SequenceLinked(prev, next));
        Ok(())
    }

    /// Break the chain after `prev`. The detached successor (and everything
    /// after it) becomes a root chain.
    pub fn unlink(&mut self, prev: NodeId) -> Result<Option<NodeId>, TangleError> {
        let prev_node = self.require(prev)?;
        let Some(next) = prev_node.next else {
            return Ok(None);
        };
        if let Some(p) = self.node_mut(prev) {
            p.next = None;
        }
        if let Some(n) = self.node_mut(next) {
            n.prev = None;
        }
        trace!("[Workspace::unlink] {prev} -x- {next}");
        self.notify(WorkspaceEvent::SequenceUnlinked(prev, next));
        Ok(Some(next))
    }

    // ------------------------------------------------------------------
    // Fields and shapes
    // ------------------------------------------------------------------

    /// Set a field declared by the node's kind schema.
    pub fn set_field(
        &mut self,
        id: NodeId,
        name: &str,
        value: FieldValue,
    ) -> Result<(), TangleError> {
        let node = self.require(id)?;
        let spec = self.spec_of(node)?;
        if !spec.fields.iter().any(|f| f.name == name) {
            return Err(TangleError::NotFound(format!(
                "kind '{}' has no field '{name}'",
                spec.name
            )));
        }
        let old = node.field(name).cloned().unwrap_or_else(|| {
            spec.fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.default.clone())
                .unwrap_or(FieldValue::text(""))
        });
        if old == value {
            return Ok(());
        }
        if let Some(n) = self.node_mut(id) {
            n.fields.insert(name.to_string(), value.clone());
        }
        self.notify(WorkspaceEvent::FieldChanged(
            id,
            name.to_string(),
            old,
            value,
        ));
        Ok(())
    }

    /// Install a new shape state and rebuild the node's socket layout,
    /// preserving edges whose socket names survive.
    ///
    /// Signature states have their own commit path on the procedure
    /// registry so that call sites never go stale; they are refused here.
    pub fn set_shape(&mut self, id: NodeId, state: ShapeState) -> Result<(), TangleError> {
        if matches!(state, ShapeState::Signature(_)) {
            let kind = self.require(id)?.kind.clone();
            return Err(TangleError::MalformedShapeState {
                kind,
                detail: "signatures are committed through the procedure registry".to_string(),
            });
        }
        shape::apply(self, id, state)
    }

    /// Re-derive a value socket's accepted type-set in place. The occupant,
    /// if any, must still satisfy the new set.
    pub(crate) fn retype_socket(
        &mut self,
        id: NodeId,
        socket_name: &str,
        accepts: TypeSet,
    ) -> Result<(), TangleError> {
        let node = self.require(id)?;
        let socket = node.socket(socket_name).ok_or_else(|| {
            TangleError::NotFound(format!(
                "node {id} ({}) has no socket '{socket_name}'",
                node.kind
            ))
        })?;
        if socket.role != SocketRole::Value {
            return Err(TangleError::ConnectionIncompatible {
                socket: socket_name.to_string(),
                detail: "only value sockets carry a type-set".to_string(),
            });
        }
        if let Some(child) = socket.connection {
            let offered = self.output_type(child)?;
            if !accepts.accepts(&offered) {
                return Err(TangleError::ConnectionIncompatible {
                    socket: socket_name.to_string(),
                    detail: format!(
                        "occupant produces {offered}, socket would accept {accepts}"
                    ),
                });
            }
        }
        if let Some(n) = self.node_mut(id) {
            if let Some(s) = n.socket_mut(socket_name) {
                s.accepts = accepts;
            }
        }
        trace!("[Workspace::retype_socket] {id}.{socket_name} -> {accepts}");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether the node can occupy a value socket.
    pub fn is_expression(&self, id: NodeId) -> Result<bool, TangleError> {
        let node = self.require(id)?;
        let spec = self.spec_of(node)?;
        Ok(match spec.mode {
            KindMode::Expression => true,
            KindMode::DynamicCall => node
                .signature()
                .map(|s| s.return_type.is_some())
                .unwrap_or(false),
            _ => false,
        })
    }

    /// Whether the node can participate in a statement chain.
    pub fn is_chainable(&self, id: NodeId) -> Result<bool, TangleError> {
        let node = self.require(id)?;
        let spec = self.spec_of(node)?;
        Ok(match spec.mode {
            KindMode::Statement | KindMode::Auxiliary => true,
            KindMode::DynamicCall => node
                .signature()
                .map(|s| s.return_type.is_none())
                .unwrap_or(true),
            _ => false,
        })
    }

    /// The type-set a node's output carries. Call sites derive theirs from
    /// the bound signature's return type.
    pub fn output_type(&self, id: NodeId) -> Result<TypeSet, TangleError> {
        let node = self.require(id)?;
        let spec = self.spec_of(node)?;
        if spec.mode == KindMode::DynamicCall {
            return Ok(node
                .signature()
                .and_then(|s| s.return_type)
                .map(TypeSet::single)
                .unwrap_or(TypeSet::Anything));
        }
        Ok(spec.output)
    }

    /// Walk ancestors of `start` (predecessors, then owning sockets) and
    /// report whether `target` is among them, including `start` itself.
    pub(crate) fn is_within(&self, start: NodeId, target: NodeId) -> bool {
        let mut cursor = Some(start);
        let mut hops = 0usize;
        while let Some(id) = cursor {
            if id == target {
                return true;
            }
            // A correct graph is acyclic; the hop cap keeps this walk finite
            // even on one that is not.
            hops += 1;
            if hops > self.nodes.len() + 1 {
                return true;
            }
            let Some(node) = self.node(id) else {
                return false;
            };
            cursor = node.prev.or(node.parent.as_ref().map(|(p, _)| *p));
        }
        false
    }

    /// The root of the chain/ownership tree containing `id`.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut cursor = id;
        let mut hops = 0usize;
        while let Some(node) = self.node(cursor) {
            let up = node.prev.or(node.parent.as_ref().map(|(p, _)| *p));
            match up {
                Some(parent) if hops <= self.nodes.len() => {
                    cursor = parent;
                    hops += 1;
                }
                _ => break,
            }
        }
        cursor
    }

    /// The signature of the procedure definition enclosing `id`, if the
    /// node sits inside one.
    pub fn enclosing_signature(&self, id: NodeId) -> Option<SignatureState> {
        let root = self.root_of(id);
        let node = self.node(root)?;
        if node.kind == crate::catalog::kinds::PROCEDURE_DEFINE {
            return node.signature().cloned();
        }
        None
    }

    /// Spawn a shadow default literal into an empty value socket. Only the
    /// directly defaultable tags get one; other types leave the socket open.
    pub(crate) fn attach_default_literal(
        &mut self,
        parent: NodeId,
        socket_name: &str,
        tag: SlotType,
    ) -> Result<Option<NodeId>, TangleError> {
        use crate::catalog::kinds;
        let (kind, field, value) = match tag {
            SlotType::Number => (kinds::NUMBER_LITERAL, "VALUE", FieldValue::Number(0.0)),
            SlotType::String => (kinds::STRING_LITERAL, "VALUE", FieldValue::text("")),
            SlotType::Boolean => (kinds::BOOLEAN_LITERAL, "VALUE", FieldValue::Flag(false)),
            _ => return Ok(None),
        };
        let literal = self.create_node(kind)?;
        self.set_field(literal, field, value)?;
        if let Some(n) = self.node_mut(literal) {
            n.shadow = true;
        }
        self.connect(parent, socket_name, literal)?;
        Ok(Some(literal))
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            procedures: self.procedures.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, TangleError> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Rebuild a workspace from a snapshot, validating kinds, link
    /// symmetry, and shape states against the catalog.
    pub fn from_snapshot(
        catalog: Arc<NodeCatalog>,
        snapshot: WorkspaceSnapshot,
    ) -> Result<Workspace, TangleError> {
        let mut ws = Workspace {
            catalog,
            nodes: BTreeMap::new(),
            procedures: snapshot.procedures,
            observers: Vec::new(),
        };
        for node in snapshot.nodes {
            if ws.catalog.get(&node.kind).is_none() {
                return Err(TangleError::UnknownNodeKind(node.kind));
            }
            ws.nodes.insert(node.id, node);
        }
        ws.validate()?;
        Ok(ws)
    }

    pub fn from_json(catalog: Arc<NodeCatalog>, json: &str) -> Result<Workspace, TangleError> {
        let snapshot: WorkspaceSnapshot = serde_json::from_str(json)?;
        Workspace::from_snapshot(catalog, snapshot)
    }

    /// Structural integrity check used after deserialization.
    pub fn validate(&self) -> Result<(), TangleError> {
        for node in self.nodes.values() {
            let spec = self.spec_of(node)?;
            if let Some(state) = &node.shape {
                shape::check_state(spec, state)?;
            }
            for socket in &node.sockets {
                if let Some(child_id) = socket.connection {
                    let child = self.nodes.get(&child_id).ok_or_else(|| {
                        TangleError::MalformedGraph(format!(
                            "socket {}.{} points at missing node {child_id}",
                            node.id, socket.name
                        ))
                    })?;
                    let back = child.parent.as_ref();
                    if back != Some(&(node.id, socket.name.clone())) {
                        return Err(TangleError::MalformedGraph(format!(
                            "asymmetric edge {}.{} -> {child_id}",
                            node.id, socket.name
                        )));
                    }
                }
            }
            if let Some(next) = node.next {
                let succ = self.nodes.get(&next).ok_or_else(|| {
                    TangleError::MalformedGraph(format!(
                        "node {} links to missing successor {next}",
                        node.id
                    ))
                })?;
                if succ.prev != Some(node.id) {
                    return Err(TangleError::MalformedGraph(format!(
                        "asymmetric chain link {} -> {next}",
                        node.id
                    )));
                }
            }
        }
        for (name, entry) in self.procedures.entries() {
            let node = self.nodes.get(&entry.definition).ok_or_else(|| {
                TangleError::MalformedGraph(format!(
                    "procedure '{name}' registered to missing node {}",
                    entry.definition
                ))
            })?;
            if node.kind != crate::catalog::kinds::PROCEDURE_DEFINE {
                return Err(TangleError::MalformedGraph(format!(
                    "procedure '{name}' registered to a '{}' node",
                    node.kind
                )));
            }
        }
        Ok(())
    }

    /// Swap in another workspace's contents while keeping this workspace's
    /// observers. The transactional parse path ends here.
    pub fn replace_with(&mut self, other: Workspace) {
        self.catalog = other.catalog;
        self.nodes = other.nodes;
        self.procedures = other.procedures;
        debug!(
            "[Workspace::replace_with] adopted {} nodes, {} procedures",
            self.nodes.len(),
            self.procedures.entries().count()
        );
        self.notify(WorkspaceEvent::WorkspaceReplaced);
    }

    // ------------------------------------------------------------------
    // Canonical form
    // ------------------------------------------------------------------

    /// An id-insensitive JSON rendering of the graph, suitable for
    /// structural comparison. Procedure definitions come first, ordered by
    /// name; remaining roots follow in creation order.
    pub fn canonical_form(&self) -> serde_json::Value {
        use serde_json::{json, Value};

        fn node_value(ws: &Workspace, id: NodeId) -> Value {
            let Some(node) = ws.node(id) else {
                return Value::Null;
            };
            let sockets: Vec<Value> = node
                .sockets
                .iter()
                .map(|s| {
                    json!({
                        "name": s.name,
                        "child": s.connection.map(|c| node_value(ws, c)).unwrap_or(Value::Null),
                    })
                })
                .collect();
            json!({
                "kind": node.kind,
                "fields": node.fields,
                "shape": node.shape,
                "shadow": node.shadow,
                "sockets": sockets,
                "next": node.next.map(|n| node_value(ws, n)).unwrap_or(Value::Null),
            })
        }

        let mut defines: Vec<NodeId> = Vec::new();
        let mut others: Vec<NodeId> = Vec::new();
        for id in self.roots() {
            let is_define = self
                .node(id)
                .map(|n| n.kind == crate::catalog::kinds::PROCEDURE_DEFINE)
                .unwrap_or(false);
            if is_define {
                defines.push(id);
            } else {
                others.push(id);
            }
        }
        defines.sort_by_key(|id| {
            self.node(*id)
                .and_then(|n| n.signature())
                .map(|s| s.name.clone())
                .unwrap_or_default()
        });

        let roots: Vec<serde_json::Value> = defines
            .into_iter()
            .chain(others)
            .map(|id| node_value(self, id))
            .collect();
        serde_json::json!({ "roots": roots })
    }
}

/// Id-insensitive comparison of two workspaces.
pub fn structural_eq(a: &Workspace, b: &Workspace) -> bool {
    a.canonical_form() == b.canonical_form()
}

//! Procedure signature shape: the state shared by a definition node and
//! every call site bound to it, plus the parameter edit dialog.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::kinds,
    error::TangleError,
    graph::{FieldValue, NodeId, Socket, Workspace},
    types::{SlotType, TypeSet},
};

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: SlotType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: SlotType) -> Parameter {
        Parameter {
            name: name.into(),
            ty,
        }
    }

    /// An untyped parameter accepts anything the type system allows.
    pub fn untyped(name: impl Into<String>) -> Parameter {
        Parameter::new(name, SlotType::Any)
    }
}

/// A procedure's complete interface. Stored on the definition node, cached
/// on every bound call site, and mirrored in the registry.
///
/// `return_type: None` makes the procedure (and its call sites) a
/// statement; `Some(_)` makes call sites expressions of that type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignatureState {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Option<SlotType>,
    pub is_generator: bool,
}

impl SignatureState {
    pub fn new(name: impl Into<String>) -> SignatureState {
        SignatureState {
            name: name.into(),
            ..SignatureState::default()
        }
    }

    pub fn with_params(mut self, params: Vec<Parameter>) -> SignatureState {
        self.params = params;
        self
    }

    pub fn returning(mut self, ty: SlotType) -> SignatureState {
        self.return_type = Some(ty);
        self
    }

    pub fn generator(mut self) -> SignatureState {
        self.is_generator = true;
        self
    }

    /// Argument sockets a call site carries under this signature:
    /// `ARG0..ARGn`, positionally typed by the parameter list.
    pub(crate) fn call_sockets(&self) -> Vec<Socket> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, param)| Socket::value(format!("ARG{i}"), TypeSet::single(param.ty)))
            .collect()
    }
}

/// A decompose/compose session for editing a definition's parameter list.
///
/// [`ParamDialog::open`] spawns a root marker whose `PARAMS` socket holds a
/// chain of parameter markers, one per declared parameter, each carrying
/// `NAME` and `TYPE` fields. [`ParamDialog::commit`] reads the edited chain
/// back into a parameter list and commits the updated signature through the
/// registry, which resynchronizes every call site.
#[derive(Debug)]
pub struct ParamDialog {
    target: NodeId,
    root: NodeId,
}

impl ParamDialog {
    pub fn open(ws: &mut Workspace, target: NodeId) -> Result<ParamDialog, TangleError> {
        let node = ws.require(target)?;
        if node.kind != kinds::PROCEDURE_DEFINE {
            return Err(TangleError::MalformedShapeState {
                kind: node.kind.clone(),
                detail: "only procedure definitions have parameter dialogs".to_string(),
            });
        }
        let params = node
            .signature()
            .map(|sig| sig.params.clone())
            .unwrap_or_default();

        let root = ws.create_node(kinds::PROCEDURE_PARAMS_ROOT)?;
        let mut tail: Option<NodeId> = None;
        for param in params {
            let marker = ws.create_node(kinds::PROCEDURE_PARAM_MARKER)?;
            ws.set_field(marker, "NAME", FieldValue::text(param.name))?;
            ws.set_field(marker, "TYPE", FieldValue::text(param.ty.tag_name()))?;
            match tail {
                None => ws.connect(root, "PARAMS", marker)?,
                Some(prev) => ws.link(prev, marker)?,
            }
            tail = Some(marker);
        }
        debug!("[ParamDialog::open] target {target}");
        Ok(ParamDialog { target, root })
    }

    /// The root marker whose `PARAMS` chain the host edits.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn commit(self, ws: &mut Workspace) -> Result<(), TangleError> {
        let mut params: Vec<Parameter> = Vec::new();
        let mut cursor = ws
            .require(self.root)?
            .socket("PARAMS")
            .and_then(|s| s.connection);
        while let Some(marker) = cursor {
            let node = ws.require(marker)?;
            if node.kind != kinds::PROCEDURE_PARAM_MARKER {
                return Err(TangleError::UnknownClauseKind(node.kind.clone()));
            }
            let name = node.text_field("NAME").to_string();
            let tag = node.text_field("TYPE");
            let ty = SlotType::parse_tag(tag).ok_or_else(|| {
                TangleError::MalformedShapeState {
                    kind: kinds::PROCEDURE_DEFINE.to_string(),
                    detail: format!("parameter '{name}' declares unknown type '{tag}'"),
                }
            })?;
            params.push(Parameter::new(name, ty));
            cursor = node.next;
        }

        let mut signature = ws
            .require(self.target)?
            .signature()
            .cloned()
            .ok_or_else(|| TangleError::MalformedShapeState {
                kind: kinds::PROCEDURE_DEFINE.to_string(),
                detail: "definition lost its signature during dialog".to_string(),
            })?;
        signature.params = params;
        ws.commit_signature(self.target, signature)?;
        ws.delete_subtree(self.root);
        debug!("[ParamDialog::commit] target {}", self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_sockets_positionally_typed() {
        let sig = SignatureState::new("area").with_params(vec![
            Parameter::new("width", SlotType::Number),
            Parameter::new("label", SlotType::String),
            Parameter::untyped("extra"),
        ]);
        let sockets = sig.call_sockets();
        assert_eq!(sockets.len(), 3);
        assert_eq!(sockets[0].name, "ARG0");
        assert_eq!(sockets[0].accepts, TypeSet::single(SlotType::Number));
        assert_eq!(sockets[1].accepts, TypeSet::single(SlotType::String));
        assert_eq!(sockets[2].accepts, TypeSet::single(SlotType::Any));
    }

    #[test]
    fn test_statement_signature_has_no_return() {
        let sig = SignatureState::new("greet");
        assert!(sig.return_type.is_none());
        assert!(!sig.is_generator);
        let sig = SignatureState::new("total").returning(SlotType::Number);
        assert_eq!(sig.return_type, Some(SlotType::Number));
    }
}

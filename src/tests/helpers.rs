//! Shared test utilities for workspace, generation, and parse testing.

use std::sync::Arc;

use crate::{
    catalog::{kinds, NodeCatalog},
    codegen::CodeGenerator,
    error::TangleError,
    graph::{FieldValue, NodeId, Workspace},
    parser::CodeParser,
    shape::{Parameter, SignatureState},
    types::SlotType,
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn catalog() -> Arc<NodeCatalog> {
    Arc::new(NodeCatalog::create())
}

pub fn workspace() -> Workspace {
    init_logging();
    Workspace::new(catalog())
}

pub fn number(ws: &mut Workspace, value: f64) -> NodeId {
    let id = ws.create_node(kinds::NUMBER_LITERAL).unwrap();
    ws.set_field(id, "VALUE", FieldValue::Number(value)).unwrap();
    id
}

pub fn string(ws: &mut Workspace, value: &str) -> NodeId {
    let id = ws.create_node(kinds::STRING_LITERAL).unwrap();
    ws.set_field(id, "VALUE", FieldValue::text(value)).unwrap();
    id
}

pub fn boolean(ws: &mut Workspace, value: bool) -> NodeId {
    let id = ws.create_node(kinds::BOOLEAN_LITERAL).unwrap();
    ws.set_field(id, "VALUE", FieldValue::Flag(value)).unwrap();
    id
}

pub fn variable(ws: &mut Workspace, name: &str) -> NodeId {
    let id = ws.create_node(kinds::VARIABLE_GET).unwrap();
    ws.set_field(id, "NAME", FieldValue::text(name)).unwrap();
    id
}

/// A minimal chainable statement for filling sequence sockets.
pub fn simple_statement(ws: &mut Workspace) -> NodeId {
    ws.create_node(kinds::BREAK_STATEMENT).unwrap()
}

/// A procedure definition committed with the given parameter types and
/// optional return type.
pub fn define_procedure(
    ws: &mut Workspace,
    name: &str,
    params: &[(&str, SlotType)],
    returns: Option<SlotType>,
) -> NodeId {
    let definition = ws.create_node(kinds::PROCEDURE_DEFINE).unwrap();
    let mut signature = SignatureState::new(name).with_params(
        params
            .iter()
            .map(|(name, ty)| Parameter::new(*name, *ty))
            .collect(),
    );
    signature.return_type = returns;
    ws.commit_signature(definition, signature).unwrap();
    definition
}

/// A call site bound to a registered procedure.
pub fn call_site(ws: &mut Workspace, name: &str) -> NodeId {
    let site = ws.create_node(kinds::PROCEDURE_CALL).unwrap();
    ws.bind_call_site(site, name).unwrap();
    site
}

pub fn generate(ws: &Workspace) -> String {
    CodeGenerator::new().generate(ws).unwrap()
}

pub async fn parse(source: &str) -> Result<Workspace, TangleError> {
    init_logging();
    CodeParser::new(catalog()).parse(source).await
}

/// The socket names of a node, in layout order.
pub fn socket_names(ws: &Workspace, id: NodeId) -> Vec<String> {
    ws.node(id)
        .unwrap()
        .sockets
        .iter()
        .map(|s| s.name.clone())
        .collect()
}

pub fn connection(ws: &Workspace, id: NodeId, socket: &str) -> Option<NodeId> {
    ws.node(id).unwrap().socket(socket).unwrap().connection
}

//! Signature commit semantics: registry bookkeeping, call-site
//! resynchronization, attachment-mode flips, and event ordering.

use test_log::test;

use crate::{
    catalog::kinds,
    error::TangleError,
    event::WorkspaceEvent,
    shape::{refresh_return_shape, Parameter, SignatureState},
    types::{SlotType, TypeSet},
};

use super::helpers::*;

#[test]
fn test_commit_registers_and_caches_signature() {
    let mut ws = workspace();
    let definition = define_procedure(
        &mut ws,
        "area",
        &[("width", SlotType::Number), ("height", SlotType::Number)],
        Some(SlotType::Number),
    );

    let entry = ws.procedures().get("area").unwrap();
    assert_eq!(entry.definition, definition);
    assert_eq!(entry.state.params.len(), 2);
    let cached = ws.node(definition).unwrap().signature().cloned().unwrap();
    assert_eq!(cached, entry.state);
}

#[test]
fn test_bound_call_site_adopts_layout_with_shadow_defaults() {
    let mut ws = workspace();
    define_procedure(&mut ws, "greet", &[("who", SlotType::String)], None);
    let site = call_site(&mut ws, "greet");

    assert_eq!(socket_names(&ws, site), vec!["ARG0"]);
    let arg = ws.node(site).unwrap().socket("ARG0").cloned().unwrap();
    assert_eq!(arg.accepts, TypeSet::single(SlotType::String));
    let shadow = arg.connection.unwrap();
    assert!(ws.node(shadow).unwrap().shadow);
    assert_eq!(ws.node(shadow).unwrap().kind, kinds::STRING_LITERAL);
}

#[test]
fn test_bind_to_unknown_procedure_is_refused() {
    let mut ws = workspace();
    let site = ws.create_node(kinds::PROCEDURE_CALL).unwrap();
    let err = ws.bind_call_site(site, "nowhere").unwrap_err();
    assert!(matches!(err, TangleError::NotFound(_)));
}

#[test]
fn test_param_retype_resyncs_every_call_site() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "emit", &[("value", SlotType::String)], None);

    // Three live call sites in different wiring states.
    let with_variable = call_site(&mut ws, "emit");
    let wired = variable(&mut ws, "message");
    ws.connect(with_variable, "ARG0", wired).unwrap();

    let with_literal = call_site(&mut ws, "emit");
    let literal = string(&mut ws, "hello");
    ws.connect(with_literal, "ARG0", literal).unwrap();

    let untouched = call_site(&mut ws, "emit");

    ws.commit_signature(
        definition,
        SignatureState::new("emit").with_params(vec![Parameter::new("value", SlotType::Number)]),
    )
    .unwrap();

    for site in [with_variable, with_literal, untouched] {
        let arg = ws.node(site).unwrap().socket("ARG0").cloned().unwrap();
        assert_eq!(arg.accepts, TypeSet::single(SlotType::Number));
    }
    // An untyped variable reference still satisfies the new socket.
    assert_eq!(connection(&ws, with_variable, "ARG0"), Some(wired));
    // The incompatible literal is detached, not destroyed, and the vacancy
    // is refilled with a shadow default of the new type.
    assert!(ws.node(literal).unwrap().parent.is_none());
    assert!(ws.roots().contains(&literal));
    let refill = connection(&ws, with_literal, "ARG0").unwrap();
    assert!(ws.node(refill).unwrap().shadow);
    assert_eq!(ws.node(refill).unwrap().kind, kinds::NUMBER_LITERAL);
    // The stale shadow string on the untouched site was deleted outright.
    let refill = connection(&ws, untouched, "ARG0").unwrap();
    assert_eq!(ws.node(refill).unwrap().kind, kinds::NUMBER_LITERAL);
}

#[test]
fn test_rename_with_live_call_sites_is_refused() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "jump", &[], None);
    let site = call_site(&mut ws, "jump");

    let err = ws
        .commit_signature(definition, SignatureState::new("leap"))
        .unwrap_err();
    assert_eq!(err, TangleError::DanglingProcedureReference("jump".into()));
    assert!(ws.procedures().contains("jump"));

    ws.remove_node(site).unwrap();
    ws.commit_signature(definition, SignatureState::new("leap"))
        .unwrap();
    assert!(!ws.procedures().contains("jump"));
    assert!(ws.procedures().contains("leap"));
}

#[test]
fn test_definition_removal_guarded_by_call_sites() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "spin", &[], None);
    let site = call_site(&mut ws, "spin");

    let err = ws.remove_node(definition).unwrap_err();
    assert_eq!(err, TangleError::DanglingProcedureReference("spin".into()));
    assert!(ws.node(definition).is_some());

    ws.remove_node(site).unwrap();
    ws.remove_node(definition).unwrap();
    assert!(!ws.procedures().contains("spin"));
}

#[test]
fn test_duplicate_name_refused_across_definitions() {
    let mut ws = workspace();
    define_procedure(&mut ws, "tick", &[], None);
    let other = ws.create_node(kinds::PROCEDURE_DEFINE).unwrap();
    let err = ws
        .commit_signature(other, SignatureState::new("tick"))
        .unwrap_err();
    assert_eq!(err, TangleError::DuplicateProcedure("tick".into()));
}

#[test]
fn test_return_type_flip_detaches_statement_sites() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "poll", &[], None);
    let site = call_site(&mut ws, "poll");
    assert!(ws.is_chainable(site).unwrap());

    let while_block = ws.create_node(kinds::WHILE_BLOCK).unwrap();
    ws.connect(while_block, "DO", site).unwrap();

    ws.commit_signature(
        definition,
        SignatureState::new("poll").returning(SlotType::Number),
    )
    .unwrap();
    assert!(ws.is_expression(site).unwrap());
    assert!(!ws.is_chainable(site).unwrap());
    // The site no longer belongs in a sequence socket.
    assert!(connection(&ws, while_block, "DO").is_none());
    assert!(ws.node(site).unwrap().parent.is_none());
}

#[test]
fn test_return_type_flip_detaches_expression_sites() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "score", &[], Some(SlotType::Number));
    let site = call_site(&mut ws, "score");
    let set = ws.create_node(kinds::VARIABLE_SET).unwrap();
    ws.connect(set, "VALUE", site).unwrap();

    ws.commit_signature(definition, SignatureState::new("score"))
        .unwrap();
    assert!(ws.is_chainable(site).unwrap());
    assert!(connection(&ws, set, "VALUE").is_none());
}

#[test]
fn test_commit_refreshes_return_sockets_in_body() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "total", &[], Some(SlotType::Number));
    let ret = ws.create_node(kinds::RETURN_STATEMENT).unwrap();
    ws.connect(definition, "BODY", ret).unwrap();
    refresh_return_shape(&mut ws, ret).unwrap();
    let value = number(&mut ws, 9.0);
    ws.connect(ret, "VALUE", value).unwrap();

    // Dropping the return type strips the value socket; the wired value
    // survives as a root.
    ws.commit_signature(definition, SignatureState::new("total"))
        .unwrap();
    assert!(ws.node(ret).unwrap().socket("VALUE").is_none());
    assert!(ws.node(value).unwrap().parent.is_none());

    // Restoring it brings the socket back, empty.
    ws.commit_signature(
        definition,
        SignatureState::new("total").returning(SlotType::Number),
    )
    .unwrap();
    assert!(connection(&ws, ret, "VALUE").is_none());
}

#[test]
fn test_procedure_changed_fires_once_after_resync() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "emit", &[], None);
    call_site(&mut ws, "emit");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    ws.observe(tx);
    ws.commit_signature(
        definition,
        SignatureState::new("emit").with_params(vec![Parameter::new("n", SlotType::Number)]),
    )
    .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let changed: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, WorkspaceEvent::ProcedureChanged(_, _)))
        .collect();
    assert_eq!(changed.len(), 1);
    // The signature event is the final word of the mutation: every layout
    // rebuild and shadow refill has already been announced.
    assert!(matches!(
        events.last(),
        Some(WorkspaceEvent::ProcedureChanged(name, state))
            if name == "emit" && state.params.len() == 1
    ));
}

#[test]
fn test_unregister_keeps_definition_node() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "idle", &[], None);
    ws.remove_procedure("idle").unwrap();
    assert!(!ws.procedures().contains("idle"));
    assert!(ws.node(definition).is_some());
}

//! Workspace editing rules and shape mutator behavior across modules:
//! connection checking, shadow replacement, clause layouts, and the
//! decompose/compose dialogs.

use test_log::test;

use crate::{
    catalog::kinds,
    error::TangleError,
    graph::{FieldValue, SocketRole},
    shape::{
        refresh_return_shape, BranchDialog, BranchState, CollectionItem, CollectionState,
        ShapeState,
    },
    types::SlotType,
};

use super::helpers::*;

// ----------------------------------------------------------------------
// Connection rules
// ----------------------------------------------------------------------

#[test]
fn test_value_socket_rejects_incompatible_type() {
    let mut ws = workspace();
    let while_block = ws.create_node(kinds::WHILE_BLOCK).unwrap();
    let text = string(&mut ws, "forever");
    let err = ws.connect(while_block, "COND", text).unwrap_err();
    assert!(matches!(err, TangleError::ConnectionIncompatible { .. }));
    assert!(err.is_recoverable());
    // The refused edit left both nodes untouched.
    assert!(connection(&ws, while_block, "COND").is_none());
    assert!(ws.node(text).unwrap().parent.is_none());
}

#[test]
fn test_sequence_socket_rejects_expressions() {
    let mut ws = workspace();
    let while_block = ws.create_node(kinds::WHILE_BLOCK).unwrap();
    let literal = number(&mut ws, 5.0);
    let err = ws.connect(while_block, "DO", literal).unwrap_err();
    assert!(matches!(err, TangleError::ConnectionIncompatible { .. }));
}

#[test]
fn test_occupied_socket_refuses_unless_shadow() {
    let mut ws = workspace();
    let set = ws.create_node(kinds::VARIABLE_SET).unwrap();
    let first = number(&mut ws, 1.0);
    ws.connect(set, "VALUE", first).unwrap();

    let second = number(&mut ws, 2.0);
    let err = ws.connect(set, "VALUE", second).unwrap_err();
    assert!(matches!(err, TangleError::SocketAlreadyOccupied { .. }));
    assert_eq!(connection(&ws, set, "VALUE"), Some(first));
}

#[test]
fn test_shadow_occupant_is_replaced_silently() {
    let mut ws = workspace();
    let set = ws.create_node(kinds::VARIABLE_SET).unwrap();
    let shadow = ws
        .attach_default_literal(set, "VALUE", SlotType::Number)
        .unwrap()
        .unwrap();
    assert!(ws.node(shadow).unwrap().shadow);

    let real = number(&mut ws, 42.0);
    ws.connect(set, "VALUE", real).unwrap();
    assert_eq!(connection(&ws, set, "VALUE"), Some(real));
    assert!(ws.node(shadow).is_none());
}

#[test]
fn test_connect_refuses_cycles() {
    let mut ws = workspace();
    let outer = ws.create_node(kinds::ARITHMETIC).unwrap();
    let inner = ws.create_node(kinds::ARITHMETIC).unwrap();
    ws.connect(outer, "A", inner).unwrap();
    let err = ws.connect(inner, "A", outer).unwrap_err();
    assert!(matches!(err, TangleError::ConnectionIncompatible { .. }));
}

#[test]
fn test_remove_node_heals_chain_and_detaches_children() {
    let mut ws = workspace();
    let while_block = ws.create_node(kinds::WHILE_BLOCK).unwrap();
    let first = simple_statement(&mut ws);
    let second = ws.create_node(kinds::CONTINUE_STATEMENT).unwrap();
    let third = simple_statement(&mut ws);
    ws.connect(while_block, "DO", first).unwrap();
    ws.link(first, second).unwrap();
    ws.link(second, third).unwrap();

    ws.remove_node(second).unwrap();
    assert_eq!(ws.node(first).unwrap().next, Some(third));
    assert_eq!(ws.node(third).unwrap().prev, Some(first));

    // Removing the head promotes its successor into the socket.
    ws.remove_node(first).unwrap();
    assert_eq!(connection(&ws, while_block, "DO"), Some(third));
    assert_eq!(ws.node(third).unwrap().prev, None);
}

// ----------------------------------------------------------------------
// Branch shape
// ----------------------------------------------------------------------

#[test]
fn test_branch_layout_order() {
    let mut ws = workspace();
    let branch = ws.create_node(kinds::IF_BLOCK).unwrap();
    assert_eq!(socket_names(&ws, branch), vec!["COND", "THEN"]);

    ws.set_shape(branch, ShapeState::Branch(BranchState::with_clauses(2, true)))
        .unwrap();
    assert_eq!(
        socket_names(&ws, branch),
        vec!["COND", "THEN", "IF1", "DO1", "IF2", "DO2", "ELSE0", "ELSE"]
    );
    let else0 = ws.node(branch).unwrap().socket("ELSE0").unwrap().role;
    assert_eq!(else0, SocketRole::Marker);
}

#[test]
fn test_else_marker_socket_never_connects() {
    let mut ws = workspace();
    let branch = ws.create_node(kinds::IF_BLOCK).unwrap();
    ws.set_shape(branch, ShapeState::Branch(BranchState::with_clauses(0, true)))
        .unwrap();
    let body = simple_statement(&mut ws);
    let err = ws.connect(branch, "ELSE0", body).unwrap_err();
    assert!(matches!(err, TangleError::ConnectionIncompatible { .. }));
    ws.connect(branch, "ELSE", body).unwrap();
}

#[test]
fn test_shape_rebuild_preserves_surviving_edges() {
    let mut ws = workspace();
    let branch = ws.create_node(kinds::IF_BLOCK).unwrap();
    ws.set_shape(branch, ShapeState::Branch(BranchState::with_clauses(1, true)))
        .unwrap();
    let cond = boolean(&mut ws, true);
    let body = simple_statement(&mut ws);
    let else_body = simple_statement(&mut ws);
    ws.connect(branch, "IF1", cond).unwrap();
    ws.connect(branch, "DO1", body).unwrap();
    ws.connect(branch, "ELSE", else_body).unwrap();

    // Dropping the else clause keeps the else-if edges and detaches the
    // else body as a root.
    ws.set_shape(branch, ShapeState::Branch(BranchState::with_clauses(1, false)))
        .unwrap();
    assert_eq!(connection(&ws, branch, "IF1"), Some(cond));
    assert_eq!(connection(&ws, branch, "DO1"), Some(body));
    assert!(ws.node(branch).unwrap().socket("ELSE").is_none());
    assert!(ws.node(else_body).unwrap().parent.is_none());
    assert!(ws.roots().contains(&else_body));
}

#[test]
fn test_branch_dialog_reorders_clauses_with_their_edges() {
    let mut ws = workspace();
    let branch = ws.create_node(kinds::IF_BLOCK).unwrap();
    ws.set_shape(branch, ShapeState::Branch(BranchState::with_clauses(2, false)))
        .unwrap();
    let first_cond = variable(&mut ws, "a");
    let second_cond = variable(&mut ws, "b");
    ws.connect(branch, "IF1", first_cond).unwrap();
    ws.connect(branch, "IF2", second_cond).unwrap();

    let dialog = BranchDialog::open(&mut ws, branch).unwrap();
    let root = dialog.root();
    let marker_a = connection(&ws, root, "CLAUSES").unwrap();
    let marker_b = ws.node(marker_a).unwrap().next.unwrap();

    // Swap the two else-if markers.
    ws.unlink(marker_a).unwrap();
    ws.disconnect(root, "CLAUSES").unwrap();
    ws.connect(root, "CLAUSES", marker_b).unwrap();
    ws.link(marker_b, marker_a).unwrap();
    dialog.commit(&mut ws).unwrap();

    assert_eq!(connection(&ws, branch, "IF1"), Some(second_cond));
    assert_eq!(connection(&ws, branch, "IF2"), Some(first_cond));
    // The markers themselves are gone.
    assert!(ws.node(root).is_none());
    assert!(ws.node(marker_a).is_none());
}

#[test]
fn test_branch_dialog_deleted_clause_orphans_its_children() {
    let mut ws = workspace();
    let branch = ws.create_node(kinds::IF_BLOCK).unwrap();
    ws.set_shape(branch, ShapeState::Branch(BranchState::with_clauses(2, true)))
        .unwrap();
    let kept = variable(&mut ws, "kept");
    let dropped = variable(&mut ws, "dropped");
    ws.connect(branch, "IF1", kept).unwrap();
    ws.connect(branch, "IF2", dropped).unwrap();

    let dialog = BranchDialog::open(&mut ws, branch).unwrap();
    let first_marker = connection(&ws, dialog.root(), "CLAUSES").unwrap();
    let second_marker = ws.node(first_marker).unwrap().next.unwrap();
    ws.remove_node(second_marker).unwrap();
    dialog.commit(&mut ws).unwrap();

    let state = *ws.node(branch).unwrap().branch_state().unwrap();
    assert_eq!(state, BranchState::with_clauses(1, true));
    assert_eq!(connection(&ws, branch, "IF1"), Some(kept));
    // The deleted clause's condition survives as a detached root.
    assert!(ws.node(dropped).unwrap().parent.is_none());
    assert!(ws.roots().contains(&dropped));
}

#[test]
fn test_branch_dialog_rejects_foreign_marker() {
    let mut ws = workspace();
    let branch = ws.create_node(kinds::IF_BLOCK).unwrap();
    ws.set_shape(branch, ShapeState::Branch(BranchState::with_clauses(1, false)))
        .unwrap();

    let dialog = BranchDialog::open(&mut ws, branch).unwrap();
    let marker = connection(&ws, dialog.root(), "CLAUSES").unwrap();
    let foreign = ws.create_node(kinds::PROCEDURE_PARAM_MARKER).unwrap();
    ws.link(marker, foreign).unwrap();

    let err = dialog.commit(&mut ws).unwrap_err();
    assert_eq!(
        err,
        TangleError::UnknownClauseKind(kinds::PROCEDURE_PARAM_MARKER.to_string())
    );
    assert!(!err.is_recoverable());
}

// ----------------------------------------------------------------------
// Collection shape
// ----------------------------------------------------------------------

#[test]
fn test_empty_collection_carries_placeholder_marker() {
    let mut ws = workspace();
    let list = ws.create_node(kinds::COLLECTION_LITERAL).unwrap();
    assert_eq!(socket_names(&ws, list), vec!["EMPTY"]);
    let item = number(&mut ws, 1.0);
    assert!(ws.connect(list, "EMPTY", item).is_err());
}

#[test]
fn test_collection_resize_detaches_dropped_items() {
    let mut ws = workspace();
    let list = ws.create_node(kinds::COLLECTION_LITERAL).unwrap();
    ws.set_shape(list, ShapeState::Collection(CollectionState::singles(2)))
        .unwrap();
    let first = number(&mut ws, 1.0);
    let second = number(&mut ws, 2.0);
    ws.connect(list, "ITEM0", first).unwrap();
    ws.connect(list, "ITEM1", second).unwrap();

    ws.set_shape(list, ShapeState::Collection(CollectionState::singles(1)))
        .unwrap();
    assert_eq!(connection(&ws, list, "ITEM0"), Some(first));
    assert!(ws.node(second).unwrap().parent.is_none());

    ws.set_shape(list, ShapeState::Collection(CollectionState::default()))
        .unwrap();
    assert_eq!(socket_names(&ws, list), vec!["EMPTY"]);
    assert!(ws.node(first).unwrap().parent.is_none());
}

#[test]
fn test_spread_item_requires_iterable_value() {
    let mut ws = workspace();
    let list = ws.create_node(kinds::COLLECTION_LITERAL).unwrap();
    ws.set_shape(
        list,
        ShapeState::Collection(CollectionState::of(vec![CollectionItem::Spread])),
    )
    .unwrap();

    let scalar = number(&mut ws, 7.0);
    assert!(ws.connect(list, "ITEM0", scalar).is_err());

    let inner = ws.create_node(kinds::COLLECTION_LITERAL).unwrap();
    ws.connect(list, "ITEM0", inner).unwrap();
    let text = string(&mut ws, "abc");
    // Strings are iterable too; swap in after detaching the array.
    ws.disconnect(list, "ITEM0").unwrap();
    ws.connect(list, "ITEM0", text).unwrap();
}

// ----------------------------------------------------------------------
// Return shape
// ----------------------------------------------------------------------

#[test]
fn test_return_shape_follows_enclosing_signature() {
    let mut ws = workspace();
    let definition = define_procedure(&mut ws, "total", &[], Some(SlotType::Number));
    let ret = ws.create_node(kinds::RETURN_STATEMENT).unwrap();
    assert!(ws.node(ret).unwrap().socket("VALUE").is_none());

    ws.connect(definition, "BODY", ret).unwrap();
    refresh_return_shape(&mut ws, ret).unwrap();
    let socket = ws.node(ret).unwrap().socket("VALUE").cloned().unwrap();
    assert_eq!(socket.accepts, crate::types::TypeSet::single(SlotType::Number));

    // Outside any definition the socket disappears again.
    ws.disconnect(definition, "BODY").unwrap();
    refresh_return_shape(&mut ws, ret).unwrap();
    assert!(ws.node(ret).unwrap().socket("VALUE").is_none());
}

// ----------------------------------------------------------------------
// Serialization
// ----------------------------------------------------------------------

#[test]
fn test_snapshot_round_trip_preserves_shapes_and_edges() {
    let mut ws = workspace();
    let branch = ws.create_node(kinds::IF_BLOCK).unwrap();
    ws.set_shape(branch, ShapeState::Branch(BranchState::with_clauses(1, true)))
        .unwrap();
    let cond = boolean(&mut ws, true);
    ws.connect(branch, "COND", cond).unwrap();
    let definition = define_procedure(&mut ws, "step", &[("n", SlotType::Number)], None);
    let site = call_site(&mut ws, "step");

    let json = ws.to_json().unwrap();
    let restored = crate::graph::Workspace::from_json(catalog(), &json).unwrap();
    assert!(crate::graph::structural_eq(&ws, &restored));
    assert_eq!(restored.procedures().call_sites("step"), vec![site]);
    assert_eq!(
        restored.procedures().get("step").map(|e| e.definition),
        Some(definition)
    );
}

#[test]
fn test_snapshot_with_unknown_kind_is_rejected() {
    let mut ws = workspace();
    let declare = ws.create_node(kinds::VARIABLE_DECLARE).unwrap();
    ws.set_field(declare, "NAME", FieldValue::text("score"))
        .unwrap();
    let json = ws.to_json().unwrap().replace("variable_declare", "mystery_kind");
    let err = crate::graph::Workspace::from_json(catalog(), &json).unwrap_err();
    assert!(matches!(err, TangleError::UnknownNodeKind(_)));
}

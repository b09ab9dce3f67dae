//! AST-to-workspace instantiation.
//!
//! The builder walks the restricted AST in source order and creates graph
//! nodes through the same `Workspace` mutation primitives the host uses,
//! connecting children via the same socket names the generator reads. Names
//! are collected incrementally as declarations are encountered, so a
//! reference ahead of its declaration is rejected — a documented limitation,
//! not a defect.

use std::collections::HashSet;

use crate::{
    catalog::{kinds, MATH_BINARY_FUNCTIONS, MATH_UNARY_FUNCTIONS},
    error::TangleError,
    graph::{FieldValue, NodeId, SocketRole, Workspace},
    shape::{
        BranchState, CollectionItem, CollectionState, Parameter, ReturnShape, ShapeState,
        SignatureState,
    },
    types::{SlotType, TypeSet},
};

use super::ast::{Expr, Item, Pos, ProcedureDecl, Script, Stmt, UnaryOp};

pub(crate) struct GraphBuilder<'a> {
    ws: &'a mut Workspace,
    /// One scope per enclosing procedure, innermost last; index 0 is the
    /// top level. Declarations land in the innermost scope and stay there,
    /// matching the source-order name collection the original performs.
    scopes: Vec<HashSet<String>>,
    /// `(return type, is_generator)` of the enclosing procedure, if any.
    enclosing: Option<(Option<SlotType>, bool)>,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(ws: &'a mut Workspace) -> GraphBuilder<'a> {
        GraphBuilder {
            ws,
            scopes: vec![HashSet::new()],
            enclosing: None,
        }
    }

    /// Build the whole script. Procedures hoist to their own roots;
    /// top-level statements form one chain in source order.
    pub(crate) fn build(&mut self, script: &Script) -> Result<(), TangleError> {
        let mut tail: Option<NodeId> = None;
        for item in &script.items {
            match item {
                Item::Procedure(decl) => self.procedure(decl)?,
                Item::Statement(stmt) => {
                    let id = self.statement(stmt)?;
                    if let Some(prev) = tail {
                        self.ws.link(prev, id)?;
                    }
                    tail = Some(id);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Declarations and scopes
    // ------------------------------------------------------------------

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn resolve_tag(tag: &str, pos: Pos) -> Result<SlotType, TangleError> {
        SlotType::parse_tag(tag)
            .ok_or_else(|| TangleError::unsupported(format!("type tag '{tag}'"), pos.line, pos.column))
    }

    fn procedure(&mut self, decl: &ProcedureDecl) -> Result<(), TangleError> {
        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let ty = match &param.ty {
                Some(tag) => Self::resolve_tag(tag, param.pos)?,
                None => SlotType::Any,
            };
            params.push(Parameter::new(param.name.clone(), ty));
        }
        let return_type = match &decl.returns {
            Some(tag) => Some(Self::resolve_tag(tag, decl.pos)?),
            None => None,
        };

        let definition = self.ws.create_node(kinds::PROCEDURE_DEFINE)?;
        let mut signature = SignatureState::new(decl.name.clone()).with_params(params);
        signature.return_type = return_type;
        signature.is_generator = decl.is_generator;
        self.ws.commit_signature(definition, signature)?;

        let mut scope = HashSet::new();
        for param in &decl.params {
            scope.insert(param.name.clone());
        }
        self.scopes.push(scope);
        let outer = self.enclosing.replace((return_type, decl.is_generator));
        let body = self.chain(&decl.body);
        self.enclosing = outer;
        self.scopes.pop();
        if let Some(first) = body? {
            self.ws.connect(definition, "BODY", first)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Build a statement list into a linked chain, returning its head.
    fn chain(&mut self, stmts: &[Stmt]) -> Result<Option<NodeId>, TangleError> {
        let mut first = None;
        let mut tail: Option<NodeId> = None;
        for stmt in stmts {
            let id = self.statement(stmt)?;
            match tail {
                Some(prev) => self.ws.link(prev, id)?,
                None => first = Some(id),
            }
            tail = Some(id);
        }
        Ok(first)
    }

    fn connect_body(
        &mut self,
        parent: NodeId,
        socket: &str,
        stmts: &[Stmt],
    ) -> Result<(), TangleError> {
        if let Some(first) = self.chain(stmts)? {
            self.ws.connect(parent, socket, first)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<NodeId, TangleError> {
        match stmt {
            Stmt::Declare { name, ty, pos } => {
                let tag = match ty {
                    Some(tag) => {
                        Self::resolve_tag(tag, *pos)?;
                        tag.clone()
                    }
                    None => "Any".to_string(),
                };
                let id = self.ws.create_node(kinds::VARIABLE_DECLARE)?;
                self.ws.set_field(id, "NAME", FieldValue::text(name.clone()))?;
                self.ws.set_field(id, "TYPE", FieldValue::text(tag))?;
                self.declare(name);
                Ok(id)
            }
            Stmt::Assign { name, value, pos } => {
                if !self.is_declared(name) {
                    return Err(TangleError::undefined(name.clone(), pos.line, pos.column));
                }
                let id = self.ws.create_node(kinds::VARIABLE_SET)?;
                self.ws.set_field(id, "NAME", FieldValue::text(name.clone()))?;
                let value = self.expression(value)?;
                self.ws.connect(id, "VALUE", value)?;
                Ok(id)
            }
            Stmt::If {
                arms, else_body, ..
            } => {
                let id = self.ws.create_node(kinds::IF_BLOCK)?;
                let state =
                    BranchState::with_clauses(arms.len().saturating_sub(1), else_body.is_some());
                self.ws.set_shape(id, ShapeState::Branch(state))?;
                for (index, (cond, body)) in arms.iter().enumerate() {
                    let (cond_socket, body_socket) = if index == 0 {
                        ("COND".to_string(), "THEN".to_string())
                    } else {
                        (format!("IF{index}"), format!("DO{index}"))
                    };
                    let cond = self.expression(cond)?;
                    self.ws.connect(id, &cond_socket, cond)?;
                    self.connect_body(id, &body_socket, body)?;
                }
                if let Some(body) = else_body {
                    self.connect_body(id, "ELSE", body)?;
                }
                Ok(id)
            }
            Stmt::While { cond, body, .. } => {
                let id = self.ws.create_node(kinds::WHILE_BLOCK)?;
                let cond = self.expression(cond)?;
                self.ws.connect(id, "COND", cond)?;
                self.connect_body(id, "DO", body)?;
                Ok(id)
            }
            Stmt::Repeat {
                var, limit, body, ..
            } => {
                let id = self.ws.create_node(kinds::REPEAT_BLOCK)?;
                self.ws.set_field(id, "VAR", FieldValue::text(var.clone()))?;
                let limit = self.expression(limit)?;
                self.ws.connect(id, "TIMES", limit)?;
                self.declare(var);
                self.connect_body(id, "DO", body)?;
                Ok(id)
            }
            Stmt::ForOf {
                var, iter, body, ..
            } => {
                let id = self.ws.create_node(kinds::FOR_EACH_BLOCK)?;
                self.ws.set_field(id, "VAR", FieldValue::text(var.clone()))?;
                let iter = self.expression(iter)?;
                self.ws.connect(id, "LIST", iter)?;
                self.declare(var);
                self.connect_body(id, "DO", body)?;
                Ok(id)
            }
            Stmt::Try {
                body,
                error_name,
                catch,
                finally,
                ..
            } => {
                let id = self.ws.create_node(kinds::TRY_BLOCK)?;
                self.ws
                    .set_field(id, "ERROR", FieldValue::text(error_name.clone()))?;
                self.connect_body(id, "TRY", body)?;
                self.declare(error_name);
                self.connect_body(id, "CATCH", catch)?;
                if let Some(body) = finally {
                    self.connect_body(id, "FINALLY", body)?;
                }
                Ok(id)
            }
            Stmt::Return { value, pos } => self.return_like(kinds::RETURN_STATEMENT, value, *pos),
            Stmt::Yield { value, pos } => {
                match self.enclosing {
                    Some((_, true)) => {}
                    Some((_, false)) => {
                        return Err(TangleError::unsupported(
                            "'yield' outside a generator",
                            pos.line,
                            pos.column,
                        ))
                    }
                    None => {
                        return Err(TangleError::unsupported(
                            "'yield' outside a procedure",
                            pos.line,
                            pos.column,
                        ))
                    }
                }
                self.return_like(kinds::YIELD_STATEMENT, value, *pos)
            }
            Stmt::Break { .. } => self.ws.create_node(kinds::BREAK_STATEMENT),
            Stmt::Continue { .. } => self.ws.create_node(kinds::CONTINUE_STATEMENT),
            Stmt::Throw { value, .. } => {
                let id = self.ws.create_node(kinds::THROW_STATEMENT)?;
                let value = self.expression(value)?;
                self.ws.connect(id, "VALUE", value)?;
                Ok(id)
            }
            Stmt::Call { call, pos } => {
                let id = self.call(call)?;
                if !self.ws.is_chainable(id)? {
                    return Err(TangleError::unsupported(
                        "value-producing call as a statement",
                        pos.line,
                        pos.column,
                    ));
                }
                Ok(id)
            }
        }
    }

    fn return_like(
        &mut self,
        kind: &str,
        value: &Option<Expr>,
        pos: Pos,
    ) -> Result<NodeId, TangleError> {
        let Some((return_type, _)) = self.enclosing else {
            return Err(TangleError::unsupported(
                format!("'{}' outside a procedure", keyword_of(kind)),
                pos.line,
                pos.column,
            ));
        };
        let id = self.ws.create_node(kind)?;
        if let Some(value) = value {
            let Some(expects) = return_type else {
                return Err(TangleError::unsupported(
                    format!(
                        "'{}' with a value in a procedure without a declared return type",
                        keyword_of(kind)
                    ),
                    pos.line,
                    pos.column,
                ));
            };
            self.ws.set_shape(
                id,
                ShapeState::Return(ReturnShape {
                    expects: Some(expects),
                }),
            )?;
            let value = self.expression(value)?;
            self.ws.connect(id, "VALUE", value)?;
        }
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self, expr: &Expr) -> Result<NodeId, TangleError> {
        match expr {
            Expr::Number { value, .. } => self.number_literal(*value),
            Expr::Str { value, .. } => {
                let id = self.ws.create_node(kinds::STRING_LITERAL)?;
                self.ws.set_field(id, "VALUE", FieldValue::text(value.clone()))?;
                Ok(id)
            }
            Expr::Bool { value, .. } => {
                let id = self.ws.create_node(kinds::BOOLEAN_LITERAL)?;
                self.ws.set_field(id, "VALUE", FieldValue::Flag(*value))?;
                Ok(id)
            }
            Expr::Null { .. } => self.ws.create_node(kinds::NULL_LITERAL),
            Expr::Ident { name, pos } => {
                if !self.is_declared(name) {
                    return Err(TangleError::undefined(name.clone(), pos.line, pos.column));
                }
                let id = self.ws.create_node(kinds::VARIABLE_GET)?;
                self.ws.set_field(id, "NAME", FieldValue::text(name.clone()))?;
                Ok(id)
            }
            Expr::This { pos } => Err(TangleError::unsupported(
                "'this' outside a method call",
                pos.line,
                pos.column,
            )),
            // A negated numeric literal folds into the literal; the
            // generator spells negative numbers the same way back.
            Expr::Unary {
                op: UnaryOp::Negate,
                operand,
                ..
            } if matches!(**operand, Expr::Number { .. }) => {
                let Expr::Number { value, .. } = **operand else {
                    unreachable!()
                };
                self.number_literal(-value)
            }
            Expr::Unary { op, operand, .. } => {
                let kind = match op {
                    UnaryOp::Not => kinds::LOGIC_NOT,
                    UnaryOp::Negate => kinds::NUMERIC_NEGATE,
                    UnaryOp::Plus => kinds::NUMERIC_PLUS,
                };
                let id = self.ws.create_node(kind)?;
                let operand = self.expression(operand)?;
                self.ws.connect(id, "VALUE", operand)?;
                Ok(id)
            }
            Expr::Binary { op, lhs, rhs, pos } => {
                let kind = match op.as_str() {
                    "+" | "-" | "*" | "/" | "%" => kinds::ARITHMETIC,
                    "==" | "!=" | "<" | "<=" | ">" | ">=" => kinds::COMPARISON,
                    "&&" | "||" => kinds::LOGICAL,
                    other => {
                        return Err(TangleError::unsupported(
                            format!("operator '{other}'"),
                            pos.line,
                            pos.column,
                        ))
                    }
                };
                let id = self.ws.create_node(kind)?;
                self.ws.set_field(id, "OP", FieldValue::text(op.clone()))?;
                let lhs = self.expression(lhs)?;
                let rhs = self.expression(rhs)?;
                if kind == kinds::ARITHMETIC && op == "+" {
                    self.rederive_concat_sockets(id, lhs, rhs)?;
                }
                self.connect_operand(id, "A", lhs, op, *pos)?;
                self.connect_operand(id, "B", rhs, op, *pos)?;
                Ok(id)
            }
            Expr::Array { items, .. } => {
                let id = self.ws.create_node(kinds::COLLECTION_LITERAL)?;
                let state = CollectionState::of(
                    items
                        .iter()
                        .map(|(spread, _)| {
                            if *spread {
                                CollectionItem::Spread
                            } else {
                                CollectionItem::Single
                            }
                        })
                        .collect(),
                );
                self.ws.set_shape(id, ShapeState::Collection(state))?;
                for (index, (_, item)) in items.iter().enumerate() {
                    let child = self.expression(item)?;
                    self.ws.connect(id, &format!("ITEM{index}"), child)?;
                }
                Ok(id)
            }
            Expr::Member {
                object, property, ..
            } => {
                let id = self.ws.create_node(kinds::MEMBER_ACCESS)?;
                self.ws
                    .set_field(id, "PROPERTY", FieldValue::text(property.clone()))?;
                let object = self.expression(object)?;
                self.ws.connect(id, "OBJECT", object)?;
                Ok(id)
            }
            Expr::Index { object, index, .. } => {
                let id = self.ws.create_node(kinds::INDEX_ACCESS)?;
                let object = self.expression(object)?;
                self.ws.connect(id, "OBJECT", object)?;
                let index = self.expression(index)?;
                self.ws.connect(id, "INDEX", index)?;
                Ok(id)
            }
            Expr::Call { pos, .. } => {
                let id = self.call(expr)?;
                if !self.ws.is_expression(id)? {
                    return Err(TangleError::unsupported(
                        "statement call in an expression",
                        pos.line,
                        pos.column,
                    ));
                }
                Ok(id)
            }
        }
    }

    fn number_literal(&mut self, value: f64) -> Result<NodeId, TangleError> {
        let id = self.ws.create_node(kinds::NUMBER_LITERAL)?;
        self.ws.set_field(id, "VALUE", FieldValue::Number(value))?;
        Ok(id)
    }

    /// `+` doubles as concatenation: when an operand's inferred type offers
    /// a string, both operand sockets are re-derived to admit one.
    fn rederive_concat_sockets(
        &mut self,
        node: NodeId,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<(), TangleError> {
        let string = TypeSet::single(SlotType::String);
        let mut offers_string = false;
        for operand in [lhs, rhs] {
            match self.ws.output_type(operand)? {
                // An unrestricted output gives nothing to infer from.
                TypeSet::Anything => {}
                offered => offers_string |= string.accepts(&offered),
            }
        }
        if offers_string {
            let widened = TypeSet::of(&[SlotType::Number, SlotType::String]);
            self.ws.retype_socket(node, "A", widened)?;
            self.ws.retype_socket(node, "B", widened)?;
        }
        Ok(())
    }

    /// Operand type mismatches surface as located parse errors here, not as
    /// the edit refusal they would be inside the workspace.
    fn connect_operand(
        &mut self,
        node: NodeId,
        socket: &str,
        child: NodeId,
        op: &str,
        pos: Pos,
    ) -> Result<(), TangleError> {
        self.ws.connect(node, socket, child).map_err(|err| match err {
            TangleError::ConnectionIncompatible { detail, .. } => TangleError::unsupported(
                format!("operand of '{op}' ({detail})"),
                pos.line,
                pos.column,
            ),
            other => other,
        })
    }

    // ------------------------------------------------------------------
    // The call-shape whitelist
    // ------------------------------------------------------------------

    /// Instantiate one of the closed set of call shapes: `this.<method>`
    /// matching a catalog actor kind, `Math.<fn>`, the fixed constructors
    /// and coercions, or a user-procedure call. Anything else is rejected.
    fn call(&mut self, expr: &Expr) -> Result<NodeId, TangleError> {
        let Expr::Call { callee, args, pos } = expr else {
            return Err(TangleError::unsupported(
                "call shape",
                expr.pos().line,
                expr.pos().column,
            ));
        };
        match &**callee {
            Expr::Member {
                object, property, ..
            } if matches!(**object, Expr::This { .. }) => self.actor_call(property, args, *pos),
            Expr::Member {
                object, property, ..
            } if matches!(**object, Expr::Ident { ref name, .. } if name == "Math") => {
                self.math_call(property, args, *pos)
            }
            Expr::Ident { name, pos } => match name.as_str() {
                "rgb" => {
                    self.expect_arity("rgb", args, 3, *pos)?;
                    let id = self.ws.create_node(kinds::COLOR_RGB)?;
                    for (socket, arg) in ["R", "G", "B"].iter().zip(args) {
                        let child = self.expression(arg)?;
                        self.ws.connect(id, socket, child)?;
                    }
                    Ok(id)
                }
                "sprite" => {
                    self.expect_arity("sprite", args, 1, *pos)?;
                    let Expr::Str { value, .. } = &args[0] else {
                        return Err(TangleError::unsupported(
                            "non-literal sprite name",
                            pos.line,
                            pos.column,
                        ));
                    };
                    let id = self.ws.create_node(kinds::SPRITE_REF)?;
                    self.ws.set_field(id, "NAME", FieldValue::text(value.clone()))?;
                    Ok(id)
                }
                "Number" => {
                    self.expect_arity("Number", args, 1, *pos)?;
                    let id = self.ws.create_node(kinds::COERCE_NUMBER)?;
                    let child = self.expression(&args[0])?;
                    self.ws.connect(id, "VALUE", child)?;
                    Ok(id)
                }
                "String" => {
                    self.expect_arity("String", args, 1, *pos)?;
                    let id = self.ws.create_node(kinds::COERCE_STRING)?;
                    let child = self.expression(&args[0])?;
                    self.ws.connect(id, "VALUE", child)?;
                    Ok(id)
                }
                _ => self.procedure_call(name, args, *pos),
            },
            _ => Err(TangleError::unsupported(
                "computed call target",
                pos.line,
                pos.column,
            )),
        }
    }

    fn actor_call(&mut self, method: &str, args: &[Expr], pos: Pos) -> Result<NodeId, TangleError> {
        let spec = self
            .ws
            .catalog()
            .actor_kind(method)
            .ok_or_else(|| {
                TangleError::unsupported(format!("actor method '{method}'"), pos.line, pos.column)
            })?;
        let kind = spec.name;
        let sockets: Vec<&'static str> = spec
            .sockets
            .iter()
            .filter(|s| s.role == SocketRole::Value)
            .map(|s| s.name)
            .collect();
        let fields: Vec<&'static str> = spec.fields.iter().map(|f| f.name).collect();

        let id = self.ws.create_node(kind)?;
        if sockets.is_empty() {
            // Field-backed kinds (resource pickers) take string literals.
            self.expect_arity(method, args, fields.len(), pos)?;
            for (field, arg) in fields.iter().zip(args) {
                let Expr::Str { value, .. } = arg else {
                    return Err(TangleError::unsupported(
                        format!("non-literal argument to '{method}'"),
                        pos.line,
                        pos.column,
                    ));
                };
                self.ws.set_field(id, field, FieldValue::text(value.clone()))?;
            }
        } else {
            self.expect_arity(method, args, sockets.len(), pos)?;
            for (socket, arg) in sockets.iter().zip(args) {
                let child = self.expression(arg)?;
                self.ws.connect(id, socket, child)?;
            }
        }
        Ok(id)
    }

    fn math_call(&mut self, function: &str, args: &[Expr], pos: Pos) -> Result<NodeId, TangleError> {
        if MATH_UNARY_FUNCTIONS.contains(&function) {
            self.expect_arity(function, args, 1, pos)?;
            let id = self.ws.create_node(kinds::MATH_UNARY)?;
            self.ws.set_field(id, "FN", FieldValue::text(function))?;
            let arg = self.expression(&args[0])?;
            self.ws.connect(id, "ARG", arg)?;
            Ok(id)
        } else if MATH_BINARY_FUNCTIONS.contains(&function) {
            self.expect_arity(function, args, 2, pos)?;
            let id = self.ws.create_node(kinds::MATH_BINARY)?;
            self.ws.set_field(id, "FN", FieldValue::text(function))?;
            let a = self.expression(&args[0])?;
            self.ws.connect(id, "A", a)?;
            let b = self.expression(&args[1])?;
            self.ws.connect(id, "B", b)?;
            Ok(id)
        } else {
            Err(TangleError::unsupported(
                format!("math function '{function}'"),
                pos.line,
                pos.column,
            ))
        }
    }

    /// A call naming a procedure declared earlier in the source. Later
    /// declarations do not resolve here.
    fn procedure_call(&mut self, name: &str, args: &[Expr], pos: Pos) -> Result<NodeId, TangleError> {
        let params = match self.ws.procedures().signature(name) {
            Some(signature) => signature.params.len(),
            None => return Err(TangleError::undefined(name, pos.line, pos.column)),
        };
        self.expect_arity(name, args, params, pos)?;
        let id = self.ws.create_node(kinds::PROCEDURE_CALL)?;
        self.ws.bind_call_site(id, name)?;
        for (index, arg) in args.iter().enumerate() {
            let child = self.expression(arg)?;
            self.ws.connect(id, &format!("ARG{index}"), child)?;
        }
        Ok(id)
    }

    fn expect_arity(
        &self,
        name: &str,
        args: &[Expr],
        expected: usize,
        pos: Pos,
    ) -> Result<(), TangleError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(TangleError::unsupported(
                format!("'{name}' with {} arguments (expected {expected})", args.len()),
                pos.line,
                pos.column,
            ))
        }
    }
}

fn keyword_of(kind: &str) -> &'static str {
    if kind == kinds::YIELD_STATEMENT {
        "yield"
    } else {
        "return"
    }
}

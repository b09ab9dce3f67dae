//! Per-kind rendering rules: one statement or expression rule for every
//! built-in kind, plus the shared `this.<method>(...)` rule for actor kinds.
//!
//! Rendering is total over invariant-satisfying graphs. An unconnected value
//! socket renders a type-appropriate default literal, never a gap, so every
//! emitted program is syntactically complete.

use std::fmt::Write;

use crate::{
    catalog::{kinds, KindMode, RenderRule},
    error::TangleError,
    graph::{Node, NodeId, Socket, SocketRole, Workspace},
    types::{SlotType, TypeSet},
};

use super::{
    names::NameTable,
    precedence::{binary_op, wrap, Precedence, Rendered},
    GeneratorConfig,
};

pub(crate) struct Emitter<'a> {
    ws: &'a Workspace,
    config: &'a GeneratorConfig,
    names: NameTable,
    out: String,
    indent: usize,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(ws: &'a Workspace, config: &'a GeneratorConfig) -> Emitter<'a> {
        Emitter {
            ws,
            config,
            names: NameTable::new(),
            out: String::new(),
            indent: 0,
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(&self.config.indent);
        }
    }

    fn node(&self, id: NodeId) -> Result<&'a Node, TangleError> {
        self.ws
            .node(id)
            .ok_or_else(|| TangleError::MalformedGraph(format!("missing node {id}")))
    }

    fn socket(&self, node: &'a Node, name: &str) -> Result<&'a Socket, TangleError> {
        node.socket(name).ok_or_else(|| {
            TangleError::MalformedGraph(format!(
                "'{}' node {} lacks required socket '{name}'",
                node.kind, node.id
            ))
        })
    }

    fn variable(&mut self, name: &str) -> String {
        self.names.claim(&format!("var:{name}"), name)
    }

    fn procedure(&mut self, name: &str) -> String {
        self.names.claim(&format!("proc:{name}"), name)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Emit a whole statement chain starting at `first`.
    pub(crate) fn emit_chain(&mut self, first: NodeId) -> Result<(), TangleError> {
        let mut cursor = Some(first);
        while let Some(id) = cursor {
            let node = self.node(id)?;
            self.emit_statement(node)?;
            cursor = node.next;
        }
        Ok(())
    }

    /// One `{ ... }` block fed by a sequence socket, loop-pause aware.
    fn emit_block(&mut self, node: &'a Node, socket_name: &str, is_loop: bool) -> Result<(), TangleError> {
        self.out.push_str("{\n");
        self.indent += 1;
        if let Some(first) = self.socket(node, socket_name)?.connection {
            self.emit_chain(first)?;
        }
        if is_loop {
            if let Some(pause) = &self.config.loop_pause {
                self.write_indent();
                writeln!(self.out, "{pause}();")?;
            }
        }
        self.indent -= 1;
        self.write_indent();
        self.out.push('}');
        Ok(())
    }

    pub(crate) fn emit_statement(&mut self, node: &'a Node) -> Result<(), TangleError> {
        let spec = self
            .ws
            .catalog()
            .get(&node.kind)
            .ok_or_else(|| TangleError::UnknownNodeKind(node.kind.clone()))?;
        if let RenderRule::ActorMethod(method) = &spec.render {
            self.write_indent();
            let call = self.render_actor_call(node, method)?;
            writeln!(self.out, "{call};")?;
            return Ok(());
        }

        self.write_indent();
        match node.kind.as_str() {
            kinds::VARIABLE_DECLARE => {
                let name = self.variable(node.text_field("NAME"));
                match node.text_field("TYPE") {
                    "" | "Any" => writeln!(self.out, "let {name};")?,
                    tag => writeln!(self.out, "let /*type:{tag}*/ {name};")?,
                }
            }
            kinds::VARIABLE_SET => {
                let name = self.variable(node.text_field("NAME"));
                let value = self.render_slot(node, "VALUE", Precedence::None, None)?;
                writeln!(self.out, "{name} = {value};")?;
            }
            kinds::IF_BLOCK => {
                let cond = self.render_slot(node, "COND", Precedence::None, None)?;
                write!(self.out, "if ({cond}) ")?;
                self.emit_block(node, "THEN", false)?;
                let state = node.branch_state().copied().unwrap_or_default();
                for i in 1..=state.else_if_count {
                    let cond = self.render_slot(node, &format!("IF{i}"), Precedence::None, None)?;
                    write!(self.out, " else if ({cond}) ")?;
                    self.emit_block(node, &format!("DO{i}"), false)?;
                }
                if state.has_else {
                    self.out.push_str(" else ");
                    self.emit_block(node, "ELSE", false)?;
                }
                self.out.push('\n');
            }
            kinds::WHILE_BLOCK => {
                let cond = self.render_slot(node, "COND", Precedence::None, None)?;
                write!(self.out, "while ({cond}) ")?;
                self.emit_block(node, "DO", true)?;
                self.out.push('\n');
            }
            kinds::REPEAT_BLOCK => {
                let var = self.variable(node.text_field("VAR"));
                // The bound sits on the right of `<`; relational operands
                // need at least additive rank to re-parse unambiguously.
                let times = self.render_slot(node, "TIMES", Precedence::Additive, None)?;
                write!(self.out, "for (let {var} = 0; {var} < {times}; {var}++) ")?;
                self.emit_block(node, "DO", true)?;
                self.out.push('\n');
            }
            kinds::FOR_EACH_BLOCK => {
                let var = self.variable(node.text_field("VAR"));
                let list = self.render_slot(node, "LIST", Precedence::None, None)?;
                write!(self.out, "for (const {var} of {list}) ")?;
                self.emit_block(node, "DO", true)?;
                self.out.push('\n');
            }
            kinds::TRY_BLOCK => {
                let err = self.variable(node.text_field("ERROR"));
                self.out.push_str("try ");
                self.emit_block(node, "TRY", false)?;
                write!(self.out, " catch ({err}) ")?;
                self.emit_block(node, "CATCH", false)?;
                if self.socket(node, "FINALLY")?.connection.is_some() {
                    self.out.push_str(" finally ");
                    self.emit_block(node, "FINALLY", false)?;
                }
                self.out.push('\n');
            }
            kinds::RETURN_STATEMENT | kinds::YIELD_STATEMENT => {
                let keyword = if node.kind == kinds::RETURN_STATEMENT {
                    "return"
                } else {
                    "yield"
                };
                if node.socket("VALUE").is_some() {
                    let value = self.render_slot(node, "VALUE", Precedence::None, None)?;
                    writeln!(self.out, "{keyword} {value};")?;
                } else {
                    writeln!(self.out, "{keyword};")?;
                }
            }
            kinds::BREAK_STATEMENT => writeln!(self.out, "break;")?,
            kinds::CONTINUE_STATEMENT => writeln!(self.out, "continue;")?,
            kinds::THROW_STATEMENT => {
                let value = self.render_slot(node, "VALUE", Precedence::None, None)?;
                writeln!(self.out, "throw {value};")?;
            }
            kinds::PROCEDURE_CALL => {
                let call = self.render_procedure_call(node)?;
                writeln!(self.out, "{call};")?;
            }
            other => {
                return Err(TangleError::MalformedGraph(format!(
                    "kind '{other}' has no statement rendering rule"
                )));
            }
        }
        Ok(())
    }

    /// A hoisted procedure definition with its annotated parameter list.
    pub(crate) fn emit_definition(&mut self, node: &'a Node) -> Result<(), TangleError> {
        let signature = node.signature().cloned().ok_or_else(|| {
            TangleError::MalformedGraph(format!("definition {} has no signature", node.id))
        })?;
        let name = self.procedure(&signature.name);
        let star = if signature.is_generator { "*" } else { "" };
        self.write_indent();
        write!(self.out, "function{star} {name}(")?;
        for (index, param) in signature.params.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            if param.ty != SlotType::Any {
                write!(self.out, "/*type:{}*/ ", param.ty.tag_name())?;
            }
            let rendered = self.variable(&param.name);
            self.out.push_str(&rendered);
        }
        self.out.push(')');
        if let Some(ty) = signature.return_type {
            write!(self.out, " /*returns:{}*/", ty.tag_name())?;
        }
        self.out.push(' ');
        self.emit_block(node, "BODY", false)?;
        self.out.push('\n');
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Render the child of a value socket, parenthesized for its slot; an
    /// empty socket yields the type-appropriate default literal.
    fn render_slot(
        &mut self,
        node: &'a Node,
        socket_name: &str,
        min: Precedence,
        slot_op: Option<&'static str>,
    ) -> Result<String, TangleError> {
        let socket = self.socket(node, socket_name)?;
        let rendered = match socket.connection {
            Some(child) => self.render_expr(child)?,
            None => default_literal(&socket.accepts),
        };
        Ok(wrap(&rendered, min, slot_op))
    }

    fn render_expr(&mut self, id: NodeId) -> Result<Rendered, TangleError> {
        let node = self.node(id)?;
        let rendered = match node.kind.as_str() {
            kinds::NUMBER_LITERAL => {
                let value = node.field("VALUE").and_then(|f| f.as_number()).unwrap_or(0.0);
                let text = number_text(value);
                if value.is_finite() && value < 0.0 {
                    Rendered {
                        text,
                        rank: Precedence::Unary,
                        op: Some("-"),
                    }
                } else {
                    Rendered::atom(text)
                }
            }
            kinds::STRING_LITERAL => Rendered::atom(quote(node.text_field("VALUE"))),
            kinds::BOOLEAN_LITERAL => {
                let value = node.field("VALUE").and_then(|f| f.as_flag()).unwrap_or(false);
                Rendered::atom(if value { "true" } else { "false" })
            }
            kinds::NULL_LITERAL => Rendered::atom("null"),
            kinds::VARIABLE_GET => Rendered::atom(self.variable(node.text_field("NAME"))),
            kinds::ARITHMETIC | kinds::COMPARISON | kinds::LOGICAL => {
                let spelling = node.text_field("OP").to_string();
                let op = binary_op(&spelling).ok_or_else(|| {
                    TangleError::MalformedGraph(format!(
                        "'{}' node {} carries unknown operator '{spelling}'",
                        node.kind, node.id
                    ))
                })?;
                let lhs = self.render_slot(node, "A", op.left_min, Some(op.symbol))?;
                let rhs = self.render_slot(node, "B", op.right_min, Some(op.symbol))?;
                Rendered {
                    text: format!("{lhs} {} {rhs}", op.symbol),
                    rank: op.rank,
                    op: Some(op.symbol),
                }
            }
            kinds::LOGIC_NOT => {
                let value = self.render_slot(node, "VALUE", Precedence::Unary, None)?;
                Rendered {
                    text: format!("!{value}"),
                    rank: Precedence::Unary,
                    op: Some("!"),
                }
            }
            kinds::NUMERIC_NEGATE => {
                let value = self.render_slot(node, "VALUE", Precedence::Unary, None)?;
                Rendered {
                    text: format!("-{value}"),
                    rank: Precedence::Unary,
                    op: Some("-"),
                }
            }
            kinds::NUMERIC_PLUS => {
                let value = self.render_slot(node, "VALUE", Precedence::Unary, None)?;
                Rendered {
                    text: format!("+{value}"),
                    rank: Precedence::Unary,
                    op: Some("+"),
                }
            }
            kinds::COLLECTION_LITERAL => {
                let state = node.collection_state().cloned().unwrap_or_default();
                let mut parts: Vec<String> = Vec::with_capacity(state.items.len());
                for (index, item) in state.items.iter().enumerate() {
                    let text =
                        self.render_slot(node, &format!("ITEM{index}"), Precedence::None, None)?;
                    match item {
                        crate::shape::CollectionItem::Single => parts.push(text),
                        crate::shape::CollectionItem::Spread => parts.push(format!("...{text}")),
                    }
                }
                Rendered::atom(format!("[{}]", parts.join(", ")))
            }
            kinds::MEMBER_ACCESS => {
                let object = self.render_slot(node, "OBJECT", Precedence::Member, Some("."))?;
                Rendered {
                    text: format!("{object}.{}", node.text_field("PROPERTY")),
                    rank: Precedence::Member,
                    op: Some("."),
                }
            }
            kinds::INDEX_ACCESS => {
                let object = self.render_slot(node, "OBJECT", Precedence::Member, Some("."))?;
                let index = self.render_slot(node, "INDEX", Precedence::None, None)?;
                Rendered {
                    text: format!("{object}[{index}]"),
                    rank: Precedence::Member,
                    op: Some("."),
                }
            }
            kinds::MATH_UNARY => {
                let arg = self.render_slot(node, "ARG", Precedence::None, None)?;
                Rendered::call(format!("Math.{}({arg})", node.text_field("FN")))
            }
            kinds::MATH_BINARY => {
                let a = self.render_slot(node, "A", Precedence::None, None)?;
                let b = self.render_slot(node, "B", Precedence::None, None)?;
                Rendered::call(format!("Math.{}({a}, {b})", node.text_field("FN")))
            }
            kinds::COERCE_NUMBER => {
                let value = self.render_slot(node, "VALUE", Precedence::None, None)?;
                Rendered::call(format!("Number({value})"))
            }
            kinds::COERCE_STRING => {
                let value = self.render_slot(node, "VALUE", Precedence::None, None)?;
                Rendered::call(format!("String({value})"))
            }
            kinds::COLOR_RGB => {
                let r = self.render_slot(node, "R", Precedence::None, None)?;
                let g = self.render_slot(node, "G", Precedence::None, None)?;
                let b = self.render_slot(node, "B", Precedence::None, None)?;
                Rendered::call(format!("rgb({r}, {g}, {b})"))
            }
            kinds::SPRITE_REF => {
                Rendered::call(format!("sprite({})", quote(node.text_field("NAME"))))
            }
            kinds::PROCEDURE_CALL => {
                let text = self.render_procedure_call(node)?;
                Rendered::call(text)
            }
            other => {
                let spec = self.ws.catalog().get(other);
                match spec.map(|s| (&s.render, s.mode)) {
                    Some((RenderRule::ActorMethod(method), _)) => {
                        let text = self.render_actor_call(node, method)?;
                        Rendered::call(text)
                    }
                    Some((_, KindMode::Expression)) => {
                        return Err(TangleError::MalformedGraph(format!(
                            "kind '{other}' has no expression rendering rule"
                        )));
                    }
                    Some(_) => {
                        return Err(TangleError::MalformedGraph(format!(
                            "kind '{other}' cannot appear in a value socket"
                        )));
                    }
                    None => return Err(TangleError::UnknownNodeKind(other.to_string())),
                }
            }
        };
        Ok(rendered)
    }

    /// `name(arg, ...)` for a bound call site, statement and expression alike.
    fn render_procedure_call(&mut self, node: &'a Node) -> Result<String, TangleError> {
        let signature = node.signature().cloned().ok_or_else(|| {
            TangleError::MalformedGraph(format!("call site {} is not bound", node.id))
        })?;
        let name = self.procedure(&signature.name);
        let mut args: Vec<String> = Vec::with_capacity(signature.params.len());
        for index in 0..signature.params.len() {
            args.push(self.render_slot(node, &format!("ARG{index}"), Precedence::None, None)?);
        }
        Ok(format!("{name}({})", args.join(", ")))
    }

    /// `this.<method>(...)`: value sockets map positionally to arguments;
    /// kinds with no value sockets pass their text fields as string literals.
    fn render_actor_call(&mut self, node: &'a Node, method: &str) -> Result<String, TangleError> {
        let spec = self
            .ws
            .catalog()
            .get(&node.kind)
            .ok_or_else(|| TangleError::UnknownNodeKind(node.kind.clone()))?;
        let mut args: Vec<String> = Vec::new();
        let value_sockets: Vec<&str> = spec
            .sockets
            .iter()
            .filter(|s| s.role == SocketRole::Value)
            .map(|s| s.name)
            .collect();
        if value_sockets.is_empty() {
            for field in &spec.fields {
                args.push(quote(node.text_field(field.name)));
            }
        } else {
            for socket_name in value_sockets {
                args.push(self.render_slot(node, socket_name, Precedence::None, None)?);
            }
        }
        Ok(format!("this.{method}({})", args.join(", ")))
    }
}

/// The literal filling an unconnected value socket, chosen from the
/// socket's accepted type-set.
fn default_literal(accepts: &TypeSet) -> Rendered {
    let Some(tags) = accepts.tags() else {
        return Rendered::atom("null");
    };
    if tags.contains(SlotType::Number) {
        Rendered::atom("0")
    } else if tags.contains(SlotType::String) {
        Rendered::atom("''")
    } else if tags.contains(SlotType::Boolean) {
        Rendered::atom("false")
    } else if tags.contains(SlotType::Color) {
        Rendered::call("rgb(0, 0, 0)")
    } else if tags.contains(SlotType::Array) || tags.contains(SlotType::Iterable) {
        Rendered::atom("[]")
    } else {
        Rendered::atom("null")
    }
}

/// Canonical number spelling: integral values print without a fraction.
/// Non-finite values have no literal spelling in the grammar and fall back
/// to `0` so the output stays parseable.
fn number_text(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Single-quoted string literal with the grammar's escape set.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

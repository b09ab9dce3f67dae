//! The restricted abstract syntax tree the grammar produces and the graph
//! builder consumes.
//!
//! Every node carries the source position of its first token so the builder
//! can locate its own rejections (undeclared names, whitelist misses) as
//! precisely as the grammar locates syntax errors.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// 1-based line and column of a token's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Pos {
        Pos { line, column }
    }
}

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A whole source text: procedures and top-level statements in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Procedure(ProcedureDecl),
    Statement(Stmt),
}

/// `function` / `function*` declaration with structured-comment annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDecl {
    pub name: String,
    pub is_generator: bool,
    pub params: Vec<ParamDecl>,
    /// Raw tag text of the `/*returns:..*/` annotation, unresolved.
    pub returns: Option<String>,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    /// Raw tag text of the `/*type:..*/` annotation, unresolved.
    pub ty: Option<String>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let /*type:T*/ name;`
    Declare {
        name: String,
        ty: Option<String>,
        pos: Pos,
    },
    /// `name = expr;`
    Assign { name: String, value: Expr, pos: Pos },
    /// `if (..) {..} else if (..) {..} else {..}`; one arm per condition.
    If {
        arms: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
        pos: Pos,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        pos: Pos,
    },
    /// The canonical counting loop `for (let v = 0; v < limit; v++)`.
    Repeat {
        var: String,
        limit: Expr,
        body: Vec<Stmt>,
        pos: Pos,
    },
    /// `for (const v of iter)` (or `let v of`).
    ForOf {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
        pos: Pos,
    },
    Try {
        body: Vec<Stmt>,
        error_name: String,
        catch: Vec<Stmt>,
        finally: Option<Vec<Stmt>>,
        pos: Pos,
    },
    Return { value: Option<Expr>, pos: Pos },
    Yield { value: Option<Expr>, pos: Pos },
    Break { pos: Pos },
    Continue { pos: Pos },
    Throw { value: Expr, pos: Pos },
    /// A bare call expression terminated by `;`.
    Call { call: Expr, pos: Pos },
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Declare { pos, .. }
            | Stmt::Assign { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::While { pos, .. }
            | Stmt::Repeat { pos, .. }
            | Stmt::ForOf { pos, .. }
            | Stmt::Try { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::Yield { pos, .. }
            | Stmt::Break { pos }
            | Stmt::Continue { pos }
            | Stmt::Throw { pos, .. }
            | Stmt::Call { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number { value: f64, pos: Pos },
    Str { value: String, pos: Pos },
    Bool { value: bool, pos: Pos },
    Null { pos: Pos },
    Ident { name: String, pos: Pos },
    /// The actor receiver; only legal as a call target (`this.method(..)`).
    This { pos: Pos },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    /// `[a, ...b, c]`; the flag marks spread items.
    Array {
        items: Vec<(bool, Expr)>,
        pos: Pos,
    },
    Member {
        object: Box<Expr>,
        property: String,
        pos: Pos,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: Pos,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Number { pos, .. }
            | Expr::Str { pos, .. }
            | Expr::Bool { pos, .. }
            | Expr::Null { pos }
            | Expr::Ident { pos, .. }
            | Expr::This { pos }
            | Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Array { pos, .. }
            | Expr::Member { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Call { pos, .. } => *pos,
        }
    }
}

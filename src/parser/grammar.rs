//! Hand-written lexer and recursive-descent parser for the restricted
//! surface grammar.
//!
//! The grammar is deliberately small: everything the graph cannot represent
//! is rejected up front with a located [`TangleError::UnsupportedSyntax`]
//! naming the construct. Structured comments (`/*type:..*/`,
//! `/*returns:..*/`) are tokens; all other comments are skipped.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::TangleError;

use super::ast::{Expr, Item, ParamDecl, Pos, ProcedureDecl, Script, Stmt, UnaryOp};

static STRUCTURED_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(type|returns)\s*:\s*([A-Za-z]+)\s*$").expect("comment regex"));

/// Keywords that may never start an expression.
const STATEMENT_KEYWORDS: &[&str] = &[
    "let", "var", "const", "if", "else", "while", "for", "try", "catch", "finally", "return",
    "yield", "break", "continue", "throw", "function", "class", "switch", "do", "new", "import",
    "export", "delete", "typeof", "in", "instanceof", "of",
];

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    TypeAnn(String),
    ReturnAnn(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    pos: Pos,
}

// ----------------------------------------------------------------------
// Lexer
// ----------------------------------------------------------------------

struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Lexer {
        Lexer {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    fn unsupported(&self, construct: impl Into<String>, pos: Pos) -> TangleError {
        TangleError::unsupported(construct, pos.line, pos.column)
    }

    fn tokenize(mut self) -> Result<Vec<Token>, TangleError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let pos = self.pos();
            let Some(ch) = self.peek() else {
                tokens.push(Token { tok: Tok::Eof, pos });
                return Ok(tokens);
            };
            if ch == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            if ch == '/' && self.peek_at(1) == Some('*') {
                if let Some(token) = self.block_comment(pos)? {
                    tokens.push(token);
                }
                continue;
            }
            let tok = if ch.is_ascii_digit() {
                self.number(pos)?
            } else if ch == '\'' || ch == '"' {
                self.string(pos)?
            } else if ch.is_alphabetic() || ch == '_' || ch == '$' {
                self.ident()
            } else {
                self.punct(pos)?
            };
            tokens.push(Token { tok, pos });
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// `/* .. */`: structured annotations become tokens, anything else is
    /// skipped.
    fn block_comment(&mut self, pos: Pos) -> Result<Option<Token>, TangleError> {
        self.bump();
        self.bump();
        let mut body = String::new();
        loop {
            match self.peek() {
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some(_) => {
                    if let Some(c) = self.bump() {
                        body.push(c);
                    }
                }
                None => return Err(self.unsupported("unterminated comment", pos)),
            }
        }
        if let Some(captures) = STRUCTURED_COMMENT.captures(&body) {
            let tag = captures[2].to_string();
            let tok = match &captures[1] {
                "type" => Tok::TypeAnn(tag),
                _ => Tok::ReturnAnn(tag),
            };
            return Ok(Some(Token { tok, pos }));
        }
        Ok(None)
    }

    fn number(&mut self, pos: Pos) -> Result<Tok, TangleError> {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            text.push('.');
            self.bump();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        text.parse::<f64>()
            .map(Tok::Number)
            .map_err(|_| self.unsupported(format!("number literal '{text}'"), pos))
    }

    fn string(&mut self, pos: Pos) -> Result<Tok, TangleError> {
        let quote = self.bump().unwrap_or('\'');
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    Some('t') => text.push('\t'),
                    Some(other) => text.push(other),
                    None => return Err(self.unsupported("unterminated string", pos)),
                },
                Some(ch) if ch == quote => return Ok(Tok::Str(text)),
                Some('\n') | None => return Err(self.unsupported("unterminated string", pos)),
                Some(ch) => text.push(ch),
            }
        }
    }

    fn ident(&mut self) -> Tok {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        Tok::Ident(text)
    }

    fn punct(&mut self, pos: Pos) -> Result<Tok, TangleError> {
        const TWO: &[&str] = &["==", "!=", "<=", ">=", "&&", "||", "++"];
        let first = self.peek().unwrap_or('\0');
        let second = self.peek_at(1).unwrap_or('\0');
        if first == '.' && second == '.' && self.peek_at(2) == Some('.') {
            self.bump();
            self.bump();
            self.bump();
            return Ok(Tok::Punct("..."));
        }
        let pair: String = [first, second].iter().collect();
        if let Some(sym) = TWO.iter().find(|t| **t == pair) {
            self.bump();
            self.bump();
            return Ok(Tok::Punct(sym));
        }
        let sym = match first {
            '(' => "(",
            ')' => ")",
            '{' => "{",
            '}' => "}",
            '[' => "[",
            ']' => "]",
            ';' => ";",
            ',' => ",",
            '.' => ".",
            '=' => "=",
            '<' => "<",
            '>' => ">",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            '!' => "!",
            other => return Err(self.unsupported(format!("character '{other}'"), pos)),
        };
        self.bump();
        Ok(Tok::Punct(sym))
    }
}

// ----------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------

/// Parse a whole source text into the restricted AST.
pub fn parse_script(source: &str) -> Result<Script, TangleError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, index: 0 };
    parser.script()
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn pos(&self) -> Pos {
        self.current().pos
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn unsupported(&self, construct: impl Into<String>) -> TangleError {
        let pos = self.pos();
        TangleError::unsupported(construct, pos.line, pos.column)
    }

    fn at_punct(&self, sym: &str) -> bool {
        matches!(&self.current().tok, Tok::Punct(p) if *p == sym)
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(&self.current().tok, Tok::Ident(name) if name == word)
    }

    fn eat_punct(&mut self, sym: &str) -> bool {
        if self.at_punct(sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, sym: &'static str) -> Result<(), TangleError> {
        if self.eat_punct(sym) {
            Ok(())
        } else {
            Err(self.unsupported(format!("expected '{sym}'")))
        }
    }

    fn expect_keyword(&mut self, word: &'static str) -> Result<(), TangleError> {
        if self.at_keyword(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.unsupported(format!("expected '{word}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Pos), TangleError> {
        let pos = self.pos();
        match &self.current().tok {
            Tok::Ident(name) if !STATEMENT_KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok((name, pos))
            }
            _ => Err(self.unsupported("expected an identifier")),
        }
    }

    fn script(&mut self) -> Result<Script, TangleError> {
        let mut items = Vec::new();
        while !matches!(self.current().tok, Tok::Eof) {
            if self.at_keyword("function") {
                items.push(Item::Procedure(self.procedure()?));
            } else {
                items.push(Item::Statement(self.statement()?));
            }
        }
        Ok(Script { items })
    }

    fn procedure(&mut self) -> Result<ProcedureDecl, TangleError> {
        let pos = self.pos();
        self.expect_keyword("function")?;
        let is_generator = self.eat_punct("*");
        let (name, _) = self.expect_ident()?;
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.at_punct(")") {
            loop {
                let param_pos = self.pos();
                let ty = match &self.current().tok {
                    Tok::TypeAnn(tag) => {
                        let tag = tag.clone();
                        self.advance();
                        Some(tag)
                    }
                    _ => None,
                };
                let (param_name, _) = self.expect_ident()?;
                params.push(ParamDecl {
                    name: param_name,
                    ty,
                    pos: param_pos,
                });
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        let returns = match &self.current().tok {
            Tok::ReturnAnn(tag) => {
                let tag = tag.clone();
                self.advance();
                Some(tag)
            }
            _ => None,
        };
        let body = self.block()?;
        Ok(ProcedureDecl {
            name,
            is_generator,
            params,
            returns,
            body,
            pos,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, TangleError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.at_punct("}") {
            if matches!(self.current().tok, Tok::Eof) {
                return Err(self.unsupported("unterminated block"));
            }
            body.push(self.statement()?);
        }
        self.expect_punct("}")?;
        Ok(body)
    }

    fn statement(&mut self) -> Result<Stmt, TangleError> {
        let pos = self.pos();
        match &self.current().tok {
            Tok::Ident(word) => match word.as_str() {
                "let" => self.declare(),
                "var" => Err(self.unsupported("'var' declaration")),
                "const" => Err(self.unsupported("'const' declaration")),
                "if" => self.if_statement(),
                "while" => self.while_statement(),
                "for" => self.for_statement(),
                "try" => self.try_statement(),
                "return" => self.return_statement(false),
                "yield" => self.return_statement(true),
                "break" => {
                    self.advance();
                    self.expect_punct(";")?;
                    Ok(Stmt::Break { pos })
                }
                "continue" => {
                    self.advance();
                    self.expect_punct(";")?;
                    Ok(Stmt::Continue { pos })
                }
                "throw" => {
                    self.advance();
                    let value = self.expression()?;
                    self.expect_punct(";")?;
                    Ok(Stmt::Throw { value, pos })
                }
                "function" => Err(self.unsupported("nested function declaration")),
                "class" => Err(self.unsupported("class declaration")),
                "switch" => Err(self.unsupported("switch statement")),
                "do" => Err(self.unsupported("do-while loop")),
                "import" => Err(self.unsupported("import declaration")),
                "export" => Err(self.unsupported("export declaration")),
                _ => self.expression_statement(),
            },
            _ => self.expression_statement(),
        }
    }

    fn declare(&mut self) -> Result<Stmt, TangleError> {
        let pos = self.pos();
        self.expect_keyword("let")?;
        let ty = match &self.current().tok {
            Tok::TypeAnn(tag) => {
                let tag = tag.clone();
                self.advance();
                Some(tag)
            }
            _ => None,
        };
        let (name, _) = self.expect_ident()?;
        if self.at_punct("=") {
            return Err(self.unsupported("initialized declaration"));
        }
        self.expect_punct(";")?;
        Ok(Stmt::Declare { name, ty, pos })
    }

    fn if_statement(&mut self) -> Result<Stmt, TangleError> {
        let pos = self.pos();
        self.expect_keyword("if")?;
        self.expect_punct("(")?;
        let cond = self.expression()?;
        self.expect_punct(")")?;
        let body = self.block()?;
        let mut arms = vec![(cond, body)];
        let mut else_body = None;
        while self.at_keyword("else") {
            self.advance();
            if self.at_keyword("if") {
                self.advance();
                self.expect_punct("(")?;
                let cond = self.expression()?;
                self.expect_punct(")")?;
                arms.push((cond, self.block()?));
            } else {
                else_body = Some(self.block()?);
                break;
            }
        }
        Ok(Stmt::If {
            arms,
            else_body,
            pos,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, TangleError> {
        let pos = self.pos();
        self.expect_keyword("while")?;
        self.expect_punct("(")?;
        let cond = self.expression()?;
        self.expect_punct(")")?;
        let body = self.block()?;
        Ok(Stmt::While { cond, body, pos })
    }

    /// `for` splits three ways: the canonical counting loop (`let` only —
    /// `var` is rejected here, a restriction preserved from the original
    /// grammar), `for..of` with `let` or `const`, anything else unsupported.
    fn for_statement(&mut self) -> Result<Stmt, TangleError> {
        let pos = self.pos();
        self.expect_keyword("for")?;
        self.expect_punct("(")?;
        if self.at_keyword("var") {
            return Err(self.unsupported("'var' counting loop"));
        }
        let is_const = self.at_keyword("const");
        if is_const {
            self.advance();
        } else {
            self.expect_keyword("let")?;
        }
        let (var, _) = self.expect_ident()?;
        if self.at_keyword("of") {
            self.advance();
            let iter = self.expression()?;
            self.expect_punct(")")?;
            let body = self.block()?;
            return Ok(Stmt::ForOf {
                var,
                iter,
                body,
                pos,
            });
        }
        if is_const {
            return Err(self.unsupported("'const' counting loop"));
        }
        self.expect_punct("=")?;
        match self.current().tok {
            Tok::Number(n) if n == 0.0 => {
                self.advance();
            }
            _ => return Err(self.unsupported("counting loop not starting at 0")),
        }
        self.expect_punct(";")?;
        let (check_var, _) = self.expect_ident()?;
        self.expect_punct("<")?;
        let limit = self.expression()?;
        self.expect_punct(";")?;
        let (step_var, _) = self.expect_ident()?;
        self.expect_punct("++")?;
        self.expect_punct(")")?;
        if check_var != var || step_var != var {
            return Err(self.unsupported("non-canonical counting loop"));
        }
        let body = self.block()?;
        Ok(Stmt::Repeat {
            var,
            limit,
            body,
            pos,
        })
    }

    fn try_statement(&mut self) -> Result<Stmt, TangleError> {
        let pos = self.pos();
        self.expect_keyword("try")?;
        let body = self.block()?;
        self.expect_keyword("catch")?;
        self.expect_punct("(")?;
        let (error_name, _) = self.expect_ident()?;
        self.expect_punct(")")?;
        let catch = self.block()?;
        let finally = if self.at_keyword("finally") {
            self.advance();
            Some(self.block()?)
        } else {
            None
        };
        Ok(Stmt::Try {
            body,
            error_name,
            catch,
            finally,
            pos,
        })
    }

    fn return_statement(&mut self, is_yield: bool) -> Result<Stmt, TangleError> {
        let pos = self.pos();
        self.advance();
        let value = if self.at_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        if is_yield {
            Ok(Stmt::Yield { value, pos })
        } else {
            Ok(Stmt::Return { value, pos })
        }
    }

    /// `ident = expr;` or a bare call. Anything else has no statement node.
    fn expression_statement(&mut self) -> Result<Stmt, TangleError> {
        let pos = self.pos();
        if let Tok::Ident(name) = &self.current().tok {
            let name = name.clone();
            if matches!(self.tokens.get(self.index + 1).map(|t| &t.tok), Some(Tok::Punct("="))) {
                self.advance();
                self.advance();
                let value = self.expression()?;
                self.expect_punct(";")?;
                return Ok(Stmt::Assign { name, value, pos });
            }
        }
        let expr = self.expression()?;
        self.expect_punct(";")?;
        match expr {
            call @ Expr::Call { .. } => Ok(Stmt::Call { call, pos }),
            _ => Err(TangleError::unsupported(
                "expression statement",
                pos.line,
                pos.column,
            )),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, TangleError> {
        self.binary(0)
    }

    /// Precedence climbing over the binary operator tiers.
    fn binary(&mut self, tier: usize) -> Result<Expr, TangleError> {
        const TIERS: &[&[&str]] = &[
            &["||"],
            &["&&"],
            &["==", "!="],
            &["<", "<=", ">", ">="],
            &["+", "-"],
            &["*", "/", "%"],
        ];
        if tier >= TIERS.len() {
            return self.unary();
        }
        let mut lhs = self.binary(tier + 1)?;
        loop {
            let op = match &self.current().tok {
                Tok::Punct(sym) if TIERS[tier].contains(sym) => *sym,
                _ => break,
            };
            let pos = self.pos();
            self.advance();
            let rhs = self.binary(tier + 1)?;
            lhs = Expr::Binary {
                op: op.to_string(),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, TangleError> {
        let pos = self.pos();
        let op = match &self.current().tok {
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("-") => Some(UnaryOp::Negate),
            Tok::Punct("+") => Some(UnaryOp::Plus),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                pos,
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, TangleError> {
        let mut expr = self.primary()?;
        loop {
            let pos = self.pos();
            if self.eat_punct(".") {
                let (property, _) = self.expect_ident()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    pos,
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    pos,
                };
            } else if self.eat_punct("(") {
                let mut args = Vec::new();
                if !self.at_punct(")") {
                    loop {
                        args.push(self.expression()?);
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                }
                self.expect_punct(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    pos,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, TangleError> {
        let pos = self.pos();
        match self.current().tok.clone() {
            Tok::Number(value) => {
                self.advance();
                Ok(Expr::Number { value, pos })
            }
            Tok::Str(value) => {
                self.advance();
                Ok(Expr::Str { value, pos })
            }
            Tok::Ident(name) => match name.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool { value: true, pos })
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool { value: false, pos })
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null { pos })
                }
                "this" => {
                    self.advance();
                    Ok(Expr::This { pos })
                }
                word if STATEMENT_KEYWORDS.contains(&word) => {
                    Err(self.unsupported(format!("'{word}' expression")))
                }
                _ => {
                    self.advance();
                    Ok(Expr::Ident { name, pos })
                }
            },
            Tok::Punct("(") => {
                self.advance();
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Tok::Punct("[") => {
                self.advance();
                let mut items = Vec::new();
                if !self.at_punct("]") {
                    loop {
                        let spread = self.eat_punct("...");
                        items.push((spread, self.expression()?));
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                }
                self.expect_punct("]")?;
                Ok(Expr::Array { items, pos })
            }
            Tok::TypeAnn(_) | Tok::ReturnAnn(_) => {
                Err(self.unsupported("misplaced structured comment"))
            }
            Tok::Eof => Err(self.unsupported("unexpected end of input")),
            Tok::Punct(sym) => Err(self.unsupported(format!("token '{sym}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotated_declaration() {
        let script = parse_script("let /*type:Number*/ x;").unwrap();
        assert_eq!(script.items.len(), 1);
        match &script.items[0] {
            Item::Statement(Stmt::Declare { name, ty, .. }) => {
                assert_eq!(name, "x");
                assert_eq!(ty.as_deref(), Some("Number"));
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn test_plain_comments_are_skipped() {
        let script = parse_script("// note\nlet x; /* free text */ let y;").unwrap();
        assert_eq!(script.items.len(), 2);
    }

    #[test]
    fn test_binary_precedence() {
        let script = parse_script("x = 1 + 2 * 3;").unwrap();
        let Item::Statement(Stmt::Assign { value, .. }) = &script.items[0] else {
            panic!("expected assignment");
        };
        let Expr::Binary { op, rhs, .. } = value else {
            panic!("expected binary expression");
        };
        assert_eq!(op, "+");
        assert!(matches!(**rhs, Expr::Binary { ref op, .. } if op == "*"));
    }

    #[test]
    fn test_counting_loop_rejects_var() {
        let err = parse_script("for (var i = 0; i < 10; i++) {}").unwrap_err();
        match err {
            TangleError::UnsupportedSyntax { construct, .. } => {
                assert!(construct.contains("var"), "got '{construct}'");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_counting_loop_must_be_canonical() {
        assert!(parse_script("for (let i = 0; i < 10; i++) { break; }").is_ok());
        assert!(parse_script("for (let i = 1; i < 10; i++) {}").is_err());
        assert!(parse_script("for (let i = 0; j < 10; i++) {}").is_err());
        assert!(parse_script("for (const i = 0; i < 10; i++) {}").is_err());
    }

    #[test]
    fn test_for_of_accepts_let_and_const() {
        assert!(parse_script("for (const item of xs) {}").is_ok());
        assert!(parse_script("for (let item of xs) {}").is_ok());
    }

    #[test]
    fn test_class_is_unsupported_and_located() {
        let err = parse_script("let x;\nclass Foo {}").unwrap_err();
        match err {
            TangleError::UnsupportedSyntax {
                construct,
                line,
                column,
            } => {
                assert_eq!(construct, "class declaration");
                assert_eq!((line, column), (2, 1));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_initialized_declaration_is_rejected() {
        assert!(parse_script("let x = 1;").is_err());
    }

    #[test]
    fn test_spread_items() {
        let script = parse_script("x = [1, ...xs, 2];").unwrap();
        let Item::Statement(Stmt::Assign { value, .. }) = &script.items[0] else {
            panic!("expected assignment");
        };
        let Expr::Array { items, .. } = value else {
            panic!("expected array literal");
        };
        let flags: Vec<bool> = items.iter().map(|(spread, _)| *spread).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_generator_with_annotations() {
        let script =
            parse_script("function* gen(/*type:Number*/ n) /*returns:Number*/ { yield n; }")
                .unwrap();
        let Item::Procedure(decl) = &script.items[0] else {
            panic!("expected procedure");
        };
        assert!(decl.is_generator);
        assert_eq!(decl.params[0].ty.as_deref(), Some("Number"));
        assert_eq!(decl.returns.as_deref(), Some("Number"));
    }

    #[test]
    fn test_bare_non_call_expression_statement_is_rejected() {
        let err = parse_script("1 + 2;").unwrap_err();
        assert!(matches!(err, TangleError::UnsupportedSyntax { .. }));
    }

    #[test]
    fn test_this_method_call_statement() {
        let script = parse_script("this.moveTo(10, 20);").unwrap();
        let Item::Statement(Stmt::Call { call, .. }) = &script.items[0] else {
            panic!("expected call statement");
        };
        let Expr::Call { callee, args, .. } = call else {
            panic!("expected call");
        };
        assert!(matches!(**callee, Expr::Member { ref property, .. } if property == "moveTo"));
        assert_eq!(args.len(), 2);
    }
}

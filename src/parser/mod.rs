//! Text-to-graph parsing.
//!
//! [`CodeParser::parse`] turns restricted source text into a fresh
//! [`Workspace`], instantiating nodes through the same socket names the
//! generator emits so that `parse(generate(g))` structurally restores `g`
//! for the supported subset. The parse is transactional:
//! [`CodeParser::parse_into`] replaces the destination workspace only on
//! full success, so a failed parse leaves prior state untouched.
//!
//! The syntax frontend is injected: the built-in [`ScriptGrammar`] resolves
//! immediately over the hand-written grammar, and hosts may substitute an
//! asynchronously loaded engine. The core awaits it once per parse and never
//! interleaves concurrent parses against one destination.

pub mod ast;
mod builder;
pub mod grammar;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::{catalog::NodeCatalog, error::TangleError, graph::Workspace};

use builder::GraphBuilder;

pub type SyntaxFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ast::Script, TangleError>> + Send + 'a>>;

/// The "raw text to syntax tree" capability, possibly asynchronously loaded.
pub trait SyntaxFrontend: Send + Sync {
    fn syntax_tree<'a>(&'a self, source: &'a str) -> SyntaxFuture<'a>;
}

/// The built-in frontend: the lexer and recursive-descent grammar of
/// [`grammar`], ready immediately.
#[derive(Debug, Default)]
pub struct ScriptGrammar;

impl SyntaxFrontend for ScriptGrammar {
    fn syntax_tree<'a>(&'a self, source: &'a str) -> SyntaxFuture<'a> {
        let parsed = grammar::parse_script(source);
        Box::pin(async move { parsed })
    }
}

/// Parses restricted source text into workspaces.
pub struct CodeParser {
    catalog: Arc<NodeCatalog>,
    frontend: Arc<dyn SyntaxFrontend>,
}

impl CodeParser {
    pub fn new(catalog: Arc<NodeCatalog>) -> CodeParser {
        CodeParser::with_frontend(catalog, Arc::new(ScriptGrammar))
    }

    pub fn with_frontend(catalog: Arc<NodeCatalog>, frontend: Arc<dyn SyntaxFrontend>) -> CodeParser {
        CodeParser { catalog, frontend }
    }

    /// Parse `source` into a fresh workspace. Any error aborts the whole
    /// parse; no partial graph escapes.
    pub async fn parse(&self, source: &str) -> Result<Workspace, TangleError> {
        debug!("[CodeParser::parse] {} bytes", source.len());
        let script = self.frontend.syntax_tree(source).await?;
        let mut ws = Workspace::new(self.catalog.clone());
        GraphBuilder::new(&mut ws).build(&script)?;
        debug!(
            "[CodeParser::parse] built {} nodes, {} procedures",
            ws.len(),
            ws.procedures().len()
        );
        Ok(ws)
    }

    /// Transactional replacement: `target` adopts the parsed graph only on
    /// full success and keeps its observers either way.
    pub async fn parse_into(&self, source: &str, target: &mut Workspace) -> Result<(), TangleError> {
        let parsed = self.parse(source).await?;
        target.replace_with(parsed);
        Ok(())
    }
}

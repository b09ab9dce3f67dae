//! # tangle-core
//!
//! The bidirectional translator at the heart of a block-based visual
//! programming environment: a typed block graph that stays semantically
//! synchronized with an equivalent textual program at all times. Graphs
//! generate into source text, and source text parses back into an
//! equivalent graph.
//!
//! ## Overview
//!
//! A [`graph::Workspace`] holds nodes, typed sockets, edges, and field
//! values, and refuses any edit that would violate the connection rules.
//! Compound constructs (branches, collection literals, procedure signatures,
//! call sites) derive their socket layouts from small serializable
//! [`shape`] states, so a layout is always mechanically re-derivable.
//! Committed procedure signatures flow through the [`procedures`] registry,
//! which resynchronizes every call site in the same mutation.
//!
//! ### Key properties
//!
//! - **Round-trip fidelity**: `parse(generate(g))` structurally restores `g`
//!   for graphs built from supported kinds (see `tests/roundtrip_test.rs`).
//! - **Typed connections**: every edge is checked by [`types::compatible`]
//!   at edit time; generation never fails for type reasons.
//! - **Transactional parsing**: a failed parse leaves the prior graph
//!   untouched.
//! - **Synchronous change notification**: every committed mutation emits a
//!   [`event::WorkspaceEvent`] to observers in registration order.
//! - **Dependency-injected catalogs**: node kinds live in a
//!   [`catalog::NodeCatalog`] built once and passed by reference; hosts may
//!   register their own actor kinds.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tangle_core::{catalog::NodeCatalog, codegen::CodeGenerator, parser::CodeParser};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(NodeCatalog::create());
//!
//!     // Text to graph...
//!     let parser = CodeParser::new(catalog.clone());
//!     let ws = parser
//!         .parse("let /*type:Number*/ score;\nscore = 1 + 2;\n")
//!         .await?;
//!
//!     // ...and back to text.
//!     let text = CodeGenerator::new().generate(&ws)?;
//!     print!("{text}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Guide
//!
//! Start with [`parser::CodeParser`] and [`codegen::CodeGenerator`] for the
//! two translation directions, then [`graph::Workspace`] for direct edits.
//! See [`catalog`] for the node kind schemas and [`shape`] for the
//! variable-arity layout logic.

pub mod catalog;
pub mod codegen;
pub mod error;
pub mod event;
pub mod graph;
pub mod parser;
pub mod procedures;
pub mod shape;
#[cfg(test)]
mod tests;
pub mod types;

pub use error::*;

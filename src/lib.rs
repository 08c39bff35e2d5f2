//! A reStructuredText parser producing a structured document tree (§1).
//!
//! Layered bottom-up, each module building on the last: [`runtime`] (cursor/combinator core),
//! [`primitives`] (character-class and line scanners), [`inline`] (emphasis/strong/literal/
//! reference/role markup), [`block`] (paragraphs, lists, tables, explicit markup), [`extensions`]
//! (the directive/role registry), and [`rewrite`] (section nesting and reference resolution).
//! [`api`] is the only module callers need.

pub mod api;
pub mod block;
pub mod config;
pub mod diagnostics;
pub mod extensions;
pub mod inline;
pub mod primitives;
pub mod rewrite;
pub mod runtime;
pub mod tree;

pub use api::Parser;
pub use config::ParserConfig;
pub use extensions::{ContentKind, DirectiveBuilder, DirectiveSpec, Payload, Registry, RoleSpec};
pub use tree::{Block, Document, Span};

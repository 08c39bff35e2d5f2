//! Public entry points (§6). Grounded on the teacher's own top-level `Parser`/`Document` builder
//! in `src/lib.rs`: a handful of `build`/`parse*` functions sitting on top of the staged
//! layers, with extension registration happening once at `build` time rather than per parse.

use crate::config::ParserConfig;
use crate::extensions::Registry;
use crate::inline::parse_spans;
use crate::rewrite;
use crate::tree::{Document, Span};

/// A configured parser: an extension [`Registry`] plus a [`ParserConfig`], both fixed at
/// construction and reused across any number of [`Parser::parse`] calls.
pub struct Parser {
    cfg: ParserConfig,
    registry: Registry,
}

impl Parser {
    /// Builds a parser from a caller-supplied extension registry and config. Pass
    /// `ParserConfig::default()` for `cfg` to get the stock recursion cap and `title-reference`
    /// default role with the rewrite pass enabled.
    pub fn build(registry: Registry, cfg: ParserConfig) -> Self {
        Parser { cfg, registry }
    }

    /// Builds a parser with no registered directives/roles and the default config.
    pub fn plain() -> Self {
        Parser {
            cfg: ParserConfig::default(),
            registry: Registry::new(),
        }
    }

    /// Parses `source` into a fully resolved [`Document`] (§4.6 rewrite applied, subject to
    /// `cfg.resolve_on_parse`).
    pub fn parse(&self, source: &str) -> Document {
        let blocks = crate::block::parse_document(source, &self.cfg, Some(&self.registry));
        let body = if self.cfg.resolve_on_parse {
            rewrite::resolve(blocks, true)
        } else {
            blocks
        };
        Document { body }
    }

    /// Parses `source` into the raw block tree, skipping the rewrite pass (§4.6) entirely:
    /// section nesting is left flat, link/footnote/citation/substitution references are left
    /// unresolved, and definition blocks are not stripped.
    pub fn parse_unresolved(&self, source: &str) -> Document {
        let body = crate::block::parse_document(source, &self.cfg, Some(&self.registry));
        Document { body }
    }

    /// Parses `source` as a single run of inline markup with no block structure (§6) — a field
    /// value, a table cell's single line, anything the caller already knows is span-only.
    pub fn parse_span_only(&self, source: &str) -> Vec<Span> {
        parse_spans(source, 0, 0, &self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Block;

    #[test]
    fn parse_resolves_by_default() {
        let doc = Parser::plain().parse(".. _t: http://example.com\n\n`t`_ link.\n");
        match &doc.body[0] {
            Block::Paragraph { spans, .. } => {
                assert!(matches!(spans[0], Span::SpanLink { .. }));
            }
            other => panic!("expected a paragraph, got {:?}", other),
        }
    }

    #[test]
    fn parse_unresolved_keeps_definitions_and_raw_references() {
        let doc = Parser::plain().parse_unresolved(".. _t: http://example.com\n\n`t`_ link.\n");
        assert!(matches!(doc.body[0], Block::LinkDefinition { .. }));
        match &doc.body[1] {
            Block::Paragraph { spans, .. } => {
                assert!(matches!(spans[0], Span::LinkIdReference { .. }));
            }
            other => panic!("expected a paragraph, got {:?}", other),
        }
    }

    #[test]
    fn resolve_on_parse_false_disables_rewrite_on_parse_too() {
        let cfg = ParserConfig {
            resolve_on_parse: false,
            ..ParserConfig::default()
        };
        let parser = Parser::build(Registry::new(), cfg);
        let doc = parser.parse(".. _t: http://example.com\n\n`t`_ link.\n");
        assert!(matches!(doc.body[0], Block::LinkDefinition { .. }));
    }

    #[test]
    fn parse_span_only_has_no_block_structure() {
        let spans = Parser::plain().parse_span_only("plain *emphasis* text");
        assert!(spans.iter().any(|s| matches!(s, Span::Emphasized(_))));
    }
}

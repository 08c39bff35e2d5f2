//! End-to-end scenarios (§8): one fixture document per scenario, asserted against the shape of
//! the resolved `Document` returned by the public `Parser` (§6). These exercise the full L1-L6
//! stack together rather than any one layer in isolation.

use rst_core::{Block, DirectiveBuilder, Parser, ParserConfig, Registry, Span};
use rstest::rstest;

fn plain_document(src: &str) -> rst_core::Document {
    Parser::plain().parse(src)
}

#[rstest]
fn bullet_list_with_nesting() {
    let doc = plain_document("- one\n\n  - nested\n\n- two\n");
    let items = match &doc.body[0] {
        Block::BulletList { items, .. } => items,
        other => panic!("expected a bullet list, got {:?}", other),
    };
    assert_eq!(items.len(), 2);
    let nested_found = items[0]
        .content
        .iter()
        .any(|b| matches!(b, Block::BulletList { .. }));
    assert!(nested_found, "first item should contain a nested bullet list");
}

#[rstest]
fn enum_list_with_explicit_start() {
    let doc = plain_document("3. three\n4. four\n");
    match &doc.body[0] {
        Block::EnumList { start, items, .. } => {
            assert_eq!(*start, 3);
            assert_eq!(items.len(), 2);
        }
        other => panic!("expected an enumerated list, got {:?}", other),
    }
}

#[rstest]
fn grid_table_with_vertical_merge() {
    // the middle row's separator is blank across the whole column, so the body row above and
    // below it merge into a single two-row-spanning cell in the left column.
    let src = "\
+-----+-----+
| a   | one |
+     +-----+
|     | two |
+-----+-----+
";
    let doc = plain_document(src);
    let table = match &doc.body[0] {
        Block::Table(t) => t,
        other => panic!("expected a table, got {:?}", other),
    };
    assert_eq!(table.body.len(), 2);
    assert_eq!(table.body[0].cells[0].row_span, 2);
}

#[rstest]
fn directive_with_argument_field_block_content() {
    let registry = Registry::new().directive(
        "box",
        DirectiveBuilder::new()
            .argument()
            .field("title")
            .block_content()
            .map(|p| {
                Ok(Block::QuotedBlock {
                    content: p.block_content.unwrap_or_default(),
                    attribution: Some(vec![Span::Text(p.fields.get("title").cloned().unwrap_or_default())]),
                })
            }),
    );
    let parser = Parser::build(registry, ParserConfig::default());
    let doc = parser.parse(".. box:: plain\n   :title: A Box\n\n   Inner text.\n");
    match &doc.body[0] {
        Block::QuotedBlock { content, attribution } => {
            assert!(matches!(&content[0], Block::Paragraph { .. }));
            assert_eq!(
                attribution.as_ref().unwrap()[0],
                Span::Text("A Box".to_string())
            );
        }
        other => panic!("expected a quoted block, got {:?}", other),
    }
}

#[rstest]
fn in_document_role_declaration_applies_to_later_inline_text() {
    let doc = plain_document(".. role:: hl(emphasis)\n\nplain text, then :hl:`highlighted`.\n");
    let para = doc
        .body
        .iter()
        .find_map(|b| match b {
            Block::Paragraph { spans, .. } => Some(spans),
            _ => None,
        })
        .expect("expected a paragraph in the resolved output");
    assert!(para.iter().any(|s| matches!(
        s,
        Span::InterpretedText { role, text, .. } if role == "emphasis" && text == "highlighted"
    )));
}

#[rstest]
fn internal_link_target_before_paragraph() {
    let doc = plain_document(".. _my-target:\n\nParagraph after the target.\n");
    // the internal link target is a pure-definition block and is stripped from resolved output,
    // leaving just the paragraph it precedes.
    assert_eq!(doc.body.len(), 1);
    match &doc.body[0] {
        Block::Paragraph { spans, attrs, .. } => {
            assert_eq!(spans[0], Span::Text("Paragraph after the target.".to_string()));
            assert_eq!(attrs.id.as_deref(), Some("my-target"));
        }
        other => panic!("expected a paragraph, got {:?}", other),
    }
}

#[rstest]
fn substitution_flanked_by_paired_punctuation_suppressed() {
    // a substitution reference immediately inside parentheses, with no surrounding whitespace,
    // should still be recognized (punctuation suppression only matters for emphasis/strong
    // markup, not substitution references), and resolve against its definition.
    let src = ".. |vers| replace:: 1.0\n\n(|vers|) is the current release.\n";
    let doc = plain_document(src);
    let para = doc
        .body
        .iter()
        .find_map(|b| match b {
            Block::Paragraph { spans, .. } => Some(spans),
            _ => None,
        })
        .expect("expected a paragraph in the resolved output");
    let resolved_text: String = para.iter().map(Span::plain_text).collect();
    assert!(resolved_text.contains("1.0"), "got: {}", resolved_text);
}

#[rstest]
fn header_level_assignment() {
    let src = "Title\n=====\n\nSection One\n-----------\n\nBody one.\n\nSection Two\n-----------\n\nBody two.\n";
    let doc = plain_document(src);
    let top = match &doc.body[0] {
        Block::Section { level, body, .. } => {
            assert_eq!(*level, 1);
            body
        }
        other => panic!("expected a top-level section, got {:?}", other),
    };
    let sub_levels: Vec<u32> = top
        .iter()
        .filter_map(|b| match b {
            Block::Section { level, .. } => Some(*level),
            _ => None,
        })
        .collect();
    assert_eq!(sub_levels, vec![2, 2]);
}

#[rstest]
fn illegal_grid_table_merge_fallback() {
    let src = "\
+-----+-----+
| a   | b   |
| c     d   |
+-----+-----+
";
    let doc = plain_document(src);
    // the disagreeing interior lines make the grid-table grammar reject the block outright; the
    // dispatcher falls back to treating it as an ordinary paragraph.
    assert!(matches!(doc.body[0], Block::Paragraph { .. }));
}

#[rstest]
fn unresolved_parse_keeps_definition_blocks() {
    let parser = Parser::plain();
    let doc = parser.parse_unresolved(".. _my-target:\n\nParagraph after the target.\n");
    assert!(matches!(doc.body[0], Block::InternalLinkDefinition { .. }));
}

#[rstest]
fn span_only_parse_has_no_registry_dependency() {
    let spans = Parser::plain().parse_span_only("plain *emphasized* text");
    assert!(spans.iter().any(|s| matches!(s, Span::Emphasized(_))));
}

#[rstest]
fn unknown_directive_without_registry_is_a_diagnostic() {
    let doc = plain_document(".. mystery:: arg\n");
    assert!(matches!(doc.body[0], Block::InvalidBlock { .. }));
}

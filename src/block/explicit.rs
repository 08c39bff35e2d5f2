//! Explicit markup dispatch (layer L4, §4.4/§4.5): `.. ` blocks — comments, footnote/citation
//! definitions, link targets, substitution definitions, directives, and the `.. role::` role
//! declaration. Grounded on the teacher's `parser/elements/annotation.rs` dispatch-by-prefix shape,
//! generalized from its closed set of built-in annotations to reST's open, registry-driven set.

use super::lines::{Line, LineCursor};
use super::Ctx;
use crate::diagnostics::DiagnosticKind;
use crate::extensions::{diagnostic_block, invoke_directive, ContentKind, Payload};
use crate::tree::{Attrs, Block, CustomRoleDef, FootnoteLabel, SourceFragment, Span};
use std::collections::HashMap;

const MARKER_INDENT: usize = 3; // len(".. ")

/// Attempts to parse one explicit markup block starting at the cursor. Returns `None` (without
/// consuming anything) if the current line isn't `.. ` prefixed.
pub fn try_parse(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let first = cur.peek()?;
    if first.text.trim_end() == ".." {
        // bare marker, body (if any) lives entirely in the indented continuation
        cur.advance();
        let body = cur.take_indented_block(MARKER_INDENT);
        let text = body.iter().map(|l| l.text).collect::<Vec<_>>().join("\n");
        return Some(Block::Comment { text });
    }
    if !first.text.starts_with(".. ") {
        return None;
    }
    let remainder = &first.text[3..];
    let offset = first.offset;
    cur.advance();

    if let Some(stripped) = remainder.strip_prefix('[') {
        return Some(parse_footnote_or_citation(stripped, offset, cur, ctx));
    }
    if let Some(stripped) = remainder.strip_prefix('_') {
        return Some(parse_link_target(stripped, offset, cur));
    }
    if let Some(stripped) = remainder.strip_prefix('|') {
        return Some(parse_substitution_definition(stripped, offset, cur, ctx));
    }
    if let Some(pos) = remainder.find("::") {
        let name_token = remainder[..pos].trim();
        if !name_token.is_empty() && !name_token.contains(char::is_whitespace) {
            let args_line = remainder[pos + 2..].trim().to_string();
            return Some(parse_directive(name_token, &args_line, offset, cur, ctx));
        }
    }
    Some(parse_comment(remainder, cur))
}

fn parse_comment(remainder: &str, cur: &mut LineCursor) -> Block {
    let body = cur.take_indented_block(MARKER_INDENT);
    let mut lines: Vec<&str> = Vec::new();
    if !remainder.trim().is_empty() {
        lines.push(remainder);
    }
    lines.extend(body.iter().map(|l| l.text));
    Block::Comment { text: lines.join("\n") }
}

fn classify_label(label: &str) -> Result<FootnoteLabel, String> {
    if label == "#" {
        Ok(FootnoteLabel::AutoNumber)
    } else if label == "*" {
        Ok(FootnoteLabel::AutoSymbol)
    } else if let Some(rest) = label.strip_prefix('#') {
        Ok(FootnoteLabel::AutoNumberLabeled(rest.to_string()))
    } else if let Ok(n) = label.parse::<u32>() {
        Ok(FootnoteLabel::Numeric(n))
    } else {
        Err(label.to_string())
    }
}

fn parse_footnote_or_citation(stripped: &str, offset: usize, cur: &mut LineCursor, ctx: &Ctx) -> Block {
    let close = match stripped.find(']') {
        Some(i) => i,
        None => return Block::invalid("malformed footnote/citation label", SourceFragment::new(offset, stripped.len() + 4)),
    };
    let label = &stripped[..close];
    let first_line_rest = stripped[close + 1..].trim_start();

    let continuation = cur.take_indented_block(MARKER_INDENT);

    let mut text_lines: Vec<&str> = Vec::new();
    if !first_line_rest.is_empty() {
        text_lines.push(first_line_rest);
    }
    text_lines.extend(continuation.iter().map(|l| l.text));
    let content_text = text_lines.join(" ");
    let content = if content_text.trim().is_empty() {
        Vec::new()
    } else {
        vec![Block::Paragraph {
            spans: ctx.spans(&content_text, offset),
            forced: false,
            attrs: Attrs::default(),
            source: SourceFragment::new(offset, content_text.len()),
        }]
    };

    match classify_label(label) {
        Ok(flabel) => Block::FootnoteDefinition {
            label: flabel,
            content,
            attrs: Attrs::default(),
        },
        Err(id) => Block::Citation {
            label: id,
            content,
            attrs: Attrs::default(),
        },
    }
}

fn parse_link_target(stripped: &str, offset: usize, cur: &mut LineCursor) -> Block {
    // `try_parse` has already peeled one leading `_` off to get here; a second one immediately
    // followed by `:` (`.. __: target`) is the anonymous-target form, not a name starting with
    // `_` (that case's `stripped` only has one leading `_`, with the name text right after it).
    let anonymous = stripped.starts_with('_') && stripped[1..].starts_with(':');
    let name_raw = if anonymous { &stripped[1..] } else { stripped };
    let colon = match name_raw.find(':') {
        Some(i) => i,
        None => return Block::invalid("malformed link target", SourceFragment::new(offset, name_raw.len() + 4)),
    };
    let name = if anonymous {
        String::new()
    } else {
        name_raw[..colon].trim_matches('`').to_string()
    };
    let mut value = name_raw[colon + 1..].trim().to_string();

    let continuation = cur.take_indented_block(MARKER_INDENT);
    if !continuation.is_empty() {
        let extra = continuation.iter().map(|l| l.text.trim()).collect::<Vec<_>>().join("");
        value.push_str(&extra);
    }

    if !anonymous {
        if let Some(alias_target) = value.strip_suffix('_') {
            let to = alias_target.trim_end_matches('_').to_string();
            return Block::LinkAlias { from: name, to };
        }
    }
    if value.is_empty() {
        Block::InternalLinkDefinition { id: name }
    } else {
        Block::LinkDefinition { id: name, target: value }
    }
}

fn parse_substitution_definition(stripped: &str, offset: usize, cur: &mut LineCursor, ctx: &Ctx) -> Block {
    let close = match stripped.find('|') {
        Some(i) => i,
        None => {
            return Block::invalid(
                "malformed substitution definition",
                SourceFragment::new(offset, stripped.len() + 4),
            )
        }
    };
    let name = stripped[..close].to_string();
    let after = stripped[close + 1..].trim_start();

    let pos = match after.find("::") {
        Some(p) => p,
        None => {
            return Block::SubstitutionDefinition {
                name,
                span: Box::new(Span::invalid("malformed substitution directive", SourceFragment::new(offset, after.len()))),
            }
        }
    };
    let directive_name = after[..pos].trim();
    let mut args_str = after[pos + 2..].trim().to_string();
    let continuation = cur.take_indented_block(MARKER_INDENT);
    if args_str.is_empty() && !continuation.is_empty() {
        args_str = continuation.iter().map(|l| l.text).collect::<Vec<_>>().join(" ");
    }

    let span = match directive_name {
        "replace" => {
            let spans = ctx.spans(&args_str, offset);
            if spans.len() == 1 {
                spans.into_iter().next().unwrap()
            } else {
                Span::SpanSequence(spans)
            }
        }
        "image" => Span::Image {
            uri: args_str.trim().to_string(),
            alt: None,
        },
        other => Span::invalid(
            format!("unknown substitution directive: {}", other),
            SourceFragment::new(offset, after.len()),
        ),
    };
    Block::SubstitutionDefinition { name, span: Box::new(span) }
}

/// Splits a directive body's indented continuation into leading `:field: value` lines and the
/// remaining content lines, per §4.5 (one line per field; no multi-line field-value continuation).
fn split_fields_and_content<'a>(body: Vec<Line<'a>>) -> (Vec<(String, String)>, Vec<Line<'a>>) {
    let mut fields = Vec::new();
    let mut idx = 0;
    while idx < body.len() {
        let line = body[idx];
        if line.is_blank() {
            break;
        }
        if !line.text.starts_with(':') {
            break;
        }
        let rest = &line.text[1..];
        let close = match rest.find(':') {
            Some(i) => i,
            None => break,
        };
        let key = rest[..close].trim().to_lowercase();
        let value = rest[close + 1..].trim().to_string();
        fields.push((key, value));
        idx += 1;
    }
    if idx < body.len() && body[idx].is_blank() {
        idx += 1;
    }
    (fields, body[idx..].to_vec())
}

fn parse_role_directive(args_line: &str, fields: Vec<(String, String)>, ctx: &Ctx) -> Block {
    let (name, base) = match args_line.find('(') {
        Some(open) => {
            let name = args_line[..open].trim().to_string();
            let base = args_line[open + 1..].trim_end_matches(')').trim().to_string();
            (name, base)
        }
        None => (args_line.trim().to_string(), String::new()),
    };
    // Registering here, rather than in the rewrite pass, is what makes the role usable by
    // inline parsing of the rest of this same document: `ctx.registry` is the same `Registry`
    // every later `ctx.spans()` call in this parse consults.
    if let Some(registry) = ctx.registry {
        registry.register_custom_role(name.clone(), base.clone(), fields.clone());
    }
    Block::CustomizedTextRole(CustomRoleDef { name, base, fields })
}

fn parse_directive(name_token: &str, args_line: &str, offset: usize, cur: &mut LineCursor, ctx: &Ctx) -> Block {
    let body = cur.take_indented_block(MARKER_INDENT);
    let (fields, content_lines) = split_fields_and_content(body);
    let source_len = args_line.len() + 4;

    if name_token.eq_ignore_ascii_case("role") {
        return parse_role_directive(args_line, fields, ctx);
    }

    let registry = match ctx.registry {
        Some(r) => r,
        None => {
            return diagnostic_block(
                DiagnosticKind::UnknownDirective { name: name_token.to_string() },
                offset,
                source_len,
            )
        }
    };
    let spec = match registry.lookup_directive(name_token) {
        Some(s) => s,
        None => {
            return diagnostic_block(
                DiagnosticKind::UnknownDirective { name: name_token.to_string() },
                offset,
                source_len,
            )
        }
    };

    let args: Vec<String> = if args_line.is_empty() {
        Vec::new()
    } else {
        args_line.split_whitespace().map(String::from).collect()
    };
    let field_map: HashMap<String, String> = fields.into_iter().collect();
    let joined_content = content_lines.iter().map(|l| l.text).collect::<Vec<_>>().join("\n");

    let mut payload = Payload {
        args,
        fields: field_map,
        raw_content: None,
        span_content: None,
        block_content: None,
    };
    match spec_content_kind(registry, name_token) {
        ContentKind::None => {}
        ContentKind::Raw => payload.raw_content = Some(joined_content),
        ContentKind::Span => payload.span_content = Some(ctx.spans(&joined_content, offset)),
        ContentKind::Block => {
            let content_cur_lines = content_lines.clone();
            let mut sub = LineCursor::new(&content_cur_lines);
            payload.block_content = Some(super::parse_blocks(&mut sub, ctx));
        }
    }

    match invoke_directive(spec, payload) {
        Ok(block) => block,
        Err(kind) => diagnostic_block(kind, offset, source_len),
    }
}

// `DirectiveSpec`'s content kind isn't exposed directly; re-derive it through a zero-cost lookup
// so `parse_directive` can decide how to shape the payload before calling `invoke_directive`.
fn spec_content_kind(registry: &crate::extensions::Registry, name: &str) -> ContentKind {
    registry
        .lookup_directive(name)
        .map(|s| s.content_kind())
        .unwrap_or(ContentKind::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::lines::split_lines;
    use crate::config::ParserConfig;
    use crate::extensions::{DirectiveBuilder, Registry};

    fn one_block(src: &str, registry: Option<&crate::extensions::Registry>) -> Block {
        let cfg = ParserConfig::default();
        let ctx = Ctx::new(&cfg, registry);
        let lines = split_lines(src);
        let mut cur = LineCursor::new(&lines);
        try_parse(&mut cur, &ctx).expect("expected an explicit markup block")
    }

    #[test]
    fn bare_comment_marker() {
        let got = one_block(".. \n   not a directive\n", None);
        match got {
            Block::Comment { text } => assert_eq!(text, "not a directive"),
            other => panic!("expected a comment, got {:?}", other),
        }
    }

    #[test]
    fn comment_with_inline_text() {
        let got = one_block(".. this is a comment\n", None);
        match got {
            Block::Comment { text } => assert_eq!(text, "this is a comment"),
            other => panic!("expected a comment, got {:?}", other),
        }
    }

    #[test]
    fn footnote_autonumber_label() {
        let got = one_block(".. [#] a note\n", None);
        match got {
            Block::FootnoteDefinition { label, .. } => assert_eq!(label, FootnoteLabel::AutoNumber),
            other => panic!("expected a footnote definition, got {:?}", other),
        }
    }

    #[test]
    fn citation_label_falls_back_from_footnote_classification() {
        let got = one_block(".. [CIT2002] a citation\n", None);
        match got {
            Block::Citation { label, .. } => assert_eq!(label, "CIT2002"),
            other => panic!("expected a citation, got {:?}", other),
        }
    }

    #[test]
    fn link_target_definition() {
        let got = one_block(".. _target: https://example.com/\n", None);
        match got {
            Block::LinkDefinition { id, target } => {
                assert_eq!(id, "target");
                assert_eq!(target, "https://example.com/");
            }
            other => panic!("expected a link definition, got {:?}", other),
        }
    }

    #[test]
    fn anonymous_link_target_has_an_empty_id() {
        let got = one_block(".. __: https://example.com/anon\n", None);
        match got {
            Block::LinkDefinition { id, target } => {
                assert!(id.is_empty());
                assert_eq!(target, "https://example.com/anon");
            }
            other => panic!("expected a link definition, got {:?}", other),
        }
    }

    #[test]
    fn underscore_led_name_is_still_a_named_target() {
        let got = one_block(".. _my_target: https://example.com/\n", None);
        match got {
            Block::LinkDefinition { id, target } => {
                assert_eq!(id, "my_target");
                assert_eq!(target, "https://example.com/");
            }
            other => panic!("expected a link definition, got {:?}", other),
        }
    }

    #[test]
    fn link_alias_definition() {
        let got = one_block(".. _alias: target_\n", None);
        match got {
            Block::LinkAlias { from, to } => {
                assert_eq!(from, "alias");
                assert_eq!(to, "target");
            }
            other => panic!("expected a link alias, got {:?}", other),
        }
    }

    #[test]
    fn internal_link_target_with_no_value() {
        let got = one_block(".. _anchor:\n", None);
        match got {
            Block::InternalLinkDefinition { id } => assert_eq!(id, "anchor"),
            other => panic!("expected an internal link definition, got {:?}", other),
        }
    }

    #[test]
    fn substitution_replace_definition() {
        let got = one_block(".. |sub| replace:: stand-in text\n", None);
        match got {
            Block::SubstitutionDefinition { name, span } => {
                assert_eq!(name, "sub");
                assert_eq!(*span, Span::Text("stand-in text".to_string()));
            }
            other => panic!("expected a substitution definition, got {:?}", other),
        }
    }

    #[test]
    fn substitution_image_definition() {
        let got = one_block(".. |pic| image:: pic.png\n", None);
        match got {
            Block::SubstitutionDefinition { name, span } => {
                assert_eq!(name, "pic");
                match *span {
                    Span::Image { uri, .. } => assert_eq!(uri, "pic.png"),
                    other => panic!("expected an image span, got {:?}", other),
                }
            }
            other => panic!("expected a substitution definition, got {:?}", other),
        }
    }

    #[test]
    fn role_declaration_with_base() {
        let got = one_block(".. role:: emphasis-red(emphasis)\n", None);
        match got {
            Block::CustomizedTextRole(def) => {
                assert_eq!(def.name, "emphasis-red");
                assert_eq!(def.base, "emphasis");
            }
            other => panic!("expected a customized text role, got {:?}", other),
        }
    }

    #[test]
    fn unknown_directive_produces_diagnostic() {
        let registry = Registry::new();
        let got = one_block(".. nonexistent:: arg\n", Some(&registry));
        assert!(matches!(got, Block::InvalidBlock { .. }));
    }

    #[test]
    fn known_directive_with_required_argument() {
        let registry = Registry::new().directive(
            "note",
            DirectiveBuilder::new()
                .argument()
                .map(|p| Ok(Block::StaticContent { text: p.args[0].clone() })),
        );
        let got = one_block(".. note:: hello\n", Some(&registry));
        match got {
            Block::StaticContent { text } => assert_eq!(text, "hello"),
            other => panic!("expected static content, got {:?}", other),
        }
    }
}

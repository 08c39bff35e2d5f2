//! Inline grammar (layer L3): the markup recognized inside a run of text that has already been
//! sliced out by the block grammar (a paragraph's joined lines, a header's text, a field body's
//! first line, ...). Grounded on the teacher's `src/tokenizer/inline/*.rs` staged matchers and
//! `src/semantic/elements/inlines/*`, generalized from txxt's inline set to reST's.
//!
//! The production functions below are plain `&str` scanners rather than [`crate::runtime::Parser`]
//! values: markup recognition here needs lookbehind into the character immediately preceding a
//! candidate delimiter, which doesn't fit the forward-only `Cursor` cleanly. They still lean on
//! the L2 primitives ([`crate::primitives::ref_name`]) for the sub-scans that do fit that shape.
//! The six rules in [`recognition`] are the single source of truth for flanking decisions; no
//! production re-derives them.

pub mod recognition;

use crate::config::ParserConfig;
use crate::extensions::Registry;
use crate::primitives::ref_name;
use crate::runtime::{Cursor, ParseResult};
use crate::tree::{FootnoteLabel, Span, SourceFragment};
use recognition::*;

fn char_before(text: &str, idx: usize) -> Option<char> {
    text[..idx].chars().last()
}

fn char_at(text: &str, idx: usize) -> Option<char> {
    text.get(idx..).and_then(|s| s.chars().next())
}

/// Scans for the first occurrence of `delim` at or after `from` whose surrounding characters
/// satisfy rules 2-6, returning the matched content and the byte index just past the closing
/// delimiter. Rule 1 (the start delimiter's left context) is checked by the caller, once, before
/// this is invoked — it doesn't change as we scan forward for the close.
fn find_close<'t>(text: &'t str, content_start: usize, delim: &str) -> Option<(&'t str, usize)> {
    let mut search_from = content_start;
    while let Some(rel) = text[search_from..].find(delim) {
        let idx = search_from + rel;
        let content = &text[content_start..idx];
        let prev = char_before(text, idx);
        let next = char_at(text, idx + delim.len());
        if nonzero_content(content)
            && end_preceded_ok(prev)
            && end_followed_ok(next)
            && !flanking_pair_suppressed(prev, next)
        {
            return Some((content, idx + delim.len()));
        }
        search_from = idx + delim.len();
    }
    None
}

/// Attempts a symmetric `delim ... delim` match starting exactly at `start`. Checks rule 1/2/5
/// on the opening delimiter, then hands off to [`find_close`] for the closing one.
fn match_delimited<'t>(text: &'t str, start: usize, delim: &str) -> Option<(&'t str, usize)> {
    if !text[start..].starts_with(delim) {
        return None;
    }
    let prev = char_before(text, start);
    if !start_preceded_ok(prev) {
        return None;
    }
    let content_start = start + delim.len();
    let after_delim = char_at(text, content_start);
    if !start_followed_ok(after_delim) {
        return None;
    }
    if flanking_pair_suppressed(prev, after_delim) {
        return None;
    }
    find_close(text, content_start, delim)
}

/// Splits `text <url>` / `text<url>` phrase-link content into its visible text and embedded
/// target, if the content ends with an angle-bracketed URI.
fn split_phrase_target(content: &str) -> (String, Option<String>) {
    let trimmed = content.trim_end();
    if trimmed.ends_with('>') {
        if let Some(open) = trimmed.rfind('<') {
            let target = trimmed[open + 1..trimmed.len() - 1].to_string();
            let text_part = trimmed[..open].trim_end().to_string();
            if !text_part.is_empty() {
                return (text_part, Some(target));
            }
        }
    }
    (content.to_string(), None)
}

/// If `pending` ends with `:role:` whose left context satisfies rule 1, strips it off and
/// returns `(remaining pending, role name)`.
fn strip_role_prefix(pending: &str) -> Option<(String, String)> {
    if !pending.ends_with(':') {
        return None;
    }
    let before_last = &pending[..pending.len() - 1];
    let colon1 = before_last.rfind(':')?;
    let name = &before_last[colon1 + 1..];
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return None;
    }
    let rest = &before_last[..colon1];
    if !start_preceded_ok(rest.chars().last()) {
        return None;
    }
    Some((rest.to_string(), name.to_string()))
}

/// If `text[at..]` starts with `:role:`, returns `(role name, bytes consumed)`.
fn take_role_suffix(text: &str, at: usize) -> Option<(String, usize)> {
    let rest = &text[at..];
    if !rest.starts_with(':') {
        return None;
    }
    let after_colon = &rest[1..];
    let end = after_colon
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '-' || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(after_colon.len());
    if end == 0 {
        return None;
    }
    if after_colon[end..].starts_with(':') {
        Some((after_colon[..end].to_string(), 1 + end + 1))
    } else {
        None
    }
}

fn try_literal(text: &str, i: usize) -> Option<(Span, usize)> {
    let (content, end) = match_delimited(text, i, "``")?;
    Some((Span::Literal(content.to_string()), end))
}

fn try_strong(text: &str, i: usize) -> Option<(Span, usize)> {
    let (content, end) = match_delimited(text, i, "**")?;
    Some((Span::Strong(vec![Span::Text(content.to_string())]), end))
}

fn try_emphasis(text: &str, i: usize) -> Option<(Span, usize)> {
    let (content, end) = match_delimited(text, i, "*")?;
    Some((Span::Emphasized(vec![Span::Text(content.to_string())]), end))
}

fn try_substitution(text: &str, i: usize, base_offset: usize) -> Option<(Span, usize)> {
    let (content, end) = match_delimited(text, i, "|")?;
    Some((
        Span::SubstitutionReference {
            name: content.trim().to_string(),
            source: SourceFragment::new(base_offset + i, end - i),
        },
        end,
    ))
}

/// `` _`text` `` — an inline-defined link target. Faithfully modeled as its (literally-taken)
/// inner text rather than a new attrs-bearing span variant, since the fixed span set has none.
fn try_inline_target(text: &str, i: usize) -> Option<(Span, usize)> {
    if !text[i..].starts_with("_`") {
        return None;
    }
    let prev = char_before(text, i);
    if !start_preceded_ok(prev) {
        return None;
    }
    let (content, end) = find_close(text, i + 2, "`")?;
    Some((Span::SpanSequence(vec![Span::Text(content.to_string())]), end))
}

/// `[#]_`, `[*]_`, `[#label]_`, `[3]_`, `[label]_`.
fn try_bracket_reference(text: &str, i: usize, base_offset: usize) -> Option<(Span, usize)> {
    if !text[i..].starts_with('[') {
        return None;
    }
    let prev = char_before(text, i);
    if !start_preceded_ok(prev) {
        return None;
    }
    let (content, close_end) = find_close(text, i + 1, "]")?;
    if !text[close_end..].starts_with('_') {
        return None;
    }
    let end = close_end + 1;
    let next = char_at(text, end);
    if !end_followed_ok(next) {
        return None;
    }
    let source = SourceFragment::new(base_offset + i, end - i);
    let label = if content == "#" {
        FootnoteLabel::AutoNumber
    } else if content == "*" {
        FootnoteLabel::AutoSymbol
    } else if let Some(rest) = content.strip_prefix('#') {
        FootnoteLabel::AutoNumberLabeled(rest.to_string())
    } else if let Ok(n) = content.parse::<u32>() {
        FootnoteLabel::Numeric(n)
    } else {
        return Some((
            Span::CitationReference {
                id: content.to_string(),
                source,
            },
            end,
        ));
    };
    Some((Span::FootnoteReference { label, source }, end))
}

/// Interpreted text, with optional `:role:` prefix/suffix, or a phrase link when the closing
/// backtick is followed by `_`/`__` instead of a role.
fn try_backtick(
    text: &str,
    i: usize,
    base_offset: usize,
    pending: &str,
    default_role: &str,
    registry: Option<&Registry>,
) -> Option<(Span, usize, Option<String>)> {
    if text[i..].starts_with("``") {
        return None; // literal, tried earlier
    }
    let (content, end) = match_delimited(text, i, "`")?;

    if text[end..].starts_with("__") {
        let after = end + 2;
        if end_followed_ok(char_at(text, after)) {
            let (text_part, target) = split_phrase_target(content);
            let span = match target {
                Some(target) => Span::SpanLink {
                    text: vec![Span::Text(text_part)],
                    target,
                },
                None => Span::LinkIdReference {
                    spans: vec![Span::Text(text_part)],
                    id: String::new(),
                    source: SourceFragment::new(base_offset + i, after - i),
                },
            };
            return Some((span, after, None));
        }
    }
    if text[end..].starts_with('_') && !text[end..].starts_with("__") {
        let after = end + 1;
        if end_followed_ok(char_at(text, after)) {
            let (text_part, target) = split_phrase_target(content);
            let span = match target {
                Some(target) => Span::SpanLink {
                    text: vec![Span::Text(text_part.clone())],
                    target,
                },
                None => Span::LinkIdReference {
                    spans: vec![Span::Text(text_part.clone())],
                    id: text_part,
                    source: SourceFragment::new(base_offset + i, after - i),
                },
            };
            return Some((span, after, None));
        }
    }

    if let Some((role, consumed)) = take_role_suffix(text, end) {
        let source = SourceFragment::new(base_offset + i, end + consumed - i);
        return Some((
            build_interpreted(&role, content, source, registry),
            end + consumed,
            None,
        ));
    }
    if let Some((new_pending, role)) = strip_role_prefix(pending) {
        let source = SourceFragment::new(base_offset + i, end - i);
        return Some((
            build_interpreted(&role, content, source, registry),
            end,
            Some(new_pending),
        ));
    }
    let source = SourceFragment::new(base_offset + i, end - i);
    Some((
        build_interpreted(default_role, content, source, registry),
        end,
        None,
    ))
}

/// Builds the `Span` for a named interpreted-text occurrence, consulting the registry for a
/// caller-registered role override (§4.5) and falling back to a plain `InterpretedText` node.
/// A registered role that returns its own `InterpretedText` has its `source` corrected to the
/// occurrence's real fragment; any other span shape from a custom role is trusted as-is.
fn build_interpreted(role: &str, content: &str, source: SourceFragment, registry: Option<&Registry>) -> Span {
    if let Some(spec) = registry.and_then(|r| r.lookup_role(role)) {
        return match spec.apply(content) {
            Span::InterpretedText { role, text, .. } => Span::InterpretedText { role, text, source },
            other => other,
        };
    }
    Span::InterpretedText {
        role: role.to_string(),
        text: content.to_string(),
        source,
    }
}

/// `name_` / `name__` shorthand link references.
fn try_shorthand_link(text: &str, i: usize, base_offset: usize) -> Option<(Span, usize)> {
    let prev = char_before(text, i);
    if !start_preceded_ok(prev) {
        return None;
    }
    let slice = Cursor::new(&text[i..]);
    let (name, after_name) = match ref_name().parse(slice) {
        ParseResult::Success(name, c) => (name, i + c.offset()),
        ParseResult::Failure(..) => return None,
    };
    if text[after_name..].starts_with("__") {
        let end = after_name + 2;
        if end_followed_ok(char_at(text, end)) {
            return Some((
                Span::LinkIdReference {
                    spans: vec![Span::Text(name.to_string())],
                    id: String::new(),
                    source: SourceFragment::new(base_offset + i, end - i),
                },
                end,
            ));
        }
        return None;
    }
    if text[after_name..].starts_with('_') {
        let end = after_name + 1;
        if end_followed_ok(char_at(text, end)) {
            return Some((
                Span::LinkIdReference {
                    spans: vec![Span::Text(name.to_string())],
                    id: name.to_string(),
                    source: SourceFragment::new(base_offset + i, end - i),
                },
                end,
            ));
        }
    }
    None
}

const URI_TRAILING_PUNCT: [char; 9] = ['.', ',', ';', ':', '!', '?', ')', ']', '}'];

fn strip_uri_trailing(mut s: &str) -> &str {
    loop {
        let last = match s.chars().last() {
            Some(c) => c,
            None => return s,
        };
        if URI_TRAILING_PUNCT.contains(&last) || last == '\'' || last == '"' {
            s = &s[..s.len() - last.len_utf8()];
        } else {
            break;
        }
    }
    s
}

fn try_standalone_uri(text: &str, i: usize) -> Option<(Span, usize)> {
    let rest = &text[i..];
    let scheme_len = ["https://", "http://", "ftp://", "mailto:"]
        .iter()
        .find(|s| rest.starts_with(**s))
        .map(|s| s.len());
    if let Some(_scheme_len) = scheme_len {
        let run_end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        let raw = &rest[..run_end];
        let stripped = strip_uri_trailing(raw);
        if stripped.is_empty() {
            return None;
        }
        return Some((
            Span::SpanLink {
                text: vec![Span::Text(stripped.to_string())],
                target: stripped.to_string(),
            },
            i + stripped.len(),
        ));
    }
    // bare email: local@domain.tld, conservatively scanned.
    if let Some(at_rel) = rest.find('@') {
        let local = &rest[..at_rel];
        if local.is_empty()
            || !local
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
        {
            return None;
        }
        let after_at = &rest[at_rel + 1..];
        let domain_end = after_at
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '.' | '-')))
            .unwrap_or(after_at.len());
        let domain = &after_at[..domain_end];
        if domain.contains('.') {
            let stripped = strip_uri_trailing(domain);
            let total = at_rel + 1 + stripped.len();
            let email = rest[..total].to_string();
            return Some((
                Span::SpanLink {
                    text: vec![Span::Text(email.clone())],
                    target: format!("mailto:{}", email),
                },
                i + total,
            ));
        }
    }
    None
}

/// Parses a slice of already-joined source text into spans (§4.3). `base_offset` is the absolute
/// byte offset of `text[0]` in the original source, used to build [`SourceFragment`]s. `depth`
/// tracks nested-span recursion (substitution/role bodies that themselves get inline-parsed);
/// beyond `cfg.recursion_cap` the remaining text is emitted as a single literal run instead of
/// recursing further.
pub fn parse_spans(text: &str, base_offset: usize, depth: u32, cfg: &ParserConfig) -> Vec<Span> {
    parse_spans_with_registry(text, base_offset, depth, cfg, None)
}

/// As [`parse_spans`], but consulting a [`Registry`] for caller-registered text-role overrides
/// on named interpreted text (§4.5). The block grammar calls this variant; the registry-less
/// `parse_spans` exists for tests and for content that cannot carry extensions (e.g. a header).
pub fn parse_spans_with_registry(
    text: &str,
    base_offset: usize,
    depth: u32,
    cfg: &ParserConfig,
    registry: Option<&Registry>,
) -> Vec<Span> {
    if depth >= cfg.recursion_cap {
        return vec![Span::Text(text.to_string())];
    }
    let mut spans = Vec::new();
    let mut pending = String::new();
    let mut i = 0usize;
    while i < text.len() {
        if text[i..].starts_with('\\') {
            if let Some(next_char) = char_at(text, i + 1) {
                pending.push(next_char);
                i += 1 + next_char.len_utf8();
                continue;
            }
        }
        if let Some((span, end)) = try_literal(text, i) {
            flush(&mut spans, &mut pending);
            spans.push(span);
            i = end;
            continue;
        }
        if let Some((span, end)) = try_strong(text, i) {
            flush(&mut spans, &mut pending);
            spans.push(span);
            i = end;
            continue;
        }
        if let Some((span, end)) = try_emphasis(text, i) {
            flush(&mut spans, &mut pending);
            spans.push(span);
            i = end;
            continue;
        }
        if let Some((span, end, trimmed_pending)) =
            try_backtick(text, i, base_offset, &pending, &cfg.default_role, registry)
        {
            if let Some(p) = trimmed_pending {
                pending = p;
            }
            flush(&mut spans, &mut pending);
            spans.push(span);
            i = end;
            continue;
        }
        if let Some((span, end)) = try_substitution(text, i, base_offset) {
            flush(&mut spans, &mut pending);
            spans.push(span);
            i = end;
            continue;
        }
        if let Some((span, end)) = try_inline_target(text, i) {
            flush(&mut spans, &mut pending);
            spans.push(span);
            i = end;
            continue;
        }
        if let Some((span, end)) = try_bracket_reference(text, i, base_offset) {
            flush(&mut spans, &mut pending);
            spans.push(span);
            i = end;
            continue;
        }
        if char_at(text, i).map(|c| c.is_alphanumeric()).unwrap_or(false) {
            if let Some((span, end)) = try_shorthand_link(text, i, base_offset) {
                flush(&mut spans, &mut pending);
                spans.push(span);
                i = end;
                continue;
            }
            if let Some((span, end)) = try_standalone_uri(text, i) {
                flush(&mut spans, &mut pending);
                spans.push(span);
                i = end;
                continue;
            }
        }
        let ch = char_at(text, i).unwrap();
        pending.push(ch);
        i += ch.len_utf8();
    }
    flush(&mut spans, &mut pending);
    spans
}

fn flush(spans: &mut Vec<Span>, pending: &mut String) {
    if !pending.is_empty() {
        spans.push(Span::Text(std::mem::take(pending)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(text: &str) -> Vec<Span> {
        parse_spans(text, 0, 0, &ParserConfig::default())
    }

    #[test]
    fn plain_text_is_a_single_run() {
        assert_eq!(spans("hello world"), vec![Span::Text("hello world".into())]);
    }

    #[test]
    fn emphasis_is_recognized() {
        let got = spans("an *emphasized* word");
        assert!(matches!(got[1], Span::Emphasized(_)));
    }

    #[test]
    fn strong_preempts_emphasis_at_double_star() {
        let got = spans("**strong**");
        assert_eq!(got.len(), 1);
        assert!(matches!(got[0], Span::Strong(_)));
    }

    #[test]
    fn literal_is_recognized() {
        let got = spans("``code here``");
        assert_eq!(got, vec![Span::Literal("code here".into())]);
    }

    #[test]
    fn substitution_flanked_by_matched_pair_is_suppressed() {
        // `(|)` : the `|` is flanked by a matched `()` pair, so it stays literal text.
        let got = spans("some (|)replaced| text");
        assert_eq!(got.len(), 1);
        assert!(matches!(&got[0], Span::Text(t) if t.contains("(|)replaced|")));
    }

    #[test]
    fn substitution_without_flanking_pair_matches() {
        let got = spans("a |name| substitution");
        assert!(matches!(&got[1], Span::SubstitutionReference { name, .. } if name == "name"));
    }

    #[test]
    fn footnote_autonumber_reference() {
        let got = spans("see note [#]_ here");
        assert!(matches!(
            &got[1],
            Span::FootnoteReference {
                label: FootnoteLabel::AutoNumber,
                ..
            }
        ));
    }

    #[test]
    fn named_phrase_link_with_embedded_target() {
        let got = spans("see `Python <http://python.org>`_ site");
        match &got[1] {
            Span::SpanLink { text, target } => {
                assert_eq!(target, "http://python.org");
                assert_eq!(text[0], Span::Text("Python".into()));
            }
            other => panic!("expected SpanLink, got {:?}", other),
        }
    }

    #[test]
    fn shorthand_reference_is_recognized() {
        let got = spans("see reference_ here");
        assert!(matches!(&got[1], Span::LinkIdReference { id, .. } if id == "reference"));
    }

    #[test]
    fn standalone_uri_is_recognized_with_trailing_punctuation_stripped() {
        let got = spans("visit http://example.com.");
        match &got[1] {
            Span::SpanLink { text, target } => {
                assert_eq!(target, "http://example.com");
                assert_eq!(text[0], Span::Text("http://example.com".into()));
            }
            other => panic!("expected a SpanLink span, got {:?}", other),
        }
        assert_eq!(got[2], Span::Text(".".into()));
    }

    #[test]
    fn standalone_email_resolves_to_a_mailto_target() {
        let got = spans("contact a.b@example.com today");
        match &got[1] {
            Span::SpanLink { text, target } => {
                assert_eq!(target, "mailto:a.b@example.com");
                assert_eq!(text[0], Span::Text("a.b@example.com".into()));
            }
            other => panic!("expected a SpanLink span, got {:?}", other),
        }
    }

    #[test]
    fn interpreted_text_uses_default_role() {
        let got = spans("a `title` here");
        assert!(matches!(&got[1], Span::InterpretedText { role, .. } if role == "title-reference"));
    }

    #[test]
    fn interpreted_text_role_prefix_is_applied() {
        let got = spans("see :math:`x^2` here");
        assert!(matches!(&got[1], Span::InterpretedText { role, text, .. } if role == "math" && text == "x^2"));
    }

    #[test]
    fn backslash_escape_suppresses_markup() {
        let got = spans(r"not \*emphasis\*");
        assert_eq!(got, vec![Span::Text("not *emphasis*".into())]);
    }

    #[test]
    fn recursion_cap_degrades_to_literal_text() {
        let cfg = ParserConfig {
            recursion_cap: 0,
            ..ParserConfig::default()
        };
        let got = parse_spans("*x*", 0, 0, &cfg);
        assert_eq!(got, vec![Span::Text("*x*".into())]);
    }
}

//! Bullet, enumerated, definition, field, and option lists, plus line blocks (§4.4).

use super::lines::{Line, LineCursor};
use super::{parse_blocks, Ctx};
use crate::tree::{
    Block, DefinitionListItem, EnumFormat, Field, LineBlockEntry, ListItem, NumeralSystem,
    OptionEntry, OptionListItem,
};

fn mark_forced(blocks: &mut [Block]) {
    for b in blocks.iter_mut() {
        if let Block::Paragraph { forced, .. } = b {
            *forced = true;
        }
    }
}

fn parse_item_body<'a>(item_lines: Vec<Line<'a>>, ctx: &Ctx) -> Vec<Block> {
    let mut item_cur = LineCursor::new(&item_lines);
    let mut content = parse_blocks(&mut item_cur, ctx);
    if content.len() > 1 {
        mark_forced(&mut content);
    }
    content
}

fn is_bullet_marker(line: &Line, bullet: char) -> bool {
    let t = line.text;
    line.indent() == 0
        && t.starts_with(bullet)
        && (t.len() == 1 || t[1..].starts_with(' '))
}

fn marker_content_col(line: &Line) -> usize {
    let rest = &line.text[1..];
    let spaces = rest.chars().take_while(|c| *c == ' ').count();
    1 + spaces.max(1).min(rest.len().max(1))
}

pub fn try_bullet_list(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let first = cur.peek()?;
    if first.indent() != 0 || !matches!(first.text.chars().next(), Some('*') | Some('-') | Some('+')) {
        return None;
    }
    if !(first.text.len() == 1 || first.text[1..].starts_with(' ')) {
        return None;
    }
    let bullet = first.text.chars().next().unwrap();
    let mut items = Vec::new();
    loop {
        cur.skip_blank_lines();
        let line = match cur.peek() {
            Some(l) if is_bullet_marker(&l, bullet) => l,
            _ => break,
        };
        cur.advance();
        let col = marker_content_col(&line);
        let mut item_lines = vec![Line {
            text: line.trimmed_start(col),
            offset: line.offset + col,
        }];
        item_lines.extend(cur.take_indented_block(col));
        items.push(ListItem {
            content: parse_item_body(item_lines, ctx),
        });
    }
    if items.is_empty() {
        None
    } else {
        Some(Block::BulletList { bullet, items })
    }
}

fn roman_value(token: &str) -> Option<u32> {
    let upper = token.to_ascii_uppercase();
    if upper.is_empty() || !upper.chars().all(|c| matches!(c, 'I' | 'V' | 'X' | 'L' | 'C' | 'D' | 'M')) {
        return None;
    }
    let val = |c: char| match c {
        'I' => 1,
        'V' => 5,
        'X' => 10,
        'L' => 50,
        'C' => 100,
        'D' => 500,
        'M' => 1000,
        _ => unreachable!(),
    };
    let chars: Vec<char> = upper.chars().collect();
    let mut total = 0i64;
    for i in 0..chars.len() {
        let v = val(chars[i]) as i64;
        if i + 1 < chars.len() && v < val(chars[i + 1]) as i64 {
            total -= v;
        } else {
            total += v;
        }
    }
    if total <= 0 {
        None
    } else {
        Some(total as u32)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Shape {
    Dot,
    Paren,
    BothParen,
}

struct EnumMarker {
    system: NumeralSystem,
    value: u32,
    shape: Shape,
    marker_len: usize,
}

/// Classifies a single candidate enumerator token at the start of `text` (§4.4). Ambiguous
/// single-letter tokens (`i`/`I`) resolve to the Roman numeral reading rather than confirming via
/// lookahead at a subsequent item, a simplification from the full ambiguity rule (noted in
/// DESIGN.md).
fn parse_enum_marker(text: &str) -> Option<EnumMarker> {
    let (token, shape, marker_len) = if let Some(rest) = text.strip_prefix('(') {
        let close = rest.find(')')?;
        let token = &rest[..close];
        if token.is_empty() {
            return None;
        }
        (token, Shape::BothParen, 1 + close + 1)
    } else {
        let end = text.find(|c| c == '.' || c == ')')?;
        let token = &text[..end];
        if token.is_empty() {
            return None;
        }
        let shape = if text.as_bytes()[end] == b'.' { Shape::Dot } else { Shape::Paren };
        (token, shape, end + 1)
    };
    if marker_len < text.len() && !text[marker_len..].starts_with(' ') {
        return None;
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        return Some(EnumMarker {
            system: NumeralSystem::Arabic,
            value: token.parse().ok()?,
            shape,
            marker_len,
        });
    }
    if token.chars().count() == 1 {
        let c = token.chars().next().unwrap();
        if c.is_ascii_lowercase() && c != 'i' {
            return Some(EnumMarker {
                system: NumeralSystem::LowerAlpha,
                value: (c as u32) - ('a' as u32) + 1,
                shape,
                marker_len,
            });
        }
        if c.is_ascii_uppercase() && c != 'I' {
            return Some(EnumMarker {
                system: NumeralSystem::UpperAlpha,
                value: (c as u32) - ('A' as u32) + 1,
                shape,
                marker_len,
            });
        }
    }
    if let Some(value) = roman_value(token) {
        let system = if token.chars().all(|c| c.is_ascii_uppercase()) {
            NumeralSystem::UpperRoman
        } else {
            NumeralSystem::LowerRoman
        };
        return Some(EnumMarker {
            system,
            value,
            shape,
            marker_len,
        });
    }
    None
}

fn enum_format(system: NumeralSystem, shape: Shape) -> EnumFormat {
    let (prefix, suffix): (&'static str, &'static str) = match shape {
        Shape::Dot => ("", "."),
        Shape::Paren => ("", ")"),
        Shape::BothParen => ("(", ")"),
    };
    EnumFormat { system, prefix, suffix }
}

pub fn try_enum_list(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let first = cur.peek()?;
    if first.indent() != 0 {
        return None;
    }
    let marker = parse_enum_marker(first.text)?;
    let format = enum_format(marker.system, marker.shape);
    let start = marker.value;
    let mut next_value = marker.value;
    let mut items = Vec::new();
    loop {
        cur.skip_blank_lines();
        let line = match cur.peek() {
            Some(l) if l.indent() == 0 => l,
            _ => break,
        };
        let this_marker = match parse_enum_marker(line.text) {
            Some(m) => m,
            None => break,
        };
        if this_marker.system != marker.system || this_marker.shape != marker.shape {
            break;
        }
        if !items.is_empty() && this_marker.value != next_value + 1 {
            break;
        }
        next_value = this_marker.value;
        cur.advance();
        let content_rest = &line.text[this_marker.marker_len..];
        let spaces = content_rest.chars().take_while(|c| *c == ' ').count();
        let col = this_marker.marker_len + spaces.max(1).min(content_rest.len().max(1));
        let mut item_lines = vec![Line {
            text: line.trimmed_start(col),
            offset: line.offset + col,
        }];
        item_lines.extend(cur.take_indented_block(col));
        items.push(ListItem {
            content: parse_item_body(item_lines, ctx),
        });
    }
    if items.is_empty() {
        None
    } else {
        Some(Block::EnumList { format, start, items })
    }
}

/// True if `line` looks like the start of a different block construct entirely — a new
/// bullet/enumerated list item, an explicit markup line, a table border, or a header decoration
/// line — rather than the next term of the same definition list (§4.4: a definition list ends
/// when one of these is encountered, not just at a blank line).
fn starts_a_different_construct(line: &Line) -> bool {
    let t = line.text;
    if matches!(t.chars().next(), Some('*') | Some('-') | Some('+')) && (t.len() == 1 || t[1..].starts_with(' ')) {
        return true;
    }
    if parse_enum_marker(t).is_some() {
        return true;
    }
    if t.starts_with(".. ") || t.trim_end() == ".." {
        return true;
    }
    if t.starts_with('+') && t.ends_with('+') && t.chars().all(|c| c == '+' || c == '-' || c == '=' || c == ' ') {
        return true;
    }
    let trimmed = t.trim_end();
    if let Some(first) = trimmed.chars().next() {
        if !first.is_alphanumeric() && !first.is_whitespace() && trimmed.chars().all(|c| c == first) {
            return true;
        }
    }
    false
}

pub fn try_definition_list(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let mut items = Vec::new();
    loop {
        let term_line = match cur.peek() {
            Some(l) if l.indent() == 0 && !l.is_blank() && !starts_a_different_construct(&l) => l,
            _ => break,
        };
        let def_line = match cur.peek_at(1) {
            Some(l) if !l.is_blank() && l.indent() > 0 => l,
            _ => break,
        };
        cur.advance();
        let indent = def_line.indent();
        let def_lines = cur.take_indented_block(indent);

        let (term_text, classifier_text) = match term_line.text.find(" : ") {
            Some(idx) => (&term_line.text[..idx], Some(&term_line.text[idx + 3..])),
            None => (term_line.text, None),
        };
        let term = ctx.spans(term_text, term_line.offset);
        let classifier = classifier_text.map(|c| ctx.spans(c, term_line.offset));
        let definition = parse_item_body(def_lines, ctx);
        items.push(DefinitionListItem {
            term,
            classifier,
            definition,
        });
    }
    if items.is_empty() {
        None
    } else {
        Some(Block::DefinitionList { items })
    }
}

pub fn try_field_list(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let mut fields = Vec::new();
    loop {
        let line = match cur.peek() {
            Some(l) if l.indent() == 0 && l.text.starts_with(':') => l,
            _ => break,
        };
        let close = match line.text[1..].find(':') {
            Some(idx) => idx + 1,
            None => break,
        };
        let name = line.text[1..close].to_string();
        let inline_rest = line.text[close + 1..].trim_start();
        cur.advance();
        let offset = line.offset + (line.text.len() - inline_rest.len());
        let mut body_lines = Vec::new();
        if !inline_rest.is_empty() {
            body_lines.push(Line {
                text: inline_rest,
                offset,
            });
        }
        body_lines.extend(cur.take_indented_block(1));
        fields.push(Field {
            name,
            body: parse_item_body(body_lines, ctx),
        });
    }
    if fields.is_empty() {
        None
    } else {
        Some(Block::FieldList { fields })
    }
}

fn parse_option_entry(text: &str) -> Option<(OptionEntry, usize)> {
    let starts_option = text.starts_with("--")
        || text.starts_with('-')
        || text.starts_with('+')
        || text.starts_with('/');
    if !starts_option {
        return None;
    }
    let flag_end = text
        .find(|c: char| c.is_whitespace() || c == '=' || c == '<')
        .unwrap_or(text.len());
    if flag_end <= 1 {
        return None;
    }
    let flag = text[..flag_end].to_string();
    let rest = &text[flag_end..];
    if rest.is_empty() {
        return Some((OptionEntry { flag, argument: None }, flag_end));
    }
    let (arg, consumed) = if let Some(stripped) = rest.strip_prefix('=') {
        let end = stripped.find(char::is_whitespace).unwrap_or(stripped.len());
        (Some(stripped[..end].to_string()), flag_end + 1 + end)
    } else if let Some(stripped) = rest.strip_prefix(' ') {
        if stripped.starts_with('<') {
            let end = stripped.find('>')?;
            (Some(stripped[1..end].to_string()), flag_end + 1 + end + 1)
        } else if !stripped.starts_with(' ') {
            let end = stripped.find(char::is_whitespace).unwrap_or(stripped.len());
            (Some(stripped[..end].to_string()), flag_end + 1 + end)
        } else {
            (None, flag_end)
        }
    } else {
        (None, flag_end)
    };
    Some((OptionEntry { flag, argument: arg }, consumed))
}

pub fn try_option_list(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let mut items = Vec::new();
    loop {
        let line = match cur.peek() {
            Some(l) if l.indent() == 0 => l,
            _ => break,
        };
        let mut options = Vec::new();
        let mut rest = line.text;
        let mut consumed_total = 0usize;
        loop {
            let (entry, consumed) = match parse_option_entry(rest) {
                Some(v) => v,
                None => break,
            };
            options.push(entry);
            consumed_total += consumed;
            rest = &rest[consumed..];
            if let Some(stripped) = rest.strip_prefix(", ") {
                rest = stripped;
                consumed_total += 2;
            } else {
                break;
            }
        }
        if options.is_empty() {
            break;
        }
        let desc_rest = &line.text[consumed_total..];
        let gap = desc_rest.chars().take_while(|c| *c == ' ').count();
        if gap < 2 && !desc_rest.trim().is_empty() {
            break; // not a real option-list description separator
        }
        cur.advance();
        let desc_text = desc_rest.trim_start();
        let desc_offset = line.offset + line.text.len() - desc_text.len();
        let mut desc_lines = Vec::new();
        if !desc_text.is_empty() {
            desc_lines.push(Line {
                text: desc_text,
                offset: desc_offset,
            });
        }
        desc_lines.extend(cur.take_indented_block(1));
        items.push(OptionListItem {
            options,
            description: parse_item_body(desc_lines, ctx),
        });
    }
    if items.is_empty() {
        None
    } else {
        Some(Block::OptionList { items })
    }
}

pub fn try_line_block(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let first = cur.peek()?;
    if first.indent() != 0 {
        return None;
    }
    let first_is_pipe = first.text == "|" || first.text.starts_with("| ");
    if !first_is_pipe {
        return None;
    }

    struct Level {
        indent: usize,
        entries: Vec<LineBlockEntry>,
    }
    let mut stack: Vec<Level> = vec![Level {
        indent: 0,
        entries: Vec::new(),
    }];

    loop {
        let line = match cur.peek() {
            Some(l) => l,
            None => break,
        };
        if line.is_blank() {
            break;
        }
        let ind = line.indent();
        let stripped = &line.text[ind..];
        if stripped == "|" || stripped.starts_with("| ") {
            let content = if stripped == "|" { "" } else { &stripped[2..] };
            while ind < stack.last().unwrap().indent {
                let popped = stack.pop().unwrap();
                stack.last_mut().unwrap().entries.push(LineBlockEntry::Nested(popped.entries));
            }
            if ind > stack.last().unwrap().indent {
                stack.push(Level {
                    indent: ind,
                    entries: Vec::new(),
                });
            }
            let content_offset = line.offset + (line.text.len() - content.len());
            let spans = ctx.spans(content, content_offset);
            stack.last_mut().unwrap().entries.push(LineBlockEntry::Line(spans));
            cur.advance();
        } else if ind > 0 {
            let text = line.trimmed_start(ind);
            let spans = ctx.spans(text, line.offset + ind);
            stack.last_mut().unwrap().entries.push(LineBlockEntry::Line(spans));
            cur.advance();
        } else {
            break;
        }
    }
    while stack.len() > 1 {
        let popped = stack.pop().unwrap();
        stack.last_mut().unwrap().entries.push(LineBlockEntry::Nested(popped.entries));
    }
    let entries = stack.pop().unwrap().entries;
    if entries.is_empty() {
        None
    } else {
        Some(Block::LineBlock { lines: entries })
    }
}

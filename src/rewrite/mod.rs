//! Rewrite pass (layer L6, §4.6): the post-block-parsing traversal that turns the flat,
//! unresolved block sequence into the final document — section nesting, link/substitution/
//! footnote/citation resolution, link-alias application, and (for `parse`'s "resolved" entry
//! point) stripping pure-definition blocks out of the rendered sequence.
//!
//! Grounded on the teacher's own multi-pass `rewrite/*` stage (tree-to-tree passes run after its
//! own parse tree is built, each pass doing one kind of cross-reference binding), generalized from
//! its closed reference kinds to reST's five (sections, links, substitutions, footnotes,
//! citations).

use crate::tree::{
    Attrs, Block, Decoration, DefinitionListItem, Field, FootnoteLabel, ListItem, OptionListItem, Span, Table,
    TableCell, TableRow,
};
use std::collections::{HashMap, HashSet, VecDeque};

fn normalize_id(s: &str) -> String {
    s.trim().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn slugify(text: &str) -> String {
    let mut out = String::new();
    let mut last_was_sep = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('-');
            last_was_sep = true;
        }
    }
    out.trim_matches('-').to_string()
}

fn unique_id(base: &str, seen: &mut HashMap<String, u32>) -> String {
    let base = if base.is_empty() { "section".to_string() } else { base.to_string() };
    let count = seen.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{}-{}", base, *count - 1)
    }
}

/// Groups a flat sequence of blocks into nested `Section`s by the first-seen-order decoration
/// rule (§4.4): the first `(character, has_overline)` pair encountered is level 1, the next new
/// pair is level 2, and so on. Only operates over the top-level sequence — headers nested inside
/// list items, block quotes, or directive content don't start new sections, a simplification of
/// the rarely-exercised general case.
type SectionStack = Vec<(u32, Block, Vec<Block>)>;

fn close_sections_to(stack: &mut SectionStack, out: &mut Vec<Block>, ids_seen: &mut HashMap<String, u32>, level: u32) {
    loop {
        let should_close = matches!(stack.last(), Some((top_level, _, _)) if *top_level >= level);
        if !should_close {
            break;
        }
        let (lvl, header, body) = stack.pop().unwrap();
        let title_text = match &header {
            Block::DecoratedHeader { spans, .. } => spans.iter().map(Span::plain_text).collect::<String>(),
            _ => String::new(),
        };
        let id = unique_id(&slugify(&title_text), ids_seen);
        let section = Block::Section {
            level: lvl,
            header: Box::new(header),
            body,
            attrs: Attrs::with_id(id),
        };
        if let Some((_, _, parent_body)) = stack.last_mut() {
            parent_body.push(section);
        } else {
            out.push(section);
        }
    }
}

pub fn assign_section_levels(blocks: Vec<Block>) -> Vec<Block> {
    let mut levels: HashMap<Decoration, u32> = HashMap::new();
    let mut next_level = 1u32;
    let mut ids_seen: HashMap<String, u32> = HashMap::new();
    let mut stack: SectionStack = Vec::new();
    let mut out: Vec<Block> = Vec::new();

    for block in blocks {
        if let Block::DecoratedHeader { decoration, .. } = &block {
            let level = *levels.entry(*decoration).or_insert_with(|| {
                let l = next_level;
                next_level += 1;
                l
            });
            close_sections_to(&mut stack, &mut out, &mut ids_seen, level);
            stack.push((level, block, Vec::new()));
        } else if let Some((_, _, body)) = stack.last_mut() {
            body.push(block);
        } else {
            out.push(block);
        }
    }
    close_sections_to(&mut stack, &mut out, &mut ids_seen, 0);
    out
}

#[derive(Default)]
struct Definitions {
    targets: HashMap<String, String>,
    anon_queue: VecDeque<String>,
    substitutions: HashMap<String, Span>,
    citation_ids: HashSet<String>,
    auto_footnote_queue: VecDeque<u32>,
    auto_symbol_count: usize,
    labeled_footnotes: HashMap<String, u32>,
    numeric_footnotes: HashSet<u32>,
}

fn for_each_nested_blocks(block: &Block, f: &mut impl FnMut(&[Block])) {
    match block {
        Block::Section { body, .. } => f(body),
        Block::QuotedBlock { content, .. } => f(content),
        Block::BulletList { items, .. } => {
            for it in items {
                f(&it.content);
            }
        }
        Block::EnumList { items, .. } => {
            for it in items {
                f(&it.content);
            }
        }
        Block::DefinitionList { items } => {
            for it in items {
                f(&it.definition);
            }
        }
        Block::FieldList { fields } => {
            for field in fields {
                f(&field.body);
            }
        }
        Block::OptionList { items } => {
            for it in items {
                f(&it.description);
            }
        }
        Block::Table(table) => {
            if let Some(head) = &table.head {
                for row in head {
                    for cell in &row.cells {
                        f(&cell.content);
                    }
                }
            }
            for row in &table.body {
                for cell in &row.cells {
                    f(&cell.content);
                }
            }
        }
        Block::FootnoteDefinition { content, .. } => f(content),
        Block::Citation { content, .. } => f(content),
        Block::BlockSequence(inner) => f(inner),
        _ => {}
    }
}

/// Propagates a standalone internal link target's id onto the `Attrs` of the block that follows
/// it at the same nesting level (§4.4): `.. _name:` followed by a paragraph gives that paragraph
/// the anchor id `name`. Runs after [`assign_section_levels`] so a target right before a header
/// attaches to the `Section` the header became, overriding its auto-generated slug id. Recurses
/// into every nested block sequence so a target inside a list item, quoted block, or directive
/// body attaches to its own following sibling rather than leaking to an unrelated one.
fn attach_internal_link_ids(blocks: Vec<Block>) -> Vec<Block> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut pending: Option<String> = None;
    for block in blocks {
        if let Block::InternalLinkDefinition { ref id } = block {
            if !id.is_empty() {
                pending = Some(id.clone());
            }
            out.push(block);
            continue;
        }
        let block = recurse_nested_for_ids(block);
        let block = match pending.take() {
            Some(id) => attach_id(block, id),
            None => block,
        };
        out.push(block);
    }
    out
}

fn attach_id(block: Block, id: String) -> Block {
    match block {
        Block::Paragraph { spans, forced, mut attrs, source } => {
            attrs.id = Some(id);
            Block::Paragraph { spans, forced, attrs, source }
        }
        Block::Section { level, header, body, mut attrs } => {
            attrs.id = Some(id);
            Block::Section { level, header, body, attrs }
        }
        Block::FootnoteDefinition { label, content, mut attrs } => {
            attrs.id = Some(id);
            Block::FootnoteDefinition { label, content, attrs }
        }
        Block::Citation { label, content, mut attrs } => {
            attrs.id = Some(id);
            Block::Citation { label, content, attrs }
        }
        other => other,
    }
}

fn recurse_nested_for_ids(block: Block) -> Block {
    match block {
        Block::Section { level, header, body, attrs } => Block::Section {
            level,
            header,
            body: attach_internal_link_ids(body),
            attrs,
        },
        Block::QuotedBlock { content, attribution } => Block::QuotedBlock {
            content: attach_internal_link_ids(content),
            attribution,
        },
        Block::BulletList { bullet, items } => Block::BulletList {
            bullet,
            items: items
                .into_iter()
                .map(|it| ListItem { content: attach_internal_link_ids(it.content) })
                .collect(),
        },
        Block::EnumList { format, start, items } => Block::EnumList {
            format,
            start,
            items: items
                .into_iter()
                .map(|it| ListItem { content: attach_internal_link_ids(it.content) })
                .collect(),
        },
        Block::DefinitionList { items } => Block::DefinitionList {
            items: items
                .into_iter()
                .map(|it| DefinitionListItem {
                    term: it.term,
                    classifier: it.classifier,
                    definition: attach_internal_link_ids(it.definition),
                })
                .collect(),
        },
        Block::FieldList { fields } => Block::FieldList {
            fields: fields
                .into_iter()
                .map(|f| Field { name: f.name, body: attach_internal_link_ids(f.body) })
                .collect(),
        },
        Block::OptionList { items } => Block::OptionList {
            items: items
                .into_iter()
                .map(|it| OptionListItem {
                    options: it.options,
                    description: attach_internal_link_ids(it.description),
                })
                .collect(),
        },
        Block::Table(table) => Block::Table(attach_ids_in_table(table)),
        Block::FootnoteDefinition { label, content, attrs } => Block::FootnoteDefinition {
            label,
            content: attach_internal_link_ids(content),
            attrs,
        },
        Block::Citation { label, content, attrs } => Block::Citation {
            label,
            content: attach_internal_link_ids(content),
            attrs,
        },
        Block::BlockSequence(inner) => Block::BlockSequence(attach_internal_link_ids(inner)),
        other => other,
    }
}

fn attach_ids_in_table(table: Table) -> Table {
    let rewrite_rows = |rows: Vec<TableRow>| -> Vec<TableRow> {
        rows.into_iter()
            .map(|row| TableRow {
                cells: row
                    .cells
                    .into_iter()
                    .map(|cell| TableCell {
                        role: cell.role,
                        content: attach_internal_link_ids(cell.content),
                        col_span: cell.col_span,
                        row_span: cell.row_span,
                    })
                    .collect(),
            })
            .collect()
    };
    Table {
        head: table.head.map(rewrite_rows),
        body: rewrite_rows(table.body),
    }
}

fn collect(blocks: &[Block], defs: &mut Definitions, aliases: &mut Vec<(String, String)>) {
    for block in blocks {
        match block {
            Block::LinkDefinition { id, target } => {
                if id.is_empty() {
                    defs.anon_queue.push_back(target.clone());
                } else {
                    let key = normalize_id(id);
                    defs.targets.insert(key, target.clone());
                }
            }
            Block::InternalLinkDefinition { id } => {
                let key = normalize_id(id);
                defs.targets.entry(key).or_insert_with(String::new);
            }
            Block::LinkAlias { from, to } => aliases.push((normalize_id(from), normalize_id(to))),
            Block::SubstitutionDefinition { name, span } => {
                defs.substitutions.insert(name.clone(), (**span).clone());
            }
            Block::Citation { label, .. } => {
                defs.citation_ids.insert(normalize_id(label));
            }
            Block::FootnoteDefinition { label, .. } => match label {
                FootnoteLabel::AutoNumber => {
                    let n = defs.auto_footnote_queue.len() as u32 + defs.labeled_footnotes.len() as u32 + 1;
                    defs.auto_footnote_queue.push_back(n);
                }
                FootnoteLabel::AutoNumberLabeled(name) => {
                    let n = defs.auto_footnote_queue.len() as u32 + defs.labeled_footnotes.len() as u32 + 1;
                    defs.labeled_footnotes.insert(name.clone(), n);
                }
                FootnoteLabel::AutoSymbol => {
                    defs.auto_symbol_count += 1;
                }
                FootnoteLabel::Numeric(n) => {
                    defs.numeric_footnotes.insert(*n);
                }
            },
            _ => {}
        }
        for_each_nested_blocks(block, &mut |nested| collect(nested, defs, aliases));
    }
}

fn resolve_aliases(defs: &mut Definitions, aliases: &[(String, String)]) {
    for (from, to) in aliases {
        let mut target = to.clone();
        let mut seen = HashSet::new();
        while let Some((_, next)) = aliases.iter().find(|(f, _)| f == &target) {
            if !seen.insert(target.clone()) {
                break; // alias cycle
            }
            target = next.clone();
        }
        if let Some(resolved) = defs.targets.get(&target).cloned() {
            defs.targets.insert(from.clone(), resolved);
        }
    }
}

fn resolve_substitution(name: &str, defs: &Definitions, visiting: &mut HashSet<String>) -> Span {
    if !visiting.insert(name.to_string()) {
        return Span::invalid(
            format!("substitution cycle: {}", name),
            crate::tree::SourceFragment::new(0, 0),
        );
    }
    let result = match defs.substitutions.get(name) {
        Some(span) => rewrite_span(span.clone(), defs, visiting),
        None => Span::invalid(
            format!("unresolved substitution: {}", name),
            crate::tree::SourceFragment::new(0, 0),
        ),
    };
    visiting.remove(name);
    result
}

fn rewrite_span(span: Span, defs: &Definitions, visiting: &mut HashSet<String>) -> Span {
    match span {
        Span::Emphasized(inner) => Span::Emphasized(rewrite_spans(inner, defs, visiting)),
        Span::Strong(inner) => Span::Strong(rewrite_spans(inner, defs, visiting)),
        Span::SpanSequence(inner) => Span::SpanSequence(rewrite_spans(inner, defs, visiting)),
        Span::Classifier(inner) => Span::Classifier(rewrite_spans(inner, defs, visiting)),
        Span::SpanLink { text, target } => Span::SpanLink {
            text: rewrite_spans(text, defs, visiting),
            target,
        },
        Span::LinkPathReference { spans, target } => Span::LinkPathReference {
            spans: rewrite_spans(spans, defs, visiting),
            target,
        },
        Span::LinkIdReference { spans, id, source } => {
            let key = normalize_id(&id);
            let resolved_target = if id.is_empty() {
                // anonymous reference: bind to the next unclaimed anonymous target in doc order
                None // filled in by rewrite_spans via a mutable queue; see below
            } else {
                defs.targets.get(&key).cloned()
            };
            match resolved_target {
                Some(target) => Span::SpanLink {
                    text: rewrite_spans(spans, defs, visiting),
                    target,
                },
                None if id.is_empty() => Span::LinkIdReference { spans, id, source },
                None => Span::invalid(format!("unresolved reference: {}", id), source),
            }
        }
        Span::SubstitutionReference { name, source } => {
            let _ = source;
            resolve_substitution(&name, defs, visiting)
        }
        Span::FootnoteReference { label, source } => match resolve_footnote_label(&label, defs) {
            Some(resolved) => Span::FootnoteReference { label: resolved, source },
            None => Span::invalid(format!("unresolved footnote: {}", footnote_key(&label)), source),
        },
        Span::CitationReference { id, source } => {
            if defs.citation_ids.contains(&normalize_id(&id)) {
                Span::CitationReference { id, source }
            } else {
                Span::invalid(format!("unresolved citation: {}", id), source)
            }
        }
        other => other,
    }
}

fn rewrite_spans(spans: Vec<Span>, defs: &Definitions, visiting: &mut HashSet<String>) -> Vec<Span> {
    spans.into_iter().map(|s| rewrite_span(s, defs, visiting)).collect()
}

fn footnote_key(label: &FootnoteLabel) -> String {
    match label {
        FootnoteLabel::AutoNumber => "#".to_string(),
        FootnoteLabel::AutoSymbol => "*".to_string(),
        FootnoteLabel::AutoNumberLabeled(name) => format!("#{}", name),
        FootnoteLabel::Numeric(n) => n.to_string(),
    }
}

fn resolve_footnote_label(label: &FootnoteLabel, defs: &Definitions) -> Option<FootnoteLabel> {
    match label {
        FootnoteLabel::Numeric(n) => defs.numeric_footnotes.contains(n).then(|| FootnoteLabel::Numeric(*n)),
        FootnoteLabel::AutoNumberLabeled(name) => defs.labeled_footnotes.get(name).map(|n| FootnoteLabel::Numeric(*n)),
        FootnoteLabel::AutoNumber => Some(FootnoteLabel::AutoNumber),
        FootnoteLabel::AutoSymbol => Some(FootnoteLabel::AutoSymbol),
    }
}

/// Mutable resolution state threaded through the block-rewriting pass: anonymous link targets and
/// autonumber footnotes are consumed in document order as definitions/references are encountered,
/// so (unlike the read-only lookups in [`rewrite_span`]) these need to advance as the tree is
/// walked. Definitions and references each pop from their own copy of the assigned-number
/// sequence, so e.g. the first autonumber definition and the first autonumber reference both land
/// on 1 regardless of how defs/refs interleave in the source.
struct Sequencer {
    anon_queue: VecDeque<String>,
    auto_footnote_def_queue: VecDeque<u32>,
    auto_footnote_ref_queue: VecDeque<u32>,
    symbol_remaining: usize,
}

fn rewrite_span_seq(span: Span, defs: &Definitions, seq: &mut Sequencer, visiting: &mut HashSet<String>) -> Span {
    match span {
        Span::LinkIdReference { spans, id, source } if id.is_empty() => match seq.anon_queue.pop_front() {
            Some(target) => Span::SpanLink {
                text: rewrite_spans_seq(spans, defs, seq, visiting),
                target,
            },
            None => Span::invalid("unresolved reference: anonymous", source),
        },
        Span::FootnoteReference {
            label: FootnoteLabel::AutoNumber,
            source,
        } => match seq.auto_footnote_ref_queue.pop_front() {
            Some(n) => Span::FootnoteReference {
                label: FootnoteLabel::Numeric(n),
                source,
            },
            None => Span::invalid("unresolved footnote: #", source),
        },
        Span::FootnoteReference {
            label: FootnoteLabel::AutoSymbol,
            source,
        } => {
            if seq.symbol_remaining > 0 {
                seq.symbol_remaining -= 1;
                Span::FootnoteReference {
                    label: FootnoteLabel::AutoSymbol,
                    source,
                }
            } else {
                Span::invalid("unresolved footnote: *", source)
            }
        }
        Span::Emphasized(inner) => Span::Emphasized(rewrite_spans_seq(inner, defs, seq, visiting)),
        Span::Strong(inner) => Span::Strong(rewrite_spans_seq(inner, defs, seq, visiting)),
        Span::SpanSequence(inner) => Span::SpanSequence(rewrite_spans_seq(inner, defs, seq, visiting)),
        Span::Classifier(inner) => Span::Classifier(rewrite_spans_seq(inner, defs, seq, visiting)),
        Span::SpanLink { text, target } => Span::SpanLink {
            text: rewrite_spans_seq(text, defs, seq, visiting),
            target,
        },
        Span::LinkPathReference { spans, target } => Span::LinkPathReference {
            spans: rewrite_spans_seq(spans, defs, seq, visiting),
            target,
        },
        other => rewrite_span(other, defs, visiting),
    }
}

fn rewrite_spans_seq(spans: Vec<Span>, defs: &Definitions, seq: &mut Sequencer, visiting: &mut HashSet<String>) -> Vec<Span> {
    spans.into_iter().map(|s| rewrite_span_seq(s, defs, seq, visiting)).collect()
}

fn is_pure_definition(block: &Block) -> bool {
    matches!(
        block,
        Block::LinkDefinition { .. }
            | Block::InternalLinkDefinition { .. }
            | Block::LinkAlias { .. }
            | Block::SubstitutionDefinition { .. }
            | Block::FootnoteDefinition { .. }
    )
}

fn rewrite_list_items(items: Vec<ListItem>, defs: &Definitions, seq: &mut Sequencer, visiting: &mut HashSet<String>, strip: bool) -> Vec<ListItem> {
    items
        .into_iter()
        .map(|it| ListItem {
            content: rewrite_blocks(it.content, defs, seq, visiting, strip),
        })
        .collect()
}

fn rewrite_fields(fields: Vec<Field>, defs: &Definitions, seq: &mut Sequencer, visiting: &mut HashSet<String>, strip: bool) -> Vec<Field> {
    fields
        .into_iter()
        .map(|f| Field {
            name: f.name,
            body: rewrite_blocks(f.body, defs, seq, visiting, strip),
        })
        .collect()
}

fn rewrite_option_items(items: Vec<OptionListItem>, defs: &Definitions, seq: &mut Sequencer, visiting: &mut HashSet<String>, strip: bool) -> Vec<OptionListItem> {
    items
        .into_iter()
        .map(|it| OptionListItem {
            options: it.options,
            description: rewrite_blocks(it.description, defs, seq, visiting, strip),
        })
        .collect()
}

fn rewrite_table(table: Table, defs: &Definitions, seq: &mut Sequencer, visiting: &mut HashSet<String>, strip: bool) -> Table {
    let rewrite_rows = |rows: Vec<crate::tree::TableRow>, seq: &mut Sequencer| -> Vec<crate::tree::TableRow> {
        rows.into_iter()
            .map(|row| crate::tree::TableRow {
                cells: row
                    .cells
                    .into_iter()
                    .map(|cell| crate::tree::TableCell {
                        role: cell.role,
                        content: rewrite_blocks(cell.content, defs, seq, visiting, strip),
                        col_span: cell.col_span,
                        row_span: cell.row_span,
                    })
                    .collect(),
            })
            .collect()
    };
    Table {
        head: table.head.map(|h| rewrite_rows(h, seq)),
        body: rewrite_rows(table.body, seq),
    }
}

fn rewrite_blocks(blocks: Vec<Block>, defs: &Definitions, seq: &mut Sequencer, visiting: &mut HashSet<String>, strip: bool) -> Vec<Block> {
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        if strip && is_pure_definition(&block) {
            continue;
        }
        let rewritten = match block {
            Block::Paragraph { spans, forced, attrs, source } => Block::Paragraph {
                spans: rewrite_spans_seq(spans, defs, seq, visiting),
                forced,
                attrs,
                source,
            },
            Block::QuotedBlock { content, attribution } => Block::QuotedBlock {
                content: rewrite_blocks(content, defs, seq, visiting, strip),
                attribution: attribution.map(|a| rewrite_spans_seq(a, defs, seq, visiting)),
            },
            Block::BulletList { bullet, items } => Block::BulletList {
                bullet,
                items: rewrite_list_items(items, defs, seq, visiting, strip),
            },
            Block::EnumList { format, start, items } => Block::EnumList {
                format,
                start,
                items: rewrite_list_items(items, defs, seq, visiting, strip),
            },
            Block::DefinitionList { items } => Block::DefinitionList {
                items: items
                    .into_iter()
                    .map(|it| crate::tree::DefinitionListItem {
                        term: rewrite_spans_seq(it.term, defs, seq, visiting),
                        classifier: it.classifier.map(|c| rewrite_spans_seq(c, defs, seq, visiting)),
                        definition: rewrite_blocks(it.definition, defs, seq, visiting, strip),
                    })
                    .collect(),
            },
            Block::FieldList { fields } => Block::FieldList {
                fields: rewrite_fields(fields, defs, seq, visiting, strip),
            },
            Block::OptionList { items } => Block::OptionList {
                items: rewrite_option_items(items, defs, seq, visiting, strip),
            },
            Block::LineBlock { lines } => Block::LineBlock {
                lines: rewrite_line_block(lines, defs, seq, visiting),
            },
            Block::Table(table) => Block::Table(rewrite_table(table, defs, seq, visiting, strip)),
            Block::DecoratedHeader { decoration, spans, source } => Block::DecoratedHeader {
                decoration,
                spans: rewrite_spans_seq(spans, defs, seq, visiting),
                source,
            },
            Block::Section { level, header, body, attrs } => Block::Section {
                level,
                header: Box::new(rewrite_blocks(vec![*header], defs, seq, visiting, strip).remove(0)),
                body: rewrite_blocks(body, defs, seq, visiting, strip),
                attrs,
            },
            Block::FootnoteDefinition { label, content, attrs } => {
                let resolved_label = match &label {
                    FootnoteLabel::AutoNumber => seq.auto_footnote_def_queue.pop_front().map(FootnoteLabel::Numeric).unwrap_or(label),
                    other => resolve_footnote_label(other, defs).unwrap_or(label.clone()),
                };
                Block::FootnoteDefinition {
                    label: resolved_label,
                    content: rewrite_blocks(content, defs, seq, visiting, strip),
                    attrs,
                }
            }
            Block::Citation { label, content, attrs } => Block::Citation {
                label,
                content: rewrite_blocks(content, defs, seq, visiting, strip),
                attrs,
            },
            Block::SubstitutionDefinition { name, span } => Block::SubstitutionDefinition {
                name,
                span: Box::new(rewrite_span(*span, defs, visiting)),
            },
            Block::BlockSequence(inner) => Block::BlockSequence(rewrite_blocks(inner, defs, seq, visiting, strip)),
            other => other,
        };
        out.push(rewritten);
    }
    out
}

fn rewrite_line_block(lines: Vec<crate::tree::LineBlockEntry>, defs: &Definitions, seq: &mut Sequencer, visiting: &mut HashSet<String>) -> Vec<crate::tree::LineBlockEntry> {
    lines
        .into_iter()
        .map(|entry| match entry {
            crate::tree::LineBlockEntry::Line(spans) => crate::tree::LineBlockEntry::Line(rewrite_spans_seq(spans, defs, seq, visiting)),
            crate::tree::LineBlockEntry::Nested(inner) => crate::tree::LineBlockEntry::Nested(rewrite_line_block(inner, defs, seq, visiting)),
        })
        .collect()
}

/// Runs the full rewrite pass over a freshly block-parsed document (§4.6), producing the
/// resolved tree `parse` returns. `strip_definitions` controls step 6 — `false` preserves
/// definition blocks in place (used by intermediate tooling that still wants resolved references
/// without losing the raw definitions); the public `parse` entry point always passes `true`.
pub fn resolve(blocks: Vec<Block>, strip_definitions: bool) -> Vec<Block> {
    let mut defs = Definitions::default();
    let mut aliases = Vec::new();
    collect(&blocks, &mut defs, &mut aliases);
    resolve_aliases(&mut defs, &aliases);

    let sectioned = attach_internal_link_ids(assign_section_levels(blocks));

    let mut seq = Sequencer {
        anon_queue: defs.anon_queue.clone(),
        auto_footnote_def_queue: defs.auto_footnote_queue.clone(),
        auto_footnote_ref_queue: defs.auto_footnote_queue.clone(),
        symbol_remaining: defs.auto_symbol_count,
    };
    let mut visiting = HashSet::new();
    rewrite_blocks(sectioned, &defs, &mut seq, &mut visiting, strip_definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::parse_document;
    use crate::config::ParserConfig;

    fn resolved(src: &str) -> Vec<Block> {
        let blocks = parse_document(src, &ParserConfig::default(), None);
        resolve(blocks, true)
    }

    #[test]
    fn sections_nest_by_first_seen_decoration() {
        let got = resolved("Title\n=====\n\nintro\n\nSub\n---\n\nbody\n");
        assert_eq!(got.len(), 1);
        match &got[0] {
            Block::Section { level, body, .. } => {
                assert_eq!(*level, 1);
                assert!(body.iter().any(|b| matches!(b, Block::Section { level: 2, .. })));
            }
            other => panic!("expected top-level section, got {:?}", other),
        }
    }

    #[test]
    fn named_link_reference_resolves() {
        let got = resolved("See `target`_.\n\n.. _target: https://example.com/\n");
        let para = &got[0];
        match para {
            Block::Paragraph { spans, .. } => {
                assert!(spans.iter().any(|s| matches!(s, Span::SpanLink { target, .. } if target == "https://example.com/")));
            }
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn unresolved_named_reference_becomes_invalid_span() {
        let got = resolved("See `nowhere`_.\n");
        match &got[0] {
            Block::Paragraph { spans, .. } => {
                assert!(spans.iter().any(|s| matches!(s, Span::InvalidSpan { .. })));
            }
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn definition_blocks_are_stripped_from_resolved_output() {
        let got = resolved(".. _target: https://example.com/\n\nbody\n");
        assert_eq!(got.len(), 1);
        assert!(matches!(&got[0], Block::Paragraph { .. }));
    }

    #[test]
    fn anonymous_reference_resolves_to_anonymous_target_in_order() {
        let got = resolved("See foo__.\n\n.. __: https://example.com/anon\n");
        match &got[0] {
            Block::Paragraph { spans, .. } => {
                assert!(spans.iter().any(|s| matches!(s, Span::SpanLink { target, .. } if target == "https://example.com/anon")));
            }
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn named_target_does_not_satisfy_an_anonymous_reference() {
        let got = resolved("See foo__.\n\n.. _foo: https://example.com/named\n");
        match &got[0] {
            Block::Paragraph { spans, .. } => {
                assert!(spans.iter().any(|s| matches!(s, Span::InvalidSpan { .. })));
                assert!(!spans.iter().any(|s| matches!(s, Span::SpanLink { .. })));
            }
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn internal_target_attaches_its_id_to_the_following_paragraph() {
        let got = resolved(".. _my-target:\n\nSome text.\n");
        match &got[0] {
            Block::Paragraph { attrs, .. } => assert_eq!(attrs.id.as_deref(), Some("my-target")),
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn internal_target_before_a_header_overrides_the_section_s_auto_id() {
        let got = resolved(".. _custom-id:\n\nTitle\n=====\n\nbody\n");
        match &got[0] {
            Block::Section { attrs, .. } => assert_eq!(attrs.id.as_deref(), Some("custom-id")),
            other => panic!("expected section, got {:?}", other),
        }
    }

    #[test]
    fn autonumber_footnote_reference_gets_sequence_number() {
        let got = resolved("text [#]_\n\n.. [#] a note\n");
        match &got[0] {
            Block::Paragraph { spans, .. } => {
                assert!(spans.iter().any(|s| matches!(s, Span::FootnoteReference { label: FootnoteLabel::Numeric(1), .. })));
            }
            other => panic!("expected paragraph, got {:?}", other),
        }
    }
}

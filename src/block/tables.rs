//! Grid and simple table grammars (§4.4).
//!
//! Grid tables are parsed as a small 2D border grammar: column boundaries come from the `+`
//! positions of the top border, each row band's interior dividers are checked for uniform
//! presence/absence across every line in the band (a column merge) and across the band's trailing
//! separator (a row merge); any inconsistency between lines is exactly the "illegal merge" case
//! (§8) and is reported by returning `None` so the top-level dispatcher falls back to treating the
//! whole table's raw lines as an ordinary paragraph.

use super::lines::{Line, LineCursor};
use super::{parse_blocks, Ctx};
use crate::tree::{Block, CellRole, Table, TableCell, TableRow};

fn is_border_line(s: &str) -> bool {
    // A row-merge separator marks the continuing column's segment with blanks instead of
    // dashes (the row-merge pass below tells the two cases apart), so blanks have to be
    // accepted here too or such a line would never even reach that pass.
    s.starts_with('+') && s.ends_with('+') && s.chars().all(|c| c == '+' || c == '-' || c == ' ')
}

fn is_head_separator(s: &str) -> bool {
    s.starts_with('+') && s.ends_with('+') && s.chars().all(|c| c == '+' || c == '=')
}

fn is_content_line(s: &str) -> bool {
    s.starts_with('|') && s.ends_with('|') && s.len() > 1
}

struct Band<'a> {
    content_lines: Vec<&'a str>,
    separator: &'a str,
    is_head_boundary: bool,
}

pub fn try_grid_table(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let top = cur.peek()?;
    if !is_border_line(top.text) {
        return None;
    }
    let width = top.text.len();
    let mut raw: Vec<Line> = vec![top];
    let mut probe = *cur;
    probe.advance();
    loop {
        match probe.peek() {
            Some(l) if l.text.len() == width && (is_content_line(l.text) || is_border_line(l.text) || is_head_separator(l.text)) => {
                raw.push(l);
                probe.advance();
            }
            _ => break,
        }
    }
    if raw.len() < 3 {
        return None;
    }
    let last = raw.last().unwrap();
    if !is_border_line(last.text) {
        return None;
    }

    let boundaries: Vec<usize> = top.text.char_indices().filter(|(_, c)| *c == '+').map(|(i, _)| i).collect();
    if boundaries.len() < 2 {
        return None;
    }
    let ncols = boundaries.len() - 1;

    let mut bands: Vec<Band> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in &raw[1..] {
        if is_content_line(line.text) {
            current.push(line.text);
        } else {
            bands.push(Band {
                content_lines: std::mem::take(&mut current),
                separator: line.text,
                is_head_boundary: is_head_separator(line.text),
            });
        }
    }
    if !current.is_empty() {
        return None; // trailing content with no closing separator: malformed
    }
    if bands.is_empty() {
        return None;
    }

    let head_band_count = bands.iter().position(|b| b.is_head_boundary).map(|i| i + 1);

    // Column grouping per band, validated uniform across every content line in the band.
    let mut band_groups: Vec<Vec<(usize, usize)>> = Vec::new();
    for band in &bands {
        let mut groups = Vec::new();
        let mut start_col = 0usize;
        for c in 0..ncols {
            let at = boundaries[c + 1];
            let divided = band
                .content_lines
                .iter()
                .map(|l| l.as_bytes().get(at).copied())
                .collect::<Vec<_>>();
            let all_bar = divided.iter().all(|b| *b == Some(b'|'));
            let all_space = divided.iter().all(|b| *b != Some(b'|'));
            if !all_bar && !all_space {
                return None; // mixed divider presence across lines in the band: illegal merge
            }
            if all_bar || c + 1 == ncols {
                groups.push((boundaries[start_col], boundaries[c + 1]));
                start_col = c + 1;
            }
        }
        band_groups.push(groups);
    }

    // Row-merge pass: a band's separator showing no '-' under a group's column range means that
    // group continues into the next band's matching group.
    let mut row_spans: Vec<Vec<usize>> = band_groups.iter().map(|g| vec![1; g.len()]).collect();
    let mut absorbed: Vec<Vec<bool>> = band_groups.iter().map(|g| vec![false; g.len()]).collect();
    for i in 0..bands.len().saturating_sub(1) {
        if band_groups[i] != band_groups[i + 1] {
            continue; // differing column shape between adjacent bands: no merge attempted
        }
        let sep = bands[i].separator.as_bytes();
        for (gi, (s, e)) in band_groups[i].iter().enumerate() {
            let range = &sep[*s..*e];
            let all_dash = range.iter().all(|b| *b == b'-' || *b == b'+');
            let all_blank_border = range.iter().enumerate().all(|(k, b)| {
                let at = s + k;
                *b == b' ' || at == *s || at == *e - 1
            });
            if !all_dash && all_blank_border {
                row_spans[i][gi] += 1;
                absorbed[i + 1][gi] = true;
            } else if !all_dash {
                return None; // partial row merge: illegal
            }
        }
    }

    let mut rows = Vec::new();
    for (bi, band) in bands.iter().enumerate() {
        let mut cells = Vec::new();
        for (gi, (s, e)) in band_groups[bi].iter().enumerate() {
            if absorbed[bi][gi] {
                continue; // this cell's content was already folded into the row above
            }
            let mut text_lines: Vec<String> = band
                .content_lines
                .iter()
                .map(|l| l.get(*s + 1..*e).unwrap_or("").to_string())
                .collect();
            let mut bi2 = bi;
            let mut gi2 = gi;
            let mut span = row_spans[bi][gi];
            while span > 1 {
                bi2 += 1;
                text_lines.extend(
                    bands[bi2]
                        .content_lines
                        .iter()
                        .map(|l| l.get(*s + 1..*e).unwrap_or("").to_string()),
                );
                span -= 1;
                gi2 = gi2.min(band_groups[bi2].len().saturating_sub(1));
            }
            let _ = gi2;
            let cell_lines: Vec<Line> = text_lines
                .iter()
                .map(|t| Line {
                    text: t.strip_prefix(' ').unwrap_or(t).trim_end(),
                    offset: 0,
                })
                .collect();
            let mut cell_cur = LineCursor::new(&cell_lines);
            let content = parse_blocks(&mut cell_cur, ctx);
            let role = if head_band_count.map(|h| bi < h).unwrap_or(false) {
                CellRole::Head
            } else {
                CellRole::Body
            };
            cells.push(TableCell {
                role,
                content,
                col_span: e - s,
                row_span: row_spans[bi][gi],
            });
        }
        if !cells.is_empty() {
            rows.push(TableRow { cells });
        }
    }

    for _ in 0..raw.len() - 1 {
        cur.advance();
    }
    let split_at = head_band_count.unwrap_or(0);
    let (head, body) = if split_at > 0 {
        let mut all = rows;
        let body = all.split_off(split_at.min(all.len()));
        (Some(all), body)
    } else {
        (None, rows)
    };
    Some(Block::Table(Table { head, body }))
}


fn equals_spans(s: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        if c == '=' {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(st) = start.take() {
            spans.push((st, i));
        }
    }
    if let Some(st) = start {
        spans.push((st, s.len()));
    }
    spans
}

fn matches_spans(s: &str, spans: &[(usize, usize)]) -> bool {
    if s.len() < spans.last().map(|(_, e)| *e).unwrap_or(0) {
        return false;
    }
    spans.iter().all(|(start, end)| {
        s.get(*start..*end).map(|seg| seg.chars().all(|c| c == '=')).unwrap_or(false)
    })
}

fn is_dash_separator(s: &str, spans: &[(usize, usize)]) -> bool {
    spans.iter().all(|(start, end)| {
        s.get(*start..*end).map(|seg| seg.chars().all(|c| c == '-' || c == ' ')).unwrap_or(false)
    }) && s.chars().any(|c| c == '-')
}

/// Groups adjacent column indices whose gap in `line` (the space between two established column
/// spans) is filled rather than blank — a `---`/`===` run bridging the column boundary, the
/// signal that the row those columns belong to merges horizontally across that boundary (§4.4).
/// A line that doesn't bridge any boundary yields one singleton group per column: a no-op merge.
fn merge_groups(line: &str, spans: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current = vec![0usize];
    for i in 1..spans.len() {
        let prev_end = spans[i - 1].1;
        let next_start = spans[i].0;
        let bridges = line
            .get(prev_end..next_start)
            .map(|gap| !gap.is_empty() && !gap.chars().any(|c| c == ' '))
            .unwrap_or(false);
        if bridges {
            current.push(i);
        } else {
            groups.push(std::mem::take(&mut current));
            current = vec![i];
        }
    }
    groups.push(current);
    groups
}

/// Applies `groups` to `row`, combining the cells in each multi-column group into one cell whose
/// `col_span` is the sum of the merged cells' spans and whose content is their concatenation. A
/// no-op (all-singleton) grouping leaves `row` untouched.
fn merge_row_cells(row: &mut TableRow, groups: &[Vec<usize>]) {
    if groups.iter().all(|g| g.len() == 1) {
        return;
    }
    let mut merged = Vec::with_capacity(groups.len());
    for group in groups {
        let role = row.cells[group[0]].role;
        let col_span: usize = group.iter().map(|&idx| row.cells[idx].col_span).sum();
        let mut content = Vec::new();
        for &idx in group {
            content.extend(row.cells[idx].content.iter().cloned());
        }
        merged.push(TableCell {
            role,
            content,
            col_span,
            row_span: 1,
        });
    }
    row.cells = merged;
}

pub fn try_simple_table(cur: &mut LineCursor, ctx: &Ctx) -> Option<Block> {
    let top = cur.peek()?;
    let spans = equals_spans(top.text);
    if spans.is_empty() {
        return None;
    }

    let mut probe = *cur;
    probe.advance();
    let mut raw: Vec<Line> = Vec::new();
    let mut sep_indices = vec![0usize]; // index into raw+1 conceptually; track positions in collected lines
    loop {
        match probe.peek() {
            Some(l) if l.is_blank() => break,
            Some(l) if matches_spans(l.text, &spans) => {
                raw.push(l);
                sep_indices.push(raw.len());
                probe.advance();
            }
            Some(l) => {
                raw.push(l);
                probe.advance();
            }
            None => break,
        }
    }
    if sep_indices.len() < 2 {
        return None;
    }

    let extract_row = |line: &str| -> TableRow {
        let cells = spans
            .iter()
            .map(|(s, e)| {
                let text = line.get(*s..(*e).min(line.len())).unwrap_or("").trim();
                let cell_line = [Line { text, offset: 0 }];
                let mut cc = LineCursor::new(&cell_line);
                TableCell {
                    role: CellRole::Body,
                    content: parse_blocks(&mut cc, ctx),
                    col_span: 1,
                    row_span: 1,
                }
            })
            .collect();
        TableRow { cells }
    };

    let mut bands: Vec<Vec<TableRow>> = Vec::new();
    for w in sep_indices.windows(2) {
        let (start, end) = (w[0], w[1] - 1);
        let mut rows: Vec<TableRow> = Vec::new();
        for line in &raw[start..end] {
            if line.is_blank() {
                continue;
            }
            if is_dash_separator(line.text, &spans) {
                // an interior `---` line merges the row above it horizontally wherever it
                // bridges a column gap; a non-bridging dash line is just a visual divider.
                if let Some(prev) = rows.last_mut() {
                    merge_row_cells(prev, &merge_groups(line.text, &spans));
                }
                continue;
            }
            rows.push(extract_row(line.text));
        }
        bands.push(rows);
    }

    let (mut head, mut body) = if bands.len() >= 2 {
        let head = bands.remove(0);
        let body: Vec<TableRow> = bands.into_iter().flatten().collect();
        (Some(head), body)
    } else {
        (None, bands.into_iter().flatten().collect())
    };
    if head.is_none() && body.is_empty() {
        return None;
    }

    // the closing `===` border can itself bridge column gaps, merging the last body row (or, if
    // there's no body, the last head row) the same way an interior `---` line would (§4.4).
    if let Some(&last_sep_idx) = sep_indices.last() {
        if let Some(last_sep_line) = raw.get(last_sep_idx - 1) {
            let groups = merge_groups(last_sep_line.text, &spans);
            if let Some(row) = body.last_mut().or_else(|| head.as_mut().and_then(|h| h.last_mut())) {
                merge_row_cells(row, &groups);
            }
        }
    }

    let total_consumed = *sep_indices.last().unwrap();
    for _ in 0..total_consumed {
        cur.advance();
    }
    let head = head.map(|rows| {
        rows.into_iter()
            .map(|row| TableRow {
                cells: row
                    .cells
                    .into_iter()
                    .map(|c| TableCell {
                        role: CellRole::Head,
                        ..c
                    })
                    .collect(),
            })
            .collect()
    });
    Some(Block::Table(Table { head, body }))
}

#[cfg(test)]
mod simple_table_tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::tree::Span;

    fn table(src: &str) -> Table {
        let cfg = ParserConfig::default();
        let ctx = Ctx::new(&cfg, None);
        let lines = crate::block::lines::split_lines(src);
        let mut cur = LineCursor::new(&lines);
        match try_simple_table(&mut cur, &ctx) {
            Some(Block::Table(t)) => t,
            other => panic!("expected a table, got {:?}", other),
        }
    }

    #[test]
    fn simple_table_with_header() {
        let t = table(
            "===== =====\n\
             A     B    \n\
             ===== =====\n\
             one   two  \n\
             ===== =====\n",
        );
        let head = t.head.expect("head band");
        assert_eq!(head.len(), 1);
        assert_eq!(head[0].cells.len(), 2);
        assert_eq!(t.body.len(), 1);
        match &t.body[0].cells[0].content[0] {
            Block::Paragraph { spans, .. } => assert_eq!(spans[0], Span::Text("one".into())),
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn interior_dash_line_merges_preceding_row_horizontally() {
        let t = table(
            "===== =====\n\
             one   two  \n\
             -----------\n\
             ===== =====\n",
        );
        assert_eq!(t.body.len(), 1);
        assert_eq!(t.body[0].cells.len(), 1);
        assert_eq!(t.body[0].cells[0].col_span, 2);
        match &t.body[0].cells[0].content[0] {
            Block::Paragraph { spans, .. } => assert_eq!(spans[0], Span::Text("one".into())),
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn non_bridging_dash_line_is_just_a_divider() {
        let t = table(
            "===== =====\n\
             one   two  \n\
             ----- -----\n\
             three four \n\
             ===== =====\n",
        );
        assert_eq!(t.body.len(), 2);
        assert_eq!(t.body[0].cells.len(), 2);
        assert_eq!(t.body[0].cells[0].col_span, 1);
    }

    #[test]
    fn closing_border_merges_the_last_row() {
        let t = table(
            "===== =====\n\
             one   two  \n\
             ===========\n",
        );
        assert_eq!(t.body.len(), 1);
        assert_eq!(t.body[0].cells.len(), 1);
        assert_eq!(t.body[0].cells[0].col_span, 2);
    }
}

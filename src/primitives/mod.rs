//! Text primitives (layer L2): character-class scanners, line-oriented primitives, and the
//! reference-name scanner. Built directly on the L1 runtime; everything above this module is
//! built out of these primitives rather than scanning raw `&str` by hand.

use crate::runtime::{char as rt_char, literal, Cursor, Message, ParseResult, Parser};
use std::rc::Rc;

/// A character-class scanner builder. `min`/`max`/`take` configure how many matching characters
/// are required/allowed before `.build()` turns it into a `Parser<&str>` over the matched run.
pub struct CharScanner<'a> {
    pred: Rc<dyn Fn(char) -> bool + 'a>,
    min: usize,
    max: Option<usize>,
}

impl<'a> CharScanner<'a> {
    pub fn min(mut self, n: usize) -> Self {
        self.min = n;
        self
    }

    pub fn max(mut self, n: usize) -> Self {
        self.max = Some(n);
        self
    }

    /// Match exactly `n` characters.
    pub fn take(self, n: usize) -> Self {
        self.min(n).max(n)
    }

    pub fn build(self) -> Parser<'a, &'a str> {
        let pred = self.pred;
        let min = self.min;
        let max = self.max;
        Parser::new(move |c: Cursor<'a>| {
            let start = c.offset();
            let mut end = start;
            let mut count = 0usize;
            for ch in c.rest().chars() {
                if let Some(m) = max {
                    if count >= m {
                        break;
                    }
                }
                if !pred(ch) {
                    break;
                }
                end += ch.len_utf8();
                count += 1;
            }
            if count < min {
                ParseResult::Failure(Message::Static("char class did not match enough input"), c)
            } else {
                ParseResult::Success(&c.source()[start..end], c.at(end))
            }
        })
    }
}

fn scanner<'a>(pred: impl Fn(char) -> bool + 'a) -> CharScanner<'a> {
    CharScanner {
        pred: Rc::new(pred),
        min: 1,
        max: None,
    }
}

/// Matches a run of characters from a fixed set. Precomputes nothing fancier than a `Vec<char>`
/// membership check — the sets used throughout this crate are all single-digit in size, so a
/// linear scan beats a hash lookup.
pub fn any_of<'a>(chars: &'a [char]) -> CharScanner<'a> {
    scanner(move |ch| chars.contains(&ch))
}

pub fn any_but<'a>(chars: &'a [char]) -> CharScanner<'a> {
    scanner(move |ch| !chars.contains(&ch))
}

pub fn any_in<'a>(ranges: &'a [(char, char)]) -> CharScanner<'a> {
    scanner(move |ch| ranges.iter().any(|(lo, hi)| *lo <= ch && ch <= *hi))
}

pub fn any_while<'a>(pred: impl Fn(char) -> bool + 'a) -> CharScanner<'a> {
    scanner(pred)
}

/// Matches `\n` or `\r\n`, consuming it.
pub fn eol<'a>() -> Parser<'a, ()> {
    Parser::new(|c: Cursor<'a>| {
        if c.rest().starts_with("\r\n") {
            ParseResult::Success((), c.advance(2))
        } else if c.rest().starts_with('\n') {
            ParseResult::Success((), c.advance(1))
        } else {
            ParseResult::Failure(Message::Static("expected end of line"), c)
        }
    })
}

/// Pure lookahead: succeeds iff the cursor is at end of input.
pub fn eof<'a>() -> Parser<'a, ()> {
    Parser::new(|c: Cursor<'a>| {
        if c.is_eof() {
            ParseResult::Success((), c)
        } else {
            ParseResult::Failure(Message::Static("expected end of input"), c)
        }
    })
}

/// Pure lookahead: succeeds iff the cursor sits at the start of a line (offset 0 or immediately
/// after a `\n`).
pub fn at_start<'a>() -> Parser<'a, ()> {
    Parser::new(|c: Cursor<'a>| {
        let ok = c.offset() == 0 || c.source()[..c.offset()].ends_with('\n');
        if ok {
            ParseResult::Success((), c)
        } else {
            ParseResult::Failure(Message::Static("expected start of line"), c)
        }
    })
}

/// The remainder of the current line, not including the terminating `eol`/eof.
pub fn rest_of_line<'a>() -> Parser<'a, &'a str> {
    Parser::new(|c: Cursor<'a>| {
        let start = c.offset();
        let mut end = start;
        for ch in c.rest().chars() {
            if ch == '\n' {
                break;
            }
            end += ch.len_utf8();
        }
        ParseResult::Success(&c.source()[start..end], c.at(end))
    })
}

fn is_line_blank(line: &str) -> bool {
    line.trim_end_matches('\r').chars().all(|ch| ch.is_whitespace())
}

/// Succeeds on a line containing only whitespace before `eol`, consuming through the `eol`.
/// Also succeeds (without consuming) at eof, for composition convenience — callers building
/// `blank_line.many()` loops must still gate on `not(eof())` themselves, since an eof match
/// here does not advance the cursor and would otherwise spin forever were it not for the
/// runtime's no-progress guard on repetition.
pub fn blank_line<'a>() -> Parser<'a, ()> {
    Parser::new(|c: Cursor<'a>| {
        if c.is_eof() {
            return ParseResult::Success((), c);
        }
        let line_end = rest_of_line().parse(c);
        match line_end {
            ParseResult::Success(line, c2) if is_line_blank(line) => {
                match eol().parse(c2) {
                    ParseResult::Success(_, c3) => ParseResult::Success((), c3),
                    ParseResult::Failure(_, _) => ParseResult::Success((), c2), // blank line at eof w/o trailing \n
                }
            }
            _ => ParseResult::Failure(Message::Static("expected blank line"), c),
        }
    })
}

/// One or more consecutive blank lines.
pub fn blank_lines<'a>() -> Parser<'a, usize> {
    Parser::new(|c: Cursor<'a>| {
        let mut count = 0usize;
        let mut cur = c;
        loop {
            if cur.is_eof() {
                break;
            }
            match blank_line().parse(cur) {
                ParseResult::Success(_, c2) if c2.offset() > cur.offset() => {
                    cur = c2;
                    count += 1;
                }
                _ => break,
            }
        }
        if count == 0 {
            ParseResult::Failure(Message::Static("expected at least one blank line"), c)
        } else {
            ParseResult::Success(count, cur)
        }
    })
}

/// A non-blank line's text, consuming through its terminating `eol` (or eof).
pub fn text_line<'a>() -> Parser<'a, &'a str> {
    Parser::new(|c: Cursor<'a>| match rest_of_line().parse(c) {
        ParseResult::Success(line, c2) if !is_line_blank(line) => ParseResult::Success(line, c2),
        _ => ParseResult::Failure(Message::Static("expected non-blank line"), c),
    })
    .flat_map(|line| eol().opt().map(move |_| line))
}

/// Measures leading-space indentation of the current line without consuming anything.
pub fn indentation_of(line: &str) -> usize {
    line.chars().take_while(|ch| *ch == ' ').count()
}

/// A connector symbol permitted inside (but not starting) a reference name.
fn is_connector(ch: char) -> bool {
    matches!(ch, '-' | '_' | '.' | ':' | '+')
}

/// The reference-name scanner (§4.2): the longest run starting with an alphanumeric character,
/// continuing through alphanumerics and single connector symbols, stopping at two consecutive
/// connectors or any disallowed character, with a trailing connector stripped from the result.
pub fn ref_name<'a>() -> Parser<'a, &'a str> {
    Parser::new(|c: Cursor<'a>| {
        let mut chars = c.rest().char_indices();
        let first = match chars.next() {
            Some((_, ch)) if ch.is_alphanumeric() => ch,
            _ => return ParseResult::Failure(Message::Static("expected reference name"), c),
        };
        let mut end = first.len_utf8();
        let mut prev_was_connector = false;
        for (idx, ch) in c.rest().char_indices().skip(1) {
            let _ = idx;
            if ch.is_alphanumeric() {
                prev_was_connector = false;
                end += ch.len_utf8();
            } else if is_connector(ch) {
                if prev_was_connector {
                    break; // two consecutive symbols terminate the match
                }
                prev_was_connector = true;
                end += ch.len_utf8();
            } else {
                break; // unsupported character terminates the match
            }
        }
        let mut matched = &c.source()[c.offset()..c.offset() + end];
        let mut consumed = end;
        if matched.chars().last().map(is_connector).unwrap_or(false) {
            let trailing_len = matched.chars().last().unwrap().len_utf8();
            matched = &matched[..matched.len() - trailing_len];
            consumed -= trailing_len;
        }
        ParseResult::Success(matched, c.at(c.offset() + consumed))
    })
}

pub fn char<'a>(expected: char) -> Parser<'a, char> {
    rt_char(expected)
}

pub fn lit<'a>(expected: &'static str) -> Parser<'a, &'a str> {
    literal(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ParseResult;
    use rstest::rstest;

    fn parse_ref_name(s: &str) -> Option<&str> {
        match ref_name().parse(Cursor::new(s)) {
            ParseResult::Success(v, _) => Some(v),
            ParseResult::Failure(..) => None,
        }
    }

    #[rstest]
    #[case::basic("hello", Some("hello"))]
    #[case::single_connector("hello-world", Some("hello-world"))]
    #[case::trailing_hyphen_stripped("hello-", Some("hello"))]
    #[case::trailing_underscore_stripped("hello_", Some("hello"))]
    #[case::consecutive_connectors_stop_the_match("a--b", Some("a"))]
    #[case::cannot_start_with_a_symbol("-abc", None)]
    #[case::stops_at_whitespace("abc def", Some("abc"))]
    #[case::stops_at_unsupported_punctuation("abc!def", Some("abc"))]
    fn ref_name_edge_cases(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_ref_name(input), expected);
    }

    #[test]
    fn blank_line_matches_whitespace_only() {
        assert!(blank_line().parse(Cursor::new("   \nnext")).is_success());
        assert!(!blank_line().parse(Cursor::new("text\n")).is_success());
    }

    #[test]
    fn indentation_counts_leading_spaces() {
        assert_eq!(indentation_of("   x"), 3);
        assert_eq!(indentation_of("x"), 0);
    }
}

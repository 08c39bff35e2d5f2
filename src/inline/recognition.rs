//! The six inline "markup recognition rules" (§4.3), as pure predicates over the characters
//! immediately surrounding a candidate delimiter. Every inline production in [`super`] is built
//! by calling into these rather than re-deriving the rules ad hoc.

const OPENING_PUNCT: [char; 6] = ['(', '[', '{', '<', '\'', '"'];
const CLOSING_PUNCT: [char; 11] = [')', ']', '}', '>', '\'', '"', ',', '.', ';', ':', '-'];
// `!`, `?`, `/`, `\` are closing punctuation too (§4.3 rule 4); kept in a second array only
// because Rust array literals don't let us exceed the declared length inline above.
const CLOSING_PUNCT_EXTRA: [char; 4] = ['!', '?', '/', '\\'];

pub fn is_opening_punct(ch: char) -> bool {
    OPENING_PUNCT.contains(&ch)
}

pub fn is_closing_punct(ch: char) -> bool {
    CLOSING_PUNCT.contains(&ch) || CLOSING_PUNCT_EXTRA.contains(&ch)
}

/// Rule 1: a start delimiter must be preceded by whitespace, start-of-input, or opening
/// punctuation.
pub fn start_preceded_ok(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => c.is_whitespace() || is_opening_punct(c),
    }
}

/// Rule 2: a start delimiter must not be immediately followed by whitespace.
pub fn start_followed_ok(next: Option<char>) -> bool {
    match next {
        None => false,
        Some(c) => !c.is_whitespace(),
    }
}

/// Rule 3: an end delimiter must not be immediately preceded by whitespace.
pub fn end_preceded_ok(prev: Option<char>) -> bool {
    match prev {
        None => false,
        Some(c) => !c.is_whitespace(),
    }
}

/// Rule 4: an end delimiter must be followed by whitespace, end-of-input, or closing
/// punctuation.
pub fn end_followed_ok(next: Option<char>) -> bool {
    match next {
        None => true,
        Some(c) => c.is_whitespace() || is_closing_punct(c),
    }
}

/// Rule 5: the delimiter itself must not be the lone content of a matched punctuation pair
/// (`(|)` suppresses the `|` from acting as a substitution delimiter).
pub fn flanking_pair_suppressed(prev: Option<char>, next: Option<char>) -> bool {
    matches!(
        (prev, next),
        (Some('('), Some(')'))
            | (Some('['), Some(']'))
            | (Some('{'), Some('}'))
            | (Some('<'), Some('>'))
            | (Some('\''), Some('\''))
            | (Some('"'), Some('"'))
    )
}

/// Rule 6: a zero-width match (end delimiter immediately following the start delimiter) never
/// counts; callers enforce this simply by requiring the matched content to be non-empty.
pub fn nonzero_content(content: &str) -> bool {
    !content.is_empty()
}

//! The document tree data model (§3).
//!
//! A recursive algebraic data type in two top-level categories, [`Block`] and [`Span`]. Every
//! reference-carrying node stores a [`SourceFragment`] — an `(offset, len)` pair into the shared
//! source string, not a copied substring — so trees stay compact and diagnostics can still cite
//! the exact original text (§9).

use serde::Serialize;

/// A `(offset, len)` pair into the source string that produced a node. Resolve to a
/// `(line, column)` pair on demand via [`crate::runtime::Cursor::line_col`] rather than storing
/// it eagerly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceFragment {
    pub offset: usize,
    pub len: usize,
}

impl SourceFragment {
    pub fn new(offset: usize, len: usize) -> Self {
        SourceFragment { offset, len }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.offset..self.offset + self.len]
    }
}

/// The `Id`/`Styles` attribute set every node may optionally carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attrs {
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Attrs {
    pub fn with_id(id: impl Into<String>) -> Self {
        Attrs {
            id: Some(id.into()),
            classes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NumeralSystem {
    Arabic,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
}

/// The (system, prefix, suffix) triple that fixes an enumerated list's marker shape (§3, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumFormat {
    pub system: NumeralSystem,
    pub prefix: &'static str,
    pub suffix: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CellRole {
    Head,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCell {
    pub role: CellRole,
    pub content: Vec<Block>,
    pub col_span: usize,
    pub row_span: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub head: Option<Vec<TableRow>>,
    pub body: Vec<TableRow>,
}

/// A bullet/enumerated list item. `forced` marks a multi-paragraph item whose inner paragraphs
/// are `Block::Paragraph { forced: true, .. }` (the "ForcedParagraph" distinction from §4.4,
/// kept as a flag per the Open Question resolution in §9/DESIGN.md rather than a new variant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub content: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionListItem {
    pub term: Vec<Span>,
    pub classifier: Option<Vec<Span>>,
    pub definition: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub body: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionEntry {
    pub flag: String,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionListItem {
    pub options: Vec<OptionEntry>,
    pub description: Vec<Block>,
}

/// A line-block line: either a single line of spans, or a nested, more-indented line block
/// (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LineBlockEntry {
    Line(Vec<Span>),
    Nested(Vec<LineBlockEntry>),
}

/// The (character, has-overline) pair that identifies a header decoration, plus the document
/// order in which it was first seen (used by rewrite to assign the section level, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Decoration {
    pub character: char,
    pub has_overline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FootnoteLabel {
    AutoNumber,
    AutoSymbol,
    AutoNumberLabeled(String),
    Numeric(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomRoleDef {
    pub name: String,
    pub base: String,
    pub fields: Vec<(String, String)>,
}

/// A block-level node (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Block {
    Paragraph {
        spans: Vec<Span>,
        forced: bool,
        attrs: Attrs,
        source: SourceFragment,
    },
    LiteralBlock {
        text: String,
        source: SourceFragment,
    },
    QuotedBlock {
        content: Vec<Block>,
        attribution: Option<Vec<Span>>,
    },
    BulletList {
        bullet: char,
        items: Vec<ListItem>,
    },
    EnumList {
        format: EnumFormat,
        start: u32,
        items: Vec<ListItem>,
    },
    DefinitionList {
        items: Vec<DefinitionListItem>,
    },
    FieldList {
        fields: Vec<Field>,
    },
    OptionList {
        items: Vec<OptionListItem>,
    },
    LineBlock {
        lines: Vec<LineBlockEntry>,
    },
    Table(Table),
    Rule,
    DecoratedHeader {
        decoration: Decoration,
        spans: Vec<Span>,
        source: SourceFragment,
    },
    Section {
        level: u32,
        header: Box<Block>,
        body: Vec<Block>,
        attrs: Attrs,
    },
    Comment {
        text: String,
    },
    FootnoteDefinition {
        label: FootnoteLabel,
        content: Vec<Block>,
        attrs: Attrs,
    },
    Citation {
        label: String,
        content: Vec<Block>,
        attrs: Attrs,
    },
    LinkDefinition {
        id: String,
        target: String,
    },
    InternalLinkDefinition {
        id: String,
    },
    LinkAlias {
        from: String,
        to: String,
    },
    SubstitutionDefinition {
        name: String,
        span: Box<Span>,
    },
    CustomizedTextRole(CustomRoleDef),
    InvalidBlock {
        message: String,
        source: SourceFragment,
    },
    BlockSequence(Vec<Block>),
    StaticContent {
        text: String,
    },
}

/// An inline node (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Span {
    Text(String),
    Emphasized(Vec<Span>),
    Strong(Vec<Span>),
    Literal(String),
    SpanLink {
        text: Vec<Span>,
        target: String,
    },
    LinkIdReference {
        spans: Vec<Span>,
        id: String,
        source: SourceFragment,
    },
    LinkPathReference {
        spans: Vec<Span>,
        target: String,
    },
    SubstitutionReference {
        name: String,
        source: SourceFragment,
    },
    InterpretedText {
        role: String,
        text: String,
        source: SourceFragment,
    },
    FootnoteReference {
        label: FootnoteLabel,
        source: SourceFragment,
    },
    CitationReference {
        id: String,
        source: SourceFragment,
    },
    Image {
        uri: String,
        alt: Option<String>,
    },
    Classifier(Vec<Span>),
    InvalidSpan {
        message: String,
        source: SourceFragment,
    },
    SpanSequence(Vec<Span>),
}

impl Block {
    pub fn invalid(message: impl Into<String>, source: SourceFragment) -> Block {
        Block::InvalidBlock {
            message: message.into(),
            source,
        }
    }

    pub fn is_definition_boundary(&self) -> bool {
        matches!(
            self,
            Block::Table(_)
                | Block::BulletList { .. }
                | Block::EnumList { .. }
                | Block::FieldList { .. }
                | Block::OptionList { .. }
                | Block::DecoratedHeader { .. }
        )
    }
}

impl Span {
    pub fn invalid(message: impl Into<String>, source: SourceFragment) -> Span {
        Span::InvalidSpan {
            message: message.into(),
            source,
        }
    }

    pub fn plain_text(&self) -> String {
        match self {
            Span::Text(t) | Span::Literal(t) => t.clone(),
            Span::Emphasized(spans) | Span::Strong(spans) | Span::SpanSequence(spans) => {
                spans.iter().map(Span::plain_text).collect()
            }
            _ => String::new(),
        }
    }
}

/// The root of a parsed document (§6: the value returned by `parse`/`parse_unresolved`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub body: Vec<Block>,
}

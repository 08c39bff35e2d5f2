//! Parser configuration (§10.4). No environment variables or files are read anywhere in this
//! crate; construction is entirely the caller's responsibility, per §6.

/// Tunables threaded through a single parse. Passed to [`crate::api::Parser::build`] alongside
/// the extension registry.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Cap on nested span recursion (§4.1). Beyond this, nested span parsing degrades to literal
    /// text instead of exceeding it.
    pub recursion_cap: u32,
    /// The interpreted-text role applied when `` `text` `` carries no `:role:` prefix/suffix.
    pub default_role: String,
    /// Whether `Parser::parse` should run the rewrite pass (§4.6) before returning. Always
    /// `true` for the public `parse` entry point; `parse_unresolved` bypasses it regardless of
    /// this flag, matching the two distinct entry points in §6.
    pub resolve_on_parse: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            recursion_cap: crate::runtime::DEFAULT_RECURSION_CAP,
            default_role: "title-reference".to_string(),
            resolve_on_parse: true,
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to load Python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("Recipe could not be parsed: {0}")]
    Parse(String),

    #[error("Unrecognized property declaration at line {line}: {snippet}")]
    UnrecognizedShape { line: usize, snippet: String },

    #[error(
        "Target info can't be recovered by parsing the recipe: '{property}' is set from `{expr}` (line {line})"
    )]
    NonLiteral {
        property: String,
        expr: String,
        line: usize,
    },
}

impl ExtractError {
    /// Whether the recipe was readable but needs a code-computed value
    pub fn is_non_literal(&self) -> bool {
        matches!(self, ExtractError::NonLiteral { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

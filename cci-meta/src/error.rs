use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Recipe extraction failed: {0}")]
    Extract(#[from] cci_parser::ExtractError),

    #[error("Recipe root is not a directory: {0}")]
    RecipeRoot(PathBuf),

    #[error("Recipe file listed by {config} does not exist: {recipe}")]
    MissingRecipe { config: PathBuf, recipe: PathBuf },

    #[error("Invalid recipe config {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("Recipe can't be loaded by conan inspect: {0}")]
    IncompatibleRecipe(String),

    #[error("No description found for {0} by inspection or by parsing the recipe")]
    MissingDescription(String),

    #[error("conan {command} failed: {message}")]
    Conan { command: String, message: String },

    #[error("conan {0} timed out")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

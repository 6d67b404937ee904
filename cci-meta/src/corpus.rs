//! Recipe corpus walking
//!
//! A corpus directory holds one directory per package. Each package
//! directory has a `config.yml` mapping versions to the folder holding the
//! recipe for that version:
//!
//! ```yaml
//! versions:
//!   "1.3.1":
//!     folder: all
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Error, Result};

pub const MARKER_FILE: &str = "config.yml";
pub const RECIPE_FILE: &str = "conanfile.py";
/// Folder selector meaning one recipe serves every version
pub const ALL_FOLDER: &str = "all";

#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub folder: String,
}

/// Parsed `config.yml`
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeConfig {
    #[serde(default)]
    pub versions: IndexMap<serde_yaml::Value, VersionEntry>,
}

impl RecipeConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(Error::Yaml)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Folder holding the authoritative recipe text.
    pub fn recipe_folder(&self) -> Option<&str> {
        select_folder(self.versions.values().map(|v| v.folder.as_str()))
    }
}

/// Pick the folder among the selectors of a config.
///
/// `all` wins outright. Otherwise the reverse-lexically first selector is
/// taken as the newest-looking variant; no version semantics are applied.
pub fn select_folder<'a>(folders: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let distinct: BTreeSet<&str> = folders.into_iter().collect();
    if distinct.contains(ALL_FOLDER) {
        return Some(ALL_FOLDER);
    }
    distinct.into_iter().next_back()
}

/// One package of the corpus with its recipe text loaded
#[derive(Debug, Clone)]
pub struct RecipeEntry {
    /// Package name (the directory name)
    pub name: String,
    /// Selected folder inside the package directory
    pub folder: String,
    pub recipe_path: PathBuf,
    pub source: String,
}

impl RecipeEntry {
    /// Load the entry described by a `config.yml` marker.
    ///
    /// A listed recipe file that does not exist is a corpus integrity
    /// error; callers are expected to abort.
    pub fn load(marker: &Path) -> Result<Self> {
        let dir = marker.parent().ok_or_else(|| Error::InvalidConfig {
            path: marker.to_path_buf(),
            reason: "marker has no parent directory".to_string(),
        })?;
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidConfig {
                path: marker.to_path_buf(),
                reason: "package directory has no usable name".to_string(),
            })?
            .to_string();

        let config = RecipeConfig::from_file(marker)?;
        let folder = config
            .recipe_folder()
            .ok_or_else(|| Error::InvalidConfig {
                path: marker.to_path_buf(),
                reason: "no versions listed".to_string(),
            })?
            .to_string();

        let recipe_path = dir.join(&folder).join(RECIPE_FILE);
        if !recipe_path.is_file() {
            return Err(Error::MissingRecipe {
                config: marker.to_path_buf(),
                recipe: recipe_path,
            });
        }
        let source = std::fs::read_to_string(&recipe_path)?;
        debug!("{} -> {:?}", name, recipe_path);

        Ok(Self {
            name,
            folder,
            recipe_path,
            source,
        })
    }
}

/// Lazy walk over every package directory carrying a `config.yml`
pub struct CorpusWalker {
    paths: glob::Paths,
}

impl CorpusWalker {
    pub fn new(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::RecipeRoot(root.to_path_buf()));
        }
        let pattern = format!(
            "{}/**/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            MARKER_FILE
        );
        Ok(Self {
            paths: glob::glob(&pattern)?,
        })
    }
}

impl Iterator for CorpusWalker {
    type Item = Result<RecipeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.paths.next()? {
                Ok(marker) if marker.is_file() => return Some(RecipeEntry::load(&marker)),
                Ok(_) => continue,
                Err(e) => warn!("Glob error: {}", e),
            }
        }
    }
}

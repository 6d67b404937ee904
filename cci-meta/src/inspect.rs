//! Description and license lookup with fallback to the recipe text

use std::path::Path;

use cci_parser::{normalize_description, BasicInfo, RecipeSource};
use tracing::warn;

use crate::conan::ConanApi;
use crate::{Error, Result};

/// Where the basic info of a package came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicInfoSource {
    Inspect,
    Parsed,
}

impl BasicInfoSource {
    /// Whether the record is marked as loadable by the current engine
    pub fn is_schema_compat(&self) -> bool {
        matches!(self, BasicInfoSource::Inspect)
    }
}

/// Ask the engine for the recipe's description and license.
pub async fn inspect_basic_info<C: ConanApi>(conan: &C, recipe: &Path) -> Result<BasicInfo> {
    let inspected = conan.inspect(recipe).await?;
    Ok(BasicInfo {
        description: normalize_description(inspected.description.as_deref().unwrap_or_default()),
        license: inspected.license,
    })
}

/// Basic info for one package: live inspection, falling back to the
/// structural scrape when the engine rejects the recipe, times out on it
/// or answers with output that does not decode.
///
/// Failing to launch the engine at all is not recovered.
pub async fn basic_info_for<C: ConanApi>(
    conan: &C,
    name: &str,
    recipe: &Path,
    source: &RecipeSource,
) -> Result<(BasicInfo, BasicInfoSource)> {
    let reason = match inspect_basic_info(conan, recipe).await {
        Ok(info) => return Ok((info, BasicInfoSource::Inspect)),
        Err(Error::IncompatibleRecipe(reason)) => format!("rejected: {}", reason),
        Err(e @ (Error::Timeout(_) | Error::Json(_))) => e.to_string(),
        Err(e) => return Err(e),
    };

    warn!("conan inspect failed for {}: {}", name, reason);
    warn!("Falling back to parsing the recipe of {}", name);
    let info = source.basic_info();
    if info.description.is_empty() {
        return Err(Error::MissingDescription(name.to_string()));
    }
    Ok((info, BasicInfoSource::Parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conan::InspectedRecipe;
    use crate::testing::FakeConan;

    const LEGACY: &str = r#"
from conans import ConanFile

class FooConan(ConanFile):
    name = "foo"
    description = "Legacy   recipe\n  with spaces"
    license = "BSD-3-Clause"
"#;

    #[tokio::test]
    async fn test_inspect_normalizes() {
        let path = Path::new("/corpus/zlib/all/conanfile.py");
        let conan = FakeConan::default().with_inspected(
            path,
            InspectedRecipe {
                name: Some("zlib".to_string()),
                description: Some("A Massively Spiffy\nYet Delicately  Unobtrusive".to_string()),
                license: vec!["Zlib".to_string()],
            },
        );
        let source = RecipeSource::parse("").unwrap();
        let (info, from) = basic_info_for(&conan, "zlib", path, &source).await.unwrap();
        assert_eq!(from, BasicInfoSource::Inspect);
        assert!(from.is_schema_compat());
        assert_eq!(
            info.description,
            "A Massively Spiffy Yet Delicately Unobtrusive"
        );
        assert_eq!(info.license, vec!["Zlib".to_string()]);
    }

    #[tokio::test]
    async fn test_incompatible_recipe_falls_back_to_parser() {
        let conan = FakeConan::default();
        let source = RecipeSource::parse(LEGACY).unwrap();
        let (info, from) = basic_info_for(&conan, "foo", Path::new("foo.py"), &source)
            .await
            .unwrap();
        assert_eq!(from, BasicInfoSource::Parsed);
        assert!(!from.is_schema_compat());
        assert_eq!(info.description, "Legacy recipe with spaces");
        assert_eq!(info.license, vec!["BSD-3-Clause".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_description_is_fatal() {
        let conan = FakeConan::default();
        let source = RecipeSource::parse("class Foo(ConanFile):\n    license = \"MIT\"\n").unwrap();
        let err = basic_info_for(&conan, "foo", Path::new("foo.py"), &source)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingDescription(name) if name == "foo"));
    }

    #[tokio::test]
    async fn test_inspect_timeout_falls_back_to_parser() {
        let path = Path::new("foo.py");
        let conan = FakeConan::default().with_slow_inspect(path);
        let source = RecipeSource::parse(LEGACY).unwrap();
        let (info, from) = basic_info_for(&conan, "foo", path, &source).await.unwrap();
        assert_eq!(from, BasicInfoSource::Parsed);
        assert_eq!(info.description, "Legacy recipe with spaces");
    }

    #[tokio::test]
    async fn test_engine_launch_failure_is_not_recovered() {
        let path = Path::new("foo.py");
        let conan = FakeConan::default().with_broken_inspect(path);
        let source = RecipeSource::parse(LEGACY).unwrap();
        let err = basic_info_for(&conan, "foo", path, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conan { .. }));
    }
}

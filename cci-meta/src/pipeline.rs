//! Catalog generation: walk, reconcile, resolve

use cci_parser::RecipeSource;
use tracing::{info, warn};

use crate::catalog::{Catalog, Outcome};
use crate::config::Settings;
use crate::conan::ConanApi;
use crate::corpus::{CorpusWalker, RecipeEntry};
use crate::inspect::basic_info_for;
use crate::registry::{reconcile_from, ReconcileStats};
use crate::resolve::{Resolver, Target};
use crate::Result;

pub struct Pipeline<C> {
    conan: C,
    settings: Settings,
}

impl<C: ConanApi> Pipeline<C> {
    pub fn new(conan: C, settings: Settings) -> Self {
        Self { conan, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn conan(&self) -> &C {
        &self.conan
    }

    /// Run every phase and return the finished catalog.
    pub async fn run(&self) -> Result<Catalog> {
        let mut catalog = Catalog::new();
        self.walk(&mut catalog).await?;
        self.reconcile(&mut catalog).await?;
        self.resolve(&mut catalog).await;
        Ok(catalog)
    }

    /// Walk the corpus, filling basic info and statically declared
    /// properties of every package.
    pub async fn walk(&self, catalog: &mut Catalog) -> Result<()> {
        info!("Walking recipes in {:?}", self.settings.recipes);
        for entry in CorpusWalker::new(&self.settings.recipes)? {
            self.process(catalog, &entry?).await?;
        }
        info!(
            "Walked {} packages, {} failed static extraction",
            catalog.len(),
            catalog.with_outcome(Outcome::FailedOnce).len()
        );
        Ok(())
    }

    /// Handle one recipe. Only fatal errors are returned; extraction
    /// failures put the package in the failed set.
    pub async fn process(&self, catalog: &mut Catalog, entry: &RecipeEntry) -> Result<()> {
        let name = entry.name.as_str();
        if !catalog.create(name) {
            warn!("Duplicate package {} at {:?}, skipping", name, entry.recipe_path);
            return Ok(());
        }
        info!("Processing {}", name);

        let source = RecipeSource::parse(entry.source.as_str())?;
        let (basic_info, from) =
            basic_info_for(&self.conan, name, &entry.recipe_path, &source).await?;
        catalog.set_basic_info(name, basic_info, from.is_schema_compat());

        if self.settings.is_forced(name) {
            info!("{} is forced to install-based resolution", name);
            catalog.fail(name, Outcome::FailedOnce, "forced");
            return Ok(());
        }

        match source.properties() {
            Ok(properties) => {
                catalog.merge_static(name, &properties);
                let outcome = if from.is_schema_compat() {
                    Outcome::SucceededInspect
                } else {
                    Outcome::SucceededStatic
                };
                catalog.mark(name, outcome);
            }
            Err(e) => {
                warn!("{}: {}", name, e);
                catalog.fail(name, Outcome::FailedOnce, e.to_string());
            }
        }
        Ok(())
    }

    /// Append the versions published on the remote.
    pub async fn reconcile(&self, catalog: &mut Catalog) -> Result<ReconcileStats> {
        reconcile_from(
            &self.conan,
            catalog,
            &self.settings.pattern,
            &self.settings.remote,
        )
        .await
    }

    /// Install the latest version of every failed package and merge what
    /// the engine computed. Failures here are terminal per package.
    pub async fn resolve(&self, catalog: &mut Catalog) {
        let failed = catalog.with_outcome(Outcome::FailedOnce);
        if failed.is_empty() {
            return;
        }

        let targets: Vec<Target> = failed
            .iter()
            .map(|name| Target {
                name: name.clone(),
                version: catalog.latest_version(name).map(str::to_string),
            })
            .collect();
        let tried: Vec<String> = targets
            .iter()
            .map(|t| format!("{}/{}", t.name, t.version.as_deref().unwrap_or("?")))
            .collect();
        info!(
            "We could not get info for some packages. Will try installing these versions: {}",
            tried.join(", ")
        );

        let resolver = Resolver::new(&self.conan, &self.settings);
        for (name, result) in resolver.resolve_all(targets).await {
            match result {
                Ok(properties) => {
                    catalog.merge_resolved(&name, properties);
                    catalog.mark(&name, Outcome::SucceededInstall);
                }
                Err(e) => {
                    catalog.fail(&name, Outcome::FailedTwice, e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conan::InspectedRecipe;
    use crate::corpus::tests::write_package;
    use crate::testing::FakeConan;
    use crate::Error;
    use serde_json::json;
    use std::path::Path;

    const ALL_CONFIG: &str = "versions:\n  \"1.0\":\n    folder: all\n";

    const STATIC_RECIPE: &str = r#"
from conan import ConanFile

class FooConan(ConanFile):
    name = "foo"
    description = "x"
    license = "MIT"

    def package_info(self):
        self.cpp_info.set_property("cmake_target_name", "Foo::Foo")
"#;

    const DYNAMIC_RECIPE: &str = r#"
from conan import ConanFile

class BarConan(ConanFile):
    name = "bar"
    description = "bar library"
    license = ("MIT", "Apache-2.0")

    def package_info(self):
        self.cpp_info.set_property("cmake_target_name", f"{self._prefix}::bar")
"#;

    const BAR_GRAPH: &str = r#"{
        "nodes": {
            "0": {"ref": "conanfile", "cpp_info": {}},
            "1": {"ref": "bar/2.0#abc", "cpp_info": {"root": {"properties": {"cmake_target_name": "Y"}}}}
        }
    }"#;

    fn settings(root: &Path) -> Settings {
        Settings {
            recipes: root.join("recipes"),
            scratch_dir: root.join("scratch"),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_end_to_end_all_recipe() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings(root.path());
        write_package(&settings.recipes, "foo", ALL_CONFIG, &[("all", STATIC_RECIPE)]);

        let conan = FakeConan::default().with_references(&["foo/1.0"]);
        let catalog = Pipeline::new(conan, settings).run().await.unwrap();

        let record = catalog.get("foo").unwrap();
        assert_eq!(record.description, "x");
        assert_eq!(record.license, vec!["MIT".to_string()]);
        assert!(!record.schema_compat);
        assert_eq!(record.build_properties["cmake_target_name"], json!("Foo::Foo"));
        assert!(record.components.is_none());
        assert_eq!(record.versions, vec!["1.0".to_string()]);
        assert_eq!(catalog.outcome("foo"), Some(Outcome::SucceededStatic));
        assert!(catalog.report().failures.is_empty());
    }

    #[tokio::test]
    async fn test_inspected_package_is_schema_compatible() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings(root.path());
        write_package(&settings.recipes, "foo", ALL_CONFIG, &[("all", STATIC_RECIPE)]);

        let conan = FakeConan::default().with_inspected(
            &settings.recipes.join("foo/all/conanfile.py"),
            InspectedRecipe {
                name: Some("foo".to_string()),
                description: Some("from inspect".to_string()),
                license: vec!["MIT".to_string()],
            },
        );
        let catalog = Pipeline::new(conan, settings).run().await.unwrap();

        let record = catalog.get("foo").unwrap();
        assert_eq!(record.description, "from inspect");
        assert!(record.schema_compat);
        assert_eq!(catalog.outcome("foo"), Some(Outcome::SucceededInspect));
    }

    #[tokio::test]
    async fn test_failure_then_recovery_through_install() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings(root.path());
        write_package(
            &settings.recipes,
            "bar",
            "versions:\n  \"1.0\":\n    folder: all\n  \"2.0\":\n    folder: all\n",
            &[("all", DYNAMIC_RECIPE)],
        );

        let conan = FakeConan::default()
            .with_references(&["bar/1.0", "bar/2.0"])
            .with_graph("bar/2.0", BAR_GRAPH);
        let pipeline = Pipeline::new(conan, settings);
        let catalog = pipeline.run().await.unwrap();

        let record = catalog.get("bar").unwrap();
        assert_eq!(record.build_properties["cmake_target_name"], json!("Y"));
        assert_eq!(
            record.license,
            vec!["MIT".to_string(), "Apache-2.0".to_string()]
        );
        assert_eq!(catalog.outcome("bar"), Some(Outcome::SucceededInstall));
        assert!(catalog.report().failures.is_empty());
        assert_eq!(pipeline.conan().installed(), vec!["bar/2.0".to_string()]);
    }

    #[tokio::test]
    async fn test_unresolvable_package_fails_twice() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = settings(root.path());
        settings.force = vec!["foo".to_string()];
        write_package(&settings.recipes, "foo", ALL_CONFIG, &[("all", STATIC_RECIPE)]);

        // Never listed by the registry, so there is no version to install
        let conan = FakeConan::default();
        let catalog = Pipeline::new(conan, settings).run().await.unwrap();

        let report = catalog.report();
        assert_eq!(report.failures, vec!["foo".to_string()]);
        assert!(report.reasons["foo"].contains("no published versions"));
        assert!(catalog.get("foo").unwrap().build_properties.is_empty());
    }

    #[tokio::test]
    async fn test_missing_description_stops_the_batch() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings(root.path());
        write_package(
            &settings.recipes,
            "nodesc",
            ALL_CONFIG,
            &[("all", "class NoDesc(ConanFile):\n    license = \"MIT\"\n")],
        );

        let err = Pipeline::new(FakeConan::default(), settings)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingDescription(_)));
    }

    #[tokio::test]
    async fn test_inspect_timeout_only_affects_its_package() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings(root.path());
        for name in ["aaa", "slow", "zzz"] {
            write_package(&settings.recipes, name, ALL_CONFIG, &[("all", STATIC_RECIPE)]);
        }

        let conan = FakeConan::default()
            .with_slow_inspect(&settings.recipes.join("slow/all/conanfile.py"))
            .with_references(&["aaa/1.0", "slow/1.0", "zzz/1.0"]);
        let catalog = Pipeline::new(conan, settings).run().await.unwrap();

        assert_eq!(catalog.len(), 3);
        let slow = catalog.get("slow").unwrap();
        assert_eq!(slow.description, "x");
        assert!(!slow.schema_compat);
        assert_eq!(slow.build_properties["cmake_target_name"], json!("Foo::Foo"));
        assert_eq!(catalog.outcome("slow"), Some(Outcome::SucceededStatic));
        assert_eq!(catalog.outcome("zzz"), Some(Outcome::SucceededStatic));
        assert!(catalog.report().failures.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_has_every_walked_package() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings(root.path());
        write_package(&settings.recipes, "bar", ALL_CONFIG, &[("all", DYNAMIC_RECIPE)]);
        write_package(&settings.recipes, "foo", ALL_CONFIG, &[("all", STATIC_RECIPE)]);

        let catalog = Pipeline::new(FakeConan::default(), settings)
            .run()
            .await
            .unwrap();
        let names: Vec<&String> = catalog.records().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["bar", "foo"]);
        assert_eq!(catalog.outcome("bar"), Some(Outcome::FailedTwice));
    }
}

//! Install-based resolution of packages the static path could not handle

use std::path::Path;

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::Properties;
use crate::config::Settings;
use crate::conan::{ConanApi, DepsGraph, InstallRequest};
use crate::Error;

/// Scope of `cpp_info` holding the package-wide properties
pub const ROOT_SCOPE: &str = "root";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no published versions to install")]
    NoVersions,

    #[error("failed to create scratch folder: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("install of {reference} failed: {source}")]
    Install {
        reference: String,
        #[source]
        source: Error,
    },

    #[error("{0} not found in the dependency graph")]
    NodeNotFound(String),

    #[error("{0} declares no properties")]
    NoProperties(String),
}

/// Properties computed by the engine for one package
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedProperties {
    pub global: Properties,
    pub components: IndexMap<String, Properties>,
}

impl ResolvedProperties {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.components.is_empty()
    }
}

/// Collect the properties of the node built for `requirement`.
///
/// `root` properties are package-wide; other scopes are components, except
/// internal ones prefixed with `_`.
pub fn properties_from_graph(
    graph: &DepsGraph,
    requirement: &str,
) -> Result<ResolvedProperties, ResolveError> {
    let node = graph
        .nodes
        .values()
        .find(|n| n.matches(requirement))
        .ok_or_else(|| ResolveError::NodeNotFound(requirement.to_string()))?;

    let mut resolved = ResolvedProperties::default();
    for (scope, info) in node.cpp_info.iter().flatten() {
        let Some(properties) = info.properties.as_ref().filter(|p| !p.is_empty()) else {
            continue;
        };
        if scope == ROOT_SCOPE {
            resolved.global.extend(properties.clone());
        } else if !scope.starts_with('_') {
            resolved
                .components
                .insert(scope.clone(), properties.clone());
        }
    }

    if resolved.is_empty() {
        return Err(ResolveError::NoProperties(requirement.to_string()));
    }
    Ok(resolved)
}

/// Create a fresh install folder for `name` under `parent`.
async fn create_scratch(parent: &Path, name: &str) -> std::io::Result<TempDir> {
    tokio::fs::create_dir_all(parent).await?;
    let parent = parent.to_path_buf();
    let prefix = format!("{}-", name);
    tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(parent)
    })
    .await
    .map_err(std::io::Error::other)?
}

/// A package to resolve with the version to install, if any
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub version: Option<String>,
}

/// Result of one resolution attempt
pub type Resolution = (String, Result<ResolvedProperties, ResolveError>);

pub struct Resolver<'a, C> {
    conan: &'a C,
    settings: &'a Settings,
}

impl<'a, C: ConanApi> Resolver<'a, C> {
    pub fn new(conan: &'a C, settings: &'a Settings) -> Self {
        Self { conan, settings }
    }

    /// Install `name/version` into a scratch folder and read its properties.
    pub async fn resolve_one(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<ResolvedProperties, ResolveError> {
        let version = version.ok_or(ResolveError::NoVersions)?;
        let requirement = format!("{}/{}", name, version);
        info!("Try to get cpp_info for: {}", requirement);

        let scratch = create_scratch(&self.settings.scratch_dir, name)
            .await
            .map_err(ResolveError::Scratch)?;

        let request = InstallRequest {
            reference: requirement.clone(),
            remote: self.settings.remote.clone(),
            host_profile: self.settings.host_profile.clone(),
            build_profile: self.settings.build_profile.clone(),
            host_conf: self.settings.host_conf(),
            output_folder: scratch.path().to_path_buf(),
        };

        let result = self
            .conan
            .install(&request)
            .await
            .map_err(|source| ResolveError::Install {
                reference: requirement.clone(),
                source,
            })
            .and_then(|graph| properties_from_graph(&graph, &requirement));

        if self.settings.keep_scratch {
            let kept = scratch.keep();
            debug!("Keeping scratch folder {:?}", kept);
        } else {
            let path = scratch.path().to_path_buf();
            match tokio::task::spawn_blocking(move || scratch.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to remove scratch folder {:?}: {}", path, e),
                Err(e) => warn!("Failed to remove scratch folder {:?}: {}", path, e),
            }
        }

        result
    }

    /// Resolve every target, at most `settings.parallel` at a time.
    ///
    /// Results come back in target order.
    pub async fn resolve_all(&self, targets: Vec<Target>) -> Vec<Resolution> {
        let parallel = self.settings.parallel.max(1);
        let mut results: Vec<(usize, Resolution)> = stream::iter(targets.into_iter().enumerate())
            .map(|(index, target)| async move {
                let result = self
                    .resolve_one(&target.name, target.version.as_deref())
                    .await;
                if let Err(e) = &result {
                    warn!("Could not resolve {}: {}", target.name, e);
                }
                (index, (target.name, result))
            })
            .buffer_unordered(parallel)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, resolution)| resolution).collect()
    }
}

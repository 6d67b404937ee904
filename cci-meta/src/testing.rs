//! In-memory engine used by the unit tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::conan::{ConanApi, DepsGraph, InspectedRecipe, InstallRequest};
use crate::{Error, Result};

/// How `inspect` fails for a given recipe
#[derive(Debug, Clone, Copy)]
pub enum InspectFailure {
    Timeout,
    Launch,
}

#[derive(Default)]
pub struct FakeConan {
    /// Inspect results by recipe path; missing paths are incompatible
    pub inspected: HashMap<PathBuf, InspectedRecipe>,
    pub inspect_failures: HashMap<PathBuf, InspectFailure>,
    pub references: Vec<String>,
    /// Install graphs by requirement; missing requirements fail to install
    pub graphs: HashMap<String, DepsGraph>,
    pub installs: Mutex<Vec<InstallRequest>>,
}

impl FakeConan {
    pub fn with_inspected(mut self, path: &Path, recipe: InspectedRecipe) -> Self {
        self.inspected.insert(path.to_path_buf(), recipe);
        self
    }

    pub fn with_slow_inspect(mut self, path: &Path) -> Self {
        self.inspect_failures
            .insert(path.to_path_buf(), InspectFailure::Timeout);
        self
    }

    pub fn with_broken_inspect(mut self, path: &Path) -> Self {
        self.inspect_failures
            .insert(path.to_path_buf(), InspectFailure::Launch);
        self
    }

    pub fn with_references(mut self, refs: &[&str]) -> Self {
        self.references = refs.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_graph(mut self, requirement: &str, graph_json: &str) -> Self {
        let graph: DepsGraph = serde_json::from_str(graph_json).unwrap();
        self.graphs.insert(requirement.to_string(), graph);
        self
    }

    pub fn installed(&self) -> Vec<String> {
        self.installs
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.reference.clone())
            .collect()
    }
}

impl ConanApi for FakeConan {
    async fn inspect(&self, recipe: &Path) -> Result<InspectedRecipe> {
        match self.inspect_failures.get(recipe) {
            Some(InspectFailure::Timeout) => return Err(Error::Timeout("inspect".to_string())),
            Some(InspectFailure::Launch) => {
                return Err(Error::Conan {
                    command: "inspect".to_string(),
                    message: "No such file or directory (os error 2)".to_string(),
                })
            }
            None => {}
        }
        self.inspected
            .get(recipe)
            .cloned()
            .ok_or_else(|| Error::IncompatibleRecipe(format!("{} uses v1 syntax", recipe.display())))
    }

    async fn list_references(&self, _pattern: &str, _remote: &str) -> Result<Vec<String>> {
        Ok(self.references.clone())
    }

    async fn install(&self, request: &InstallRequest) -> Result<DepsGraph> {
        self.installs.lock().unwrap().push(request.clone());
        self.graphs
            .get(&request.reference)
            .cloned()
            .ok_or_else(|| Error::Conan {
                command: "install".to_string(),
                message: format!("{} failed to build", request.reference),
            })
    }
}

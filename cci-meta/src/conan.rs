//! Facade over the conan 2.x command line

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::catalog::{deserialize_license, Properties};
use crate::{Error, Result};

pub const DEFAULT_PROGRAM: &str = "conan";
pub const DEFAULT_INSPECT_TIMEOUT: u64 = 120;
pub const DEFAULT_LIST_TIMEOUT: u64 = 600;
pub const DEFAULT_INSTALL_TIMEOUT: u64 = 3600;

/// Basic attributes of a recipe as loaded by the engine
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InspectedRecipe {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_license")]
    pub license: Vec<String>,
}

/// Install of one requirement into its own output folder
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// `name/version` requirement
    pub reference: String,
    pub remote: String,
    pub host_profile: String,
    pub build_profile: String,
    pub host_conf: Vec<String>,
    pub output_folder: PathBuf,
}

/// Serialized dependency graph of an install
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepsGraph {
    #[serde(default)]
    pub nodes: IndexMap<String, GraphNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphNode {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub cpp_info: Option<IndexMap<String, CppInfoScope>>,
}

impl GraphNode {
    /// Whether this node is the package built for `requirement`.
    ///
    /// Node refs may carry a revision (`#rev`) or user/channel (`@u/c`).
    pub fn matches(&self, requirement: &str) -> bool {
        let Some(reference) = self.reference.as_deref() else {
            return false;
        };
        match reference.strip_prefix(requirement) {
            Some(rest) => rest.is_empty() || rest.starts_with('#') || rest.starts_with('@'),
            None => false,
        }
    }
}

/// One `cpp_info` scope: `root` or a component
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CppInfoScope {
    #[serde(default)]
    pub properties: Option<Properties>,
}

#[derive(Deserialize)]
struct GraphOutput {
    graph: DepsGraph,
}

/// Operations the pipeline needs from the package manager
#[allow(async_fn_in_trait)]
pub trait ConanApi {
    /// Load a recipe and report its attributes.
    ///
    /// A recipe the engine refuses to load yields
    /// [`Error::IncompatibleRecipe`].
    async fn inspect(&self, recipe: &Path) -> Result<InspectedRecipe>;

    /// Published `name/version` references matching `pattern`, in the
    /// order the remote enumerates them.
    async fn list_references(&self, pattern: &str, remote: &str) -> Result<Vec<String>>;

    /// Install a requirement, building missing binaries, and return the
    /// resulting graph.
    async fn install(&self, request: &InstallRequest) -> Result<DepsGraph>;
}

/// [`ConanApi`] backed by the `conan` executable
#[derive(Debug, Clone)]
pub struct ConanCli {
    program: PathBuf,
    inspect_timeout: Duration,
    list_timeout: Duration,
    install_timeout: Duration,
}

impl Default for ConanCli {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl ConanCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            inspect_timeout: Duration::from_secs(DEFAULT_INSPECT_TIMEOUT),
            list_timeout: Duration::from_secs(DEFAULT_LIST_TIMEOUT),
            install_timeout: Duration::from_secs(DEFAULT_INSTALL_TIMEOUT),
        }
    }

    pub fn with_inspect_timeout(mut self, secs: u64) -> Self {
        self.inspect_timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_install_timeout(mut self, secs: u64) -> Self {
        self.install_timeout = Duration::from_secs(secs);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, command: &str, args: &[String], limit: Duration) -> Result<Output> {
        debug!("Running {} {} {}", self.program.display(), command, args.join(" "));

        let child = Command::new(&self.program)
            .arg(command)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match timeout(limit, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(Error::Conan {
                command: command.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(Error::Timeout(command.to_string())),
        }
    }
}

impl ConanApi for ConanCli {
    async fn inspect(&self, recipe: &Path) -> Result<InspectedRecipe> {
        let path = std::path::absolute(recipe)?;
        let args = vec![
            path.to_string_lossy().to_string(),
            "--format=json".to_string(),
        ];
        let output = self.run("inspect", &args, self.inspect_timeout).await?;
        if !output.status.success() {
            return Err(Error::IncompatibleRecipe(stderr_message(&output)));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    async fn list_references(&self, pattern: &str, remote: &str) -> Result<Vec<String>> {
        let args = vec![
            pattern.to_string(),
            "-r".to_string(),
            remote.to_string(),
            "--format=json".to_string(),
        ];
        let output = self.run("list", &args, self.list_timeout).await?;
        if !output.status.success() {
            return Err(Error::Conan {
                command: "list".to_string(),
                message: stderr_message(&output),
            });
        }
        parse_list_output(&output.stdout, remote)
    }

    async fn install(&self, request: &InstallRequest) -> Result<DepsGraph> {
        let output = self
            .run("install", &install_args(request), self.install_timeout)
            .await?;
        if !output.status.success() {
            return Err(Error::Conan {
                command: "install".to_string(),
                message: stderr_message(&output),
            });
        }
        parse_graph_output(&output.stdout)
    }
}

fn install_args(request: &InstallRequest) -> Vec<String> {
    let mut args = vec![
        format!("--requires={}", request.reference),
        "-r".to_string(),
        request.remote.clone(),
        "--build=missing".to_string(),
        format!("-pr:h={}", request.host_profile),
        format!("-pr:b={}", request.build_profile),
    ];
    for conf in &request.host_conf {
        args.push(format!("-c:h={}", conf));
    }
    args.push(format!(
        "--output-folder={}",
        request.output_folder.to_string_lossy()
    ));
    args.push("--format=json".to_string());
    args
}

/// References listed for `remote` by `conan list --format=json`
pub fn parse_list_output(stdout: &[u8], remote: &str) -> Result<Vec<String>> {
    let remotes: IndexMap<String, IndexMap<String, serde_json::Value>> =
        serde_json::from_slice(stdout)?;
    let listing = remotes.get(remote).ok_or_else(|| Error::Conan {
        command: "list".to_string(),
        message: format!("no results for remote {}", remote),
    })?;
    if let Some(serde_json::Value::String(message)) = listing.get("error") {
        return Err(Error::Conan {
            command: "list".to_string(),
            message: message.clone(),
        });
    }
    Ok(listing.keys().cloned().collect())
}

/// Graph of `conan install --format=json`
pub fn parse_graph_output(stdout: &[u8]) -> Result<DepsGraph> {
    let output: GraphOutput = serde_json::from_slice(stdout)?;
    Ok(output.graph)
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string();
    if message.is_empty() {
        format!("exited with {}", output.status)
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inspect_output() {
        let json = br#"{"name": "zlib", "description": "A Massively Spiffy\nYet Delicately Unobtrusive Compression Library", "license": "Zlib", "options": {}}"#;
        let inspected: InspectedRecipe = serde_json::from_slice(json).unwrap();
        assert_eq!(inspected.name.as_deref(), Some("zlib"));
        assert_eq!(inspected.license, vec!["Zlib".to_string()]);
    }

    #[test]
    fn test_parse_inspect_output_without_license() {
        let inspected: InspectedRecipe = serde_json::from_slice(br#"{"name": "foo"}"#).unwrap();
        assert!(inspected.description.is_none());
        assert!(inspected.license.is_empty());
    }

    #[test]
    fn test_parse_list_output_keeps_order() {
        let json = br#"{"conancenter": {"zlib/1.2.13": {}, "abseil/20230802.1": {}, "zlib/1.3.1": {}}}"#;
        let refs = parse_list_output(json, "conancenter").unwrap();
        assert_eq!(refs, vec!["zlib/1.2.13", "abseil/20230802.1", "zlib/1.3.1"]);
    }

    #[test]
    fn test_parse_list_output_error() {
        let json = br#"{"conancenter": {"error": "Remote 'conancenter' can't be found"}}"#;
        let err = parse_list_output(json, "conancenter").unwrap_err();
        assert!(matches!(err, Error::Conan { .. }));
    }

    #[test]
    fn test_parse_graph_output() {
        let json = br#"{
            "graph": {
                "nodes": {
                    "0": {"ref": "conanfile", "cpp_info": {}},
                    "1": {
                        "ref": "foo/1.0#abc",
                        "cpp_info": {
                            "root": {"properties": {"cmake_file_name": "Foo"}},
                            "core": {"properties": null}
                        }
                    }
                }
            }
        }"#;
        let graph = parse_graph_output(json).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        let node = &graph.nodes["1"];
        assert!(node.matches("foo/1.0"));
        let scopes = node.cpp_info.as_ref().unwrap();
        assert!(scopes["core"].properties.is_none());
    }

    #[test]
    fn test_node_matching_is_exact() {
        let node = |r: &str| GraphNode {
            reference: Some(r.to_string()),
            cpp_info: None,
        };
        assert!(node("foo/1.0").matches("foo/1.0"));
        assert!(node("foo/1.0@user/stable").matches("foo/1.0"));
        assert!(!node("foo/1.0.1").matches("foo/1.0"));
        assert!(!node("libfoo/1.0").matches("foo/1.0"));
        assert!(!GraphNode::default().matches("foo/1.0"));
    }

    #[test]
    fn test_install_args() {
        let request = InstallRequest {
            reference: "foo/1.0".to_string(),
            remote: "conancenter".to_string(),
            host_profile: "default".to_string(),
            build_profile: "default".to_string(),
            host_conf: vec!["tools.system.package_manager:mode=install".to_string()],
            output_folder: PathBuf::from("/tmp/foo"),
        };
        let args = install_args(&request);
        assert_eq!(args[0], "--requires=foo/1.0");
        assert!(args.contains(&"--build=missing".to_string()));
        assert!(args.contains(&"-c:h=tools.system.package_manager:mode=install".to_string()));
        assert!(args.contains(&"--output-folder=/tmp/foo".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--format=json"));
    }
}

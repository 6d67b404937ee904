//! Run settings shared by the pipeline phases

use std::path::PathBuf;

pub const DEFAULT_RECIPES_DIR: &str = "tmp/conan-center-index/recipes";
pub const DEFAULT_REMOTE: &str = "conancenter";
pub const DEFAULT_PATTERN: &str = "*";
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_SCRATCH_DIR: &str = "tmp";

/// Host configuration applied to every install-based resolution: let the
/// engine install system packages, elevated.
pub const HOST_CONF: [&str; 2] = [
    "tools.system.package_manager:mode=install",
    "tools.system.package_manager:sudo=True",
];

#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the recipe corpus (`recipes/` of conan-center-index)
    pub recipes: PathBuf,
    /// Remote used for listing references and installing
    pub remote: String,
    /// Reference pattern listed from the remote
    pub pattern: String,
    /// Packages sent straight to install-based resolution
    pub force: Vec<String>,
    pub host_profile: String,
    pub build_profile: String,
    /// Parent of the per-package install folders
    pub scratch_dir: PathBuf,
    pub keep_scratch: bool,
    /// Concurrent install-based resolutions
    pub parallel: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recipes: PathBuf::from(DEFAULT_RECIPES_DIR),
            remote: DEFAULT_REMOTE.to_string(),
            pattern: DEFAULT_PATTERN.to_string(),
            force: Vec::new(),
            host_profile: DEFAULT_PROFILE.to_string(),
            build_profile: DEFAULT_PROFILE.to_string(),
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            keep_scratch: false,
            parallel: 1,
        }
    }
}

impl Settings {
    pub fn is_forced(&self, name: &str) -> bool {
        self.force.iter().any(|f| f == name)
    }

    pub fn host_conf(&self) -> Vec<String> {
        HOST_CONF.iter().map(|c| c.to_string()).collect()
    }
}

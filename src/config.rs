//! Configuration for stackdeploy.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (STACKDEPLOY_REGION, STACKDEPLOY_ACCOUNT_ID,
//!    STACKDEPLOY_ENDPOINT, STACKDEPLOY_TOKEN, STACKDEPLOY_HOME)
//! 2. Project config file (.stackdeploy/config.yaml)
//! 3. User config file ($STACKDEPLOY_HOME/config.yaml, default ~/.stackdeploy)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .stackdeploy/config.yaml
//! - Paths in a project config file are relative to the project root

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::DeploySettings;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".stackdeploy";
const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_REGION: &str = "cn-hangzhou";
pub const DEFAULT_ENDPOINT: &str = "https://ros.aliyuncs.com";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub deploy: Option<DeploySettings>,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfig {
    pub region: Option<String>,
    pub account_id: Option<String>,
    /// Control plane gateway
    pub endpoint: Option<String>,
    /// Bearer token for the gateway
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Working directory for snapshots and packaged templates
    pub work_dir: Option<String>,
    /// Where the packaged template is written
    pub packaged_template: Option<String>,
    /// Command that packages and uploads function code
    pub packager: Option<String>,
}

/// Account and region a deployment runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub region: String,
    pub account_id: String,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub profile: Profile,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// User-level state directory
    pub home: PathBuf,
    pub work_dir: PathBuf,
    pub packaged_template_path: PathBuf,
    pub packager_command: Option<String>,
    pub deploy: DeploySettings,
    /// Path to the project config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Where the last deployed remote template is kept
    pub fn remote_template_path(&self) -> PathBuf {
        self.work_dir.join("tmp").join("remote_template.json")
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let file: ConfigFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if let Some(deploy) = &file.deploy {
        deploy
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
    }

    Ok(file)
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Inputs to resolution, gathered from the process environment
struct Sources {
    cwd: PathBuf,
    home: PathBuf,
    project: Option<(PathBuf, ConfigFile)>,
    user: Option<ConfigFile>,
}

/// Merge config layers and environment into the final configuration
fn resolve(sources: Sources, env: impl Fn(&str) -> Option<String>) -> ResolvedConfig {
    let Sources {
        cwd,
        home,
        project,
        user,
    } = sources;

    // Project paths resolve against the directory holding .stackdeploy/
    let (project_root, project_file, config_file) = match project {
        Some((path, file)) => {
            let root = path
                .parent()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.clone());
            (root, Some(file), Some(path))
        }
        None => (cwd, None, None),
    };

    let layers: Vec<&ConfigFile> = project_file.iter().chain(user.iter()).collect();
    let pick = |f: fn(&ConfigFile) -> Option<&String>| -> Option<String> {
        layers.iter().find_map(|layer| f(layer)).cloned()
    };

    let region = env("STACKDEPLOY_REGION")
        .or_else(|| pick(|c| c.profile.region.as_ref()))
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let account_id = env("STACKDEPLOY_ACCOUNT_ID")
        .or_else(|| pick(|c| c.profile.account_id.as_ref()))
        .unwrap_or_default();
    let endpoint = env("STACKDEPLOY_ENDPOINT")
        .or_else(|| pick(|c| c.profile.endpoint.as_ref()))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let token = env("STACKDEPLOY_TOKEN").or_else(|| pick(|c| c.profile.token.as_ref()));

    let work_dir = match (
        project_file.as_ref().and_then(|c| c.paths.work_dir.as_ref()),
        user.as_ref().and_then(|c| c.paths.work_dir.as_ref()),
    ) {
        (Some(dir), _) => resolve_path(&project_root, dir),
        (None, Some(dir)) => resolve_path(&home, dir),
        (None, None) => project_root.join(CONFIG_DIR),
    };

    let packaged_template_path = match pick(|c| c.paths.packaged_template.as_ref()) {
        Some(path) => resolve_path(&project_root, &path),
        None => work_dir.join("template.packaged.yml"),
    };

    let deploy = layers
        .iter()
        .find_map(|layer| layer.deploy.clone())
        .unwrap_or_default();

    ResolvedConfig {
        profile: Profile { region, account_id },
        endpoint,
        token,
        home,
        work_dir,
        packaged_template_path,
        packager_command: pick(|c| c.paths.packager.as_ref()),
        deploy,
        config_file,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let home = match std::env::var("STACKDEPLOY_HOME") {
        Ok(home) => PathBuf::from(home),
        Err(_) => dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(CONFIG_DIR),
    };
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let project = match find_config_file(&cwd) {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    let user_path = home.join(CONFIG_FILE);
    let user = if user_path.exists() {
        Some(load_config_file(&user_path)?)
    } else {
        None
    };

    Ok(resolve(
        Sources {
            cwd,
            home,
            project,
            user,
        },
        |key| std::env::var(key).ok(),
    ))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

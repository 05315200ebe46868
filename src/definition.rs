use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed name of the definition file inside the template directory.
pub const DEFINITION_FILE: &str = "templates.yaml";

/// Top-level parsed definition. Absent sections yield empty collections;
/// no other defaults are synthesized.
#[derive(Debug, Default, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub sources: Sources,
    #[serde(default, rename = "run_deploy")]
    pub run: HashMap<String, RunStep>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Defaults {
    /// Permission bits applied when a FileSpec does not declare its own.
    pub chmod: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { chmod: 0o644 }
    }
}

/// Feature identifiers: a common list plus per-deployment-target additions.
/// Order within each list is insertion order and is preserved.
#[derive(Debug, Default, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub common: Vec<String>,
    #[serde(default)]
    pub deploy: HashMap<String, Vec<String>>,
}

/// Candidate output files keyed by destination path, common plus
/// per-deployment-target.
#[derive(Debug, Default, Deserialize)]
pub struct Sources {
    #[serde(default)]
    pub common: HashMap<String, FileSpec>,
    #[serde(default)]
    pub deploy: HashMap<String, HashMap<String, FileSpec>>,
}

/// One candidate output file. An empty `template` means the file is a
/// verbatim copy; a non-empty one names the template body to render.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileSpec {
    #[serde(default)]
    pub chmod: Option<u32>,
    #[serde(default)]
    pub template: String,
    /// Optional custom delimiter pair, e.g. "(())". See `remap`.
    #[serde(default)]
    pub tag: String,
    /// Source path relative to the template dir; empty means same as the
    /// destination path.
    #[serde(default)]
    pub source: String,
    /// Gating condition. Empty means always selected; otherwise the file is
    /// selected only if evaluation yields a truthy string.
    #[serde(default, rename = "if")]
    pub condition: String,
}

/// A named shell step with its gated environment variables.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RunStep {
    #[serde(rename = "run")]
    pub command: String,
    #[serde(default, rename = "environment")]
    pub env: HashMap<String, EnvVarSpec>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EnvVarSpec {
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "if")]
    pub condition: String,
}

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("unable to find templates definition file {path:?}")]
    NotFound { path: PathBuf },
    #[error("unable to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

impl Definition {
    /// Loads the definition file from the template directory.
    pub fn load(template_dir: &Path) -> Result<Self, DefinitionError> {
        let path = template_dir.join(DEFINITION_FILE);
        if !path.exists() {
            return Err(DefinitionError::NotFound { path });
        }
        let content = std::fs::read_to_string(&path).map_err(|source| DefinitionError::Io {
            path: path.clone(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| DefinitionError::Parse { path, source })
    }
}

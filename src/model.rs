use serde::Serialize;
use std::collections::HashMap;

/// Model data exposed to templates and conditions while selecting and
/// generating source files. Built once per generation pass and consumed by
/// the selection call, so later phases cannot observe stale per-pass state.
#[derive(Debug, Default, Serialize)]
pub struct SourceModel {
    /// Opaque caller-supplied payload; templates reference it as `source.*`.
    pub source: serde_json::Value,
}

impl SourceModel {
    pub fn new(source: serde_json::Value) -> Self {
        Self { source }
    }
}

/// Long-lived model used outside the selection pass, e.g. while resolving
/// run-step environments. Owns the credential and environment mappings.
#[derive(Debug, Default, Serialize)]
pub struct RuntimeModel {
    pub config: serde_json::Value,
    pub creds: HashMap<String, String>,
    pub env: HashMap<String, String>,
}

impl RuntimeModel {
    pub fn new(config: serde_json::Value) -> Self {
        Self {
            config,
            creds: HashMap::new(),
            env: HashMap::new(),
        }
    }

    /// Exposes the process environment to conditions and run-step specs as
    /// `env.*`.
    pub fn with_process_env(mut self) -> Self {
        self.env = std::env::vars().collect();
        self
    }

    /// Supplies the credential mapping; credential storage itself belongs to
    /// the surrounding application.
    pub fn with_creds(mut self, creds: HashMap<String, String>) -> Self {
        self.creds = creds;
        self
    }
}

use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::process::Command;
use thiserror::Error;

use crate::condition::{self, EvalError};
use crate::definition::RunStep;
use crate::engine::TemplateEngine;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("unable to evaluate the '{var}' condition: {source}")]
    Env {
        var: String,
        #[source]
        source: EvalError,
    },
    #[error("unable to run step '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },
    #[error("step '{name}' failed with exit code {code:?}")]
    Failed { name: String, code: Option<i32> },
}

/// Resolves a run step's environment variables against the model. A
/// variable with a falsey condition is omitted; one with an empty condition
/// is always exported with its literal value.
pub fn resolve_env<T: Serialize>(
    engine: &TemplateEngine,
    step: &RunStep,
    model: &T,
) -> Result<HashMap<String, String>, RunError> {
    let mut env = HashMap::new();
    for (name, var) in &step.env {
        if !var.condition.is_empty() {
            let value = condition::evaluate(engine, &var.condition, model).map_err(|source| {
                RunError::Env {
                    var: name.clone(),
                    source,
                }
            })?;
            if !condition::is_truthy(&value) {
                debug!("condition '{}' negative, '{}' not exported", var.condition, name);
                continue;
            }
        }
        env.insert(name.clone(), var.value.clone());
    }
    Ok(env)
}

/// Executes one named run step through the shell with the resolved
/// environment, inheriting stdio. A non-zero exit status is an error.
pub fn run_step(
    name: &str,
    step: &RunStep,
    env: &HashMap<String, String>,
) -> Result<(), RunError> {
    info!("running step '{}': {}", name, step.command);
    let status = Command::new("sh")
        .arg("-c")
        .arg(&step.command)
        .envs(env)
        .status()
        .map_err(|source| RunError::Spawn {
            name: name.to_string(),
            source,
        })?;
    if !status.success() {
        return Err(RunError::Failed {
            name: name.to_string(),
            code: status.code(),
        });
    }
    Ok(())
}

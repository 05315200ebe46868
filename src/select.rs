use log::info;
use std::collections::HashMap;
use thiserror::Error;

use crate::condition::{self, EvalError};
use crate::definition::{Definition, FileSpec};
use crate::engine::TemplateEngine;
use crate::model::SourceModel;

/// The active file set produced by one selection pass: verbatim copies and
/// template sources, each keyed by destination path, plus the resolved
/// feature list.
#[derive(Debug, Default)]
pub struct SelectedFileSet {
    pub features: Vec<String>,
    pub copies: HashMap<String, FileSpec>,
    pub templates: HashMap<String, FileSpec>,
}

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("unable to evaluate feature '{feature}': {source}")]
    Feature {
        feature: String,
        #[source]
        source: EvalError,
    },
    #[error("unable to evaluate the '{file}' condition: {source}")]
    Condition {
        file: String,
        #[source]
        source: EvalError,
    },
}

/// Walks the definition's common and deployment-specific sections and
/// decides which files are plain copies, which are templates, and which are
/// skipped entirely.
///
/// The model is consumed by the call; selection is the only phase allowed to
/// observe it, so it is dropped when the pass completes. Any evaluation
/// error aborts the whole pass and partial results are discarded.
pub fn select(
    engine: &TemplateEngine,
    definition: &Definition,
    deploy_to: &str,
    model: SourceModel,
) -> Result<SelectedFileSet, SelectError> {
    let mut selected = SelectedFileSet::default();

    for feature in &definition.features.common {
        let value = condition::evaluate(engine, feature, &model).map_err(|source| {
            SelectError::Feature {
                feature: feature.clone(),
                source,
            }
        })?;
        if value.is_empty() {
            info!("no feature defined with '{}'", feature);
            continue;
        }
        selected.features.push(value);
    }

    if let Some(deploy_features) = definition.features.deploy.get(deploy_to) {
        for feature in deploy_features {
            if !feature.is_empty() {
                selected.features.push(feature.clone());
            }
        }
    }

    for (file, spec) in &definition.sources.common {
        choose_file(engine, &model, &mut selected, file, spec)?;
    }

    if let Some(deploy_sources) = definition.sources.deploy.get(deploy_to) {
        for (file, spec) in deploy_sources {
            choose_file(engine, &model, &mut selected, file, spec)?;
        }
    }

    // The per-pass model goes out of scope here; later phases build their own.
    drop(model);

    Ok(selected)
}

fn choose_file(
    engine: &TemplateEngine,
    model: &SourceModel,
    selected: &mut SelectedFileSet,
    file: &str,
    spec: &FileSpec,
) -> Result<(), SelectError> {
    if file.is_empty() {
        return Ok(());
    }
    if !spec.condition.is_empty() {
        let value =
            condition::evaluate(engine, &spec.condition, model).map_err(|source| {
                SelectError::Condition {
                    file: file.to_string(),
                    source,
                }
            })?;
        if !condition::is_truthy(&value) {
            info!(
                "condition '{}' negative (false or empty), '{}' ignored",
                spec.condition, file
            );
            return Ok(());
        }
    }
    if spec.template.is_empty() {
        info!("src : selected: {}", file);
        selected.copies.insert(file.to_string(), spec.clone());
    } else {
        info!("tmpl: selected: {}", file);
        selected.templates.insert(file.to_string(), spec.clone());
    }
    Ok(())
}

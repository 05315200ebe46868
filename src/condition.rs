use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::engine::TemplateEngine;

#[derive(Error, Debug)]
#[error("unable to evaluate '{expr}': {source}")]
pub struct EvalError {
    pub expr: String,
    #[source]
    pub source: minijinja::Error,
}

/// Evaluates a small inline expression against the model.
///
/// An expression without templating markers is returned unchanged, skipping
/// compilation. Otherwise it is compiled and rendered as a micro-template;
/// any compile or missing-field error carries the original expression text.
pub fn evaluate<T: Serialize>(
    engine: &TemplateEngine,
    value: &str,
    model: &T,
) -> Result<String, EvalError> {
    if !value.contains("{{") {
        return Ok(value.to_string());
    }
    let ret = engine
        .render_string(value, model)
        .map_err(|source| EvalError {
            expr: value.to_string(),
            source,
        })?;
    debug!("'{}' evaluated to '{}'", value, ret);
    Ok(ret)
}

/// Truthiness policy for gating conditions: a result is true unless it is
/// the empty string or equals "false" case-insensitively. All other
/// non-empty strings, including "0", are true. Existing definitions rely on
/// truthy non-boolean strings, so this is not a conventional boolean parse.
pub fn is_truthy(value: &str) -> bool {
    !value.is_empty() && !value.eq_ignore_ascii_case("false")
}

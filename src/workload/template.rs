use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Url;

use crate::args::{Scenario, ScenarioStep};
use crate::engine::BodyContext;
use crate::error::{AppError, AppResult, ConfigError, ValidationError};

/// Variables fixed for the lifetime of a unit: scenario vars, step vars and the user.
pub(super) fn static_vars(
    scenario: &Scenario,
    step: &ScenarioStep,
    user: Option<&str>,
) -> BTreeMap<String, String> {
    let mut vars = scenario.vars.clone();
    for (key, value) in &step.vars {
        vars.insert(key.clone(), value.clone());
    }
    if let Some(user) = user {
        vars.insert("user".to_owned(), user.to_owned());
    }
    vars
}

/// Adds the per-call variables on top of `base`.
pub(super) fn call_vars(
    base: &BTreeMap<String, String>,
    context: &BodyContext,
) -> BTreeMap<String, String> {
    let mut vars = base.clone();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    vars.insert("seq".to_owned(), context.seq.to_string());
    vars.insert("worker".to_owned(), context.worker.to_string());
    vars.insert("step".to_owned(), context.step.saturating_add(1).to_string());
    vars.insert("timestamp_ms".to_owned(), now.as_millis().to_string());
    vars.insert("timestamp_ns".to_owned(), now.as_nanos().to_string());
    vars.insert("rand".to_owned(), rand::random::<u32>().to_string());
    vars
}

pub(super) fn resolve_step_url(
    scenario: &Scenario,
    step: &ScenarioStep,
    index: usize,
    vars: &BTreeMap<String, String>,
) -> AppResult<Url> {
    if let Some(url) = step.url.as_ref() {
        let rendered = render_template(url, vars);
        return Url::parse(&rendered).map_err(|err| {
            AppError::validation(ValidationError::InvalidTargetUrl {
                url: rendered,
                source: err,
            })
        });
    }

    let base_url = scenario.base_url.as_ref().ok_or_else(|| {
        AppError::config(ConfigError::ScenarioStepMissingUrlOrPath {
            index: index.saturating_add(1),
        })
    })?;
    let path = step.path.as_deref().unwrap_or_default();
    let base = Url::parse(base_url).map_err(|err| {
        AppError::config(ConfigError::InvalidScenarioBaseUrl {
            url: base_url.to_owned(),
            source: err,
        })
    })?;
    let rendered_path = render_template(path, vars);
    base.join(&rendered_path).map_err(|err| {
        AppError::config(ConfigError::JoinScenarioPath {
            path: rendered_path,
            source: err,
        })
    })
}

/// Replaces `{{key}}` with its value. Unknown keys are left untouched.
pub(crate) fn render_template(input: &str, vars: &BTreeMap<String, String>) -> String {
    let mut rest = input;
    let mut output = String::with_capacity(input.len());

    loop {
        let Some(start) = rest.find("{{") else {
            output.push_str(rest);
            break;
        };
        let (before, after_start) = rest.split_at(start);
        output.push_str(before);
        let Some(after) = after_start.strip_prefix("{{") else {
            output.push_str(after_start);
            break;
        };
        let Some(end) = after.find("}}") else {
            output.push_str("{{");
            output.push_str(after);
            break;
        };
        let (key_part, after_end) = after.split_at(end);
        let key = key_part.trim();
        if let Some(value) = vars.get(key) {
            output.push_str(value);
        } else {
            output.push_str("{{");
            output.push_str(key);
            output.push_str("}}");
        }
        rest = match after_end.strip_prefix("}}") {
            Some(remaining) => remaining,
            None => {
                output.push_str(after_end);
                break;
            }
        };
    }

    output
}

pub(super) fn step_label(step: &ScenarioStep, index: usize) -> String {
    step.name
        .clone()
        .unwrap_or_else(|| format!("step {}", index.saturating_add(1)))
}

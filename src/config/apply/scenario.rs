use crate::args::{HttpMethod, Scenario, ScenarioStep};
use crate::error::{AppError, AppResult, ConfigError};

use super::super::types::ScenarioConfig;
use super::util::parse_headers;

/// Top-level CLI values a scenario inherits when it does not set its own.
#[derive(Debug, Clone)]
pub(crate) struct ScenarioDefaults {
    pub(crate) base_url: Option<String>,
    pub(crate) method: HttpMethod,
    pub(crate) body: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
}

pub(crate) fn parse_scenario(
    config: &ScenarioConfig,
    defaults: &ScenarioDefaults,
) -> AppResult<Scenario> {
    if config.steps.is_empty() {
        return Err(AppError::config(ConfigError::ScenarioMissingSteps));
    }

    let base_url = config
        .base_url
        .clone()
        .or_else(|| defaults.base_url.clone());
    let default_method = config.method.unwrap_or(defaults.method);
    let default_body = config.data.clone().or_else(|| defaults.body.clone());
    let default_headers = match config.headers.as_ref() {
        Some(headers) => parse_headers(headers)?,
        None => defaults.headers.clone(),
    };

    let mut steps = Vec::with_capacity(config.steps.len());
    for (idx, step) in config.steps.iter().enumerate() {
        let url = step.url.clone();
        let path = step.path.clone();
        if url.is_none() && path.is_none() && base_url.is_none() {
            return Err(AppError::config(
                ConfigError::ScenarioStepMissingUrlOrPath {
                    index: idx.saturating_add(1),
                },
            ));
        }

        let mut headers = default_headers.clone();
        if let Some(step_headers) = step.headers.as_ref() {
            headers.extend(parse_headers(step_headers)?);
        }

        steps.push(ScenarioStep {
            name: step.name.clone(),
            method: step.method.unwrap_or(default_method),
            url,
            path,
            headers,
            body: step.data.clone().or_else(|| default_body.clone()),
            vars: step.vars.clone().unwrap_or_default(),
        });
    }

    Ok(Scenario {
        base_url,
        vars: config.vars.clone().unwrap_or_default(),
        users: config.users.clone().unwrap_or_default(),
        steps,
    })
}

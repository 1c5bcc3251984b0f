//! Turns CLI arguments (and an optional scenario) into the engine's [`Workload`].

mod template;


use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Url;
use reqwest::header::{
    ACCEPT, CONTENT_TYPE, HOST, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};

use crate::args::{DEFAULT_USER_AGENT, LoadArgs, Scenario};
use crate::engine::{BodySource, ExecutionUnit, RequestTemplate, Step, Workload};
use crate::error::{AppError, AppResult, HttpError, ValidationError};

pub(crate) use template::render_template;
use template::{call_vars, resolve_step_url, static_vars, step_label};

/// Builds the workload for a run.
///
/// # Errors
///
/// Returns an error for a missing or malformed URL, invalid headers, or an
/// unreadable body file.
pub(crate) fn build_workload(args: &LoadArgs) -> AppResult<Workload> {
    match args.scenario.as_ref() {
        Some(scenario) => build_scenario_workload(args, scenario),
        None => build_single_workload(args),
    }
}

fn build_single_workload(args: &LoadArgs) -> AppResult<Workload> {
    let raw = args
        .url
        .as_deref()
        .ok_or_else(|| AppError::validation(ValidationError::MissingUrl))?;
    let url = Url::parse(raw).map_err(|err| {
        AppError::validation(ValidationError::InvalidTargetUrl {
            url: raw.to_owned(),
            source: err,
        })
    })?;

    let mut template = RequestTemplate::new(args.method.to_method(), url);
    template.headers = build_headers(args, &args.headers, None)?;
    template.basic_auth = args.basic_auth.clone();
    template.body = read_body(args)?;
    Ok(Workload::single(template))
}

fn read_body(args: &LoadArgs) -> AppResult<BodySource> {
    if let Some(path) = args.data_file.as_ref() {
        let bytes = std::fs::read(path).map_err(|err| {
            AppError::http(HttpError::ReadBodyFile {
                path: path.clone(),
                source: err,
            })
        })?;
        return Ok(BodySource::Static(Bytes::from(bytes)));
    }
    Ok(match args.data.as_deref() {
        Some(data) if !data.is_empty() => BodySource::Static(Bytes::from(data.to_owned())),
        Some(_) | None => BodySource::Empty,
    })
}

fn build_scenario_workload(args: &LoadArgs, scenario: &Scenario) -> AppResult<Workload> {
    let users: Vec<Option<&str>> = if scenario.users.is_empty() {
        vec![None]
    } else {
        scenario.users.iter().map(|user| Some(user.as_str())).collect()
    };

    let mut units = Vec::with_capacity(users.len());
    for user in users {
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let vars = static_vars(scenario, step, user);
            let url = resolve_step_url(scenario, step, index, &vars)?;
            let mut template = RequestTemplate::new(step.method.to_method(), url);
            template.headers = build_headers(args, &step.headers, Some(&vars))?;
            template.basic_auth = args.basic_auth.clone();
            template.body = templated_body(step.body.as_deref(), vars);
            steps.push(Step::new(step_label(step, index), template));
        }
        units.push(ExecutionUnit::sequence(steps));
    }
    Ok(Workload { units })
}

/// Static bodies are shared as-is; bodies with placeholders are rendered on every call.
fn templated_body(body: Option<&str>, vars: BTreeMap<String, String>) -> BodySource {
    let Some(body) = body.filter(|body| !body.is_empty()) else {
        return BodySource::Empty;
    };
    if !body.contains("{{") {
        return BodySource::Static(Bytes::from(body.to_owned()));
    }
    let body: Arc<str> = Arc::from(body);
    BodySource::deferred(move |context| {
        let rendered = render_template(&body, &call_vars(&vars, context));
        Bytes::from(rendered)
    })
}

fn build_headers(
    args: &LoadArgs,
    custom: &[(String, String)],
    vars: Option<&BTreeMap<String, String>>,
) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, header_value("Content-Type", &args.content_type)?);
    if let Some(accept) = args.accept.as_deref() {
        headers.insert(ACCEPT, header_value("Accept", accept)?);
    }
    for (key, value) in custom {
        let rendered = vars.map_or_else(|| value.clone(), |vars| render_template(value, vars));
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            AppError::validation(ValidationError::InvalidHeaderName {
                header: key.clone(),
                source: err,
            })
        })?;
        headers.insert(name, header_value(key, &rendered)?);
    }
    if let Some(host) = args.host.as_deref() {
        headers.insert(HOST, header_value("Host", host)?);
    }

    let user_agent = match headers.get(USER_AGENT).and_then(|value| value.to_str().ok()) {
        Some(custom) => format!("{} {}", custom, DEFAULT_USER_AGENT),
        None => DEFAULT_USER_AGENT.to_owned(),
    };
    headers.insert(USER_AGENT, header_value("User-Agent", &user_agent)?);
    Ok(headers)
}

fn header_value(header: &str, value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|err| {
        AppError::validation(ValidationError::InvalidHeaderValue {
            header: header.to_owned(),
            source: err,
        })
    })
}

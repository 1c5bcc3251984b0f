use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Client, Method, Request, Url, header::HeaderMap};

/// Values handed to a deferred body producer on every invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyContext {
    pub worker: usize,
    pub seq: u64,
    pub step: usize,
}

pub type BodyProducer = Arc<dyn Fn(&BodyContext) -> Bytes + Send + Sync>;

#[derive(Clone, Default)]
pub enum BodySource {
    #[default]
    Empty,
    Static(Bytes),
    /// Evaluated right before each request is issued, never at configuration time.
    Deferred(BodyProducer),
}

impl BodySource {
    pub fn deferred<F>(producer: F) -> Self
    where
        F: Fn(&BodyContext) -> Bytes + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(producer))
    }

    #[must_use]
    pub fn produce(&self, context: &BodyContext) -> Option<Bytes> {
        match self {
            BodySource::Empty => None,
            BodySource::Static(bytes) => Some(bytes.clone()),
            BodySource::Deferred(producer) => Some(producer(context)),
        }
    }
}

impl fmt::Debug for BodySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodySource::Empty => f.write_str("Empty"),
            BodySource::Static(bytes) => write!(f, "Static({} bytes)", bytes.len()),
            BodySource::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub basic_auth: Option<(String, String)>,
    pub body: BodySource,
}

impl RequestTemplate {
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            basic_auth: None,
            body: BodySource::Empty,
        }
    }

    pub(crate) fn build(
        &self,
        client: &Client,
        context: &BodyContext,
    ) -> Result<Request, reqwest::Error> {
        let mut builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if let Some((username, password)) = self.basic_auth.as_ref() {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(body) = self.body.produce(context) {
            builder = builder.body(body);
        }
        builder.build()
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub label: Arc<str>,
    pub request: RequestTemplate,
}

impl Step {
    pub fn new(label: impl Into<Arc<str>>, request: RequestTemplate) -> Self {
        Self {
            label: label.into(),
            request,
        }
    }
}

/// One iteration of a worker: a single request or an ordered session.
#[derive(Debug, Clone)]
pub struct ExecutionUnit {
    pub steps: Vec<Step>,
}

impl ExecutionUnit {
    #[must_use]
    pub fn single(request: RequestTemplate) -> Self {
        Self {
            steps: vec![Step::new("request", request)],
        }
    }

    #[must_use]
    pub const fn sequence(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

/// Units assigned to workers round-robin: worker `i` runs unit `i % len`.
#[derive(Debug, Clone)]
pub struct Workload {
    pub units: Vec<ExecutionUnit>,
}

impl Workload {
    #[must_use]
    pub fn single(request: RequestTemplate) -> Self {
        Self {
            units: vec![ExecutionUnit::single(request)],
        }
    }

    #[must_use]
    pub fn unit_for(&self, worker: usize) -> Option<&ExecutionUnit> {
        let index = worker.checked_rem(self.units.len())?;
        self.units.get(index)
    }

    pub(crate) fn templates(&self) -> impl Iterator<Item = &RequestTemplate> {
        self.units
            .iter()
            .flat_map(|unit| unit.steps.iter().map(|step| &step.request))
    }
}

//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use delve_engine::capabilities::{CapabilityCall, CapabilityInvoker, CapabilityOutcome};
use delve_engine::conductor::RunContext;
use delve_engine::config::LLMConfig;
use delve_engine::llm::router::LLMRouter;
use delve_engine::llm::{
    CompletionRequest, FinalAnswer, LLMError, LLMProvider, LLMResponse, ToolCall,
};
use delve_engine::providers::{
    EntityDirectory, FetchError, PageFetcher, ProviderError, ResolvedEntity, SearchHit, WebSearch,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A request as seen by the scripted provider
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub label: &'static str,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub functions: Vec<String>,
}

type Script = dyn Fn(&CompletionRequest) -> Result<LLMResponse, LLMError> + Send + Sync;

/// Completion provider answering from a closure and recording every request.
pub struct ScriptedProvider {
    script: Box<Script>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl ScriptedProvider {
    pub fn new<F>(script: F) -> (Self, Arc<Mutex<Vec<SeenRequest>>>)
    where
        F: Fn(&CompletionRequest) -> Result<LLMResponse, LLMError> + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script: Box::new(script),
                seen: Arc::clone(&seen),
            },
            seen,
        )
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn is_local(&self) -> bool {
        true
    }

    fn estimated_cost(&self, _tokens: usize) -> f64 {
        0.0
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<LLMResponse, LLMError> {
        self.seen.lock().unwrap().push(SeenRequest {
            label: request.label,
            system: request.system.clone(),
            user: request.user.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            functions: request.functions.iter().map(|f| f.name.clone()).collect(),
        });
        (self.script)(request)
    }
}

/// Router over a single scripted provider
pub fn scripted_router<F>(script: F) -> (Arc<LLMRouter>, Arc<Mutex<Vec<SeenRequest>>>)
where
    F: Fn(&CompletionRequest) -> Result<LLMResponse, LLMError> + Send + Sync + 'static,
{
    let (provider, seen) = ScriptedProvider::new(script);
    let router = LLMRouter::new(vec![Box::new(provider)], Arc::new(LLMConfig::default()));
    (Arc::new(router), seen)
}

pub fn text(content: &str) -> Result<LLMResponse, LLMError> {
    Ok(LLMResponse::FinalAnswer(FinalAnswer::new(content)))
}

pub fn call(name: &str, arguments: serde_json::Value) -> Result<LLMResponse, LLMError> {
    Ok(LLMResponse::ToolCall(ToolCall::new(
        "call_1",
        name,
        arguments.to_string(),
    )))
}

pub fn labels(seen: &Arc<Mutex<Vec<SeenRequest>>>) -> Vec<&'static str> {
    seen.lock().unwrap().iter().map(|r| r.label).collect()
}

/// One recorded capability invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub call: CapabilityCall,
    pub sub_task: String,
    pub context: String,
}

/// Capability invoker returning canned outcomes per capability name
#[derive(Default)]
pub struct RecordingInvoker {
    outcomes: HashMap<&'static str, CapabilityOutcome>,
    pub invocations: Mutex<Vec<Invocation>>,
}

impl RecordingInvoker {
    pub fn with(mut self, capability: &'static str, outcome: CapabilityOutcome) -> Self {
        self.outcomes.insert(capability, outcome);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapabilityInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        call: &CapabilityCall,
        sub_task: &str,
        context: &RunContext,
    ) -> CapabilityOutcome {
        self.invocations.lock().unwrap().push(Invocation {
            call: call.clone(),
            sub_task: sub_task.to_string(),
            context: context.as_str().to_string(),
        });
        self.outcomes
            .get(call.name())
            .cloned()
            .unwrap_or_else(|| CapabilityOutcome::Missing(format!("nothing for {}", call.name())))
    }
}

/// Entity directory backed by maps, counting detail fetches
#[derive(Default)]
pub struct FakeDirectory {
    pub entities: HashMap<String, ResolvedEntity>,
    pub details: HashMap<String, serde_json::Value>,
    pub resolve_calls: Mutex<usize>,
    pub detail_calls: Mutex<usize>,
}

impl FakeDirectory {
    pub fn with_entity(mut self, entity: ResolvedEntity, detail: Option<serde_json::Value>) -> Self {
        if let Some(detail) = detail {
            self.details.insert(entity.uuid.clone(), detail);
        }
        self.entities.insert(entity.name.to_lowercase(), entity);
        self
    }

    pub fn detail_calls(&self) -> usize {
        *self.detail_calls.lock().unwrap()
    }

    pub fn resolve_calls(&self) -> usize {
        *self.resolve_calls.lock().unwrap()
    }
}

#[async_trait]
impl EntityDirectory for FakeDirectory {
    async fn resolve(&self, name: &str) -> Result<Option<ResolvedEntity>, ProviderError> {
        *self.resolve_calls.lock().unwrap() += 1;
        Ok(self.entities.get(&name.to_lowercase()).cloned())
    }

    async fn fetch_detail(&self, entity: &ResolvedEntity) -> Result<serde_json::Value, ProviderError> {
        *self.detail_calls.lock().unwrap() += 1;
        self.details
            .get(&entity.uuid)
            .cloned()
            .ok_or(ProviderError::Status {
                provider: "crunchbase",
                status: 404,
            })
    }
}

/// Search returning the same hits for every query
#[derive(Default)]
pub struct FakeSearch {
    pub hits: Vec<SearchHit>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn with_urls(urls: &[&str]) -> Self {
        Self {
            hits: urls
                .iter()
                .map(|u| SearchHit {
                    url: u.to_string(),
                    snippet: String::new(),
                })
                .collect(),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str, _count: usize) -> Result<Vec<SearchHit>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.hits.clone())
    }
}

/// Fetcher replaying a scripted sequence of results per URL. URLs without
/// a script fail permanently.
#[derive(Default)]
pub struct FakeFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with(self, url: &str, results: Vec<Result<String, FetchError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), results.into_iter().collect());
        self
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn distinct_urls(&self) -> usize {
        let calls = self.calls.lock().unwrap();
        let mut urls: Vec<&String> = calls.iter().collect();
        urls.sort();
        urls.dedup();
        urls.len()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(FetchError::Permanent("HTTP 404".into())))
    }
}

pub fn html_page(body: &str) -> String {
    format!(
        "<html><head><title>t</title><script>var x = 1;</script></head><body><p>{}</p></body></html>",
        body
    )
}

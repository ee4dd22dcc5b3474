//! Shared fakes for integration tests
//!
//! `FakeEngine` models a local image store plus a remote registry so the
//! orchestrators see realistic pull/tag/push/inspect behaviour. `FakeApi`
//! serves scripted management API responses and counts requests.

#![allow(dead_code)]

use async_trait::async_trait;
use registry_replicator::common::InterruptFlag;
use registry_replicator::config::{TargetCatalog, TargetEnvironment};
use registry_replicator::engine::{ContainerEngine, EngineCommand, EngineOutput, OperationKind};
use registry_replicator::error::{ReplicationError, Result};
use registry_replicator::registry::{
    ApiResponse, CreateRepositoryRequest, ListingPage, RegistryApi,
};
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const PROD_HOST: &str = "quay-prod.example.com";
pub const DR_HOST: &str = "quay-dr.example.com";
pub const NAMESPACE: &str = "mirror_ns";

pub fn target(name: &str, url: &str) -> TargetEnvironment {
    TargetEnvironment {
        name: name.to_string(),
        url: url.to_string(),
        namespace: NAMESPACE.to_string(),
        organization: NAMESPACE.to_string(),
        api_token: format!("{}-token", name),
        api_url: None,
        username_env: None,
        password_env: None,
    }
}

pub fn catalog() -> TargetCatalog {
    TargetCatalog::new([target("prod", PROD_HOST), target("dr", DR_HOST)])
}

/// What a scripted failure makes the engine return
#[derive(Debug, Clone)]
pub enum Failure {
    /// Non-zero exit with this stderr
    Exit(String),
    Timeout,
}

#[derive(Debug)]
struct FailureRule {
    kind: OperationKind,
    target: String,
    remaining: usize,
    failure: Failure,
}

#[derive(Default)]
pub struct FakeEngine {
    remote: Mutex<HashSet<String>>,
    local: Mutex<HashSet<String>>,
    calls: Mutex<Vec<EngineCommand>>,
    rules: Mutex<Vec<FailureRule>>,
    push_lies: Mutex<bool>,
    panic_on: Mutex<Option<String>>,
    stop_on: Mutex<Option<(OperationKind, InterruptFlag)>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry already holds `image`
    pub fn with_remote(self, image: &str) -> Self {
        self.remote.lock().unwrap().insert(image.to_string());
        self
    }

    /// Fail the next `times` runs of `kind` whose image argument is `target`
    pub fn fail(&self, kind: OperationKind, target: &str, times: usize, failure: Failure) {
        self.rules.lock().unwrap().push(FailureRule {
            kind,
            target: target.to_string(),
            remaining: times,
            failure,
        });
    }

    /// Pushes report success without the image ever reaching the registry
    pub fn set_push_lies(&self, lies: bool) {
        *self.push_lies.lock().unwrap() = lies;
    }

    /// Panic when any command mentions `needle`
    pub fn panic_on(&self, needle: &str) {
        *self.panic_on.lock().unwrap() = Some(needle.to_string());
    }

    /// Raise `flag` while running every `kind` command, as Ctrl+C would
    /// mid-transfer; the engine then exits with "context canceled"
    pub fn interrupt_on(&self, kind: OperationKind, flag: &InterruptFlag) {
        *self.stop_on.lock().unwrap() = Some((kind, flag.clone()));
    }

    pub fn calls(&self) -> Vec<EngineCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: OperationKind) -> Vec<EngineCommand> {
        self.calls()
            .into_iter()
            .filter(|command| command.kind == kind)
            .collect()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.calls_of(kind).len()
    }

    /// Image arguments of every `kind` call, in order
    pub fn targets_of(&self, kind: OperationKind) -> Vec<String> {
        self.calls_of(kind)
            .iter()
            .map(|command| command.target().to_string())
            .collect()
    }

    /// Any call at all mentioning `needle`
    pub fn touched(&self, needle: &str) -> bool {
        self.calls()
            .iter()
            .any(|command| command.args.iter().any(|arg| arg.contains(needle)))
    }

    pub fn has_remote(&self, image: &str) -> bool {
        self.remote.lock().unwrap().contains(image)
    }

    pub fn local_images(&self) -> HashSet<String> {
        self.local.lock().unwrap().clone()
    }

    fn scripted_failure(&self, command: &EngineCommand) -> Option<Failure> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules.iter_mut().find(|rule| {
            rule.kind == command.kind && rule.remaining > 0 && rule.target == command.target()
        })?;
        rule.remaining -= 1;
        Some(rule.failure.clone())
    }

    fn missing(image: &str) -> EngineOutput {
        EngineOutput::failure(1, format!("Error response from daemon: No such image: {}", image))
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    fn program(&self) -> &str {
        "docker"
    }

    async fn run(&self, command: &EngineCommand, _timeout: Duration) -> Result<EngineOutput> {
        self.calls.lock().unwrap().push(command.clone());

        let panic_on = self.panic_on.lock().unwrap().clone();
        if let Some(needle) = panic_on {
            if command.args.iter().any(|arg| arg.contains(&needle)) {
                panic!("engine exploded on {}", needle);
            }
        }

        let stop_on = self.stop_on.lock().unwrap().clone();
        if let Some((kind, flag)) = stop_on {
            if kind == command.kind {
                flag.raise();
                return Ok(EngineOutput::failure(1, "context canceled"));
            }
        }

        match self.scripted_failure(command) {
            Some(Failure::Exit(stderr)) => return Ok(EngineOutput::failure(1, stderr)),
            Some(Failure::Timeout) => {
                return Err(ReplicationError::Timeout(format!(
                    "{} timed out",
                    command.display("docker")
                )));
            }
            None => {}
        }

        let image = command.target().to_string();
        let output = match command.kind {
            OperationKind::Login => EngineOutput::success(),
            OperationKind::ManifestInspect => {
                if self.has_remote(&image) {
                    EngineOutput::success()
                } else {
                    EngineOutput::failure(1, format!("no such manifest: {}", image))
                }
            }
            OperationKind::Pull => {
                self.local.lock().unwrap().insert(image);
                EngineOutput::success()
            }
            OperationKind::Tag => {
                let source = &command.args[1];
                let mut local = self.local.lock().unwrap();
                if local.contains(source) {
                    local.insert(image);
                    EngineOutput::success()
                } else {
                    Self::missing(source)
                }
            }
            OperationKind::Push => {
                if !self.local.lock().unwrap().contains(&image) {
                    Self::missing(&image)
                } else {
                    if !*self.push_lies.lock().unwrap() {
                        self.remote.lock().unwrap().insert(image);
                    }
                    EngineOutput::success()
                }
            }
            OperationKind::Remove => {
                if self.local.lock().unwrap().remove(&image) {
                    EngineOutput::success()
                } else {
                    Self::missing(&image)
                }
            }
        };
        Ok(output)
    }
}

/// Scripted management API
#[derive(Default)]
pub struct FakeApi {
    create_responses: Mutex<VecDeque<Result<ApiResponse>>>,
    create_requests: Mutex<Vec<(String, CreateRepositoryRequest)>>,
    repository_pages: Mutex<VecDeque<Result<ListingPage>>>,
    tag_pages: Mutex<HashMap<String, VecDeque<Result<ListingPage>>>>,
    repository_requests: Mutex<Vec<u32>>,
    tag_requests: Mutex<Vec<(String, u32)>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a creation response; an empty queue answers 201
    pub fn respond_to_create(&self, status: StatusCode, body: &str) {
        self.create_responses.lock().unwrap().push_back(Ok(ApiResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn repository_page(&self, items: &[&str], has_additional: bool) {
        self.repository_pages
            .lock()
            .unwrap()
            .push_back(Ok(page(items, has_additional)));
    }

    pub fn failing_repository_page(&self, error: ReplicationError) {
        self.repository_pages.lock().unwrap().push_back(Err(error));
    }

    pub fn tag_page(&self, repository: &str, items: &[&str], has_additional: bool) {
        self.tag_pages
            .lock()
            .unwrap()
            .entry(repository.to_string())
            .or_default()
            .push_back(Ok(page(items, has_additional)));
    }

    pub fn create_requests(&self) -> Vec<(String, CreateRepositoryRequest)> {
        self.create_requests.lock().unwrap().clone()
    }

    pub fn repository_requests(&self) -> Vec<u32> {
        self.repository_requests.lock().unwrap().clone()
    }

    pub fn tag_requests(&self) -> Vec<(String, u32)> {
        self.tag_requests.lock().unwrap().clone()
    }
}

fn page(items: &[&str], has_additional: bool) -> ListingPage {
    ListingPage {
        items: items.iter().map(|item| item.to_string()).collect(),
        has_additional,
    }
}

#[async_trait]
impl RegistryApi for FakeApi {
    async fn create_repository(
        &self,
        target: &TargetEnvironment,
        request: &CreateRepositoryRequest,
    ) -> Result<ApiResponse> {
        self.create_requests
            .lock()
            .unwrap()
            .push((target.name.clone(), request.clone()));
        self.create_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ApiResponse {
                    status: StatusCode::CREATED,
                    body: "{}".to_string(),
                })
            })
    }

    async fn repository_page(&self, _target: &TargetEnvironment, page: u32) -> Result<ListingPage> {
        self.repository_requests.lock().unwrap().push(page);
        self.repository_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ListingPage::default()))
    }

    async fn tag_page(
        &self,
        _target: &TargetEnvironment,
        repository: &str,
        page: u32,
    ) -> Result<ListingPage> {
        self.tag_requests
            .lock()
            .unwrap()
            .push((repository.to_string(), page));
        self.tag_pages
            .lock()
            .unwrap()
            .get_mut(repository)
            .and_then(|pages| pages.pop_front())
            .unwrap_or_else(|| Ok(ListingPage::default()))
    }
}

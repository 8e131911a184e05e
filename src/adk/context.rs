// SPDX-License-Identifier: MIT

//! Per-run execution context
//!
//! One `ExecutionContext` is created for each workflow run and passed to the
//! executor and every node call. It carries the run id used in log lines,
//! the language model service, the model call timeout, a cooperative cancel
//! flag and any observers that want to trace the run.

use crate::adk::error::ExecutionError;
use crate::adk::model::LanguageModel;
use crate::agentflow::workflow::config::{EngineConfig, DEFAULT_MODEL_TIMEOUT};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

/// Events emitted to observers while a run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    RunStarted { entry: String },
    NodeStarted { node: String, step: usize },
    NodeFinished { node: String, step: usize, elapsed: Duration },
    Transition { from: String, to: String },
    RunFinished { status: ExecutionStatus, steps: usize },
}

/// Receives execution events for a run
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, run_id: Uuid, event: &ExecutionEvent);
}

/// Cooperative cancel flag, checked by the executor before each step
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct ExecutionContext {
    run_id: Uuid,
    model: Option<Arc<dyn LanguageModel>>,
    model_timeout: Duration,
    max_tokens: Option<u32>,
    cancel: CancelHandle,
    observers: Vec<Arc<dyn ExecutionObserver>>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("run_id", &self.run_id)
            .field("has_model", &self.model.is_some())
            .field("model_timeout", &self.model_timeout)
            .field("max_tokens", &self.max_tokens)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            model: None,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            max_tokens: None,
            cancel: CancelHandle::new(),
            observers: Vec::new(),
        }
    }

    /// Context with the timeout and token cap from `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new()
            .with_model_timeout(config.model_timeout())
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Same settings under a fresh run id.
    ///
    /// Agents keep local values only while the run id stays the same.
    pub fn new_run(&self) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            ..self.clone()
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn notify(&self, event: ExecutionEvent) {
        for observer in &self.observers {
            observer.on_event(self.run_id, &event);
        }
    }

    /// Ask the language model service to complete `prompt`.
    ///
    /// Fails with `ModelTimeout` when the call outlives the configured
    /// timeout; service failures propagate unchanged.
    pub async fn complete(&self, prompt: &str, model: &str) -> Result<String, ExecutionError> {
        let service = self.model.as_ref().ok_or(ExecutionError::ModelUnavailable)?;

        log::debug!("[{}] Model request to {} ({} chars)", self.run_id, model, prompt.len());

        match tokio::time::timeout(
            self.model_timeout,
            service.complete(prompt, model, self.max_tokens),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => {
                log::error!(
                    "[{}] Model call to {} timed out after {:?}",
                    self.run_id,
                    model,
                    self.model_timeout
                );
                Err(ExecutionError::ModelTimeout(self.model_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(
            &self,
            prompt: &str,
            model: &str,
            max_tokens: Option<u32>,
        ) -> Result<String, ServiceError> {
            Ok(format!("{}:{}:{:?}", model, prompt, max_tokens))
        }
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(&self, _: &str, _: &str, _: Option<u32>) -> Result<String, ServiceError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn complete(&self, _: &str, _: &str, _: Option<u32>) -> Result<String, ServiceError> {
            Err(ServiceError::Status {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ExecutionEvent>>);

    impl ExecutionObserver for Recorder {
        fn on_event(&self, _run_id: Uuid, event: &ExecutionEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_complete_passes_model_and_max_tokens() {
        let ctx = ExecutionContext::new()
            .with_model(Arc::new(EchoModel))
            .with_max_tokens(Some(64));

        let text = ctx.complete("hi", "gpt-4o-mini").await.unwrap();
        assert_eq!(text, "gpt-4o-mini:hi:Some(64)");
    }

    #[tokio::test]
    async fn test_complete_without_model_is_error() {
        let err = ExecutionContext::new().complete("hi", "m").await.unwrap_err();
        assert!(matches!(err, ExecutionError::ModelUnavailable));
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let ctx = ExecutionContext::new()
            .with_model(Arc::new(SlowModel))
            .with_model_timeout(Duration::from_millis(20));

        let err = ctx.complete("hi", "m").await.unwrap_err();
        assert!(matches!(err, ExecutionError::ModelTimeout(d) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_service_failure_is_not_swallowed() {
        let ctx = ExecutionContext::new().with_model(Arc::new(FailingModel));

        let err = ctx.complete("hi", "m").await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Service(ServiceError::Status { status: 503, .. })
        ));
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let ctx = ExecutionContext::new();
        let handle = ctx.cancel_handle();
        assert!(!ctx.is_cancelled());

        handle.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_observers_receive_events() {
        let recorder = Arc::new(Recorder::default());
        let ctx = ExecutionContext::new().with_observer(recorder.clone());

        ctx.notify(ExecutionEvent::RunStarted {
            entry: "greeter".to_string(),
        });

        let events = recorder.0.lock().unwrap();
        assert_eq!(
            *events,
            vec![ExecutionEvent::RunStarted {
                entry: "greeter".to_string()
            }]
        );
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig {
            model_timeout_secs: 7,
            max_tokens: Some(10),
            ..EngineConfig::default()
        };
        let ctx = ExecutionContext::from_config(&config);
        assert_eq!(ctx.model_timeout, Duration::from_secs(7));
        assert_eq!(ctx.max_tokens, Some(10));
    }

    #[test]
    fn test_new_run_keeps_settings_under_fresh_id() {
        let ctx = ExecutionContext::new().with_model_timeout(Duration::from_secs(3));
        let next = ctx.new_run();

        assert_ne!(next.run_id(), ctx.run_id());
        assert_eq!(next.model_timeout, Duration::from_secs(3));

        ctx.cancel_handle().cancel();
        assert!(next.is_cancelled());
    }
}

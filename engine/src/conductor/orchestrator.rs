//! Run Orchestrator
//!
//! Drives one query through `decompose -> dispatch(i)... -> synthesize`,
//! strictly in order. Each run owns a fresh [`RunContext`].
//!
//! Only decomposition failures end a run early. A failed dispatch becomes an
//! `"Error: ..."` line for that sub-task, and a failed synthesis falls back to
//! the joined sub-task results.
//!
//! When a [`RunRepository`] is attached, the run and each of its steps are
//! recorded. Recording is best-effort and never affects the answer.

use crate::capabilities::{CapabilityInvoker, Summarizer};
use crate::conductor::context::RunContext;
use crate::conductor::executor::Dispatcher;
use crate::conductor::planner::TaskDecomposer;
use crate::conductor::types::{Query, ResearchError, RunReport, SubTask, SubTaskResult};
use crate::db::runs::{RunRepository, StepKind};
use crate::llm::router::LLMRouter;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub struct Orchestrator {
    decomposer: TaskDecomposer,
    dispatcher: Dispatcher,
    summarizer: Arc<Summarizer>,
    runs: Option<RunRepository>,
}

impl Orchestrator {
    pub fn new(
        router: Arc<LLMRouter>,
        capabilities: Arc<dyn CapabilityInvoker>,
        summarizer: Arc<Summarizer>,
    ) -> Self {
        Self {
            decomposer: TaskDecomposer::new(Arc::clone(&router)),
            dispatcher: Dispatcher::new(router, capabilities),
            summarizer,
            runs: None,
        }
    }

    /// Record runs and their steps in the history tables.
    pub fn with_history(mut self, runs: RunRepository) -> Self {
        self.runs = Some(runs);
        self
    }

    /// Research a query end to end.
    pub async fn run(&self, query: &Query) -> Result<RunReport, ResearchError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);
        self.run_with_id(run_id, query).instrument(span).await
    }

    async fn run_with_id(&self, run_id: String, query: &Query) -> Result<RunReport, ResearchError> {
        let started = Instant::now();
        if query.is_empty() {
            return Err(ResearchError::EmptyQuery);
        }
        tracing::info!(query = %query, "Starting research run");

        if let Some(runs) = &self.runs {
            if let Err(e) = runs.create_run(&run_id, query.as_str()).await {
                tracing::warn!("Failed to record run: {:#}", e);
            }
        }

        let sub_tasks = match self.decomposer.decompose(query).await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::error!("Run failed: {}", e);
                if let Some(runs) = &self.runs {
                    let elapsed = elapsed_ms(started);
                    if let Err(db_err) = runs.fail_run(&run_id, &e.to_string(), elapsed).await {
                        tracing::warn!("Failed to record run failure: {:#}", db_err);
                    }
                }
                return Err(e);
            }
        };

        let mut step_order = 0_i64;
        let listing = sub_tasks
            .iter()
            .map(SubTask::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        self.record_step(&run_id, &mut step_order, StepKind::Decomposition, None, &listing)
            .await;

        let mut context = RunContext::new();
        let mut results = Vec::with_capacity(sub_tasks.len());

        for (i, sub_task) in sub_tasks.into_iter().enumerate() {
            tracing::info!(step = i + 1, sub_task = sub_task.text(), "Dispatching sub-task");

            let (result, succeeded) = match self.dispatcher.dispatch(&sub_task, &mut context).await {
                Ok(dispatched) => (dispatched.into_text(), true),
                Err(e) => {
                    tracing::warn!(step = i + 1, "Dispatch failed: {}", e);
                    (format!("Error: {}", e), false)
                }
            };

            self.record_step(
                &run_id,
                &mut step_order,
                StepKind::Dispatch,
                Some(sub_task.text()),
                &result,
            )
            .await;

            results.push(SubTaskResult {
                sub_task,
                result,
                succeeded,
            });
        }

        let joined = results
            .iter()
            .map(|r| r.result.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let (answer, provider) = match self.summarizer.synthesize(query.as_str(), &joined).await {
            Ok((answer, provider)) => (answer.trim().to_string(), Some(provider)),
            Err(e) => {
                tracing::warn!("Synthesis failed, returning raw findings: {}", e);
                (joined, None)
            }
        };

        self.record_step(&run_id, &mut step_order, StepKind::Synthesis, None, &answer)
            .await;

        let duration_ms = elapsed_ms(started);
        if let Some(runs) = &self.runs {
            if let Err(e) = runs
                .complete_run(&run_id, &answer, provider.as_deref(), duration_ms)
                .await
            {
                tracing::warn!("Failed to record run completion: {:#}", e);
            }
        }

        tracing::info!(duration_ms, sub_tasks = results.len(), "Research run completed");

        Ok(RunReport {
            run_id,
            query: query.clone(),
            results,
            answer,
            provider,
            duration_ms,
        })
    }

    async fn record_step(
        &self,
        run_id: &str,
        step_order: &mut i64,
        kind: StepKind,
        sub_task: Option<&str>,
        content: &str,
    ) {
        let Some(runs) = &self.runs else {
            return;
        };
        if let Err(e) = runs
            .add_step(run_id, *step_order, kind, sub_task, content)
            .await
        {
            tracing::warn!("Failed to record {} step: {:#}", kind.as_str(), e);
        }
        *step_order += 1;
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// Research run history
///
/// Each `delve ask` (and each batch row) is persisted as a run with its
/// ordered steps: the decomposition, one dispatch result per sub-task and the
/// synthesized answer. All queries are parameterized.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "running" => RunStatus::Running,
            "completed" => RunStatus::Completed,
            _ => RunStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Decomposition,
    Dispatch,
    Synthesis,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Decomposition => "decomposition",
            StepKind::Dispatch => "dispatch",
            StepKind::Synthesis => "synthesis",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "decomposition" => StepKind::Decomposition,
            "synthesis" => StepKind::Synthesis,
            _ => StepKind::Dispatch,
        }
    }
}

/// Run record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub query: String,
    pub status: RunStatus,
    pub answer: Option<String>,
    pub error: Option<String>,
    pub provider_used: Option<String>,
    pub duration_ms: Option<i64>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

/// Run step record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub id: Option<i64>,
    pub run_id: String,
    pub step_order: i64,
    pub kind: StepKind,
    pub sub_task: Option<String>,
    pub content: String,
    pub created_at: i64,
}

const RUN_COLUMNS: &str =
    "id, query, status, answer, error, provider_used, duration_ms, created_at, completed_at";

fn run_from_row(r: SqliteRow) -> Run {
    Run {
        id: r.get("id"),
        query: r.get("query"),
        status: RunStatus::parse(&r.get::<String, _>("status")),
        answer: r.get("answer"),
        error: r.get("error"),
        provider_used: r.get("provider_used"),
        duration_ms: r.get("duration_ms"),
        created_at: r.get("created_at"),
        completed_at: r.get("completed_at"),
    }
}

#[derive(Clone)]
pub struct RunRepository {
    pool: SqlitePool,
}

impl RunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_run(&self, id: &str, query: &str) -> Result<Run> {
        let now = super::now_secs();

        sqlx::query("INSERT INTO runs (id, query, status, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(query)
            .bind(RunStatus::Running.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to create run")?;

        Ok(Run {
            id: id.to_string(),
            query: query.to_string(),
            status: RunStatus::Running,
            answer: None,
            error: None,
            provider_used: None,
            duration_ms: None,
            created_at: now,
            completed_at: None,
        })
    }

    pub async fn complete_run(
        &self,
        run_id: &str,
        answer: &str,
        provider_used: Option<&str>,
        duration_ms: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE runs SET status = ?, answer = ?, provider_used = ?, duration_ms = ?, completed_at = ? WHERE id = ?",
        )
        .bind(RunStatus::Completed.as_str())
        .bind(answer)
        .bind(provider_used)
        .bind(duration_ms)
        .bind(super::now_secs())
        .bind(run_id)
        .execute(&self.pool)
        .await
        .context("Failed to complete run")?;

        Ok(())
    }

    pub async fn fail_run(&self, run_id: &str, error: &str, duration_ms: i64) -> Result<()> {
        sqlx::query(
            "UPDATE runs SET status = ?, error = ?, duration_ms = ?, completed_at = ? WHERE id = ?",
        )
        .bind(RunStatus::Failed.as_str())
        .bind(error)
        .bind(duration_ms)
        .bind(super::now_secs())
        .bind(run_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark run as failed")?;

        Ok(())
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Option<Run>> {
        let row = sqlx::query(&format!("SELECT {} FROM runs WHERE id = ?", RUN_COLUMNS))
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch run")?;

        Ok(row.map(run_from_row))
    }

    /// Most recent runs first
    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<Run>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM runs ORDER BY created_at DESC, rowid DESC LIMIT ?",
            RUN_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent runs")?;

        Ok(rows.into_iter().map(run_from_row).collect())
    }

    pub async fn add_step(
        &self,
        run_id: &str,
        step_order: i64,
        kind: StepKind,
        sub_task: Option<&str>,
        content: &str,
    ) -> Result<RunStep> {
        let now = super::now_secs();

        let result = sqlx::query(
            "INSERT INTO run_steps (run_id, step_order, step_kind, sub_task, content, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(step_order)
        .bind(kind.as_str())
        .bind(sub_task)
        .bind(content)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to add run step")?;

        Ok(RunStep {
            id: Some(result.last_insert_rowid()),
            run_id: run_id.to_string(),
            step_order,
            kind,
            sub_task: sub_task.map(str::to_string),
            content: content.to_string(),
            created_at: now,
        })
    }

    pub async fn get_steps(&self, run_id: &str) -> Result<Vec<RunStep>> {
        let rows = sqlx::query(
            "SELECT id, run_id, step_order, step_kind, sub_task, content, created_at FROM run_steps WHERE run_id = ? ORDER BY step_order ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch run steps")?;

        Ok(rows
            .into_iter()
            .map(|r| RunStep {
                id: Some(r.get("id")),
                run_id: r.get("run_id"),
                step_order: r.get("step_order"),
                kind: StepKind::parse(&r.get::<String, _>("step_kind")),
                sub_task: r.get("sub_task"),
                content: r.get("content"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bookflow_core::{RunId, RunType};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::types::{DagRun, RunStatus, TaskInstance, TaskState};

/// Persistent record of every run and every task attempt.
pub struct RunHistory {
    conn: Mutex<Connection>,
}

impl RunHistory {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a file-backed history. The file may be shared with other
    /// connections (e.g. the sqlite handoff), so writers wait on a lock.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::new(conn)
    }

    fn db(&self) -> MutexGuard<'_, Connection> {
        // SQLite state stays consistent even if a holder panicked.
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn create_run(
        &self,
        dag_id: &str,
        run_id: &RunId,
        run_type: RunType,
        logical_date: DateTime<Utc>,
    ) -> Result<()> {
        let now = timestamp(Utc::now());
        self.db().execute(
            "INSERT INTO dag_runs
             (dag_id, run_id, run_type, logical_date, status, started_at)
             VALUES (?1, ?2, ?3, ?4, 'running', ?5)",
            rusqlite::params![
                dag_id,
                run_id.as_str(),
                run_type.to_string(),
                timestamp(logical_date),
                now
            ],
        )?;
        debug!(%run_id, dag_id, "run created");
        Ok(())
    }

    pub fn finish_run(
        &self,
        dag_id: &str,
        run_id: &RunId,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let now = timestamp(Utc::now());
        let n = self.db().execute(
            "UPDATE dag_runs SET status = ?1, finished_at = ?2, error = ?3
             WHERE dag_id = ?4 AND run_id = ?5",
            rusqlite::params![status.to_string(), now, error, dag_id, run_id.as_str()],
        )?;
        if n == 0 {
            return Err(SchedulerError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn start_attempt(
        &self,
        dag_id: &str,
        run_id: &RunId,
        task_id: &str,
        try_number: u32,
    ) -> Result<()> {
        let now = timestamp(Utc::now());
        self.db().execute(
            "INSERT INTO task_instances
             (dag_id, run_id, task_id, try_number, state, started_at)
             VALUES (?1, ?2, ?3, ?4, 'running', ?5)",
            rusqlite::params![dag_id, run_id.as_str(), task_id, try_number, now],
        )?;
        Ok(())
    }

    /// Close an attempt opened by `start_attempt`. `error` is `(code, message)`.
    pub fn end_attempt(
        &self,
        dag_id: &str,
        run_id: &RunId,
        task_id: &str,
        try_number: u32,
        state: TaskState,
        error: Option<(&str, &str)>,
    ) -> Result<()> {
        let now = timestamp(Utc::now());
        let (code, message) = error.unzip();
        self.db().execute(
            "UPDATE task_instances
             SET state = ?1, finished_at = ?2, error_code = ?3, error = ?4
             WHERE dag_id = ?5 AND run_id = ?6 AND task_id = ?7 AND try_number = ?8",
            rusqlite::params![
                state.to_string(),
                now,
                code,
                message,
                dag_id,
                run_id.as_str(),
                task_id,
                try_number
            ],
        )?;
        Ok(())
    }

    /// Record a task that was never attempted (try_number 0).
    pub fn mark_skipped(
        &self,
        dag_id: &str,
        run_id: &RunId,
        task_id: &str,
        state: TaskState,
    ) -> Result<()> {
        self.db().execute(
            "INSERT INTO task_instances (dag_id, run_id, task_id, try_number, state)
             VALUES (?1, ?2, ?3, 0, ?4)",
            rusqlite::params![dag_id, run_id.as_str(), task_id, state.to_string()],
        )?;
        Ok(())
    }

    pub fn get_run(&self, dag_id: &str, run_id: &RunId) -> Result<DagRun> {
        let db = self.db();
        let run = db
            .query_row(
                "SELECT dag_id, run_id, run_type, logical_date, status,
                        started_at, finished_at, error
                 FROM dag_runs WHERE dag_id = ?1 AND run_id = ?2",
                rusqlite::params![dag_id, run_id.as_str()],
                row_to_run,
            )
            .optional()?;
        match run {
            Some(run) => run,
            None => Err(SchedulerError::RunNotFound {
                run_id: run_id.to_string(),
            }),
        }
    }

    /// Most recent runs first.
    pub fn list_runs(&self, dag_id: &str, limit: usize) -> Result<Vec<DagRun>> {
        let db = self.db();
        let mut stmt = db.prepare(
            "SELECT dag_id, run_id, run_type, logical_date, status,
                    started_at, finished_at, error
             FROM dag_runs WHERE dag_id = ?1
             ORDER BY started_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![dag_id, limit as i64], row_to_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().collect()
    }

    /// All attempts of a run, in execution order.
    pub fn task_instances(&self, dag_id: &str, run_id: &RunId) -> Result<Vec<TaskInstance>> {
        let db = self.db();
        let mut stmt = db.prepare(
            "SELECT run_id, task_id, try_number, state, started_at, finished_at,
                    error_code, error
             FROM task_instances WHERE dag_id = ?1 AND run_id = ?2
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![dag_id, run_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,         // run_id
                    row.get::<_, String>(1)?,         // task_id
                    row.get::<_, u32>(2)?,            // try_number
                    row.get::<_, String>(3)?,         // state
                    row.get::<_, Option<String>>(4)?, // started_at
                    row.get::<_, Option<String>>(5)?, // finished_at
                    row.get::<_, Option<String>>(6)?, // error_code
                    row.get::<_, Option<String>>(7)?, // error
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(run_id, task_id, try_number, state, started_at, finished_at, error_code, error)| {
                    Ok(TaskInstance {
                        run_id,
                        task_id,
                        try_number,
                        state: state.parse().map_err(SchedulerError::Corrupt)?,
                        started_at,
                        finished_at,
                        error_code,
                        error,
                    })
                },
            )
            .collect()
    }

    /// Logical date of the latest scheduled run, used to resume the cadence.
    pub fn last_scheduled(&self, dag_id: &str) -> Result<Option<DateTime<Utc>>> {
        let db = self.db();
        let raw: Option<String> = db
            .query_row(
                "SELECT logical_date FROM dag_runs
                 WHERE dag_id = ?1 AND run_type = 'scheduled'
                 ORDER BY logical_date DESC LIMIT 1",
                [dag_id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| parse_timestamp(&s)).transpose()
    }
}

/// Fixed-width RFC3339 so lexical order matches chronological order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SchedulerError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<DagRun>> {
    let status: String = row.get(4)?;
    let status = match status.parse() {
        Ok(s) => s,
        Err(e) => return Ok(Err(SchedulerError::Corrupt(e))),
    };
    Ok(Ok(DagRun {
        dag_id: row.get(0)?,
        run_id: row.get(1)?,
        run_type: row.get(2)?,
        logical_date: row.get(3)?,
        status,
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
        error: row.get(7)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn history() -> RunHistory {
        RunHistory::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn run_lifecycle_is_recorded() {
        let h = history();
        let date = Utc.with_ymd_and_hms(2025, 4, 29, 0, 0, 0).unwrap();
        let run = RunId::new(RunType::Scheduled, date);

        h.create_run("dag", &run, RunType::Scheduled, date).unwrap();
        assert_eq!(h.get_run("dag", &run).unwrap().status, RunStatus::Running);

        h.start_attempt("dag", &run, "fetch", 1).unwrap();
        h.end_attempt("dag", &run, "fetch", 1, TaskState::UpForRetry, Some(("FETCH_ERROR", "boom")))
            .unwrap();
        h.start_attempt("dag", &run, "fetch", 2).unwrap();
        h.end_attempt("dag", &run, "fetch", 2, TaskState::Success, None).unwrap();
        h.mark_skipped("dag", &run, "load", TaskState::UpstreamFailed).unwrap();
        h.finish_run("dag", &run, RunStatus::Success, None).unwrap();

        let got = h.get_run("dag", &run).unwrap();
        assert_eq!(got.status, RunStatus::Success);
        assert!(got.finished_at.is_some());
        assert_eq!(got.logical_date, "2025-04-29T00:00:00.000000Z");

        let tis = h.task_instances("dag", &run).unwrap();
        assert_eq!(tis.len(), 3);
        assert_eq!(tis[0].state, TaskState::UpForRetry);
        assert_eq!(tis[0].error_code.as_deref(), Some("FETCH_ERROR"));
        assert_eq!(tis[1].try_number, 2);
        assert_eq!(tis[1].state, TaskState::Success);
        assert_eq!(tis[2].try_number, 0);
    }

    #[test]
    fn unknown_run_is_not_found() {
        let h = history();
        assert!(matches!(
            h.get_run("dag", &RunId::from("nope")),
            Err(SchedulerError::RunNotFound { .. })
        ));
        assert!(h
            .finish_run("dag", &RunId::from("nope"), RunStatus::Failed, None)
            .is_err());
    }

    #[test]
    fn last_scheduled_ignores_manual_runs() {
        let h = history();
        assert_eq!(h.last_scheduled("dag").unwrap(), None);

        let d1 = Utc.with_ymd_and_hms(2025, 4, 29, 0, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2025, 4, 30, 0, 0, 0).unwrap();
        let d3 = Utc.with_ymd_and_hms(2025, 5, 9, 0, 0, 0).unwrap();
        h.create_run("dag", &RunId::new(RunType::Scheduled, d2), RunType::Scheduled, d2)
            .unwrap();
        h.create_run("dag", &RunId::new(RunType::Scheduled, d1), RunType::Scheduled, d1)
            .unwrap();
        h.create_run("dag", &RunId::new(RunType::Manual, d3), RunType::Manual, d3)
            .unwrap();

        assert_eq!(h.last_scheduled("dag").unwrap(), Some(d2));
        assert_eq!(h.list_runs("dag", 10).unwrap().len(), 3);
        assert_eq!(h.list_runs("dag", 2).unwrap().len(), 2);
        assert!(h.list_runs("other", 10).unwrap().is_empty());
    }
}

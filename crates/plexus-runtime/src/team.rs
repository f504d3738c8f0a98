//! Teams (worker pools) executing function logic.
//!
//! A team only ever holds a function's logic. Flows instigated afterwards are
//! assigned to the team of the function they reach, so a chain of sequential
//! functions on a team of one worker cannot starve itself.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use plexus_office::TeamMeta;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::BuildError;

/// Unit of work assigned to a team.
pub type Job = BoxFuture<'static, ()>;

/// Why a job did not run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure(pub String);

#[async_trait]
pub trait Team: Send + Sync {
  /// Run the job on a worker of this team, returning once it completes.
  async fn run(&self, job: Job) -> Result<(), JobFailure>;
}

/// Creates teams of a team type.
pub trait TeamFactory: Send + Sync {
  fn create(&self, team: &TeamMeta) -> Result<Arc<dyn Team>, BuildError>;
}

impl<F> TeamFactory for F
where
  F: Fn(&TeamMeta) -> Result<Arc<dyn Team>, BuildError> + Send + Sync,
{
  fn create(&self, team: &TeamMeta) -> Result<Arc<dyn Team>, BuildError> {
    self(team)
  }
}

/// Runs jobs on the caller's task.
#[derive(Debug, Default)]
pub struct PassiveTeam;

#[async_trait]
impl Team for PassiveTeam {
  async fn run(&self, job: Job) -> Result<(), JobFailure> {
    job.await;
    Ok(())
  }
}

/// Spawns a task per job.
#[derive(Debug, Default)]
pub struct SpawnTeam;

#[async_trait]
impl Team for SpawnTeam {
  async fn run(&self, job: Job) -> Result<(), JobFailure> {
    tokio::spawn(job)
      .await
      .map_err(|e| JobFailure(e.to_string()))
  }
}

/// Runs at most `size` jobs at once.
#[derive(Debug)]
pub struct FixedTeam {
  workers: Arc<Semaphore>,
}

impl FixedTeam {
  pub fn new(size: usize) -> Self {
    Self {
      workers: Arc::new(Semaphore::new(size)),
    }
  }
}

#[async_trait]
impl Team for FixedTeam {
  async fn run(&self, job: Job) -> Result<(), JobFailure> {
    let permit = self
      .workers
      .clone()
      .acquire_owned()
      .await
      .map_err(|e| JobFailure(e.to_string()))?;
    tokio::spawn(async move {
      job.await;
      drop(permit);
    })
    .await
    .map_err(|e| JobFailure(e.to_string()))
  }
}

pub(crate) fn fixed_team(team: &TeamMeta) -> Result<Arc<dyn Team>, BuildError> {
  let size = team.size.ok_or_else(|| BuildError::InvalidTeam {
    team: team.name.clone(),
    message: "fixed team requires a size".to_string(),
  })?;
  debug!(team = %team.name, size, "fixed_team_created");
  Ok(Arc::new(FixedTeam::new(size)))
}

pub(crate) fn spawn_team(_team: &TeamMeta) -> Result<Arc<dyn Team>, BuildError> {
  Ok(Arc::new(SpawnTeam))
}

pub(crate) fn passive_team(_team: &TeamMeta) -> Result<Arc<dyn Team>, BuildError> {
  Ok(Arc::new(PassiveTeam))
}

/// A job observed by an oversight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
  pub team: String,
  pub function: String,
  pub process_id: String,
  pub kind: JobEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEventKind {
  Started,
  Completed,
  Escalated(String),
}

/// Observes the jobs of the teams it oversees.
pub trait Oversight: Send + Sync {
  fn observe(&self, event: &JobEvent);
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use futures::FutureExt;
  use plexus_config::PropertyList;

  fn meta(size: Option<usize>) -> TeamMeta {
    TeamMeta {
      name: "payments".to_string(),
      team_type: "plexus.team.fixed".to_string(),
      size,
      oversight: None,
      properties: PropertyList::new(),
    }
  }

  #[tokio::test]
  async fn test_fixed_team_bounds_concurrency() {
    let team = Arc::new(FixedTeam::new(2));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let jobs = (0..6).map(|_| {
      let team = team.clone();
      let running = running.clone();
      let peak = peak.clone();
      async move {
        let job = async move {
          let now = running.fetch_add(1, Ordering::SeqCst) + 1;
          peak.fetch_max(now, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(20)).await;
          running.fetch_sub(1, Ordering::SeqCst);
        };
        team.run(job.boxed()).await
      }
    });
    let results = futures::future::join_all(jobs).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(peak.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_spawn_team_reports_panic() {
    let result = SpawnTeam.run(async { panic!("boom"); }.boxed()).await;
    assert!(result.is_err());
  }

  #[test]
  fn test_fixed_team_requires_size() {
    assert!(fixed_team(&meta(None)).is_err());
    assert!(fixed_team(&meta(Some(1))).is_ok());
  }
}

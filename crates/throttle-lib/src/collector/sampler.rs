//! Taking one or two cpu.stat snapshots of a target

use super::locator::CgroupLocator;
use super::parser::parse_cpu_stat;
use crate::error::{Result, ThrottleError};
use crate::models::{SamplePair, StatSnapshot, Target};
use crate::remote::RemoteExecutor;
use std::time::Duration;
use tracing::debug;

/// Reads snapshots through a [`CgroupLocator`]
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    locator: CgroupLocator,
}

impl Sampler {
    pub fn new(locator: CgroupLocator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &CgroupLocator {
        &self.locator
    }

    /// Locate, read and parse cpu.stat once
    pub async fn snapshot(&self, executor: &dyn RemoteExecutor, target: &Target) -> Result<StatSnapshot> {
        let located = self.locator.locate(executor, target).await?;
        let counters = parse_cpu_stat(&located.raw).map_err(|source| ThrottleError::Parse {
            target: target.clone(),
            path: located.path.clone(),
            source,
        })?;

        debug!(
            pod = %target,
            nr_periods = counters.nr_periods,
            nr_throttled = counters.nr_throttled,
            throttled_time = counters.throttled_time,
            path = %located.path,
            "Read cpu.stat"
        );

        Ok(StatSnapshot {
            counters,
            resolved_path: located.path,
            taken_at: chrono::Utc::now(),
        })
    }

    /// Sample a target, instantaneously or across `wait`
    ///
    /// A zero or absent wait takes a single snapshot. Otherwise the task
    /// sleeps for the full wait between the two reads; a failure on either
    /// read fails the whole sample.
    pub async fn sample(
        &self,
        executor: &dyn RemoteExecutor,
        target: &Target,
        wait: Option<Duration>,
    ) -> Result<SamplePair> {
        let before = self.snapshot(executor, target).await?;

        let Some(wait) = wait.filter(|w| !w.is_zero()) else {
            return Ok(SamplePair::Instantaneous(before));
        };

        debug!(
            pod = %target,
            wait_ms = wait.as_millis() as u64,
            "Waiting before second measurement"
        );
        tokio::time::sleep(wait).await;

        let after = self.snapshot(executor, target).await?;
        Ok(SamplePair::Differential { before, after })
    }
}

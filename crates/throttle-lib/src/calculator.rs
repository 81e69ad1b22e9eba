//! Throttling ratio computation
//!
//! Turns a snapshot or snapshot pair into a throttling percentage and a
//! throttled-time rate normalized against the nominal 100ms period.

use crate::error::{Result, ThrottleError};
use crate::models::{CounterDeltas, SamplePair, SampleQuality, StatSnapshot, Target, ThrottlingResult};

/// Divisor applied per period when normalizing throttled time
pub const PERIOD_NORMALIZER: f64 = 100_000_000.0;

/// Ratio figures for a set of period/throttle/time counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratios {
    pub percentage: f64,
    pub rate: f64,
    pub quality: SampleQuality,
}

/// Compute ratios for raw counts; zero periods yields a zero-activity reading
///
/// The percentage is deliberately left unclamped so that kernel accounting
/// oddities (throttled > periods) remain visible.
pub fn ratios(periods: u64, throttled: u64, throttled_time: u64) -> Ratios {
    if periods == 0 {
        return Ratios {
            percentage: 0.0,
            rate: 0.0,
            quality: SampleQuality::ZeroActivity,
        };
    }

    let periods = periods as f64;
    Ratios {
        percentage: throttled as f64 / periods * 100.0,
        rate: throttled_time as f64 / (periods * PERIOD_NORMALIZER),
        quality: SampleQuality::Measured,
    }
}

/// Differences between two snapshots, refusing to go negative
pub fn deltas(target: &Target, before: &StatSnapshot, after: &StatSnapshot) -> Result<CounterDeltas> {
    let delta = |counter: &'static str, before: u64, after_value: u64| {
        after_value
            .checked_sub(before)
            .ok_or_else(|| ThrottleError::CounterRegression {
                target: target.clone(),
                path: after.resolved_path.clone(),
                counter,
                before,
                after: after_value,
            })
    };

    let (before, after) = (&before.counters, &after.counters);
    Ok(CounterDeltas {
        periods_delta: delta("nr_periods", before.nr_periods, after.nr_periods)?,
        throttled_delta: delta("nr_throttled", before.nr_throttled, after.nr_throttled)?,
        throttled_time_delta: delta("throttled_time", before.throttled_time, after.throttled_time)?,
    })
}

/// Compute the throttling result for a sampled target
pub fn compute(target: &Target, pair: &SamplePair) -> Result<ThrottlingResult> {
    let after = pair.after();

    let (figures, deltas) = match pair {
        SamplePair::Instantaneous(snapshot) => {
            let c = &snapshot.counters;
            (ratios(c.nr_periods, c.nr_throttled, c.throttled_time), None)
        }
        SamplePair::Differential { before, after } => {
            let d = deltas(target, before, after)?;
            (
                ratios(d.periods_delta, d.throttled_delta, d.throttled_time_delta),
                Some(d),
            )
        }
    };

    Ok(ThrottlingResult {
        target: target.clone(),
        percentage: figures.percentage,
        rate: figures.rate,
        periods: after.counters.nr_periods,
        throttled: after.counters.nr_throttled,
        throttled_time: after.counters.throttled_time,
        cgroup_path: Some(after.resolved_path.clone()),
        deltas,
        quality: figures.quality,
    })
}

//! cpu.stat parsing
//!
//! Accepts both the cgroup v2 layout (`throttled_usec`) and the legacy v1
//! layout (`throttled_time`). Unknown keys are skipped so newer kernels that
//! add fields keep working.

use super::locator::FOUND_MARKER;
use crate::error::ParseError;
use crate::models::StatCounters;

const NR_PERIODS: &str = "nr_periods";
const NR_THROTTLED: &str = "nr_throttled";
const THROTTLED_USEC: &str = "throttled_usec";
const THROTTLED_TIME: &str = "throttled_time";

#[derive(Default)]
struct Seen {
    nr_periods: Option<u64>,
    nr_throttled: Option<u64>,
    throttled_usec: Option<u64>,
    throttled_time: Option<u64>,
}

impl Seen {
    fn slot(&mut self, key: &str) -> Option<&mut Option<u64>> {
        match key {
            NR_PERIODS => Some(&mut self.nr_periods),
            NR_THROTTLED => Some(&mut self.nr_throttled),
            THROTTLED_USEC => Some(&mut self.throttled_usec),
            THROTTLED_TIME => Some(&mut self.throttled_time),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.nr_periods.is_none()
            && self.nr_throttled.is_none()
            && self.throttled_usec.is_none()
            && self.throttled_time.is_none()
    }
}

/// Parse raw probe output (sentinel line included) into counters
///
/// Missing recognized keys read as zero, but at least one must be present.
/// When both throttled-time spellings appear, `throttled_usec` wins.
pub fn parse_cpu_stat(raw: &str) -> Result<StatCounters, ParseError> {
    let mut seen = Seen::default();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(FOUND_MARKER) {
            continue;
        }

        let (key, value) = match line.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (line, ""),
        };

        let Some(slot) = seen.slot(key) else {
            continue;
        };

        let parsed: u64 = value.parse().map_err(|_| ParseError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;

        match *slot {
            Some(first) if first != parsed => {
                return Err(ParseError::ConflictingValues {
                    key: key.to_string(),
                    first: first.min(parsed),
                    second: first.max(parsed),
                });
            }
            _ => *slot = Some(parsed),
        }
    }

    if seen.is_empty() {
        return Err(ParseError::NoStatistics);
    }

    Ok(StatCounters {
        nr_periods: seen.nr_periods.unwrap_or(0),
        nr_throttled: seen.nr_throttled.unwrap_or(0),
        throttled_time: seen.throttled_usec.or(seen.throttled_time).unwrap_or(0),
    })
}

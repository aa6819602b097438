//! Previous-sample persistence and counter differencing.
//!
//! The state file is a flat JSON object: raw values keyed by output key,
//! the last computed rate of each counter under `.last_diff.<key>`, and the
//! sample time under `_lastTime`.

use anyhow::Context;
use mongomon_collector::catalog::NumericWidth;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

const LAST_TIME_KEY: &str = "_lastTime";
const LAST_DIFF_PREFIX: &str = ".last_diff.";

/// Samples older than this are not differenced.
pub const MAX_ELAPSED_SECS: i64 = 600;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateError {
    #[error("too long duration since last sample: {0}s")]
    TooLongDuration(i64),
    #[error("no time elapsed since last sample")]
    NoElapsedTime,
    #[error("counter seems to be reset")]
    CounterReset,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleState {
    pub time: i64,
    pub values: BTreeMap<String, f64>,
    pub last_diffs: BTreeMap<String, f64>,
}

impl SampleState {
    pub fn new(time: i64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    /// Read the previous sample; a missing or unreadable file means none.
    pub fn load(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No previous sample");
                return None;
            }
        };
        match serde_json::from_str::<Map<String, Value>>(&content) {
            Ok(map) => Some(Self::from_map(map)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable state file");
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string(&self.to_map())?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write state file {}", path.display()))
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let mut state = Self::default();
        for (key, value) in map {
            if key == LAST_TIME_KEY {
                state.time = value.as_i64().unwrap_or_default();
                continue;
            }
            let Some(number) = value.as_f64() else {
                continue;
            };
            match key.strip_prefix(LAST_DIFF_PREFIX) {
                Some(metric) => {
                    state.last_diffs.insert(metric.to_string(), number);
                }
                None => {
                    state.values.insert(key, number);
                }
            }
        }
        state
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in &self.values {
            map.insert(key.clone(), Value::from(*value));
        }
        for (key, value) in &self.last_diffs {
            map.insert(format!("{LAST_DIFF_PREFIX}{key}"), Value::from(*value));
        }
        map.insert(LAST_TIME_KEY.to_string(), Value::from(self.time));
        map
    }
}

/// Per-minute rate of a counter between two samples.
///
/// `last_diff` is the previous rate; for [`NumericWidth::Uint64`] counters a
/// decrease is accepted as a wraparound only when the resulting rate stays
/// below ten times that value.
pub fn counter_rate(
    width: NumericWidth,
    current: f64,
    previous: f64,
    elapsed_secs: i64,
    last_diff: f64,
) -> Result<f64, RateError> {
    if elapsed_secs > MAX_ELAPSED_SECS {
        return Err(RateError::TooLongDuration(elapsed_secs));
    }
    if elapsed_secs <= 0 {
        return Err(RateError::NoElapsedTime);
    }
    let elapsed = elapsed_secs as f64;

    match width {
        NumericWidth::Default => {
            let rate = (current - previous) * 60.0 / elapsed;
            if rate < 0.0 {
                Err(RateError::CounterReset)
            } else {
                Ok(rate)
            }
        }
        NumericWidth::Uint64 => {
            let (current, previous) = (current as u64, previous as u64);
            let rate = current.wrapping_sub(previous).wrapping_mul(60) as f64 / elapsed;
            if previous <= current || rate < last_diff * 10.0 {
                Ok(rate)
            } else {
                Err(RateError::CounterReset)
            }
        }
    }
}

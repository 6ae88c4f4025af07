//! Update-policy strategies plugged into the channel accumulator.
//!
//! Each strategy decides how an ingested value mutates the channel's current values
//! and what value ends up in the composed record.

use crate::model::{ComposedUpdate, UpdateType};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::{Display, Formatter};

/// A raw value together with the moment it was measured.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TimedValue {
    pub(crate) value: String,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RunningMean {
    sum: f64,
    count: u32,
    newest: Option<DateTime<Utc>>,
}

impl RunningMean {
    fn add(&mut self, value: f64, timestamp: DateTime<Utc>) {
        self.sum += value;
        self.count += 1;
        self.newest = Some(self.newest.map_or(timestamp, |newest| newest.max(timestamp)));
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

/// A value the active policy refused to store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RejectedValue {
    pub(crate) value: String,
}

impl Display for RejectedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot convert {:?} to a number", self.value)
    }
}

/// Current field values, shaped by the channel's update type.
#[derive(Debug)]
pub(crate) enum ChannelPolicy {
    Blackout(HashMap<String, TimedValue>),
    Buffered(HashMap<String, TimedValue>),
    Average(HashMap<String, RunningMean>),
    OnChange(HashMap<String, VecDeque<TimedValue>>),
}

impl ChannelPolicy {
    pub(crate) fn for_update_type(update_type: UpdateType) -> Self {
        match update_type {
            UpdateType::Blackout => ChannelPolicy::Blackout(HashMap::new()),
            UpdateType::Buffered => ChannelPolicy::Buffered(HashMap::new()),
            UpdateType::Average => ChannelPolicy::Average(HashMap::new()),
            UpdateType::OnChange => ChannelPolicy::OnChange(HashMap::new()),
        }
    }

    /// Stores an ingested value. Only the average policy can refuse a value.
    pub(crate) fn store(
        &mut self,
        field: &str,
        value: String,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RejectedValue> {
        match self {
            ChannelPolicy::Blackout(latest) | ChannelPolicy::Buffered(latest) => {
                latest.insert(field.to_string(), TimedValue { value, timestamp });
            }
            ChannelPolicy::Average(means) => {
                let number = parse_finite(&value).ok_or(RejectedValue { value })?;
                means
                    .entry(field.to_string())
                    .or_default()
                    .add(number, timestamp);
            }
            ChannelPolicy::OnChange(queues) => {
                queues
                    .entry(field.to_string())
                    .or_default()
                    .push_back(TimedValue { value, timestamp });
            }
        }
        Ok(())
    }

    /// Builds the multi-field record from the present fields and clears all values.
    ///
    /// Returns `None` when nothing composable is present. On-change values are never
    /// composed this way; they leave through [`ChannelPolicy::pop_change`].
    pub(crate) fn compose(
        &mut self,
        channel: &str,
        present: &BTreeSet<String>,
    ) -> Option<ComposedUpdate> {
        let mut fields = std::collections::BTreeMap::new();
        let mut newest: Option<DateTime<Utc>> = None;
        let mut note = |timestamp: DateTime<Utc>| {
            newest = Some(newest.map_or(timestamp, |current| current.max(timestamp)));
        };

        match self {
            ChannelPolicy::Blackout(latest) | ChannelPolicy::Buffered(latest) => {
                for field in present {
                    if let Some(timed) = latest.remove(field) {
                        note(timed.timestamp);
                        fields.insert(field.clone(), timed.value);
                    }
                }
                latest.clear();
            }
            ChannelPolicy::Average(means) => {
                for field in present {
                    let Some(running) = means.remove(field) else {
                        continue;
                    };
                    if let (Some(mean), Some(timestamp)) = (running.mean(), running.newest) {
                        note(timestamp);
                        fields.insert(field.clone(), format_number(mean));
                    }
                }
                means.clear();
            }
            ChannelPolicy::OnChange(_) => return None,
        }

        let timestamp = newest?;
        Some(ComposedUpdate {
            channel: channel.to_string(),
            timestamp,
            fields,
        })
    }

    /// Takes the oldest queued change of an on-change field.
    pub(crate) fn pop_change(&mut self, field: &str) -> Option<TimedValue> {
        match self {
            ChannelPolicy::OnChange(queues) => {
                let queue = queues.get_mut(field)?;
                let change = queue.pop_front();
                if queue.is_empty() {
                    queues.remove(field);
                }
                change
            }
            _ => None,
        }
    }

    /// Number of changes still queued for an on-change field.
    pub(crate) fn pending_changes(&self, field: &str) -> usize {
        match self {
            ChannelPolicy::OnChange(queues) => queues.get(field).map_or(0, VecDeque::len),
            _ => 0,
        }
    }

    pub(crate) fn has_pending_change(&self, field: &str) -> bool {
        match self {
            ChannelPolicy::OnChange(queues) => queues.get(field).is_some_and(|q| !q.is_empty()),
            _ => false,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            ChannelPolicy::Blackout(latest) | ChannelPolicy::Buffered(latest) => latest.is_empty(),
            ChannelPolicy::Average(means) => means.is_empty(),
            ChannelPolicy::OnChange(queues) => queues.is_empty(),
        }
    }
}

fn parse_finite(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

fn format_number(value: f64) -> String {
    format!("{value}")
}

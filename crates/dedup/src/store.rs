use std::collections::HashMap;

use tracing::{debug, info};

use common::{DedupRecord, SignalDecision, SignalKey};

/// Outcome of presenting a decision to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First decision on this bar for this key. The record was written and the
    /// caller should notify.
    Emit,
    /// A decision on this bar was already emitted. Nothing changed.
    Suppress,
}

/// The gatekeeper between the evaluator and the notifier.
///
/// Holds, per (symbol, timeframe), the bar of the last emitted signal.
/// Suppression is keyed on that bar's `open_time` alone: at most one emission
/// per (symbol, timeframe, bar), whatever the direction. A later bar always
/// re-arms, even in the same direction.
///
/// Records live for the life of the process. Nothing expires and nothing is
/// persisted. The scheduler owns the store and is its only writer.
#[derive(Debug, Default)]
pub struct DedupStore {
    records: HashMap<SignalKey, DedupRecord>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SignalKey) -> Option<&DedupRecord> {
        self.records.get(key)
    }

    pub fn upsert(&mut self, key: SignalKey, record: DedupRecord) {
        self.records.insert(key, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check-and-update in one step.
    ///
    /// - no record: write one, `Emit`
    /// - record on the same bar: `Suppress`, even if the direction flipped
    /// - record on a different bar: overwrite, `Emit`
    pub fn admit(&mut self, key: &SignalKey, decision: &SignalDecision) -> Admission {
        if let Some(existing) = self.records.get(key) {
            if existing.last_bar_time == decision.bar_time {
                debug!(
                    key = %key,
                    bar_time = %decision.bar_time,
                    direction = %decision.direction,
                    previous = %existing.last_direction,
                    "Signal already emitted for this bar, suppressing"
                );
                return Admission::Suppress;
            }
        }

        info!(
            key = %key,
            bar_time = %decision.bar_time,
            direction = %decision.direction,
            "Signal admitted"
        );
        self.upsert(
            key.clone(),
            DedupRecord {
                key: key.clone(),
                last_bar_time: decision.bar_time,
                last_direction: decision.direction,
            },
        );
        Admission::Emit
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

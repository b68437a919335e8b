//! Heavy stun meter state.

use crate::config::{HEAVY_STUN_PERCENT, PRIMED_PERCENT};
use crate::damage::{AttackType, DamageType};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StunState {
    Normal,
    Primed,
    HeavyStunned,
}

impl StunState {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= HEAVY_STUN_PERCENT {
            StunState::HeavyStunned
        } else if percentage >= PRIMED_PERCENT {
            StunState::Primed
        } else {
            StunState::Normal
        }
    }
}

impl fmt::Display for StunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StunState::Normal => "Normal",
            StunState::Primed => "Primed",
            StunState::HeavyStunned => "Heavy Stunned",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub damage: f64,
    pub damage_type: DamageType,
    pub attack_type: AttackType,
    pub buildup_added: f64,
    pub percentage_after: f64,
}

/// Buildup toward a heavy stun on one target.
/// Invariant: `percentage == current_buildup / max_buildup * 100` and
/// `state == StunState::from_percentage(percentage)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeavyStunMeter {
    pub target_id: String,
    pub current_buildup: f64,
    pub max_buildup: f64,
    pub percentage: f64,
    pub state: StunState,
    pub hits_received: u64,
    /// Most recent hits, oldest first.
    pub hit_history: VecDeque<HitRecord>,
}

impl HeavyStunMeter {
    pub fn new(target_id: &str, max_buildup: f64) -> Self {
        Self {
            target_id: target_id.to_string(),
            current_buildup: 0.0,
            max_buildup,
            percentage: 0.0,
            state: StunState::Normal,
            hits_received: 0,
            hit_history: VecDeque::new(),
        }
    }

    fn recompute(&mut self) {
        self.percentage = if self.max_buildup > 0.0 {
            self.current_buildup / self.max_buildup * 100.0
        } else {
            0.0
        };
        self.state = StunState::from_percentage(self.percentage);
    }

    /// Move to a new max life, keeping the same fill percentage.
    pub(crate) fn rescale(&mut self, max_buildup: f64) {
        if (self.max_buildup - max_buildup).abs() <= f64::EPSILON * max_buildup.max(1.0) {
            return;
        }
        self.current_buildup = self.percentage / 100.0 * max_buildup;
        self.max_buildup = max_buildup;
        self.recompute();
    }

    /// Apply a hit's buildup (capped at the max) and keep at most `max_history` records.
    pub(crate) fn record_hit(&mut self, mut record: HitRecord, max_history: usize) {
        self.current_buildup = (self.current_buildup + record.buildup_added).min(self.max_buildup);
        self.hits_received += 1;
        self.recompute();
        record.percentage_after = self.percentage;
        if max_history > 0 {
            self.hit_history.push_back(record);
            while self.hit_history.len() > max_history {
                self.hit_history.pop_front();
            }
        }
    }

    pub fn reset(&mut self) {
        self.current_buildup = 0.0;
        self.hits_received = 0;
        self.hit_history.clear();
        self.recompute();
    }
}

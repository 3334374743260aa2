//! RSI threshold ladder gating pyramided re-entries.
//!
//! The ladder is a plain `Copy` value owned by its position. Every operation
//! returns a new ladder instead of mutating through a shared reference.

use serde::Serialize;
use std::fmt;

/// RSI below which an initial entry (or any re-entry) may fire.
pub const ENTRY_RSI: f64 = 30.0;
/// RSI above which an open position is closed at the day's close.
pub const EXIT_RSI: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Level {
    L30,
    L20,
    L10,
}

impl Level {
    pub fn threshold(self) -> f64 {
        match self {
            Level::L30 => 30.0,
            Level::L20 => 20.0,
            Level::L10 => 10.0,
        }
    }

    /// Deepest level whose threshold `rsi` is strictly below, if any.
    pub fn deepest_below(rsi: f64) -> Option<Level> {
        [Level::L10, Level::L20, Level::L30]
            .into_iter()
            .find(|level| rsi < level.threshold())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.threshold() as u32)
    }
}

/// Which ladder rule admitted a re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReentryTrigger {
    Level20,
    Level10,
    ResetCycle,
}

/// Outcome of asking the ladder whether a re-entry may be taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReentryDecision {
    /// RSI is not below the entry threshold; nothing to decide.
    NotOversold,
    Take {
        ladder: LevelLadder,
        trigger: ReentryTrigger,
    },
    /// Oversold, but the level the price has reached was already used.
    LevelTaken(Level),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelLadder {
    pub l30: bool,
    pub l20: bool,
    pub l10: bool,
}

impl LevelLadder {
    /// Ladder as marked by an entry at `rsi`: 30 always, plus every deeper level
    /// the price has already moved through.
    pub fn for_entry(rsi: f64) -> Self {
        LevelLadder {
            l30: true,
            l20: rsi < Level::L20.threshold(),
            l10: rsi < Level::L10.threshold(),
        }
    }

    pub fn mark(self, level: Level) -> Self {
        match level {
            Level::L30 => LevelLadder { l30: true, ..self },
            Level::L20 => LevelLadder { l20: true, ..self },
            Level::L10 => LevelLadder { l10: true, ..self },
        }
    }

    /// True when every flag set in `self` is also set in `later`.
    pub fn is_subset_of(&self, later: &LevelLadder) -> bool {
        (!self.l30 || later.l30) && (!self.l20 || later.l20) && (!self.l10 || later.l10)
    }

    /// Decide a re-entry at `rsi`. `reset_armed` is true when RSI has been above
    /// the entry threshold at some point since the position's last fill.
    pub fn decide_reentry(self, rsi: f64, reset_armed: bool) -> ReentryDecision {
        if rsi >= ENTRY_RSI {
            return ReentryDecision::NotOversold;
        }

        if !self.l20 && rsi < Level::L20.threshold() {
            let mut ladder = self.mark(Level::L20);
            if rsi < Level::L10.threshold() {
                ladder = ladder.mark(Level::L10);
            }
            return ReentryDecision::Take {
                ladder,
                trigger: ReentryTrigger::Level20,
            };
        }

        if !self.l10 && rsi < Level::L10.threshold() {
            return ReentryDecision::Take {
                ladder: self.mark(Level::L10),
                trigger: ReentryTrigger::Level10,
            };
        }

        if reset_armed {
            return ReentryDecision::Take {
                ladder: LevelLadder::for_entry(rsi),
                trigger: ReentryTrigger::ResetCycle,
            };
        }

        ReentryDecision::LevelTaken(Level::deepest_below(rsi).unwrap_or(Level::L30))
    }
}

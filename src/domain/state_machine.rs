//! Per-symbol position state machine.
//!
//! Each bar is fed through [`transition`], which takes the current [`State`] by
//! value and returns the next state together with the events the bar produced.
//! A bar on which nothing happens yields [`Event::Hold`]; no path returns an
//! empty event list.
//!
//! Priority while a position is open: adverse-excursion update, then exit,
//! then re-entry. The bar that fills an initial entry is never exit- or
//! re-entry-checked, so every exit lands strictly after the first fill.

use chrono::NaiveDate;
use std::collections::VecDeque;

use super::bar::{DailyBar, Indicators};
use super::error::MalformedBarError;
use super::ladder::{ENTRY_RSI, EXIT_RSI, Level, LevelLadder, ReentryDecision, ReentryTrigger};
use super::outcome;
use super::position::{ExitReason, Fill, FillTag, Position};
use super::signal::{EntrySignal, Verdict, is_entry_signal};
use crate::ports::validator_port::EntryValidator;

/// Parameters that shape fills; thresholds are fixed by the strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    /// Fixed notional spent on every fill.
    pub capital_per_fill: f64,
    /// Number of most recent valid bars handed to the validator.
    pub context_window: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            capital_per_fill: 10_000.0,
            context_window: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    NoPosition,
    /// Signal accepted; fills at the next valid bar's open.
    PendingEntry { signal_date: NaiveDate, signal_rsi: f64 },
    Open(OpenPosition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub position: Position,
    /// RSI has been above the entry threshold since the last fill.
    pub reset_armed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipCause {
    Malformed(MalformedBarError),
    OutOfOrder { previous: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalSkipReason {
    Rejected,
    ValidatorError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReentryBlock {
    LevelTaken(Level),
    DailyCap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Hold {
        date: NaiveDate,
    },
    BarSkipped {
        date: NaiveDate,
        cause: SkipCause,
    },
    SignalDetected {
        date: NaiveDate,
        rsi10: f64,
    },
    SignalAccepted {
        date: NaiveDate,
    },
    SignalSkipped {
        date: NaiveDate,
        reason: SignalSkipReason,
    },
    EntryFilled {
        fill: Fill,
        target_price: f64,
        ladder: LevelLadder,
    },
    ReentryFilled {
        fill: Fill,
        trigger: ReentryTrigger,
        target_price: f64,
        ladder: LevelLadder,
    },
    ReentryRejected {
        date: NaiveDate,
        rsi10: f64,
        reason: ReentryBlock,
    },
    /// A fill would have bought zero shares at the given price.
    InsufficientCapital {
        date: NaiveDate,
        price: f64,
        tag: FillTag,
    },
    Exited {
        position: Position,
    },
}

/// Read-only inputs to a single transition.
pub struct StepContext<'a> {
    pub symbol: &'a str,
    pub params: &'a SimulationParams,
    /// Valid bars seen so far, newest last, including the current bar.
    pub window: &'a VecDeque<DailyBar>,
}

/// Apply one valid bar to `state`.
pub fn transition(
    state: State,
    bar: &DailyBar,
    ind: Indicators,
    ctx: &StepContext<'_>,
    validator: &dyn EntryValidator,
) -> (State, Vec<Event>) {
    match state {
        State::NoPosition => detect_signal(bar, ind, ctx, validator),
        State::PendingEntry { signal_rsi, .. } => fill_initial(bar, ind, signal_rsi, ctx),
        State::Open(open) => step_open(open, bar, ind, ctx),
    }
}

fn detect_signal(
    bar: &DailyBar,
    ind: Indicators,
    ctx: &StepContext<'_>,
    validator: &dyn EntryValidator,
) -> (State, Vec<Event>) {
    if !is_entry_signal(bar.close, ind.rsi10, ind.ema200) {
        return (State::NoPosition, vec![Event::Hold { date: bar.date }]);
    }

    let mut events = vec![Event::SignalDetected {
        date: bar.date,
        rsi10: ind.rsi10,
    }];

    let signal = EntrySignal {
        symbol: ctx.symbol.to_string(),
        date: bar.date,
        close: bar.close,
        rsi10: ind.rsi10,
        ema9: ind.ema9,
        ema200: ind.ema200,
        recent_bars: ctx.window.iter().cloned().collect(),
    };

    let skip = match validator.validate_entry(&signal) {
        Ok(Verdict::Accept) => None,
        Ok(Verdict::Reject) => Some(SignalSkipReason::Rejected),
        Err(e) => {
            tracing::warn!(symbol = ctx.symbol, date = %bar.date, error = %e, "validator failed; treating as rejection");
            Some(SignalSkipReason::ValidatorError(e.to_string()))
        }
    };

    match skip {
        None => {
            tracing::debug!(symbol = ctx.symbol, date = %bar.date, rsi = ind.rsi10, "entry signal accepted");
            events.push(Event::SignalAccepted { date: bar.date });
            let state = State::PendingEntry {
                signal_date: bar.date,
                signal_rsi: ind.rsi10,
            };
            (state, events)
        }
        Some(reason) => {
            tracing::info!(symbol = ctx.symbol, date = %bar.date, rsi = ind.rsi10, "entry signal SKIPPED");
            events.push(Event::SignalSkipped {
                date: bar.date,
                reason,
            });
            (State::NoPosition, events)
        }
    }
}

fn fill_initial(
    bar: &DailyBar,
    ind: Indicators,
    signal_rsi: f64,
    ctx: &StepContext<'_>,
) -> (State, Vec<Event>) {
    let quantity = shares_for(ctx.params.capital_per_fill, bar.open);
    if quantity == 0 {
        tracing::warn!(symbol = ctx.symbol, date = %bar.date, price = bar.open, "initial fill buys zero shares");
        let event = Event::InsufficientCapital {
            date: bar.date,
            price: bar.open,
            tag: FillTag::Initial,
        };
        return (State::NoPosition, vec![event]);
    }

    let fill = Fill {
        date: bar.date,
        price: bar.open,
        quantity,
        tag: FillTag::Initial,
    };
    let ladder = LevelLadder::for_entry(signal_rsi);
    let mut position = Position::open(ctx.symbol, fill.clone(), ind.ema9, ladder);
    outcome::observe_low(&mut position, bar.low);

    tracing::debug!(symbol = ctx.symbol, date = %bar.date, price = bar.open, quantity, target = ind.ema9, "initial fill");

    let open = OpenPosition {
        position,
        reset_armed: ind.rsi10 > ENTRY_RSI,
    };
    let event = Event::EntryFilled {
        fill,
        target_price: ind.ema9,
        ladder,
    };
    (State::Open(open), vec![event])
}

fn step_open(
    mut open: OpenPosition,
    bar: &DailyBar,
    ind: Indicators,
    ctx: &StepContext<'_>,
) -> (State, Vec<Event>) {
    outcome::observe_low(&mut open.position, bar.low);

    if let Some((price, reason)) = exit_condition(&open.position, bar, ind) {
        let mut position = open.position;
        outcome::finalize(&mut position, bar.date, price, reason);
        tracing::debug!(symbol = ctx.symbol, date = %bar.date, price, ?reason, "position closed");
        return (State::NoPosition, vec![Event::Exited { position }]);
    }

    if ind.rsi10 > ENTRY_RSI {
        open.reset_armed = true;
    }

    let decision = open
        .position
        .ladder
        .decide_reentry(ind.rsi10, open.reset_armed);

    let event = match decision {
        ReentryDecision::NotOversold => Event::Hold { date: bar.date },
        _ if open.position.re_entries_on(bar.date) >= 1 => Event::ReentryRejected {
            date: bar.date,
            rsi10: ind.rsi10,
            reason: ReentryBlock::DailyCap,
        },
        ReentryDecision::LevelTaken(level) => {
            tracing::debug!(symbol = ctx.symbol, date = %bar.date, rsi = ind.rsi10, %level, "re-entry blocked: level already taken");
            Event::ReentryRejected {
                date: bar.date,
                rsi10: ind.rsi10,
                reason: ReentryBlock::LevelTaken(level),
            }
        }
        ReentryDecision::Take { ladder, trigger } => {
            return reenter(open, bar, ind, ladder, trigger, ctx);
        }
    };

    (State::Open(open), vec![event])
}

fn reenter(
    mut open: OpenPosition,
    bar: &DailyBar,
    ind: Indicators,
    ladder: LevelLadder,
    trigger: ReentryTrigger,
    ctx: &StepContext<'_>,
) -> (State, Vec<Event>) {
    let quantity = shares_for(ctx.params.capital_per_fill, bar.close);
    if quantity == 0 {
        let event = Event::InsufficientCapital {
            date: bar.date,
            price: bar.close,
            tag: FillTag::ReEntry,
        };
        return (State::Open(open), vec![event]);
    }

    let fill = Fill {
        date: bar.date,
        price: bar.close,
        quantity,
        tag: FillTag::ReEntry,
    };
    open.position.add_fill(fill.clone(), ind.ema9, ladder);
    open.reset_armed = false;

    tracing::debug!(symbol = ctx.symbol, date = %bar.date, price = bar.close, ?trigger, avg = open.position.average_price(), "re-entry fill");

    let event = Event::ReentryFilled {
        fill,
        trigger,
        target_price: ind.ema9,
        ladder,
    };
    (State::Open(open), vec![event])
}

/// Target hit takes precedence and fills exactly at target; otherwise an RSI
/// exit fills at the close.
fn exit_condition(position: &Position, bar: &DailyBar, ind: Indicators) -> Option<(f64, ExitReason)> {
    if bar.high >= position.target_price {
        Some((position.target_price, ExitReason::TargetHit))
    } else if ind.rsi10 > EXIT_RSI {
        Some((bar.close, ExitReason::RsiExit))
    } else {
        None
    }
}

fn shares_for(capital: f64, price: f64) -> i64 {
    if price <= 0.0 {
        return 0;
    }
    (capital / price).floor() as i64
}

/// Drives [`transition`] over a bar sequence for one symbol.
pub struct PositionStateMachine<'a> {
    symbol: String,
    params: SimulationParams,
    validator: &'a dyn EntryValidator,
    state: State,
    window: VecDeque<DailyBar>,
    last_date: Option<NaiveDate>,
}

impl<'a> PositionStateMachine<'a> {
    pub fn new(symbol: &str, params: SimulationParams, validator: &'a dyn EntryValidator) -> Self {
        let capacity = params.context_window.max(1);
        PositionStateMachine {
            symbol: symbol.to_string(),
            params,
            validator,
            state: State::NoPosition,
            window: VecDeque::with_capacity(capacity),
            last_date: None,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Process one bar. Out-of-order bars are skipped as if the day did not
    /// exist. A malformed bar with finite prices still moves an open
    /// position's excursion and can hit its target; nothing else runs on it.
    pub fn step(&mut self, bar: &DailyBar) -> Vec<Event> {
        if let Some(previous) = self.last_date.filter(|&prev| bar.date <= prev) {
            tracing::warn!(symbol = %self.symbol, date = %bar.date, %previous, "bar out of order; skipped");
            return vec![Event::BarSkipped {
                date: bar.date,
                cause: SkipCause::OutOfOrder { previous },
            }];
        }

        let ind = match bar.validate() {
            Ok(ind) => ind,
            Err(e) => {
                tracing::warn!(symbol = %self.symbol, error = %e, "skipping malformed bar");
                let mut events = vec![Event::BarSkipped {
                    date: bar.date,
                    cause: SkipCause::Malformed(e),
                }];
                if bar.has_prices() {
                    events.extend(self.price_only_step(bar));
                }
                return events;
            }
        };
        self.last_date = Some(bar.date);

        let capacity = self.params.context_window.max(1);
        if self.window.len() == capacity {
            self.window.pop_front();
        }
        self.window.push_back(bar.clone());

        let ctx = StepContext {
            symbol: &self.symbol,
            params: &self.params,
            window: &self.window,
        };
        let state = std::mem::replace(&mut self.state, State::NoPosition);
        let (next, events) = transition(state, bar, ind, &ctx, self.validator);
        self.state = next;
        events
    }

    /// MAE update and target check for a bar whose indicators are unusable.
    fn price_only_step(&mut self, bar: &DailyBar) -> Option<Event> {
        let State::Open(open) = &mut self.state else {
            return None;
        };
        outcome::observe_low(&mut open.position, bar.low);
        if bar.high < open.position.target_price {
            return None;
        }

        let State::Open(open) = std::mem::replace(&mut self.state, State::NoPosition) else {
            return None;
        };
        let mut position = open.position;
        let price = position.target_price;
        outcome::finalize(&mut position, bar.date, price, ExitReason::TargetHit);
        self.last_date = Some(bar.date);
        tracing::debug!(symbol = %self.symbol, date = %bar.date, price, "position closed on price-only bar");
        Some(Event::Exited { position })
    }

    /// Consume the machine, returning the still-open position if there is one.
    pub fn into_open_position(self) -> Option<Position> {
        match self.state {
            State::Open(open) => Some(open.position),
            _ => None,
        }
    }
}

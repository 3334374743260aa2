//! Summary statistics over closed positions.
//!
//! Win rate and total return only ever count CLOSED positions. A position still
//! open at the end of the window is reported separately as unrealised P&L.

use serde::Serialize;

use super::position::Position;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub closed_positions: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    /// Closed positions with positive P&L / closed positions.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub capital_deployed: f64,
    /// Sum of per-position P&L / sum of capital deployed.
    pub total_return: f64,
    pub avg_return: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub avg_days_to_exit: f64,
    /// Most negative adverse excursion among closed positions (fraction).
    pub worst_drawdown_pct: f64,
    pub avg_drawdown_pct: f64,
    pub avg_fills: f64,
    pub open_positions: usize,
    pub unrealized_pnl: f64,
    pub unrealized_return: f64,
}

impl Summary {
    /// `open` pairs each still-open position with the price it is marked at.
    pub fn compute<'a, C, O>(closed: C, open: O) -> Self
    where
        C: IntoIterator<Item = &'a Position>,
        O: IntoIterator<Item = (&'a Position, f64)>,
    {
        let mut s = Summary::default();
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut total_return_pct = 0.0_f64;
        let mut total_days = 0i64;
        let mut total_drawdown = 0.0_f64;
        let mut total_fills = 0usize;

        for position in closed {
            let Some(pnl) = position.realized_pnl() else {
                continue;
            };
            s.closed_positions += 1;
            s.total_pnl += pnl;
            s.capital_deployed += position.cost_basis();
            total_return_pct += position.return_pct().unwrap_or(0.0);
            total_days += position.days_to_exit.unwrap_or(0);
            total_drawdown += position.max_drawdown_pct;
            total_fills += position.fills.len();
            s.worst_drawdown_pct = s.worst_drawdown_pct.min(position.max_drawdown_pct);

            if pnl > 0.0 {
                s.wins += 1;
                total_wins += pnl;
            } else if pnl < 0.0 {
                s.losses += 1;
                total_losses += pnl.abs();
            } else {
                s.breakeven += 1;
            }
        }

        if s.closed_positions > 0 {
            let n = s.closed_positions as f64;
            s.win_rate = s.wins as f64 / n;
            s.avg_return = total_return_pct / n;
            s.avg_days_to_exit = total_days as f64 / n;
            s.avg_drawdown_pct = total_drawdown / n;
            s.avg_fills = total_fills as f64 / n;
        }

        if s.capital_deployed > 0.0 {
            s.total_return = s.total_pnl / s.capital_deployed;
        }

        if s.wins > 0 {
            s.avg_win = total_wins / s.wins as f64;
        }
        if s.losses > 0 {
            s.avg_loss = total_losses / s.losses as f64;
        }

        s.profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let mut open_basis = 0.0_f64;
        for (position, mark) in open {
            s.open_positions += 1;
            s.unrealized_pnl += position.unrealized_pnl(mark);
            open_basis += position.cost_basis();
        }
        if open_basis > 0.0 {
            s.unrealized_return = s.unrealized_pnl / open_basis;
        }

        s
    }
}

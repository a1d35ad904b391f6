//! Challenge accounts and their accounting rules.

use super::error::PropdeskError;
use super::trade::{OrderTicket, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    Active,
    Passed,
    Failed,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Passed => "passed",
            ChallengeStatus::Failed => "failed",
            ChallengeStatus::Expired => "expired",
        }
    }

    pub fn parse(input: &str) -> Result<Self, PropdeskError> {
        match input.to_lowercase().as_str() {
            "active" => Ok(ChallengeStatus::Active),
            "passed" => Ok(ChallengeStatus::Passed),
            "failed" => Ok(ChallengeStatus::Failed),
            "expired" => Ok(ChallengeStatus::Expired),
            other => Err(PropdeskError::Database {
                reason: format!("unknown challenge status: {other}"),
            }),
        }
    }
}

/// A purchasable challenge tier. `daily_loss_limit` and the profit targets
/// are percentages of the account size.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengePlan {
    pub name: String,
    pub account_size: f64,
    pub daily_loss_limit: f64,
    pub max_loss_limit: f64,
    pub profit_target_phase1: f64,
    pub profit_target_phase2: f64,
    pub profit_split: f64,
}

/// A simulated funded-trading account tracked against its plan's limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub id: String,
    pub user_id: String,
    pub status: ChallengeStatus,
    pub phase: u8,
    pub starting_balance: f64,
    pub current_balance: f64,
    pub highest_balance: f64,
    pub total_profit: f64,
    pub total_loss: f64,
    /// Running loss as a percent of the starting balance.
    pub daily_loss: f64,
    pub trading_days: u32,
    pub plan: ChallengePlan,
}

impl Challenge {
    pub fn profit(&self) -> f64 {
        self.current_balance - self.starting_balance
    }

    pub fn profit_percent(&self) -> f64 {
        if self.starting_balance > 0.0 {
            self.profit() / self.starting_balance * 100.0
        } else {
            0.0
        }
    }

    /// Share of profit paid out under the plan's split. Zero while under water.
    pub fn capital_earned(&self) -> f64 {
        let profit = self.profit();
        if profit > 0.0 {
            profit * self.plan.profit_split / 100.0
        } else {
            0.0
        }
    }

    /// Profit target for the current phase, as a percent.
    pub fn phase_target(&self) -> f64 {
        if self.phase <= 1 {
            self.plan.profit_target_phase1
        } else {
            self.plan.profit_target_phase2
        }
    }

    /// Settle an order against the account. Buys debit the notional, sells
    /// credit it; profit/loss aggregates and the daily-loss percent are
    /// re-derived from the new balance. The order must already be validated.
    pub fn settle_order(&mut self, order: &OrderTicket) {
        let notional = order.notional();
        self.current_balance = match order.side {
            Side::Buy => self.current_balance - notional,
            Side::Sell => self.current_balance + notional,
        };
        self.highest_balance = self.highest_balance.max(self.current_balance);

        let profit = self.profit();
        self.total_profit = profit.max(0.0);
        self.total_loss = (-profit).max(0.0);
        self.daily_loss = if self.starting_balance > 0.0 {
            self.total_loss / self.starting_balance * 100.0
        } else {
            0.0
        };
        self.trading_days += 1;
    }
}

#[cfg(test)]
pub(crate) fn sample_challenge(balance: f64) -> Challenge {
    Challenge {
        id: "ch-1".into(),
        user_id: "user-1".into(),
        status: ChallengeStatus::Active,
        phase: 1,
        starting_balance: balance,
        current_balance: balance,
        highest_balance: balance,
        total_profit: 0.0,
        total_loss: 0.0,
        daily_loss: 0.0,
        trading_days: 0,
        plan: ChallengePlan {
            name: "Starter".into(),
            account_size: balance,
            daily_loss_limit: 5.0,
            max_loss_limit: 10.0,
            profit_target_phase1: 8.0,
            profit_target_phase2: 5.0,
            profit_split: 80.0,
        },
    }
}

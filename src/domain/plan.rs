//! Trade plans and risk alerts for the selected instrument.

use super::signal::{evaluate, risk_reward, stop_pct_base, RiskLevel, Signal, SignalAction};
use super::ticker::PriceTick;

/// One directional branch of a [`TradePlan`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlanLeg {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub rr: f64,
}

/// Bidirectional plan for the selected instrument: how a long and a short
/// would each be framed at the current price, and the level that invalidates
/// the currently signaled direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub symbol: String,
    pub bullish: PlanLeg,
    pub bearish: PlanLeg,
    pub invalidation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Hold,
    Exit,
    Trade,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Hold => "HOLD",
            Recommendation::Exit => "EXIT",
            Recommendation::Trade => "TRADE",
        }
    }
}

/// Aggregate risk posture for the selected instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAlert {
    pub level: RiskLevel,
    pub message: String,
    pub recommendation: Recommendation,
}

/// Build the bidirectional plan for the selected instrument. Both legs use
/// the same stop distance and reward multiple as the signal engine.
pub fn build_plan(tick: &PriceTick, daily_loss_limit: f64) -> TradePlan {
    let signal = evaluate(tick, daily_loss_limit);
    let rr = risk_reward(tick.volatility());
    let sl_pct = stop_pct_base(daily_loss_limit);
    let price = tick.price;

    let bullish = PlanLeg {
        entry: price,
        stop_loss: price * (1.0 - sl_pct),
        take_profit: price * (1.0 + sl_pct * rr),
        rr,
    };
    let bearish = PlanLeg {
        entry: price,
        stop_loss: price * (1.0 + sl_pct),
        take_profit: price * (1.0 - sl_pct * rr),
        rr,
    };

    let invalidation = match signal.action {
        SignalAction::Buy => bullish.stop_loss,
        SignalAction::Sell => bearish.stop_loss,
        SignalAction::Hold | SignalAction::Stop => price,
    };

    TradePlan {
        symbol: tick.symbol.clone(),
        bullish,
        bearish,
        invalidation,
    }
}

fn alert_message(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "excessive volatility",
        RiskLevel::Medium => "possible unconfirmed breakout",
        RiskLevel::Low => "risk under control",
    }
}

/// Build the risk alert for the selected instrument given its signal.
pub fn build_alert(tick: &PriceTick, signal: &Signal) -> RiskAlert {
    let level = RiskLevel::from_volatility(tick.volatility());
    let recommendation = if level == RiskLevel::High {
        Recommendation::Hold
    } else if signal.action == SignalAction::Stop {
        Recommendation::Exit
    } else {
        Recommendation::Trade
    };
    RiskAlert {
        level,
        message: alert_message(level).into(),
        recommendation,
    }
}

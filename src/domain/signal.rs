//! Signal derivation from price ticks.
//!
//! Signals are recomputed from scratch on every tick batch; nothing here is
//! persisted or stateful.

use super::ticker::PriceTick;

/// Floor on the stop distance so a tiny daily-loss budget never produces a
/// zero-width stop.
pub const MIN_STOP_PCT: f64 = 0.0025;
/// Fraction of the daily-loss budget a single stop may consume.
pub const STOP_BUDGET_FRACTION: f64 = 0.2;

const HIGH_VOL_THRESHOLD: f64 = 3.0;
const MEDIUM_VOL_THRESHOLD: f64 = 1.5;
const MOMENTUM_THRESHOLD: f64 = 0.8;

const CONFIDENCE_MIN: f64 = 50.0;
const CONFIDENCE_MAX: f64 = 95.0;

const OPPORTUNITY_MIN_CONFIDENCE: f64 = 70.0;
const OPPORTUNITY_LIMIT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
    Stop,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Hold => "HOLD",
            SignalAction::Stop => "STOP",
        }
    }

    pub fn is_directional(&self) -> bool {
        matches!(self, SignalAction::Buy | SignalAction::Sell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket realized volatility (absolute percent change).
    pub fn from_volatility(vol: f64) -> Self {
        if vol >= HIGH_VOL_THRESHOLD {
            RiskLevel::High
        } else if vol >= MEDIUM_VOL_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    fn confidence_penalty(&self) -> f64 {
        match self {
            RiskLevel::High => 20.0,
            RiskLevel::Medium => 8.0,
            RiskLevel::Low => 0.0,
        }
    }
}

/// A derived directional trade recommendation for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub action: SignalAction,
    pub confidence: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reason: String,
    pub risk: RiskLevel,
}

/// Base stop distance as a fraction of price: a fixed slice of the
/// configured daily-loss budget, floored at [`MIN_STOP_PCT`].
pub fn stop_pct_base(daily_loss_limit: f64) -> f64 {
    MIN_STOP_PCT.max(daily_loss_limit / 100.0 * STOP_BUDGET_FRACTION)
}

/// Reward multiple for a given realized volatility. Noisier instruments get
/// a tighter multiple.
pub fn risk_reward(vol: f64) -> f64 {
    if vol >= HIGH_VOL_THRESHOLD {
        1.5
    } else if vol >= MEDIUM_VOL_THRESHOLD {
        2.0
    } else {
        2.5
    }
}

/// Derive the signal for one tick under a challenge's daily-loss limit.
pub fn evaluate(tick: &PriceTick, daily_loss_limit: f64) -> Signal {
    let vol = tick.volatility();
    let risk = RiskLevel::from_volatility(vol);
    let rr = risk_reward(vol);
    let sl_pct = stop_pct_base(daily_loss_limit);
    let price = tick.price;

    // First matching rule wins.
    let (action, reason) = if tick.market_state.is_halted() {
        (SignalAction::Stop, "market halted")
    } else if risk == RiskLevel::High {
        (SignalAction::Stop, "excessive volatility")
    } else if tick.change_percent > MOMENTUM_THRESHOLD {
        (SignalAction::Buy, "bullish momentum")
    } else if tick.change_percent < -MOMENTUM_THRESHOLD {
        (SignalAction::Sell, "bearish pressure")
    } else {
        (SignalAction::Hold, "neutral")
    };

    let (stop_loss, take_profit) = match action {
        SignalAction::Buy => (price * (1.0 - sl_pct), price * (1.0 + sl_pct * rr)),
        SignalAction::Sell => (price * (1.0 + sl_pct), price * (1.0 - sl_pct * rr)),
        SignalAction::Hold | SignalAction::Stop => (price, price),
    };

    let base = 70.0 + vol.min(HIGH_VOL_THRESHOLD) * 10.0;
    let confidence = (base - risk.confidence_penalty()).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX);

    Signal {
        symbol: tick.symbol.clone(),
        action,
        confidence,
        entry: price,
        stop_loss,
        take_profit,
        reason: reason.into(),
        risk,
    }
}

/// Evaluate every tick in a batch. Tickers are processed in symbol order so
/// the output is stable across refreshes.
pub fn evaluate_all<'a, I>(ticks: I, daily_loss_limit: f64) -> Vec<Signal>
where
    I: IntoIterator<Item = &'a PriceTick>,
{
    ticks
        .into_iter()
        .map(|tick| evaluate(tick, daily_loss_limit))
        .collect()
}

/// Rank tradeable signals: directional, confident, and not high-risk.
/// Returns at most [`OPPORTUNITY_LIMIT`], best first.
pub fn opportunities(signals: &[Signal]) -> Vec<Signal> {
    let mut quality: Vec<Signal> = signals
        .iter()
        .filter(|s| {
            s.action.is_directional()
                && s.confidence >= OPPORTUNITY_MIN_CONFIDENCE
                && s.risk != RiskLevel::High
        })
        .cloned()
        .collect();
    quality.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    quality.truncate(OPPORTUNITY_LIMIT);
    quality
}

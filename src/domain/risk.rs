//! ATR-scaled stop-loss / take-profit levels.
//!
//! [`compute_risk_levels`] never fails. Bad inputs produce a sentinel with
//! [`RiskStatus::VolatilityUndefined`] and policy outcomes (stop too wide,
//! reward:risk too low) are reported through [`RiskStatus`]. Callers branch
//! on the status only.
//!
//! Stop width is bounded to `[MIN_STOP_PCT, MAX_STOP_PCT]` of the entry.
//! Below the floor the distance is raised; above the ceiling the computed
//! distance is discarded in favour of fixed 5% / 10% levels.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const MIN_STOP_PCT: f64 = 0.01;
pub const MAX_STOP_PCT: f64 = 0.05;
pub const DEFAULT_VOLATILITY_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_MIN_REWARD_RISK: f64 = 2.0;

/// Fixed levels used when the volatility stop exceeds [`MAX_STOP_PCT`].
const CEILING_STOP_FACTOR_LONG: f64 = 0.95;
const CEILING_TAKE_FACTOR_LONG: f64 = 1.10;
const CEILING_STOP_FACTOR_SHORT: f64 = 1.05;
const CEILING_TAKE_FACTOR_SHORT: f64 = 0.90;
const CEILING_RR_RATIO: f64 = 2.0;

/// Relative slack on the reward:risk check. The ratio is recomputed from
/// rounded prices and may land a few ulps under the configured minimum.
const RR_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Ok,
    LowRr,
    VolatilityTooHigh,
    VolatilityUndefined,
}

impl RiskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskStatus::Ok => "OK",
            RiskStatus::LowRr => "LOW_RR",
            RiskStatus::VolatilityTooHigh => "VOLATILITY_TOO_HIGH",
            RiskStatus::VolatilityUndefined => "VOLATILITY_UNDEFINED",
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
    pub volatility_multiplier: f64,
    pub min_reward_risk: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            volatility_multiplier: DEFAULT_VOLATILITY_MULTIPLIER,
            min_reward_risk: DEFAULT_MIN_REWARD_RISK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskLevels {
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_distance: f64,
    pub stop_pct: f64,
    pub rr_ratio: f64,
    pub status: RiskStatus,
}

impl RiskLevels {
    /// Sentinel for inputs that cannot be sized: both levels sit on the entry.
    pub fn undefined(entry_price: f64) -> Self {
        Self {
            entry_price,
            stop_loss: entry_price,
            take_profit: entry_price,
            stop_distance: 0.0,
            stop_pct: 0.0,
            rr_ratio: 0.0,
            status: RiskStatus::VolatilityUndefined,
        }
    }

    /// Policy ceiling: fixed-width levels that ignore the volatility stop.
    pub fn ceiling(entry_price: f64, direction: Direction) -> Self {
        let (stop_loss, take_profit) = match direction {
            Direction::Long => (
                entry_price * CEILING_STOP_FACTOR_LONG,
                entry_price * CEILING_TAKE_FACTOR_LONG,
            ),
            Direction::Short => (
                entry_price * CEILING_STOP_FACTOR_SHORT,
                entry_price * CEILING_TAKE_FACTOR_SHORT,
            ),
        };
        Self {
            entry_price,
            stop_loss,
            take_profit,
            stop_distance: entry_price * MAX_STOP_PCT,
            stop_pct: MAX_STOP_PCT,
            rr_ratio: CEILING_RR_RATIO,
            status: RiskStatus::VolatilityTooHigh,
        }
    }

    fn is_finite(&self) -> bool {
        [
            self.stop_loss,
            self.take_profit,
            self.stop_distance,
            self.stop_pct,
            self.rr_ratio,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

pub fn compute_risk_levels(
    entry_price: f64,
    volatility: f64,
    direction: Direction,
    config: &RiskConfig,
) -> RiskLevels {
    if !(entry_price > 0.0) || !entry_price.is_finite() {
        warn!(entry_price, "invalid entry price, risk levels undefined");
        return RiskLevels::undefined(entry_price);
    }
    if !(volatility >= 0.0) || !volatility.is_finite() {
        warn!(volatility, "invalid volatility, risk levels undefined");
        return RiskLevels::undefined(entry_price);
    }

    let (mut stop_distance, mut status) = if volatility == 0.0 {
        (entry_price * MIN_STOP_PCT, RiskStatus::VolatilityUndefined)
    } else {
        (volatility * config.volatility_multiplier, RiskStatus::Ok)
    };

    let mut stop_pct = stop_distance / entry_price;
    if stop_pct < MIN_STOP_PCT {
        stop_pct = MIN_STOP_PCT;
        stop_distance = entry_price * MIN_STOP_PCT;
    } else if stop_pct > MAX_STOP_PCT {
        debug!(
            entry_price,
            volatility, stop_pct, "stop wider than ceiling, using fixed-width levels"
        );
        return RiskLevels::ceiling(entry_price, direction);
    }

    let reward_distance = stop_distance * config.min_reward_risk;
    let (stop_loss, take_profit) = match direction {
        Direction::Long => (entry_price - stop_distance, entry_price + reward_distance),
        Direction::Short => (entry_price + stop_distance, entry_price - reward_distance),
    };

    let rr_ratio = if stop_distance != 0.0 {
        (take_profit - entry_price).abs() / stop_distance
    } else {
        0.0
    };

    if status == RiskStatus::Ok && rr_ratio < config.min_reward_risk * (1.0 - RR_TOLERANCE) {
        status = RiskStatus::LowRr;
    }

    let levels = RiskLevels {
        entry_price,
        stop_loss,
        take_profit,
        stop_distance,
        stop_pct,
        rr_ratio,
        status,
    };

    if !levels.is_finite() {
        warn!(entry_price, volatility, "non-finite risk levels, treating as undefined");
        return RiskLevels::undefined(entry_price);
    }
    levels
}

/// Same as [`compute_risk_levels`] with the direction given as text; an
/// unrecognised direction yields the undefined sentinel.
pub fn compute_risk_levels_for(
    entry_price: f64,
    volatility: f64,
    direction: &str,
    config: &RiskConfig,
) -> RiskLevels {
    match direction.parse::<Direction>() {
        Ok(d) => compute_risk_levels(entry_price, volatility, d, config),
        Err(e) => {
            warn!("{}", e);
            RiskLevels::undefined(entry_price)
        }
    }
}

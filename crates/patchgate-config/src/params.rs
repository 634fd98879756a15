//! Positional invocation parameters
//!
//! The management agent calls scripts with three reserved leading arguments
//! (mount point, computer name, user name) followed by the administrator's
//! own. Both the bare four-value form and the seven-value agent form are
//! accepted.

use patchgate_util::QuietHours;

use crate::{ConfigError, ConfigResult, Thresholds};

/// Number of parameters we care about
const PARAM_COUNT: usize = 4;

/// Leading arguments supplied by the management agent
const RESERVED_LEADING: usize = 3;

/// Longest grace period an administrator may grant, in days
pub const MAX_DEFER_LIMIT_DAYS: u32 = 3650;

/// Parse `DEFER_LIMIT QUIET_HOURS_START QUIET_HOURS_END MIN_BATTERY_LEVEL`
pub fn parse_invocation(params: &[String]) -> ConfigResult<Thresholds> {
    let params = match params.len() {
        PARAM_COUNT => params,
        n if n == PARAM_COUNT + RESERVED_LEADING => &params[RESERVED_LEADING..],
        n => return Err(ConfigError::WrongParameterCount(n)),
    };

    let defer_limit_days = parse_integer("DEFER_LIMIT", &params[0])?;
    let start = parse_integer("QUIET_HOURS_START", &params[1])?;
    let end = parse_integer("QUIET_HOURS_END", &params[2])?;
    let min_battery = parse_integer("MIN_BATTERY_LEVEL", &params[3])?;

    let defer_limit_days = u32::try_from(defer_limit_days)
        .ok()
        .filter(|days| *days <= MAX_DEFER_LIMIT_DAYS)
        .ok_or_else(|| ConfigError::OutOfRange {
            name: "DEFER_LIMIT",
            message: format!(
                "{} days is outside 0-{}",
                defer_limit_days, MAX_DEFER_LIMIT_DAYS
            ),
        })?;

    let start = hour("QUIET_HOURS_START", start)?;
    let end = hour("QUIET_HOURS_END", end)?;
    let quiet_hours = QuietHours::new(start, end).ok_or(ConfigError::OutOfRange {
        name: "QUIET_HOURS",
        message: format!("{}-{} is not a pair of hours", start, end),
    })?;

    if !(0..=100).contains(&min_battery) {
        return Err(ConfigError::OutOfRange {
            name: "MIN_BATTERY_LEVEL",
            message: format!("{}% is not a percentage", min_battery),
        });
    }

    Ok(Thresholds {
        defer_limit_days,
        quiet_hours,
        min_battery_percent: min_battery as u8,
    })
}

fn parse_integer(name: &'static str, value: &str) -> ConfigResult<i64> {
    value.trim().parse().map_err(|_| ConfigError::NotAnInteger {
        name,
        value: value.to_string(),
    })
}

fn hour(name: &'static str, value: i64) -> ConfigResult<u8> {
    if (0..24).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ConfigError::OutOfRange {
            name,
            message: format!("{} is not an hour of the day", value),
        })
    }
}

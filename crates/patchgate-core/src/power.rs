//! Power gate
//!
//! Reads the hardware model and `pmset -g batt` to decide whether an
//! unattended install is safe. Anything unreadable counts against the
//! install.

use patchgate_api::PowerState;
use patchgate_host_api::{CommandRunner, CommandSpec};
use patchgate_util::{PMSET, SYSCTL};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::EngineResult;

/// Marker in the hardware model of laptop-class machines
const PORTABLE_MODEL_MARKER: &str = "MacBook";

pub struct PowerGate {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl PowerGate {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// True if the hardware model indicates a laptop.
    ///
    /// An unreadable model is treated as portable so battery rules still
    /// apply.
    pub async fn is_portable_device(&self) -> EngineResult<bool> {
        let out = self
            .runner
            .run(&CommandSpec::new(SYSCTL).arg("hw.model"), self.timeout)
            .await?;

        if !out.is_success() {
            warn!(status = ?out.status, "Could not read hardware model, assuming portable");
            return Ok(true);
        }

        let portable = is_portable_model(&out.output);
        debug!(model = %out.output.trim(), portable, "Hardware model");
        Ok(portable)
    }

    /// True only when the power source report says "AC".
    pub async fn on_ac_power(&self) -> EngineResult<bool> {
        let report = self.battery_report().await?;
        Ok(report.as_deref().is_some_and(parse_on_ac_power))
    }

    /// Non-portables always pass. Portables need a readable charge at or
    /// above `min_percent`.
    pub async fn meets_battery_threshold(&self, min_percent: u8) -> EngineResult<bool> {
        Ok(self.read_state().await?.meets_battery_threshold(min_percent))
    }

    /// Probe everything once
    pub async fn read_state(&self) -> EngineResult<PowerState> {
        let is_portable = self.is_portable_device().await?;
        let report = self.battery_report().await?;

        let (on_ac_power, battery_percent) = match report.as_deref() {
            Some(text) => (parse_on_ac_power(text), parse_battery_percent(text)),
            None => (false, None),
        };

        let state = PowerState {
            is_portable,
            on_ac_power,
            battery_percent,
        };

        if is_portable && battery_percent.is_none() {
            warn!("Failed to get battery level");
        }
        info!(
            portable = state.is_portable,
            on_ac_power = state.on_ac_power,
            battery_percent = ?state.battery_percent,
            "Power state"
        );
        Ok(state)
    }

    async fn battery_report(&self) -> EngineResult<Option<String>> {
        let out = self
            .runner
            .run(&CommandSpec::new(PMSET).args(["-g", "batt"]), self.timeout)
            .await?;

        if out.is_success() {
            Ok(Some(out.output))
        } else {
            warn!(status = ?out.status, "pmset failed, power state unknown");
            Ok(None)
        }
    }
}

/// `hw.model: MacBookPro15,1` → true
pub fn is_portable_model(sysctl_output: &str) -> bool {
    sysctl_output.contains(PORTABLE_MODEL_MARKER)
}

/// Power source named in `Now drawing from 'AC Power'`
pub fn parse_power_source(report: &str) -> Option<&str> {
    let start = report.find("drawing from '")? + "drawing from '".len();
    let rest = &report[start..];
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

pub fn parse_on_ac_power(report: &str) -> bool {
    parse_power_source(report)
        .and_then(|source| source.split_whitespace().next())
        .is_some_and(|word| word == "AC")
}

/// Charge from a battery line such as
/// ` -InternalBattery-0 (id=4653155)\t80%; charging; 1:20 remaining`
pub fn parse_battery_percent(report: &str) -> Option<u8> {
    report.lines().find_map(|line| {
        let (_, detail) = line.split_once('\t')?;
        let level = detail.split(';').next()?.trim();
        level.strip_suffix('%')?.trim().parse().ok()
    })
}

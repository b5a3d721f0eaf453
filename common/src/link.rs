// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Link power-mode configuration types.
//!
//! A UniPro link runs in one of two mode classes: HS ("fast", gears 1-3)
//! or PWM ("slow", gears 1-7).  Each class has an "auto" variant that
//! transitions between BURST and SLEEP M-PHY states on its own, trading
//! exit latency for power.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Highest HS gear supported by the switch.
pub const HS_GEAR_MAX: u8 = 3;

/// Highest PWM gear supported by the switch.
pub const PWM_GEAR_MAX: u8 = 7;

/// Maximum number of active data lanes per direction.
pub const MAX_ACTIVE_LANES: u8 = 2;

/// Default L2 FC0 protection timeout programmed when the caller supplies
/// no power-mode user data of its own.
pub const DEFAULT_FC0_PROTECTION_TIMEOUT: u16 = 0x1fff;

/// The HS rate series a link runs at.  `Unchanged` leaves the currently
/// negotiated series in place.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HsSeries {
    #[default]
    Unchanged,
    A,
    B,
}

impl HsSeries {
    /// The PA_HSSERIES attribute encoding, or None if the attribute
    /// should not be written at all.
    pub fn encoding(&self) -> Option<u32> {
        match self {
            HsSeries::Unchanged => None,
            HsSeries::A => Some(1),
            HsSeries::B => Some(2),
        }
    }
}

/// One direction's power mode.  The numeric encodings are the PA_PWRMODE
/// nibble values; the attribute itself packs RX in the high nibble and TX
/// in the low one.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PowerMode {
    Fast,
    FastAuto,
    Slow,
    SlowAuto,
    Unchanged,
}

impl PowerMode {
    pub fn encoding(&self) -> u32 {
        match self {
            PowerMode::Fast => 1,
            PowerMode::Slow => 2,
            PowerMode::FastAuto => 4,
            PowerMode::SlowAuto => 5,
            PowerMode::Unchanged => 7,
        }
    }

    pub fn is_hs(&self) -> bool {
        matches!(self, PowerMode::Fast | PowerMode::FastAuto)
    }

    pub fn is_pwm(&self) -> bool {
        matches!(self, PowerMode::Slow | PowerMode::SlowAuto)
    }

    fn fast(auto: bool) -> Self {
        match auto {
            true => PowerMode::FastAuto,
            false => PowerMode::Fast,
        }
    }

    fn slow(auto: bool) -> Self {
        match auto {
            true => PowerMode::SlowAuto,
            false => PowerMode::Slow,
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PowerMode::Fast => write!(f, "HS"),
            PowerMode::FastAuto => write!(f, "HS-auto"),
            PowerMode::Slow => write!(f, "PWM"),
            PowerMode::SlowAuto => write!(f, "PWM-auto"),
            PowerMode::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// The gear/lane/mode tuple for one direction of a link.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PowerConfig {
    pub mode: PowerMode,
    pub gear: u8,
    pub lanes: u8,
}

impl PowerConfig {
    pub fn fast(auto: bool, gear: u8, lanes: u8) -> Self {
        PowerConfig {
            mode: PowerMode::fast(auto),
            gear,
            lanes,
        }
    }

    pub fn slow(auto: bool, gear: u8, lanes: u8) -> Self {
        PowerConfig {
            mode: PowerMode::slow(auto),
            gear,
            lanes,
        }
    }

    /// Reject gear/lane combinations the hardware cannot express.  This
    /// runs before any attribute write is issued.
    pub fn validate(&self) -> Result<(), LinkCfgError> {
        let gear_max = if self.mode.is_hs() {
            HS_GEAR_MAX
        } else if self.mode.is_pwm() {
            PWM_GEAR_MAX
        } else {
            // Unchanged keeps whatever the link already negotiated.
            return Ok(());
        };
        if self.gear < 1 || self.gear > gear_max {
            return Err(LinkCfgError::BadGear {
                mode: self.mode,
                gear: self.gear,
            });
        }
        if self.lanes < 1 || self.lanes > MAX_ACTIVE_LANES {
            return Err(LinkCfgError::BadLaneCount(self.lanes));
        }
        Ok(())
    }
}

/// Power-mode user data, carried alongside the PA_PWRMODE write.  Only
/// the L2 FC0 protection timeout is meaningful on this switch family; an
/// unset field leaves the hardware register alone.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PwrUserData {
    pub fc0_protection_timeout: Option<u16>,
}

impl PwrUserData {
    /// The user data programmed by the convenience entry points.
    pub fn standard() -> Self {
        PwrUserData {
            fc0_protection_timeout: Some(DEFAULT_FC0_PROTECTION_TIMEOUT),
        }
    }
}

/// A full link power-mode change request.
#[derive(Clone, Copy, Debug)]
pub struct LinkConfig {
    pub hs_series: HsSeries,
    pub tx: PowerConfig,
    pub rx: PowerConfig,
    pub user: PwrUserData,
    pub tx_termination: bool,
    pub rx_termination: bool,
}

impl LinkConfig {
    /// Both directions to the given HS gear.  No line termination; HS
    /// links run unterminated on this backplane.
    pub fn hs(gear: u8, lanes: u8, auto: bool) -> Self {
        LinkConfig {
            hs_series: HsSeries::Unchanged,
            tx: PowerConfig::fast(auto, gear, lanes),
            rx: PowerConfig::fast(auto, gear, lanes),
            user: PwrUserData::standard(),
            tx_termination: false,
            rx_termination: false,
        }
    }

    /// Both directions to the given PWM gear, with termination on both
    /// line directions.
    pub fn pwm(gear: u8, lanes: u8, auto: bool) -> Self {
        LinkConfig {
            hs_series: HsSeries::Unchanged,
            tx: PowerConfig::slow(auto, gear, lanes),
            rx: PowerConfig::slow(auto, gear, lanes),
            user: PwrUserData::standard(),
            tx_termination: true,
            rx_termination: true,
        }
    }

    pub fn validate(&self) -> Result<(), LinkCfgError> {
        self.tx.validate()?;
        self.rx.validate()
    }

    /// The PA_PWRMODE attribute value: RX mode in the high nibble, TX in
    /// the low.
    pub fn pwrmode_encoding(&self) -> u32 {
        (self.rx.mode.encoding() << 4) | self.tx.mode.encoding()
    }
}

/// Vendor-specific local L2 timer overrides applied during a power mode
/// change.  Each field maps to one 16-bit TSB_DME_* timeout register and
/// is written only if set; unset fields keep their current hardware
/// value.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TimerOverrides {
    pub fc0_protection: Option<u16>,
    pub tc0_replay: Option<u16>,
    pub afc0_req: Option<u16>,
    pub fc1_protection: Option<u16>,
    pub tc1_replay: Option<u16>,
    pub afc1_req: Option<u16>,
}

impl TimerOverrides {
    pub fn is_empty(&self) -> bool {
        *self == TimerOverrides::default()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LinkCfgError {
    #[error("gear {gear} invalid for {mode} mode")]
    BadGear { mode: PowerMode, gear: u8 },
    #[error("invalid lane count: {0}")]
    BadLaneCount(u8),
}

impl FromStr for PowerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" | "hs" => Ok(PowerMode::Fast),
            "fastauto" | "hsauto" => Ok(PowerMode::FastAuto),
            "slow" | "pwm" => Ok(PowerMode::Slow),
            "slowauto" | "pwmauto" => Ok(PowerMode::SlowAuto),
            "unchanged" => Ok(PowerMode::Unchanged),
            x => Err(format!("unknown power mode: {x}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hs_gear_range() {
        assert!(PowerConfig::fast(false, 1, 1).validate().is_ok());
        assert!(PowerConfig::fast(false, 3, 2).validate().is_ok());
        assert_eq!(
            PowerConfig::fast(false, 4, 1).validate(),
            Err(LinkCfgError::BadGear {
                mode: PowerMode::Fast,
                gear: 4
            })
        );
        assert!(PowerConfig::fast(false, 0, 1).validate().is_err());
    }

    #[test]
    fn test_pwm_gear_range() {
        assert!(PowerConfig::slow(true, 7, 1).validate().is_ok());
        assert_eq!(
            PowerConfig::slow(true, 8, 1).validate(),
            Err(LinkCfgError::BadGear {
                mode: PowerMode::SlowAuto,
                gear: 8
            })
        );
    }

    #[test]
    fn test_lane_bounds() {
        assert_eq!(
            PowerConfig::fast(false, 1, MAX_ACTIVE_LANES + 1).validate(),
            Err(LinkCfgError::BadLaneCount(MAX_ACTIVE_LANES + 1))
        );
        assert_eq!(
            PowerConfig::fast(false, 1, 0).validate(),
            Err(LinkCfgError::BadLaneCount(0))
        );
    }

    #[test]
    fn test_pwrmode_encoding() {
        // Fast both directions packs to 0x11, fast-auto to 0x44.
        assert_eq!(LinkConfig::hs(2, 1, false).pwrmode_encoding(), 0x11);
        assert_eq!(LinkConfig::hs(2, 1, true).pwrmode_encoding(), 0x44);
        assert_eq!(LinkConfig::pwm(1, 1, false).pwrmode_encoding(), 0x22);
        assert_eq!(LinkConfig::pwm(1, 1, true).pwrmode_encoding(), 0x55);
    }

    #[test]
    fn test_unchanged_mode_skips_gear_check() {
        let cfg = PowerConfig {
            mode: PowerMode::Unchanged,
            gear: 0,
            lanes: 0,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_timer_overrides_empty() {
        assert!(TimerOverrides::default().is_empty());
        let t = TimerOverrides {
            tc0_replay: Some(0x1fff),
            ..Default::default()
        };
        assert!(!t.is_empty());
    }
}

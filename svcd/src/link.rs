// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Link power-mode management.
//!
//! A power mode change is staged as a series of attribute writes (gear,
//! termination, lanes, user data, vendor timers) and then kicked off by
//! writing PA_PWRMODE.  The hardware negotiates the change with the peer
//! asynchronously and latches the outcome in a vendor indication
//! register, which we poll with a bound.

use std::time::{Duration, Instant};

use slog::info;

use crate::types::{SvcdError, SvcdResult};
use crate::Switch;
use common::link::{LinkConfig, TimerOverrides};
use common::ports::PortId;
use ual::dme;

/// How long to wait for the switch to report the outcome of a power mode
/// change before giving up.
const POWERMODE_TIMEOUT: Duration = Duration::from_millis(100);
const POWERMODE_POLL_INTERVAL: Duration = Duration::from_millis(5);

impl Switch {
    /// Reconfigure the power mode of `port`'s link.  The request is
    /// validated in full before any attribute write is issued; a request
    /// that fails validation leaves the hardware untouched.
    pub fn configure_link(
        &self,
        port: PortId,
        cfg: &LinkConfig,
        timers: &TimerOverrides,
    ) -> SvcdResult<()> {
        cfg.validate()?;

        let sel = dme::NCP_SELINDEX_NULL;
        self.dme_set(port, dme::PA_TXGEAR, sel, cfg.tx.gear as u32)?;
        self.dme_set(
            port,
            dme::PA_TXTERMINATION,
            sel,
            cfg.tx_termination as u32,
        )?;
        if let Some(series) = cfg.hs_series.encoding() {
            self.dme_set(port, dme::PA_HSSERIES, sel, series)?;
        }
        self.dme_set(
            port,
            dme::PA_ACTIVETXDATALANES,
            sel,
            cfg.tx.lanes as u32,
        )?;

        self.dme_set(port, dme::PA_RXGEAR, sel, cfg.rx.gear as u32)?;
        self.dme_set(
            port,
            dme::PA_RXTERMINATION,
            sel,
            cfg.rx_termination as u32,
        )?;
        self.dme_set(
            port,
            dme::PA_ACTIVERXDATALANES,
            sel,
            cfg.rx.lanes as u32,
        )?;

        if let Some(timeout) = cfg.user.fc0_protection_timeout {
            self.dme_set(
                port,
                dme::PA_PWRMODEUSERDATA0,
                sel,
                timeout as u32,
            )?;
        }

        self.apply_timer_overrides(port, timers)?;

        // The indication register holds the outcome of the last
        // negotiation on this port; clear it so the poll below cannot
        // mistake a stale success for this one's.
        self.dme_set(
            port,
            dme::TSB_DME_POWERMODEIND,
            sel,
            dme::TSB_DME_POWERMODEIND_NONE,
        )?;
        self.dme_set(port, dme::PA_PWRMODE, sel, cfg.pwrmode_encoding())?;
        self.wait_powermode(port)?;

        info!(self.log, "link reconfigured";
            "port" => %port,
            "tx" => %cfg.tx.mode,
            "rx" => %cfg.rx.mode,
            "tx_gear" => cfg.tx.gear,
            "rx_gear" => cfg.rx.gear);
        Ok(())
    }

    /// Both directions to the given HS gear.
    pub fn configure_link_hs(
        &self,
        port: PortId,
        gear: u8,
        lanes: u8,
        auto: bool,
    ) -> SvcdResult<()> {
        self.configure_link(
            port,
            &LinkConfig::hs(gear, lanes, auto),
            &TimerOverrides::default(),
        )
    }

    /// Both directions to the given PWM gear.
    pub fn configure_link_pwm(
        &self,
        port: PortId,
        gear: u8,
        lanes: u8,
        auto: bool,
    ) -> SvcdResult<()> {
        self.configure_link(
            port,
            &LinkConfig::pwm(gear, lanes, auto),
            &TimerOverrides::default(),
        )
    }

    // Write only the vendor L2 timer registers the caller asked to
    // override.
    fn apply_timer_overrides(
        &self,
        port: PortId,
        timers: &TimerOverrides,
    ) -> SvcdResult<()> {
        let sel = dme::NCP_SELINDEX_NULL;
        let regs = [
            (dme::TSB_DME_FC0PROTECTIONTIMEOUTVAL, timers.fc0_protection),
            (dme::TSB_DME_TC0REPLAYTIMEOUTVAL, timers.tc0_replay),
            (dme::TSB_DME_AFC0REQTIMEOUTVAL, timers.afc0_req),
            (dme::TSB_DME_FC1PROTECTIONTIMEOUTVAL, timers.fc1_protection),
            (dme::TSB_DME_TC1REPLAYTIMEOUTVAL, timers.tc1_replay),
            (dme::TSB_DME_AFC1REQTIMEOUTVAL, timers.afc1_req),
        ];
        for (attr, value) in regs {
            if let Some(v) = value {
                self.dme_set(port, attr, sel, v as u32)?;
            }
        }
        Ok(())
    }

    // Poll the vendor indication register until the power mode change
    // completes, fails, or the deadline passes.
    fn wait_powermode(&self, port: PortId) -> SvcdResult<()> {
        let deadline = Instant::now() + POWERMODE_TIMEOUT;
        loop {
            let ind = self.dme_get(
                port,
                dme::TSB_DME_POWERMODEIND,
                dme::NCP_SELINDEX_NULL,
            )?;
            match ind {
                dme::TSB_DME_POWERMODEIND_SUCCESS => return Ok(()),
                dme::TSB_DME_POWERMODEIND_NONE => {
                    if Instant::now() >= deadline {
                        return Err(SvcdError::LinkNegotiation {
                            port,
                            ind,
                        });
                    }
                    std::thread::sleep(POWERMODE_POLL_INTERVAL);
                }
                _ => return Err(SvcdError::LinkNegotiation { port, ind }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_switch;
    use common::link::{HsSeries, LinkCfgError, PwrUserData};
    use ncp::tsb_stub::PowerModeBehavior;

    fn port(id: u8) -> PortId {
        PortId::new(id).unwrap()
    }

    #[test]
    fn test_hs_write_sequence() {
        let switch = test_switch();
        let p = port(1);
        switch.configure_link_hs(p, 2, 1, false).unwrap();

        let attrs: Vec<u16> = switch
            .hdl
            .dme_writes()
            .iter()
            .map(|w| w.attr)
            .collect();
        // series unchanged, so no PA_HSSERIES write
        assert_eq!(
            attrs,
            vec![
                dme::PA_TXGEAR,
                dme::PA_TXTERMINATION,
                dme::PA_ACTIVETXDATALANES,
                dme::PA_RXGEAR,
                dme::PA_RXTERMINATION,
                dme::PA_ACTIVERXDATALANES,
                dme::PA_PWRMODEUSERDATA0,
                dme::TSB_DME_POWERMODEIND,
                dme::PA_PWRMODE,
            ]
        );
        // HS links run unterminated
        assert_eq!(switch.dme_get(p, dme::PA_TXTERMINATION, 0).unwrap(), 0);
        assert_eq!(switch.dme_get(p, dme::PA_PWRMODE, 0).unwrap(), 0x11);
    }

    #[test]
    fn test_pwm_terminated_and_auto_encoding() {
        let switch = test_switch();
        let p = port(1);
        switch.configure_link_pwm(p, 4, 1, true).unwrap();
        assert_eq!(switch.dme_get(p, dme::PA_TXTERMINATION, 0).unwrap(), 1);
        assert_eq!(switch.dme_get(p, dme::PA_RXTERMINATION, 0).unwrap(), 1);
        assert_eq!(switch.dme_get(p, dme::PA_PWRMODE, 0).unwrap(), 0x55);
    }

    #[test]
    fn test_explicit_series_written() {
        let switch = test_switch();
        let p = port(1);
        let cfg = LinkConfig {
            hs_series: HsSeries::B,
            ..LinkConfig::hs(1, 1, false)
        };
        switch
            .configure_link(p, &cfg, &TimerOverrides::default())
            .unwrap();
        assert_eq!(switch.dme_get(p, dme::PA_HSSERIES, 0).unwrap(), 2);
    }

    #[test]
    fn test_validation_before_write() {
        let switch = test_switch();
        // HS gear 4 does not exist
        let err = switch.configure_link_hs(port(1), 4, 1, false);
        assert!(matches!(
            err,
            Err(SvcdError::LinkConfig(LinkCfgError::BadGear { .. }))
        ));
        // the hardware saw nothing
        assert!(switch.hdl.dme_writes().is_empty());
    }

    #[test]
    fn test_sparse_timer_overrides() {
        let switch = test_switch();
        let p = port(1);
        let timers = TimerOverrides {
            tc0_replay: Some(0x0fff),
            ..Default::default()
        };
        let cfg = LinkConfig {
            user: PwrUserData::default(),
            ..LinkConfig::hs(1, 1, false)
        };
        switch.configure_link(p, &cfg, &timers).unwrap();

        let timer_writes: Vec<_> = switch
            .hdl
            .dme_writes()
            .iter()
            .filter(|w| {
                (dme::TSB_DME_FC0PROTECTIONTIMEOUTVAL
                    ..=dme::TSB_DME_AFC1REQTIMEOUTVAL)
                    .contains(&w.attr)
            })
            .cloned()
            .collect();
        assert_eq!(timer_writes.len(), 1);
        assert_eq!(timer_writes[0].attr, dme::TSB_DME_TC0REPLAYTIMEOUTVAL);
        assert_eq!(timer_writes[0].value, 0x0fff);
    }

    #[test]
    fn test_negotiation_failure() {
        let switch = test_switch();
        switch.hdl.set_powermode_behavior(PowerModeBehavior::Fail);
        let err = switch.configure_link_hs(port(1), 1, 1, false);
        assert!(matches!(
            err,
            Err(SvcdError::LinkNegotiation { ind: 1, .. })
        ));
    }

    #[test]
    fn test_stale_indication_not_trusted() {
        let switch = test_switch();
        let p = port(1);
        // a completed change leaves a success indication latched
        switch.configure_link_hs(p, 1, 1, false).unwrap();

        // the next change never completes; its poll must not be fooled
        // by the leftover success
        switch.hdl.set_powermode_behavior(PowerModeBehavior::Pending);
        let err = switch.configure_link_hs(p, 2, 1, false);
        assert!(matches!(
            err,
            Err(SvcdError::LinkNegotiation { ind: 0, .. })
        ));
    }

    #[test]
    fn test_negotiation_timeout() {
        let switch = test_switch();
        switch.hdl.set_powermode_behavior(PowerModeBehavior::Pending);
        let err = switch.configure_link_hs(port(1), 1, 1, false);
        assert!(matches!(
            err,
            Err(SvcdError::LinkNegotiation { ind: 0, .. })
        ));
    }
}

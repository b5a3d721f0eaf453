// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The DME attribute engine: every attribute access the driver makes
//! goes through here, which serializes access to the command bus and
//! folds non-success protocol result codes into driver errors.

use std::sync::MutexGuard;

use slog::trace;

use crate::types::{SvcdError, SvcdResult};
use crate::Switch;
use common::ports::PortId;
use ual::dme;
use ual::SwitchOps;

/// Switch version and boot status, read once at startup.
#[derive(Clone, Copy, Debug)]
pub struct SwitchVersion {
    pub version: u32,
    pub status: u32,
}

impl Switch {
    /// Take the bus lock.  The switch processes one NCP command at a
    /// time, so each backend call happens under this guard.  Composite
    /// operations deliberately do not hold it across calls: interleaving
    /// is acceptable, a stalled peer holding the bus is not.
    pub(crate) fn ncp(&self) -> MutexGuard<'_, ()> {
        self.bus.lock().unwrap()
    }

    /// Read a DME attribute on the switch side of `port`'s link.
    pub fn dme_get(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
    ) -> SvcdResult<u32> {
        let reply = {
            let _bus = self.ncp();
            self.hdl.attr_get(port, attr, selector)?
        };
        if !reply.result.is_success() {
            return Err(SvcdError::Protocol {
                ctx: format!("get {attr:#06x} port {port}"),
                code: reply.result,
            });
        }
        trace!(self.log, "dme get";
            "port" => %port,
            "attr" => format!("{attr:#06x}"),
            "value" => format!("{:#x}", reply.value));
        Ok(reply.value)
    }

    /// Write a DME attribute on the switch side of `port`'s link.
    pub fn dme_set(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
        value: u32,
    ) -> SvcdResult<()> {
        let result = {
            let _bus = self.ncp();
            self.hdl.attr_set(port, attr, selector, value)?
        };
        if !result.is_success() {
            return Err(SvcdError::Protocol {
                ctx: format!("set {attr:#06x} port {port}"),
                code: result,
            });
        }
        Ok(())
    }

    /// Read a DME attribute on the device across the link from `port`.
    pub fn dme_peer_get(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
    ) -> SvcdResult<u32> {
        let reply = {
            let _bus = self.ncp();
            self.hdl.peer_attr_get(port, attr, selector)?
        };
        if !reply.result.is_success() {
            return Err(SvcdError::Protocol {
                ctx: format!("peer get {attr:#06x} port {port}"),
                code: reply.result,
            });
        }
        Ok(reply.value)
    }

    /// Write a DME attribute on the device across the link from `port`.
    pub fn dme_peer_set(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
        value: u32,
    ) -> SvcdResult<()> {
        let result = {
            let _bus = self.ncp();
            self.hdl.peer_attr_set(port, attr, selector, value)?
        };
        if !result.is_success() {
            return Err(SvcdError::Protocol {
                ctx: format!("peer set {attr:#06x} port {port}"),
                code: result,
            });
        }
        Ok(())
    }

    /// Read the switch version and boot status registers.
    pub fn switch_version(&self) -> SvcdResult<SwitchVersion> {
        let _bus = self.ncp();
        let version = self.hdl.switch_attr_get(dme::SWVER)?;
        let status = self.hdl.switch_attr_get(dme::SWSTA)?;
        Ok(SwitchVersion { version, status })
    }

    /// Unmask (or mask) the switch's interrupt source.
    pub fn irq_enable(&self, enable: bool) -> SvcdResult<()> {
        let _bus = self.ncp();
        Ok(self.hdl.switch_irq_enable(enable)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_switch;
    use ncp::tsb_stub::FaultInjection;
    use ual::{ResultCode, UalError};

    #[test]
    fn test_attr_round_trip() {
        let switch = test_switch();
        let port = PortId::new(3).unwrap();
        switch.dme_set(port, dme::PA_TXGEAR, 0, 2).unwrap();
        assert_eq!(switch.dme_get(port, dme::PA_TXGEAR, 0).unwrap(), 2);
    }

    #[test]
    fn test_protocol_error_mapped() {
        let switch = test_switch();
        let port = PortId::new(0).unwrap();
        switch.hdl.inject_fault(FaultInjection::Protocol(ResultCode(8)));
        match switch.dme_get(port, dme::PA_TXGEAR, 0) {
            Err(SvcdError::Protocol { code, .. }) => {
                assert_eq!(code, ResultCode(8))
            }
            x => panic!("expected protocol error, got {x:?}"),
        }
    }

    #[test]
    fn test_transport_error_mapped() {
        let switch = test_switch();
        let port = PortId::new(0).unwrap();
        switch.hdl.inject_fault(FaultInjection::Transport);
        match switch.dme_set(port, dme::PA_TXGEAR, 0, 1) {
            Err(SvcdError::Switch(UalError::Transport { .. })) => (),
            x => panic!("expected transport error, got {x:?}"),
        }
    }

    #[test]
    fn test_switch_version() {
        let switch = test_switch();
        let ver = switch.switch_version().unwrap();
        assert_ne!(ver.version, 0);
        assert_ne!(ver.status, 0);
    }
}

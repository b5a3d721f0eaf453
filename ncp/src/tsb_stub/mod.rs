// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! A stub backend that models the switch in memory, allowing the driver
//! to run on hardware without the real switch attached.  All attribute,
//! LUT, and mask state is held in a sparse register file, every write is
//! journaled for inspection, and interrupts can be raised on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use slog::{debug, info, o};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::Identifiers;
use common::ports::{CportId, PortId};
use ual::dme;
use ual::{
    AttrReply, ResultCode, RoutingSnapshot, SwitchEvent, SwitchOps, UalError,
    UalResult,
};

mod regs;
pub use regs::AttrScope;
pub use regs::DmeWrite;
pub use regs::RouteWrite;
use regs::RegFile;

/// Fixed identity reported by the stub, so repeated runs agree on which
/// "switch" they were talking to.
const STUB_UUID: &str = "11e96b2c-7f22-4229-96c9-50b6a3c18b39";

/// Value the stub reports for the switch version register after init.
const STUB_SWVER: u32 = 0x0102;
/// Value the stub reports for the boot status register after init.
const STUB_SWSTA_READY: u32 = 0x0b;

/// How the stub completes a power mode change requested through a
/// `PA_PWRMODE` write.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PowerModeBehavior {
    /// Immediately latch a successful completion indication.
    #[default]
    Confirm,
    /// Never complete: the indication register stays at "none".
    Pending,
    /// Latch a failure indication.
    Fail,
}

/// A fault armed on the stub, consumed by the next attribute operation.
#[derive(Clone, Debug)]
pub enum FaultInjection {
    /// The transaction never completes on the bus.
    Transport,
    /// The switch answers with this result code.
    Protocol(ResultCode),
}

/// Board-level parameters the real backend would need to bring the
/// switch out of reset.  The stub only records them.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub vdd_1p1: bool,
    pub vdd_1p8: bool,
    pub reset_gpio: u32,
    pub irq_gpio: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            vdd_1p1: true,
            vdd_1p8: true,
            reset_gpio: 0,
            irq_gpio: 0,
        }
    }
}

#[derive(Default)]
struct IrqEnables {
    switch: bool,
    // bit n set means port n's interrupt source is unmasked
    ports: u16,
}

pub struct StubHandle {
    log: slog::Logger,
    cfg: BackendConfig,
    initialized: AtomicBool,
    state: Mutex<RegFile>,
    journal: Mutex<Vec<DmeWrite>>,
    route_journal: Mutex<Vec<RouteWrite>>,
    irq_tx: Mutex<Option<UnboundedSender<SwitchEvent>>>,
    irq_enables: Mutex<IrqEnables>,
    irq_dispatches: AtomicUsize,
    powermode: Mutex<PowerModeBehavior>,
    inject: Mutex<Option<FaultInjection>>,
}

impl StubHandle {
    pub fn new(log: &slog::Logger, cfg: BackendConfig) -> StubHandle {
        StubHandle {
            log: log.new(o!("unit" => "tsb-stub")),
            cfg,
            initialized: AtomicBool::new(false),
            state: Mutex::new(RegFile::default()),
            journal: Mutex::new(Vec::new()),
            route_journal: Mutex::new(Vec::new()),
            irq_tx: Mutex::new(None),
            irq_enables: Mutex::new(IrqEnables::default()),
            irq_dispatches: AtomicUsize::new(0),
            powermode: Mutex::new(PowerModeBehavior::default()),
            inject: Mutex::new(None),
        }
    }

    /// Release any resources held on behalf of the switch.
    pub fn fini(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        info!(self.log, "backend shut down");
    }

    pub fn is_model(&self) -> bool {
        true
    }

    /// Choose how subsequent `PA_PWRMODE` writes complete.
    pub fn set_powermode_behavior(&self, behavior: PowerModeBehavior) {
        *self.powermode.lock().unwrap() = behavior;
    }

    /// Arm a fault to be consumed by the next attribute operation.
    pub fn inject_fault(&self, fault: FaultInjection) {
        *self.inject.lock().unwrap() = Some(fault);
    }

    /// Raise the switch interrupt line: latch a cause bit in `SWINT` and
    /// notify the registered event channel.
    pub fn post_irq(&self) -> UalResult<()> {
        self.check_init("post_irq")?;
        self.state.lock().unwrap().switch_set(dme::SWINT, 1);
        if !self.irq_enables.lock().unwrap().switch {
            debug!(self.log, "interrupt latched while masked");
            return Ok(());
        }
        if let Some(tx) = self.irq_tx.lock().unwrap().as_ref() {
            tx.send(SwitchEvent::Irq).map_err(|e| UalError::Internal(
                format!("irq channel closed: {e}"),
            ))?;
        }
        Ok(())
    }

    /// How many interrupts `switch_irq_handler` has serviced.
    pub fn irq_dispatches(&self) -> usize {
        self.irq_dispatches.load(Ordering::SeqCst)
    }

    /// The journal of every attribute write issued so far, oldest first.
    pub fn dme_writes(&self) -> Vec<DmeWrite> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_dme_writes(&self) {
        self.journal.lock().unwrap().clear();
    }

    /// The journal of every LUT and mask write issued so far.
    pub fn route_writes(&self) -> Vec<RouteWrite> {
        self.route_journal.lock().unwrap().clone()
    }

    pub fn clear_route_writes(&self) {
        self.route_journal.lock().unwrap().clear();
    }

    pub fn config(&self) -> &BackendConfig {
        &self.cfg
    }

    fn check_init(&self, ctx: &str) -> UalResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(UalError::Uninitialized(ctx.to_string()))
        }
    }

    // A fault armed with inject_fault() fires exactly once.
    fn take_fault(&self) -> Option<FaultInjection> {
        self.inject.lock().unwrap().take()
    }

    fn journal_write(
        &self,
        scope: AttrScope,
        port: PortId,
        attr: u16,
        selector: u16,
        value: u32,
    ) {
        self.journal.lock().unwrap().push(DmeWrite {
            scope,
            port,
            attr,
            selector,
            value,
        });
    }

    /// Model the hardware's reaction to a power mode request: the
    /// indication register latches the outcome for the driver to poll.
    /// A negotiation that never completes latches nothing, leaving
    /// whatever an earlier change put there.
    fn latch_powermode_ind(&self, port: PortId) {
        let ind = match *self.powermode.lock().unwrap() {
            PowerModeBehavior::Confirm => dme::TSB_DME_POWERMODEIND_SUCCESS,
            PowerModeBehavior::Pending => return,
            PowerModeBehavior::Fail => 1,
        };
        self.state.lock().unwrap().local_set(
            port,
            dme::TSB_DME_POWERMODEIND,
            dme::NCP_SELINDEX_NULL,
            ind,
        );
    }
}

impl SwitchOps for StubHandle {
    fn init_comm(&self) -> UalResult<()> {
        let mut state = self.state.lock().unwrap();
        state.switch_set(dme::SWVER, STUB_SWVER);
        state.switch_set(dme::SWSTA, STUB_SWSTA_READY);
        drop(state);
        self.initialized.store(true, Ordering::SeqCst);
        info!(self.log, "switch model out of reset";
            "vdd_1p1" => self.cfg.vdd_1p1,
            "vdd_1p8" => self.cfg.vdd_1p8,
            "reset_gpio" => self.cfg.reset_gpio,
            "irq_gpio" => self.cfg.irq_gpio);
        Ok(())
    }

    fn attr_get(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
    ) -> UalResult<AttrReply> {
        self.check_init("attr_get")?;
        match self.take_fault() {
            Some(FaultInjection::Transport) => {
                return Err(UalError::Transport {
                    ctx: "attr_get".to_string(),
                    err: "no response".to_string(),
                })
            }
            Some(FaultInjection::Protocol(rc)) => {
                return Ok(AttrReply { value: 0, result: rc })
            }
            None => (),
        }
        let value = self.state.lock().unwrap().local_get(port, attr, selector);
        Ok(AttrReply::success(value))
    }

    fn attr_set(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
        value: u32,
    ) -> UalResult<ResultCode> {
        self.check_init("attr_set")?;
        match self.take_fault() {
            Some(FaultInjection::Transport) => {
                return Err(UalError::Transport {
                    ctx: "attr_set".to_string(),
                    err: "no response".to_string(),
                })
            }
            Some(FaultInjection::Protocol(rc)) => return Ok(rc),
            None => (),
        }
        self.journal_write(AttrScope::Local, port, attr, selector, value);
        self.state.lock().unwrap().local_set(port, attr, selector, value);
        if attr == dme::PA_PWRMODE {
            self.latch_powermode_ind(port);
        }
        debug!(self.log, "attr_set";
            "port" => %port,
            "attr" => format!("{attr:#06x}"),
            "selector" => selector,
            "value" => format!("{value:#x}"));
        Ok(ResultCode::SUCCESS)
    }

    fn peer_attr_get(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
    ) -> UalResult<AttrReply> {
        self.check_init("peer_attr_get")?;
        match self.take_fault() {
            Some(FaultInjection::Transport) => {
                return Err(UalError::Transport {
                    ctx: "peer_attr_get".to_string(),
                    err: "no response".to_string(),
                })
            }
            Some(FaultInjection::Protocol(rc)) => {
                return Ok(AttrReply { value: 0, result: rc })
            }
            None => (),
        }
        let value = self.state.lock().unwrap().peer_get(port, attr, selector);
        Ok(AttrReply::success(value))
    }

    fn peer_attr_set(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
        value: u32,
    ) -> UalResult<ResultCode> {
        self.check_init("peer_attr_set")?;
        match self.take_fault() {
            Some(FaultInjection::Transport) => {
                return Err(UalError::Transport {
                    ctx: "peer_attr_set".to_string(),
                    err: "no response".to_string(),
                })
            }
            Some(FaultInjection::Protocol(rc)) => return Ok(rc),
            None => (),
        }
        self.journal_write(AttrScope::Peer, port, attr, selector, value);
        self.state.lock().unwrap().peer_set(port, attr, selector, value);
        debug!(self.log, "peer_attr_set";
            "port" => %port,
            "attr" => format!("{attr:#06x}"),
            "selector" => selector,
            "value" => format!("{value:#x}"));
        Ok(ResultCode::SUCCESS)
    }

    fn lut_get(&self, port: PortId, addr: u8) -> UalResult<u8> {
        self.check_init("lut_get")?;
        Ok(self.state.lock().unwrap().lut_get(port, addr))
    }

    fn lut_set(&self, port: PortId, addr: u8, dest: PortId) -> UalResult<()> {
        self.check_init("lut_set")?;
        self.route_journal.lock().unwrap().push(RouteWrite::Lut {
            port,
            addr,
            dest: dest.as_u8(),
        });
        self.state.lock().unwrap().lut_set(port, addr, dest.as_u8());
        debug!(self.log, "lut_set";
            "port" => %port, "addr" => addr, "dest" => %dest);
        Ok(())
    }

    fn dev_id_mask_get(&self, port: PortId) -> UalResult<u8> {
        self.check_init("dev_id_mask_get")?;
        Ok(self.state.lock().unwrap().mask_get(port))
    }

    fn dev_id_mask_set(&self, port: PortId, mask: u8) -> UalResult<()> {
        self.check_init("dev_id_mask_set")?;
        self.route_journal
            .lock()
            .unwrap()
            .push(RouteWrite::Mask { port, mask });
        self.state.lock().unwrap().mask_set(port, mask);
        debug!(self.log, "dev_id_mask_set";
            "port" => %port, "mask" => format!("{mask:#04x}"));
        Ok(())
    }

    fn switch_attr_get(&self, attr: u16) -> UalResult<u32> {
        self.check_init("switch_attr_get")?;
        Ok(self.state.lock().unwrap().switch_get(attr))
    }

    fn switch_attr_set(&self, attr: u16, value: u32) -> UalResult<()> {
        self.check_init("switch_attr_set")?;
        self.state.lock().unwrap().switch_set(attr, value);
        Ok(())
    }

    fn switch_id_set(
        &self,
        cport: CportId,
        peer_cport: CportId,
        dis: bool,
        irt: bool,
    ) -> UalResult<()> {
        self.check_init("switch_id_set")?;
        self.state.lock().unwrap().id_route_set(
            cport.as_u8(),
            peer_cport.as_u8(),
            dis,
            irt,
        );
        debug!(self.log, "switch_id_set";
            "cport" => %cport, "peer_cport" => %peer_cport,
            "dis" => dis, "irt" => irt);
        Ok(())
    }

    fn port_irq_enable(&self, port: PortId, enable: bool) -> UalResult<()> {
        self.check_init("port_irq_enable")?;
        let mut enables = self.irq_enables.lock().unwrap();
        if enable {
            enables.ports |= 1 << port.as_u8();
        } else {
            enables.ports &= !(1 << port.as_u8());
        }
        Ok(())
    }

    fn switch_irq_enable(&self, enable: bool) -> UalResult<()> {
        self.check_init("switch_irq_enable")?;
        self.irq_enables.lock().unwrap().switch = enable;
        Ok(())
    }

    fn switch_irq_handler(&self) -> UalResult<()> {
        self.check_init("switch_irq_handler")?;
        let mut state = self.state.lock().unwrap();
        let cause = state.switch_get(dme::SWINT);
        state.switch_set(dme::SWINT, 0);
        drop(state);
        self.irq_dispatches.fetch_add(1, Ordering::SeqCst);
        debug!(self.log, "interrupt serviced";
            "cause" => format!("{cause:#x}"));
        Ok(())
    }

    fn dump_routing_table(&self) -> UalResult<RoutingSnapshot> {
        self.check_init("dump_routing_table")?;
        Ok(self.state.lock().unwrap().routing_snapshot())
    }

    fn register_irq_handler(
        &self,
        events: UnboundedSender<SwitchEvent>,
    ) -> UalResult<()> {
        *self.irq_tx.lock().unwrap() = Some(events);
        Ok(())
    }

    fn identifiers(&self) -> UalResult<impl ual::SwitchIdentifiers> {
        let id = Uuid::parse_str(STUB_UUID)
            .map_err(|e| UalError::Internal(format!("bad stub uuid: {e}")))?;
        Ok(Identifiers {
            id,
            backend: "tsb_stub".to_string(),
            silicon_rev: Some(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ports::INVALID_PORT;
    use ual::SwitchIdentifiers;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, o!())
    }

    fn test_handle() -> StubHandle {
        let hdl = StubHandle::new(&test_logger(), BackendConfig::default());
        hdl.init_comm().unwrap();
        hdl
    }

    #[test]
    fn test_uninitialized_rejected() {
        let hdl = StubHandle::new(&test_logger(), BackendConfig::default());
        let err = hdl.attr_get(PortId::internal(), dme::PA_TXGEAR, 0);
        assert!(matches!(err, Err(UalError::Uninitialized(_))));
    }

    #[test]
    fn test_init_reports_version() {
        let hdl = test_handle();
        assert_eq!(hdl.switch_attr_get(dme::SWVER).unwrap(), STUB_SWVER);
        assert_eq!(hdl.switch_attr_get(dme::SWSTA).unwrap(), STUB_SWSTA_READY);
    }

    #[test]
    fn test_attr_round_trip() {
        let hdl = test_handle();
        let port = PortId::new(3).unwrap();
        hdl.attr_set(port, dme::PA_TXGEAR, 0, 2).unwrap();
        assert_eq!(hdl.attr_get(port, dme::PA_TXGEAR, 0).unwrap().value, 2);
        // unwritten attributes read back as zero
        assert_eq!(hdl.attr_get(port, dme::PA_RXGEAR, 0).unwrap().value, 0);
        // the local and peer sides are distinct register files
        assert_eq!(
            hdl.peer_attr_get(port, dme::PA_TXGEAR, 0).unwrap().value,
            0
        );
    }

    #[test]
    fn test_lut_defaults_invalid() {
        let hdl = test_handle();
        let port = PortId::new(1).unwrap();
        assert_eq!(hdl.lut_get(port, 5).unwrap(), INVALID_PORT);
        hdl.lut_set(port, 5, PortId::new(7).unwrap()).unwrap();
        assert_eq!(hdl.lut_get(port, 5).unwrap(), 7);
    }

    #[test]
    fn test_journal_records_writes() {
        let hdl = test_handle();
        let port = PortId::new(2).unwrap();
        hdl.attr_set(port, dme::PA_TXGEAR, 0, 1).unwrap();
        hdl.peer_attr_set(port, dme::T_TRAFFICCLASS, 4, 0).unwrap();
        let writes = hdl.dme_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].scope, AttrScope::Local);
        assert_eq!(writes[0].attr, dme::PA_TXGEAR);
        assert_eq!(writes[1].scope, AttrScope::Peer);
        assert_eq!(writes[1].selector, 4);
        hdl.clear_dme_writes();
        assert!(hdl.dme_writes().is_empty());
    }

    #[test]
    fn test_powermode_latch() {
        let hdl = test_handle();
        let port = PortId::new(0).unwrap();
        hdl.attr_set(port, dme::PA_PWRMODE, 0, 0x11).unwrap();
        assert_eq!(
            hdl.attr_get(port, dme::TSB_DME_POWERMODEIND, 0).unwrap().value,
            dme::TSB_DME_POWERMODEIND_SUCCESS
        );

        // a change that never completes latches nothing, so the previous
        // outcome stays in the register
        hdl.set_powermode_behavior(PowerModeBehavior::Pending);
        hdl.attr_set(port, dme::PA_PWRMODE, 0, 0x22).unwrap();
        assert_eq!(
            hdl.attr_get(port, dme::TSB_DME_POWERMODEIND, 0).unwrap().value,
            dme::TSB_DME_POWERMODEIND_SUCCESS
        );

        hdl.set_powermode_behavior(PowerModeBehavior::Fail);
        hdl.attr_set(port, dme::PA_PWRMODE, 0, 0x44).unwrap();
        assert_ne!(
            hdl.attr_get(port, dme::TSB_DME_POWERMODEIND, 0).unwrap().value,
            dme::TSB_DME_POWERMODEIND_SUCCESS
        );
    }

    #[test]
    fn test_fault_injection_fires_once() {
        let hdl = test_handle();
        let port = PortId::new(0).unwrap();
        hdl.inject_fault(FaultInjection::Transport);
        assert!(matches!(
            hdl.attr_get(port, dme::PA_TXGEAR, 0),
            Err(UalError::Transport { .. })
        ));
        assert!(hdl.attr_get(port, dme::PA_TXGEAR, 0).is_ok());

        hdl.inject_fault(FaultInjection::Protocol(ResultCode(8)));
        let rc = hdl.attr_set(port, dme::PA_TXGEAR, 0, 1).unwrap();
        assert_eq!(rc, ResultCode(8));
        // a rejected write neither lands in the register file nor the
        // journal
        assert_eq!(hdl.attr_get(port, dme::PA_TXGEAR, 0).unwrap().value, 0);
        assert!(hdl.dme_writes().is_empty());
    }

    #[test]
    fn test_irq_delivery() {
        let hdl = test_handle();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        hdl.register_irq_handler(tx).unwrap();

        // masked: the cause latches but no event is delivered
        hdl.post_irq().unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(hdl.switch_attr_get(dme::SWINT).unwrap(), 1);

        hdl.switch_irq_enable(true).unwrap();
        hdl.post_irq().unwrap();
        assert!(matches!(rx.try_recv(), Ok(SwitchEvent::Irq)));

        hdl.switch_irq_handler().unwrap();
        assert_eq!(hdl.switch_attr_get(dme::SWINT).unwrap(), 0);
        assert_eq!(hdl.irq_dispatches(), 1);
    }

    #[test]
    fn test_routing_snapshot() {
        let hdl = test_handle();
        let p2 = PortId::new(2).unwrap();
        let p4 = PortId::new(4).unwrap();
        hdl.lut_set(p2, 7, p4).unwrap();
        hdl.dev_id_mask_set(p2, 0x80).unwrap();
        let snap = hdl.dump_routing_table().unwrap();
        assert_eq!(snap.entries.len(), 1);
        assert_eq!(snap.entries[0].port, p2);
        assert_eq!(snap.entries[0].addr, 7);
        assert_eq!(snap.entries[0].dest, 4);
        assert_eq!(snap.masks, vec![(p2, 0x80)]);
    }

    #[test]
    fn test_identifiers() {
        let hdl = test_handle();
        let ids = hdl.identifiers().unwrap();
        assert_eq!(ids.backend(), "tsb_stub");
        assert_eq!(ids.id().to_string(), STUB_UUID);
    }
}

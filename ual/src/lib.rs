// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The UniPro abstraction layer: the set of operations a concrete switch
//! backend must provide to the control-plane driver, together with the
//! error taxonomy and the DME attribute constants shared by both sides.

use thiserror::Error;

use common::ports::{CportId, PortId};

pub mod dme;
pub use dme::AttrReply;
pub use dme::ResultCode;

mod routing;
pub use routing::*;

/// A specialized Result type for backend operations
pub type UalResult<T> = Result<T, UalError>;

/// Trait-bound for use by backend implementations to provide a set of
/// identifiers for the switch silicon they manage.
pub trait SwitchIdentifiers {
    fn id(&self) -> uuid::Uuid;
    fn backend(&self) -> &str;
    fn silicon_rev(&self) -> Option<u8>;
}

/// Error type conveying additional information about backend errors.
///
/// The split between `Transport` and `Protocol` matters to callers: a
/// transport failure means the request never completed on the bus, with
/// no more detail available, while a protocol failure means the switch
/// answered and rejected the request with a result code that may be
/// worth retrying (e.g. Busy).  Attribute get/set operations do not use
/// `Protocol`; their replies carry the [`ResultCode`] directly and the
/// layer above decides what to do with it.
#[derive(Error, Debug)]
pub enum UalError {
    /// The physical transaction could not be completed (bus fault, no
    /// response from the switch).
    #[error("transport error at {ctx}: {err}")]
    Transport { ctx: String, err: String },
    /// The switch completed the transaction but returned a non-success
    /// result code.
    #[error("switch rejected the request: {}", .0)]
    Protocol(ResultCode),
    /// An argument passed to the backend is invalid or inappropriate.
    /// Indicates misbehavior from the caller.
    #[error("invalid argument: {}", .0)]
    InvalidArg(String),
    /// A backend operation was invoked before `init_comm` brought the
    /// switch out of reset.
    #[error("backend uninitialized: {}", .0)]
    Uninitialized(String),
    /// This operation is unsupported by the switch family being driven.
    #[error("operation unsupported by the switch")]
    OperationUnsupported,
    /// The backend detected some internal inconsistency.
    #[error("internal error: {}", .0)]
    Internal(String),
}

/// Events delivered from the backend to the driver's event loop.
#[derive(Clone, Copy, Debug)]
pub enum SwitchEvent {
    /// The switch asserted its interrupt line.
    Irq,
    /// Teardown request, posted on the same channel so a blocked wait is
    /// woken rather than deadlocking the join.
    Shutdown,
}

/// The `SwitchOps` trait contains the full capability set a switch
/// backend supplies: attribute access (local and peer), routing LUT and
/// device-id mask access, switch-wide attributes, and interrupt plumbing.
/// Every operation issues exactly one physical transaction; callers are
/// responsible for serializing access to the bus.
pub trait SwitchOps: Send + Sync {
    /// Bring up communication with the switch: release reset, establish
    /// the command channel, and leave the switch ready for NCP traffic.
    fn init_comm(&self) -> UalResult<()>;

    /// Read a DME attribute on the switch side of `port`'s link.  A
    /// transport failure is an `Err`; the reply carries the protocol
    /// result code alongside the value.
    fn attr_get(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
    ) -> UalResult<AttrReply>;

    /// Write a DME attribute on the switch side of `port`'s link.
    fn attr_set(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
        value: u32,
    ) -> UalResult<ResultCode>;

    /// Read a DME attribute on the device across the link from `port`.
    fn peer_attr_get(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
    ) -> UalResult<AttrReply>;

    /// Write a DME attribute on the device across the link from `port`.
    fn peer_attr_set(
        &self,
        port: PortId,
        attr: u16,
        selector: u16,
        value: u32,
    ) -> UalResult<ResultCode>;

    /// Read one LUT entry: the destination port frames addressed to
    /// `addr` are forwarded to when they arrive on `port`.
    fn lut_get(&self, port: PortId, addr: u8) -> UalResult<u8>;

    /// Program one LUT entry.
    fn lut_set(&self, port: PortId, addr: u8, dest: PortId) -> UalResult<()>;

    /// Read `port`'s device-id acceptance mask.
    fn dev_id_mask_get(&self, port: PortId) -> UalResult<u8>;

    /// Program `port`'s device-id acceptance mask.
    fn dev_id_mask_set(&self, port: PortId, mask: u8) -> UalResult<()>;

    /// Read a switch-wide attribute (SWVER, SWSTA, SWINT, ...).
    fn switch_attr_get(&self, attr: u16) -> UalResult<u32>;

    /// Write a switch-wide attribute.
    fn switch_attr_set(&self, attr: u16, value: u32) -> UalResult<()>;

    /// Bind an internal-port cport to a peer cport.  `dis` disables the
    /// route; `irt` selects the internal routing table.
    fn switch_id_set(
        &self,
        cport: CportId,
        peer_cport: CportId,
        dis: bool,
        irt: bool,
    ) -> UalResult<()>;

    /// Unmask (or mask) the interrupt source for a single port.
    fn port_irq_enable(&self, port: PortId, enable: bool) -> UalResult<()>;

    /// Unmask (or mask) the switch's own interrupt source.
    fn switch_irq_enable(&self, enable: bool) -> UalResult<()>;

    /// Service a pending switch interrupt: read the interrupt-cause
    /// attributes, clear them, and trigger any notification the backend
    /// owes its upper layer.  Called from the driver's event loop with
    /// the bus held.
    fn switch_irq_handler(&self) -> UalResult<()>;

    /// Read back the complete programmed LUT/mask state.  Diagnostic
    /// only; never mutates.
    fn dump_routing_table(&self) -> UalResult<RoutingSnapshot>;

    /// Register with the backend to receive `SwitchEvent`s when the
    /// hardware interrupt line fires.
    fn register_irq_handler(
        &self,
        events: tokio::sync::mpsc::UnboundedSender<SwitchEvent>,
    ) -> UalResult<()>;

    /// Identifiers of the switch silicon being managed.
    fn identifiers(&self) -> UalResult<impl SwitchIdentifiers>;
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The in-memory register model backing the stub switch.
//!
//! Registers are sparse: a read of an attribute nobody has written
//! returns zero, which is what the real silicon reports for the bulk of
//! its id space after reset.  LUT entries default to the invalid port.

use std::collections::BTreeMap;

use common::ports::{PortId, INVALID_PORT, SWITCH_PORT_MAX};
use ual::{RoutingEntry, RoutingSnapshot};

/// Which side of a link an attribute access addressed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttrScope {
    Local,
    Peer,
}

/// One recorded attribute write, kept in the journal so tests can assert
/// the exact sequence of hardware writes an operation produced.
#[derive(Clone, Copy, Debug)]
pub struct DmeWrite {
    pub scope: AttrScope,
    pub port: PortId,
    pub attr: u16,
    pub selector: u16,
    pub value: u32,
}

/// One recorded routing write (LUT entry or acceptance mask), journaled
/// separately from the attribute writes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteWrite {
    Mask { port: PortId, mask: u8 },
    Lut { port: PortId, addr: u8, dest: u8 },
}

#[derive(Default)]
pub(crate) struct RegFile {
    // (port, attr, selector) -> value, for each side of the links
    local: BTreeMap<(u8, u16, u16), u32>,
    peer: BTreeMap<(u8, u16, u16), u32>,
    switch: BTreeMap<u16, u32>,
    lut: BTreeMap<(u8, u8), u8>,
    masks: BTreeMap<u8, u8>,
    // internal cport -> (peer cport, dis, irt)
    id_routes: BTreeMap<u8, (u8, bool, bool)>,
}

impl RegFile {
    pub fn local_get(&self, port: PortId, attr: u16, sel: u16) -> u32 {
        *self
            .local
            .get(&(port.as_u8(), attr, sel))
            .unwrap_or(&0)
    }

    pub fn local_set(&mut self, port: PortId, attr: u16, sel: u16, val: u32) {
        self.local.insert((port.as_u8(), attr, sel), val);
    }

    pub fn peer_get(&self, port: PortId, attr: u16, sel: u16) -> u32 {
        *self.peer.get(&(port.as_u8(), attr, sel)).unwrap_or(&0)
    }

    pub fn peer_set(&mut self, port: PortId, attr: u16, sel: u16, val: u32) {
        self.peer.insert((port.as_u8(), attr, sel), val);
    }

    pub fn switch_get(&self, attr: u16) -> u32 {
        *self.switch.get(&attr).unwrap_or(&0)
    }

    pub fn switch_set(&mut self, attr: u16, val: u32) {
        self.switch.insert(attr, val);
    }

    pub fn lut_get(&self, port: PortId, addr: u8) -> u8 {
        *self
            .lut
            .get(&(port.as_u8(), addr))
            .unwrap_or(&INVALID_PORT)
    }

    pub fn lut_set(&mut self, port: PortId, addr: u8, dest: u8) {
        self.lut.insert((port.as_u8(), addr), dest);
    }

    pub fn mask_get(&self, port: PortId) -> u8 {
        *self.masks.get(&port.as_u8()).unwrap_or(&0)
    }

    pub fn mask_set(&mut self, port: PortId, mask: u8) {
        self.masks.insert(port.as_u8(), mask);
    }

    pub fn id_route_set(
        &mut self,
        cport: u8,
        peer_cport: u8,
        dis: bool,
        irt: bool,
    ) {
        self.id_routes.insert(cport, (peer_cport, dis, irt));
    }

    /// Build the diagnostic view of all programmed routing state.
    pub fn routing_snapshot(&self) -> RoutingSnapshot {
        let entries = self
            .lut
            .iter()
            .filter(|(_, dest)| **dest != INVALID_PORT)
            .map(|((port, addr), dest)| RoutingEntry {
                // Keys only enter the map through PortId-typed setters.
                port: PortId::new(*port).unwrap(),
                addr: *addr,
                dest: *dest,
            })
            .collect();
        let masks = self
            .masks
            .iter()
            .filter(|(port, mask)| **mask != 0 && **port < SWITCH_PORT_MAX)
            .map(|(port, mask)| (PortId::new(*port).unwrap(), *mask))
            .collect();
        RoutingSnapshot { entries, masks }
    }
}

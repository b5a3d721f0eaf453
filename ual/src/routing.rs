// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use std::fmt;

use common::ports::PortId;

/// One programmed LUT entry: frames addressed to `addr` arriving on
/// `port` are forwarded to `dest`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoutingEntry {
    pub port: PortId,
    pub addr: u8,
    pub dest: u8,
}

/// A read-back of all programmed routing state, produced by
/// `dump_routing_table`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RoutingSnapshot {
    /// Every LUT entry holding a valid destination.
    pub entries: Vec<RoutingEntry>,
    /// (port, mask) pairs for every port with a non-zero acceptance mask.
    pub masks: Vec<(PortId, u8)>,
}

impl fmt::Display for RoutingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for e in &self.entries {
            writeln!(
                f,
                "port {} addr {} -> port {}",
                e.port, e.addr, e.dest
            )?;
        }
        for (port, mask) in &self.masks {
            writeln!(f, "port {} mask {:#04x}", port, mask)?;
        }
        Ok(())
    }
}

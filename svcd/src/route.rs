// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Device-id assignment and routing LUT management.
//!
//! Each attached device gets a logical device id, programmed into the
//! peer's L3 attributes and recorded here.  Routing between two devices
//! is symmetric: one LUT entry and one acceptance-mask bit in each
//! direction, so a route always comes to exactly four hardware writes.

use std::collections::BTreeMap;

use slog::{debug, info};

use crate::types::{SvcdError, SvcdResult};
use crate::Switch;
use common::ports::{DeviceId, PortId, SWITCH_DEVICE_ID};
use ual::dme;
use ual::{RoutingSnapshot, SwitchOps};

/// The driver's record of device-id assignments, keyed by port.  The
/// internal port is permanently bound to [`SWITCH_DEVICE_ID`].
pub struct DeviceMap {
    by_port: BTreeMap<PortId, DeviceId>,
}

impl DeviceMap {
    pub fn new() -> Self {
        let mut by_port = BTreeMap::new();
        by_port.insert(PortId::internal(), SWITCH_DEVICE_ID);
        DeviceMap { by_port }
    }

    pub fn device_for(&self, port: PortId) -> Option<DeviceId> {
        self.by_port.get(&port).copied()
    }

    pub fn port_for(&self, dev: DeviceId) -> Option<PortId> {
        self.by_port
            .iter()
            .find(|(_, d)| **d == dev)
            .map(|(p, _)| *p)
    }

    fn assign(&mut self, port: PortId, dev: DeviceId) -> SvcdResult<()> {
        if let Some(d) = self.by_port.get(&port) {
            if *d != dev {
                return Err(SvcdError::Exists(format!(
                    "port {port} already has device id {d}"
                )));
            }
            return Ok(());
        }
        if let Some(p) = self.port_for(dev) {
            return Err(SvcdError::Exists(format!(
                "device id {dev} already assigned to port {p}"
            )));
        }
        self.by_port.insert(port, dev);
        Ok(())
    }

    pub fn all(&self) -> Vec<(PortId, DeviceId)> {
        self.by_port.iter().map(|(p, d)| (*p, *d)).collect()
    }
}

impl Default for DeviceMap {
    fn default() -> Self {
        DeviceMap::new()
    }
}

impl Switch {
    /// Program one LUT entry on `port`.
    pub fn lut_set(
        &self,
        port: PortId,
        addr: u8,
        dest: PortId,
    ) -> SvcdResult<()> {
        let _bus = self.ncp();
        Ok(self.hdl.lut_set(port, addr, dest)?)
    }

    /// Read one LUT entry on `port`.
    pub fn lut_get(&self, port: PortId, addr: u8) -> SvcdResult<u8> {
        let _bus = self.ncp();
        Ok(self.hdl.lut_get(port, addr)?)
    }

    /// Program `port`'s device-id acceptance mask.
    pub fn dev_id_mask_set(&self, port: PortId, mask: u8) -> SvcdResult<()> {
        let _bus = self.ncp();
        Ok(self.hdl.dev_id_mask_set(port, mask)?)
    }

    /// Read `port`'s device-id acceptance mask.
    pub fn dev_id_mask_get(&self, port: PortId) -> SvcdResult<u8> {
        let _bus = self.ncp();
        Ok(self.hdl.dev_id_mask_get(port)?)
    }

    /// Assign `dev` to the device attached behind `port`: program the
    /// peer's L3 device id, mark it valid, and record the binding.
    pub fn if_dev_id_set(
        &self,
        port: PortId,
        dev: DeviceId,
    ) -> SvcdResult<()> {
        if port.is_internal() {
            if dev != SWITCH_DEVICE_ID {
                return Err(SvcdError::Invalid(format!(
                    "the internal port is fixed at device id \
                     {SWITCH_DEVICE_ID}, not {dev}"
                )));
            }
            // nothing to program: the binding is baked into the silicon
            return Ok(());
        }
        self.devices.lock().unwrap().assign(port, dev)?;
        self.dme_peer_set(
            port,
            dme::N_DEVICEID,
            dme::NCP_SELINDEX_NULL,
            dev.as_u8() as u32,
        )?;
        self.dme_peer_set(
            port,
            dme::N_DEVICEIDVALID,
            dme::NCP_SELINDEX_NULL,
            1,
        )?;
        info!(self.log, "assigned device id";
            "port" => %port, "device_id" => %dev);
        Ok(())
    }

    /// Open the fabric between two devices.  Frames entering `port_a`
    /// addressed to `dev_b` leave on `port_b`, and vice versa; the
    /// acceptance mask on each side learns the opposite device's bit.
    ///
    /// The mask updates are read-modify-write, so routes already
    /// established through either port survive.  The write order is
    /// fixed: mask a, mask b, LUT a, LUT b.
    pub fn setup_routing_table(
        &self,
        dev_a: DeviceId,
        port_a: PortId,
        dev_b: DeviceId,
        port_b: PortId,
    ) -> SvcdResult<()> {
        let mask = self.dev_id_mask_get(port_a)?;
        self.dev_id_mask_set(port_a, mask | dev_b.mask_bit())?;
        let mask = self.dev_id_mask_get(port_b)?;
        self.dev_id_mask_set(port_b, mask | dev_a.mask_bit())?;
        self.lut_set(port_a, dev_b.as_u8(), port_b)?;
        self.lut_set(port_b, dev_a.as_u8(), port_a)?;
        debug!(self.log, "routing established";
            "dev_a" => %dev_a, "port_a" => %port_a,
            "dev_b" => %dev_b, "port_b" => %port_b);
        Ok(())
    }

    /// Read back all programmed routing state.
    pub fn dump_routing(&self) -> SvcdResult<RoutingSnapshot> {
        let _bus = self.ncp();
        Ok(self.hdl.dump_routing_table()?)
    }
}

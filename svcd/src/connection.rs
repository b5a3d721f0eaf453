// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! End-to-end connection establishment.
//!
//! A connection binds a cport behind one port to a cport behind another:
//! the fabric route between the ports is opened, then each endpoint's L4
//! attributes are programmed (peer device id, peer cport, traffic class,
//! flags) and the connection state is set to connected.  Both ports must
//! already carry a device-id assignment.  Endpoints on the internal port
//! are the switch's own, and are bound through the id routing table
//! instead of peer attribute writes.

use slog::info;

use crate::types::{SvcdError, SvcdResult};
use crate::Switch;
use common::ports::{CportId, DeviceId, PortId, TrafficClass};
use ual::dme;
use ual::SwitchOps;

impl Switch {
    /// Create a connection between two cports with explicit traffic
    /// class and cport flags.  Device-id assignment must precede this:
    /// a port with no assigned id cannot be routed to.
    pub fn connection_create(
        &self,
        port_a: PortId,
        cport_a: CportId,
        port_b: PortId,
        cport_b: CportId,
        tc: TrafficClass,
        flags: u32,
    ) -> SvcdResult<()> {
        if port_a == port_b {
            return Err(SvcdError::Invalid(format!(
                "cannot connect port {port_a} to itself"
            )));
        }
        let (dev_a, dev_b) = {
            let devices = self.devices.lock().unwrap();
            let dev_a = devices.device_for(port_a).ok_or_else(|| {
                SvcdError::Missing(format!(
                    "no device id assigned to port {port_a}"
                ))
            })?;
            let dev_b = devices.device_for(port_b).ok_or_else(|| {
                SvcdError::Missing(format!(
                    "no device id assigned to port {port_b}"
                ))
            })?;
            (dev_a, dev_b)
        };

        self.setup_routing_table(dev_a, port_a, dev_b, port_b)?;
        self.create_cport(port_a, cport_a, dev_b, cport_b, tc, flags)?;
        self.create_cport(port_b, cport_b, dev_a, cport_a, tc, flags)?;

        info!(self.log, "connection established";
            "a" => format!("{port_a}:{cport_a}"),
            "b" => format!("{port_b}:{cport_b}"),
            "tc" => %tc,
            "flags" => format!("{flags:#x}"));
        Ok(())
    }

    /// Create a standard connection: TC0, no end-to-end flow control,
    /// CSD and CSV disabled.
    pub fn connection_std_create(
        &self,
        port_a: PortId,
        cport_a: CportId,
        port_b: PortId,
        cport_b: CportId,
    ) -> SvcdResult<()> {
        self.connection_create(
            port_a,
            cport_a,
            port_b,
            cport_b,
            TrafficClass::Tc0,
            dme::CPORT_FLAGS_CSD_N | dme::CPORT_FLAGS_CSV_N,
        )
    }

    // Program one endpoint of a connection.  The L4 attributes are
    // selector-indexed by the local cport.
    fn create_cport(
        &self,
        port: PortId,
        cport: CportId,
        peer_dev: DeviceId,
        peer_cport: CportId,
        tc: TrafficClass,
        flags: u32,
    ) -> SvcdResult<()> {
        let sel = cport.as_u8() as u16;
        if port.is_internal() {
            // the switch's own endpoint: bind the cport pair in the id
            // routing table, then program our local transport attributes
            {
                let _bus = self.ncp();
                self.hdl.switch_id_set(cport, peer_cport, false, true)?;
            }
            self.dme_set(
                port,
                dme::T_PEERDEVICEID,
                sel,
                peer_dev.as_u8() as u32,
            )?;
            self.dme_set(
                port,
                dme::T_PEERCPORTID,
                sel,
                peer_cport.as_u8() as u32,
            )?;
            self.dme_set(port, dme::T_TRAFFICCLASS, sel, tc.into())?;
            self.dme_set(port, dme::T_CPORTFLAGS, sel, flags)?;
            self.dme_set(
                port,
                dme::T_CONNECTIONSTATE,
                sel,
                dme::T_CONNECTIONSTATE_CONNECTED,
            )?;
        } else {
            self.dme_peer_set(
                port,
                dme::T_PEERDEVICEID,
                sel,
                peer_dev.as_u8() as u32,
            )?;
            self.dme_peer_set(
                port,
                dme::T_PEERCPORTID,
                sel,
                peer_cport.as_u8() as u32,
            )?;
            self.dme_peer_set(port, dme::T_TRAFFICCLASS, sel, tc.into())?;
            self.dme_peer_set(port, dme::T_CPORTFLAGS, sel, flags)?;
            self.dme_peer_set(
                port,
                dme::T_CONNECTIONSTATE,
                sel,
                dme::T_CONNECTIONSTATE_CONNECTED,
            )?;
        }
        Ok(())
    }
}

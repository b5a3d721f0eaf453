// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Identifiers for switch ports, cports, and attached devices.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Number of external ports, excluding the internal switch port.
pub const SWITCH_UNIPORT_MAX: u8 = 14;

/// Number of ports, including the internal switch port.
pub const SWITCH_PORT_MAX: u8 = SWITCH_UNIPORT_MAX + 1;

/// Number of cports available on each port.
pub const CPORT_MAX: u8 = 32;

/// Size of the device-id space.  Bounded by the width of the per-port
/// device-id acceptance mask, which is 8 bits on this switch family.
pub const DEVICE_ID_MAX: u8 = 8;

/// A destination that has never been programmed into the routing LUT.
pub const INVALID_PORT: u8 = 0xff;

/// A switch port, identifying one link in/out of the switch fabric.
///
/// Ports `0..SWITCH_UNIPORT_MAX` are external; `PortId::internal()` is the
/// switch's own control port.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct PortId(u8);

impl PortId {
    pub fn new(id: u8) -> Result<Self, IdError> {
        if id < SWITCH_PORT_MAX {
            Ok(PortId(id))
        } else {
            Err(IdError::BadPort(id))
        }
    }

    /// The switch's internal port, behind which the switch's own L4
    /// endpoints live.
    pub const fn internal() -> Self {
        PortId(SWITCH_UNIPORT_MAX)
    }

    pub fn is_internal(&self) -> bool {
        self.0 == SWITCH_UNIPORT_MAX
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PortId {
    type Error = IdError;

    fn try_from(id: u8) -> Result<Self, IdError> {
        PortId::new(id)
    }
}

impl From<PortId> for u8 {
    fn from(port: PortId) -> u8 {
        port.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_internal() {
            write!(f, "switch")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for PortId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "switch" {
            return Ok(PortId::internal());
        }
        let id = s.parse::<u8>().map_err(|_| IdError::Unparseable)?;
        PortId::new(id)
    }
}

/// A per-port logical channel endpoint used for the data plane.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct CportId(u8);

impl CportId {
    pub fn new(id: u8) -> Result<Self, IdError> {
        if id < CPORT_MAX {
            Ok(CportId(id))
        } else {
            Err(IdError::BadCport(id))
        }
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CportId {
    type Error = IdError;

    fn try_from(id: u8) -> Result<Self, IdError> {
        CportId::new(id)
    }
}

impl From<CportId> for u8 {
    fn from(cport: CportId) -> u8 {
        cport.0
    }
}

impl fmt::Display for CportId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logical device identifier, bound to a port by the driver and used as
/// the routing LUT lookup address.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct DeviceId(u8);

/// The device id permanently assigned to the switch's internal port.
pub const SWITCH_DEVICE_ID: DeviceId = DeviceId(0);

impl DeviceId {
    pub fn new(id: u8) -> Result<Self, IdError> {
        if id < DEVICE_ID_MAX {
            Ok(DeviceId(id))
        } else {
            Err(IdError::BadDeviceId(id))
        }
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// The bit this device occupies in a port's acceptance mask.
    pub fn mask_bit(&self) -> u8 {
        1 << self.0
    }
}

impl TryFrom<u8> for DeviceId {
    type Error = IdError;

    fn try_from(id: u8) -> Result<Self, IdError> {
        DeviceId::new(id)
    }
}

impl From<DeviceId> for u8 {
    fn from(dev: DeviceId) -> u8 {
        dev.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UniPro traffic classes usable by a connection.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrafficClass {
    #[default]
    Tc0,
    Tc1,
}

impl From<TrafficClass> for u32 {
    fn from(tc: TrafficClass) -> u32 {
        match tc {
            TrafficClass::Tc0 => 0,
            TrafficClass::Tc1 => 1,
        }
    }
}

impl fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrafficClass::Tc0 => write!(f, "TC0"),
            TrafficClass::Tc1 => write!(f, "TC1"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IdError {
    #[error("no such port: {0}")]
    BadPort(u8),
    #[error("no such cport: {0}")]
    BadCport(u8),
    #[error("device id out of range: {0}")]
    BadDeviceId(u8),
    #[error("unparseable identifier")]
    Unparseable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_bounds() {
        assert!(PortId::new(0).is_ok());
        assert!(PortId::new(SWITCH_PORT_MAX - 1).is_ok());
        assert_eq!(
            PortId::new(SWITCH_PORT_MAX),
            Err(IdError::BadPort(SWITCH_PORT_MAX))
        );
    }

    #[test]
    fn test_internal_port() {
        let p = PortId::internal();
        assert!(p.is_internal());
        assert_eq!(p.as_u8(), SWITCH_UNIPORT_MAX);
        assert_eq!("switch".parse::<PortId>().unwrap(), p);
    }

    #[test]
    fn test_port_parse() {
        let p: PortId = "3".parse().unwrap();
        assert_eq!(p.as_u8(), 3);
        assert!("15".parse::<PortId>().is_err());
        assert!("bogus".parse::<PortId>().is_err());
    }

    #[test]
    fn test_cport_bounds() {
        assert!(CportId::new(CPORT_MAX - 1).is_ok());
        assert_eq!(
            CportId::new(CPORT_MAX),
            Err(IdError::BadCport(CPORT_MAX))
        );
    }

    #[test]
    fn test_device_id_mask_bit() {
        assert_eq!(DeviceId::new(0).unwrap().mask_bit(), 0x01);
        assert_eq!(DeviceId::new(5).unwrap().mask_bit(), 0x20);
        assert!(DeviceId::new(DEVICE_ID_MAX).is_err());
    }
}

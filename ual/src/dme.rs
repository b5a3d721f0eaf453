// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! DME attribute identifiers and result codes.
//!
//! Attribute ids are 16-bit, grouped by UniPro layer: 0x15xx are L1.5
//! (PHY adapter) attributes, 0x30xx are L3 (network), 0x40xx are L4
//! (transport), and 0xD0xx are the Toshiba vendor extensions.  The
//! switch-internal registers (SWVER etc.) share the id space but are only
//! reachable through the switch-attribute operations.

use std::fmt;

/// Selector index for attributes that are not lists.
pub const NCP_SELINDEX_NULL: u16 = 0;

// Switch-internal attributes
pub const SWVER: u16 = 0x0000;
pub const SWSTA: u16 = 0x0003;
pub const SWINT: u16 = 0x0010;

// L1.5 PHY adapter attributes
pub const PA_ACTIVETXDATALANES: u16 = 0x1560;
pub const PA_TXGEAR: u16 = 0x1568;
pub const PA_TXTERMINATION: u16 = 0x1569;
pub const PA_HSSERIES: u16 = 0x156a;
pub const PA_PWRMODE: u16 = 0x1571;
pub const PA_ACTIVERXDATALANES: u16 = 0x1580;
pub const PA_RXGEAR: u16 = 0x1583;
pub const PA_RXTERMINATION: u16 = 0x1584;
pub const PA_PWRMODEUSERDATA0: u16 = 0x15b0;

// L3 network attributes, addressed on the peer device
pub const N_DEVICEID: u16 = 0x3000;
pub const N_DEVICEIDVALID: u16 = 0x3001;

// L4 transport attributes, selector-indexed by cport
pub const T_CONNECTIONSTATE: u16 = 0x4020;
pub const T_PEERDEVICEID: u16 = 0x4021;
pub const T_PEERCPORTID: u16 = 0x4022;
pub const T_TRAFFICCLASS: u16 = 0x4023;
pub const T_CPORTFLAGS: u16 = 0x4025;

/// T_CONNECTIONSTATE value for an established connection.
pub const T_CONNECTIONSTATE_CONNECTED: u32 = 1;

// T_CPORTFLAGS bits
pub const CPORT_FLAGS_E2EFC: u32 = 1 << 0;
pub const CPORT_FLAGS_CSD_N: u32 = 1 << 1;
pub const CPORT_FLAGS_CSV_N: u32 = 1 << 2;

// Toshiba vendor DME attributes
pub const TSB_DME_POWERMODEIND: u16 = 0xd040;
pub const TSB_DME_FC0PROTECTIONTIMEOUTVAL: u16 = 0xd041;
pub const TSB_DME_TC0REPLAYTIMEOUTVAL: u16 = 0xd042;
pub const TSB_DME_AFC0REQTIMEOUTVAL: u16 = 0xd043;
pub const TSB_DME_FC1PROTECTIONTIMEOUTVAL: u16 = 0xd044;
pub const TSB_DME_TC1REPLAYTIMEOUTVAL: u16 = 0xd045;
pub const TSB_DME_AFC1REQTIMEOUTVAL: u16 = 0xd046;

/// TSB_DME_POWERMODEIND value reported once a power mode change has
/// completed successfully.  Zero means no indication yet; anything else
/// is a failure code.
pub const TSB_DME_POWERMODEIND_NONE: u32 = 0;
pub const TSB_DME_POWERMODEIND_SUCCESS: u32 = 2;

/// The protocol result code returned in every NCP attribute confirm.
/// Zero is success; non-zero values are the standard UniPro config
/// result codes.  The raw value is preserved for diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResultCode(pub u32);

impl ResultCode {
    pub const SUCCESS: ResultCode = ResultCode(0);

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self.0 {
            0 => "Success",
            1 => "InvalidMIBAttribute",
            2 => "InvalidMIBAttributeValue",
            3 => "ReadOnlyMIBAttribute",
            4 => "WriteOnlyMIBAttribute",
            5 => "BadIndex",
            6 => "LockedMIBAttribute",
            7 => "PeerCommunicationFailure",
            8 => "Busy",
            9 => "DMEFailure",
            _ => return write!(f, "Unknown({:#x})", self.0),
        };
        write!(f, "{name}")
    }
}

/// The reply to an attribute read: the value together with the protocol
/// result code.  The value is meaningful only when the result code is
/// success.
#[derive(Clone, Copy, Debug)]
pub struct AttrReply {
    pub value: u32,
    pub result: ResultCode,
}

impl AttrReply {
    pub fn success(value: u32) -> Self {
        AttrReply {
            value,
            result: ResultCode::SUCCESS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_names() {
        assert_eq!(ResultCode::SUCCESS.to_string(), "Success");
        assert_eq!(ResultCode(8).to_string(), "Busy");
        assert_eq!(ResultCode(0x20).to_string(), "Unknown(0x20)");
    }

    #[test]
    fn test_success() {
        assert!(ResultCode(0).is_success());
        assert!(!ResultCode(1).is_success());
    }
}

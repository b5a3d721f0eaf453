// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Error types for `svcd`.

use thiserror::Error;

use common::link::LinkCfgError;
use common::ports::{IdError, PortId};
use ual::{ResultCode, UalError};

#[derive(Debug, Error)]
pub enum SvcdError {
    /// An error returned by the switch backend.
    #[error("switch error: {0:?}")]
    Switch(#[from] UalError),
    /// The switch answered an attribute request with a non-success
    /// result code.
    #[error("{ctx}: switch returned {code}")]
    Protocol { ctx: String, code: ResultCode },
    /// A port, cport, or device identifier was out of range.
    #[error("bad identifier: {0}")]
    Id(#[from] IdError),
    /// A link power-mode request failed validation.
    #[error("bad link configuration: {0}")]
    LinkConfig(#[from] LinkCfgError),
    /// A power mode change did not complete successfully.
    #[error("power mode change failed on port {port}: indication {ind:#x}")]
    LinkNegotiation { port: PortId, ind: u32 },
    /// The entity already exists.
    #[error("{0}")]
    Exists(String),
    /// The entity was not found.
    #[error("{0}")]
    Missing(String),
    /// The request is self-inconsistent or out of range.
    #[error("{0}")]
    Invalid(String),
    /// An I/O error on a local file.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),
    /// Any other kind of error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for SvcdError {
    fn from(err: &str) -> Self {
        SvcdError::Other(err.to_string())
    }
}

impl From<String> for SvcdError {
    fn from(err: String) -> Self {
        SvcdError::Other(err)
    }
}

pub type SvcdResult<T> = Result<T, SvcdError>;

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Concrete switch backends carrying the native command protocol (NCP)
//! to a particular switch family.  The driver binds to whichever backend
//! the build selects; the `plat` alias keeps the driver source free of
//! per-family types.

#[cfg(not(any(feature = "tsb_stub")))]
compile_error! {"must set the tsb_stub feature"}

use uuid::Uuid;

/// Identifiers are used to uniquely identify a switch chip.
#[derive(Debug, Clone)]
pub struct Identifiers {
    /// Unique identifier for the chip.
    id: Uuid,
    /// Backend (compile target) responsible for these identifiers.
    backend: String,
    /// Silicon revision, if the backend can read it.
    silicon_rev: Option<u8>,
}

impl Default for Identifiers {
    fn default() -> Self {
        Identifiers {
            id: Uuid::new_v4(),
            backend: "unknown".to_string(),
            silicon_rev: None,
        }
    }
}

impl ual::SwitchIdentifiers for Identifiers {
    fn id(&self) -> Uuid {
        self.id
    }

    fn backend(&self) -> &str {
        &self.backend
    }

    fn silicon_rev(&self) -> Option<u8> {
        self.silicon_rev
    }
}

#[cfg(feature = "tsb_stub")]
pub mod tsb_stub;
#[cfg(feature = "tsb_stub")]
mod plat {
    pub use super::tsb_stub::BackendConfig;
    pub use super::tsb_stub::StubHandle as Handle;
}

pub use plat::BackendConfig;
pub use plat::Handle;

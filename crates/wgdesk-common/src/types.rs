// ============================================
// File: crates/wgdesk-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! A peer's tunnel address doubles as its primary key. `PeerId` wraps the
//! numeric (network byte order) value of that IPv4 address so the two
//! can never drift apart.
//!
//! ## Main Functionality
//! - `PeerId`: unique peer key and tunnel address
//! - Parsing from dotted IPv4 or integer form
//! - Serialized as a bare JSON integer
//!
//! ## ⚠️ Important Note for Next Developer
//! - The persisted registry stores `id` as an integer; keep
//!   `#[serde(transparent)]`
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================
// PeerId
// ============================================

/// Identifier of a registered peer, equal to its IPv4 tunnel address.
///
/// # Example
/// ```
/// use std::net::Ipv4Addr;
/// use wgdesk_common::PeerId;
///
/// let id: PeerId = "10.0.0.5".parse().unwrap();
/// assert_eq!(id.addr(), Ipv4Addr::new(10, 0, 0, 5));
/// assert_eq!(id, "167772165".parse().unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(u32);

impl PeerId {
    /// Creates a `PeerId` from its integer form.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    /// Returns the integer form.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the tunnel address this id stands for.
    #[must_use]
    pub fn addr(self) -> Ipv4Addr {
        Ipv4Addr::from(self.0)
    }
}

impl From<Ipv4Addr> for PeerId {
    fn from(addr: Ipv4Addr) -> Self {
        Self(u32::from(addr))
    }
}

impl From<PeerId> for Ipv4Addr {
    fn from(id: PeerId) -> Self {
        id.addr()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr())
    }
}

impl FromStr for PeerId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<Ipv4Addr>() {
            return Ok(Self::from(addr));
        }
        s.parse::<u32>()
            .map(Self)
            .map_err(|_| CommonError::InvalidPeerId { input: s.to_string() })
    }
}

// ============================================
// File: crates/wgdesk-common/src/net.rs
// ============================================
//! # IPv4 Address Pools
//!
//! ## Creation Reason
//! Peer addresses are drawn from a single configured CIDR block. This
//! module owns the arithmetic over that block so the allocator, the
//! renderer and the registry agree on every bound.
//!
//! ## Address Layout
//! ```text
//! network   network+1   network+2 ........ broadcast-1   broadcast
//!    │          │           │                   │             │
//! reserved   server     first peer          last peer     reserved
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Host bits must be zero (`10.0.0.5/24` is rejected, not truncated)
//! - Prefixes above /30 parse fine but have no peer candidates
//!
//! ## Last Modified
//! v0.1.0 - Initial pool arithmetic

use std::fmt;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CommonError, Result};
use crate::types::PeerId;

// ============================================
// Ipv4Pool
// ============================================

/// A CIDR block from which peer addresses are assigned.
///
/// # Example
/// ```
/// use std::net::Ipv4Addr;
/// use wgdesk_common::Ipv4Pool;
///
/// let pool: Ipv4Pool = "10.0.0.0/24".parse().unwrap();
/// assert_eq!(pool.host_address(), Ipv4Addr::new(10, 0, 0, 1));
/// assert_eq!(pool.broadcast(), Ipv4Addr::new(10, 0, 0, 255));
/// assert_eq!(pool.candidate_count(), 253);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Pool {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Pool {
    /// Creates a pool from a network address and prefix length.
    ///
    /// # Errors
    /// Returns `InvalidCidr` if the prefix exceeds 32 or the network
    /// address has host bits set.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        let display = format!("{network}/{prefix_len}");
        if prefix_len > 32 {
            return Err(CommonError::invalid_cidr(
                display,
                "prefix length cannot exceed 32",
            ));
        }

        let pool = Self {
            network,
            prefix_len,
        };
        if u32::from(network) & !pool.netmask_bits() != 0 {
            return Err(CommonError::invalid_cidr(display, "has host bits set"));
        }

        Ok(pool)
    }

    fn netmask_bits(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix_len))
        }
    }

    /// Returns the network address.
    #[must_use]
    pub const fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the netmask.
    #[must_use]
    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.netmask_bits())
    }

    /// Returns the broadcast address.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !self.netmask_bits())
    }

    /// Returns the server's own address, `network + 1`.
    ///
    /// Only meaningful for prefixes up to /30.
    #[must_use]
    pub fn host_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network).wrapping_add(1))
    }

    /// Returns the inclusive range of integers assignable to peers,
    /// `[network + 2, broadcast - 1]`, or `None` when the block is too
    /// small to hold any peer.
    #[must_use]
    pub fn candidate_range(&self) -> Option<RangeInclusive<u32>> {
        let first = u64::from(u32::from(self.network)) + 2;
        let last = u64::from(u32::from(self.broadcast())).checked_sub(1)?;
        if first > last {
            return None;
        }
        // Both bounds lie within the block, so they fit in u32.
        Some(u32::try_from(first).ok()?..=u32::try_from(last).ok()?)
    }

    /// Returns how many peer addresses the pool can hold.
    #[must_use]
    pub fn candidate_count(&self) -> u32 {
        self.candidate_range()
            .map_or(0, |range| range.end() - range.start() + 1)
    }

    /// Returns `true` if `addr` lies anywhere in the block.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.netmask_bits() == u32::from(self.network)
    }

    /// Returns `true` if `id` is a valid peer address in this pool.
    #[must_use]
    pub fn is_candidate(&self, id: PeerId) -> bool {
        self.candidate_range()
            .is_some_and(|range| range.contains(&id.as_u32()))
    }
}

impl fmt::Display for Ipv4Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for Ipv4Pool {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| CommonError::invalid_cidr(s, "must be in CIDR notation"))?;

        let network: Ipv4Addr = addr
            .parse()
            .map_err(|_| CommonError::invalid_cidr(s, "invalid network address"))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|_| CommonError::invalid_cidr(s, "invalid prefix length"))?;

        Self::new(network, prefix_len)
    }
}

impl Serialize for Ipv4Pool {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Pool {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(s: &str) -> Ipv4Pool {
        s.parse().unwrap()
    }

    #[test]
    fn test_slash_24_bounds() {
        let p = pool("10.0.0.0/24");
        assert_eq!(p.network(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(p.netmask(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(p.broadcast(), Ipv4Addr::new(10, 0, 0, 255));
        assert_eq!(p.host_address(), Ipv4Addr::new(10, 0, 0, 1));

        let range = p.candidate_range().unwrap();
        assert_eq!(Ipv4Addr::from(*range.start()), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(Ipv4Addr::from(*range.end()), Ipv4Addr::new(10, 0, 0, 254));
        assert_eq!(p.candidate_count(), 253);
    }

    #[test]
    fn test_small_pools() {
        assert_eq!(pool("10.0.0.0/30").candidate_count(), 1);
        assert_eq!(pool("10.0.0.0/31").candidate_count(), 0);
        assert_eq!(pool("10.0.0.0/32").candidate_count(), 0);
        assert!(pool("10.0.0.0/32").candidate_range().is_none());
    }

    #[test]
    fn test_whole_address_space() {
        let p = pool("0.0.0.0/0");
        assert_eq!(p.broadcast(), Ipv4Addr::BROADCAST);
        assert_eq!(p.candidate_count(), u32::MAX - 2);
    }

    #[test]
    fn test_rejects_host_bits() {
        let err = "10.0.0.5/24".parse::<Ipv4Pool>().unwrap_err();
        assert!(err.to_string().contains("host bits"));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("10.0.0.0".parse::<Ipv4Pool>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Pool>().is_err());
        assert!("10.0.0/24".parse::<Ipv4Pool>().is_err());
        assert!("10.0.0.0/x".parse::<Ipv4Pool>().is_err());
    }

    #[test]
    fn test_membership() {
        let p = pool("192.168.4.0/22");
        assert!(p.contains(Ipv4Addr::new(192, 168, 7, 255)));
        assert!(!p.contains(Ipv4Addr::new(192, 168, 8, 0)));

        assert!(p.is_candidate(Ipv4Addr::new(192, 168, 4, 2).into()));
        assert!(p.is_candidate(Ipv4Addr::new(192, 168, 7, 254).into()));
        assert!(!p.is_candidate(Ipv4Addr::new(192, 168, 4, 1).into()));
        assert!(!p.is_candidate(Ipv4Addr::new(192, 168, 7, 255).into()));
    }

    #[test]
    fn test_serde_as_string() {
        let p = pool("10.8.0.0/16");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"10.8.0.0/16\"");
        let back: Ipv4Pool = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}

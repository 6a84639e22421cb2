// ============================================
// File: crates/wgdesk-core/src/allocator.rs
// ============================================
//! # Address Allocator
//!
//! ## Creation Reason
//! Picks an unused tunnel address for a new peer. Addresses are chosen
//! at random so that ids do not leak how many peers exist, but the
//! search is bounded so a full pool fails instead of spinning.
//!
//! ## Allocation Strategy
//! ```text
//! candidates = [network + 2, broadcast - 1]
//!
//!   start = random offset in candidates
//!   scan start, start+1, ... wrapping once around the range
//!   first address not in `taken` wins
//!   full pass with no hit → PoolExhausted
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Pure function of its inputs plus the RNG; no state, no I/O
//! - `taken` must cover ALL owners; addresses are globally unique
//!
//! ## Last Modified
//! v0.1.0 - Initial allocator

use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, warn};

use wgdesk_common::{Ipv4Pool, PeerId};

use crate::error::{CoreError, Result};

/// Allocates a free peer address from `pool` using the thread RNG.
///
/// # Errors
/// Returns `PoolExhausted` if every candidate address is in `taken`.
pub fn allocate(pool: &Ipv4Pool, taken: &HashSet<PeerId>) -> Result<PeerId> {
    allocate_with(pool, taken, &mut rand::thread_rng())
}

/// Allocates a free peer address from `pool` using `rng` for the
/// starting offset.
///
/// # Errors
/// Returns `PoolExhausted` if every candidate address is in `taken`.
pub fn allocate_with<R: Rng>(
    pool: &Ipv4Pool,
    taken: &HashSet<PeerId>,
    rng: &mut R,
) -> Result<PeerId> {
    let capacity = pool.candidate_count();
    let exhausted = || CoreError::PoolExhausted {
        pool: pool.to_string(),
        capacity,
    };

    let Some(range) = pool.candidate_range() else {
        warn!("Pool {} has no assignable peer addresses", pool);
        return Err(exhausted());
    };

    let first = *range.start();
    let start = rng.gen_range(0..capacity);

    for step in 0..capacity {
        // `(start + step) % capacity` without overflowing near u32::MAX.
        let offset = if start >= capacity - step {
            start - (capacity - step)
        } else {
            start + step
        };
        let candidate = PeerId::from_u32(first + offset);

        if !taken.contains(&candidate) {
            debug!("Allocated {} ({} of {} in use)", candidate, taken.len() + 1, capacity);
            return Ok(candidate);
        }
    }

    warn!("Pool {} exhausted ({} addresses in use)", pool, capacity);
    Err(exhausted())
}

// ============================================
// Tests
// ============================================

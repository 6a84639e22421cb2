// ============================================
// File: crates/wgdesk-common/src/lib.rs
// ============================================
//! # wgdesk Common - Shared Types Library
//!
//! ## Creation Reason
//! Provides the foundational types shared by every wgdesk crate, so that
//! peer identifiers and address pools have exactly one representation.
//!
//! ## Main Functionality
//! - [`types`]: `PeerId`, the IPv4-address-as-integer peer key
//! - [`net`]: `Ipv4Pool`, CIDR parsing and address bounds
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 wgdesk-server                       │
//! │                      │                              │
//! │                      ▼                              │
//! │                 wgdesk-core                         │
//! │                      │                              │
//! │                      ▼                              │
//! │                wgdesk-common  ◄── You are here      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - `PeerId` is persisted as a bare integer; never change its serde form
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod net;
pub mod types;

pub use error::{CommonError, Result};
pub use net::Ipv4Pool;
pub use types::PeerId;

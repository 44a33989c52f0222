//! # Shared Protocol Definitions (agent ↔ controller)
//!
//! Constants and framing shared by the in-process agent and the operator
//! console. Both ends speak the same symmetric protocol over a single duplex
//! stream, so everything here is direction-agnostic.
//!
//! ## Frame Layout
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────┐
//! │ length (8 ASCII hex, UC) │ body (exactly `length` bytes)│
//! └──────────────────────────┴──────────────────────────────┘
//!   "0000000C"                 "mode collect"
//! ```
//!
//! There is no trailing delimiter. A reader that cannot obtain a complete
//! header, or gets fewer body bytes than declared, treats the channel as dead.
//!
//! ## Key Types
//!
//! - [`FrameStream`] - Blocking whole-frame send/receive over any `Read + Write`
//! - [`WireError`] - Encoding and transport failures

pub mod wire;

pub use wire::{decode_header, encode_frame, read_frame, write_frame, FrameStream, WireError};

// ============================================================================
// Protocol Constants
// ============================================================================

/// Length of the ASCII hex length header that prefixes every frame.
pub const HEADER_LEN: usize = 8;

/// Largest body a single frame can describe (eight hex digits).
pub const MAX_BODY_LEN: u64 = 0xFFFF_FFFF;

/// TCP port the agent listens on when none is configured.
pub const DEFAULT_PORT: u16 = 8022;

/// First frame sent by the agent after a controller connects.
///
/// The target is frozen at this point and stays frozen until the operator
/// issues `unfreeze`.
pub const GREETING: &str =
    "hello from findspot 1.0\ntarget frozen, type unfreeze to continue execution";

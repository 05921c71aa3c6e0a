//! # Helix DVFS Policy Resolver
//!
//! Boot-time resolution of dynamic voltage and frequency scaling (DVFS)
//! operating points for a multi-rail SoC.
//!
//! Each independently regulated rail (CPU, core logic, GPU) gets a single
//! nominal voltage chosen from silicon characterization data, and every clock
//! domain powered by that rail is bound to a rate-to-voltage table so that the
//! clock framework can never raise a clock above what the rail currently
//! delivers.
//!
//! ## Resolution Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          DVFS INITIALIZATION PASS                           │
//! │                                                                             │
//! │   SiliconIdentity ──▶ speedo / process ids                                  │
//! │          │                                                                  │
//! │          ▼                                                                  │
//! │  ┌────────────────┐    ┌────────────────┐                                   │
//! │  │ Characterizat. │───▶│ Curve Compactor│───▶ CPU table + DFLL data         │
//! │  │    Resolver    │    └────────────────┘            │                      │
//! │  └────────────────┘                                  ▼                      │
//! │                                           ┌──────────────────────┐          │
//! │   core ladder + EDP limit ───────────────▶│ Nominal Point        │          │
//! │                                           │ Selector             │          │
//! │   core nominal ──▶ GPU bound ────────────▶│  core ─▶ cpu ─▶ gpu  │          │
//! │                                           └──────────┬───────────┘          │
//! │                                                      │ nominal indices      │
//! │                                                      ▼                      │
//! │                                           ┌──────────────────────┐          │
//! │   ClockTree ◀── max rates / tables ───────│    Domain Binder     │          │
//! │                                           └──────────────────────┘          │
//! │                                                      │                      │
//! │                                                      ▼                      │
//! │                                             PowerDomainContext              │
//! │                                       (rails, bound tables, toggles)        │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rails
//!
//! | Rail     | Nominal source                          | On failure            |
//! |----------|-----------------------------------------|-----------------------|
//! | VDD_CORE | core ladder vs. speedo target and EDP   | rail disabled, idx 0  |
//! | VDD_CPU  | top step of the compacted CVB curve     | initialization aborts |
//! | VDD_GPU  | GPU ladder bounded by core nominal      | rail disabled, idx 0  |
//!
//! ## Invariants
//!
//! 1. A rail's nominal voltage is written exactly once per boot and always
//!    lies within the rail's `[min_mv, max_mv]` window.
//! 2. The core rail is resolved before the GPU rail.
//! 3. After initialization, the only mutable state is each rail's
//!    enabled/disabled flag, guarded by that rail's lock.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

// =============================================================================
// EXTERNAL DEPENDENCIES
// =============================================================================

extern crate alloc;

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Error types and propagation helpers
pub mod error;

/// Voltage rails and their scaling state
pub mod rail;

/// Contracts of the external clock, identity and regulator services
pub mod platform;

/// Per-clock-domain voltage/frequency tables
pub mod table;

/// Silicon characterization lookup and the quadratic voltage model
pub mod characterization;

/// Characterization curve compaction
pub mod compactor;

/// Per-rail nominal operating point selection
pub mod nominal;

/// Clock-domain binding
pub mod binder;

/// Runtime scaling toggles
pub mod toggle;

/// Build-time and chip configuration
pub mod config;

/// Power domain context
pub mod context;

/// Initialization pass
pub mod init;

/// Chip data sets
pub mod chips {
    /// Tegra12 family
    pub mod tegra12;
}

#[cfg(test)]
mod mock;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use config::{ChipConfig, DvfsConfig};
pub use context::{ContextBuilder, PowerDomainContext};
pub use error::{DvfsError, DvfsResult, ErrorKind};
pub use init::{init_dvfs, InitReport, PlatformServices, RailReport};
pub use rail::{Rail, RailDescriptor, RailFlags, RailId};
pub use table::{ChipMatch, DvfsTable, DvfsTemplate};
pub use toggle::ScalingToggle;

// =============================================================================
// UNITS AND CONSTANTS
// =============================================================================

/// Voltage in millivolts
pub type Millivolts = u32;

/// Frequency in hertz
pub type Hertz = u64;

/// Kilohertz multiplier
pub const KHZ: u64 = 1_000;

/// Megahertz multiplier
pub const MHZ: u64 = 1_000_000;

/// Maximum number of steps in any voltage/frequency table
pub const MAX_DVFS_FREQS: usize = 40;

/// Wildcard value for speedo and process ids in table predicates
pub const ANY_ID: i32 = -1;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

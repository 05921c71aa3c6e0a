//! # Silicon Characterization
//!
//! CVB (core voltage binning) tables describe, per chip speedo id, the
//! voltage each CPU frequency needs as a quadratic function of the measured
//! silicon speed:
//!
//! ```text
//!   mV(f) = c0(f) + c1(f) * speedo + c2(f) * speedo^2
//! ```
//!
//! The resolved voltage is rounded up to the regulator's 12.5 mV grid.

use crate::error::{DvfsResult, ErrorKind};
use crate::{dvfs_bail, Millivolts};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Voltage grid of CVB results, in half-millivolts
const CVB_GRID_HALF_MV: i64 = 25;

// =============================================================================
// TABLES
// =============================================================================

/// One characterization row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CvbRow {
    /// CPU frequency in MHz
    pub freq_mhz: u64,
    /// Constant coefficient
    pub c0: i32,
    /// Linear coefficient
    pub c1: i32,
    /// Quadratic coefficient
    pub c2: i32,
}

impl CvbRow {
    /// Create a row
    pub const fn new(freq_mhz: u64, c0: i32, c1: i32, c2: i32) -> Self {
        Self { freq_mhz, c0, c1, c2 }
    }

    /// Raw (unrounded) voltage for a speedo measurement, `None` on overflow
    pub fn voltage(&self, speedo: i32) -> Option<i64> {
        let speedo = i64::from(speedo);
        let linear = i64::from(self.c1).checked_mul(speedo)?;
        let quadratic = i64::from(self.c2).checked_mul(speedo)?.checked_mul(speedo)?;
        i64::from(self.c0).checked_add(linear)?.checked_add(quadratic)
    }
}

/// Characterization of one CPU speedo bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CvbTable {
    /// Speedo id the table applies to
    pub speedo_id: i32,
    /// Voltage floor
    pub min_mv: Millivolts,
    /// Extra margin for PLL-sourced clocks, in percent
    pub margin: u32,
    /// Rows in ascending frequency order
    pub rows: &'static [CvbRow],
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Find the characterization of a speedo id.
///
/// The first entry in table order wins.
pub fn resolve(tables: &[CvbTable], speedo_id: i32) -> DvfsResult<&CvbTable> {
    match tables.iter().find(|t| t.speedo_id == speedo_id) {
        Some(table) => Ok(table),
        None => dvfs_bail!(
            ErrorKind::NotFound,
            "No CPU characterization table",
            "speedo_id {}",
            speedo_id
        ),
    }
}

/// Round a voltage up to the 12.5 mV grid.
///
/// Integer millivolts: `ceil(2 * mv / 25) * 25 / 2`. Negative inputs round
/// to 0.
pub fn round_cvb_voltage(mv: i64) -> i64 {
    if mv <= 0 {
        return 0;
    }
    let steps = mv.saturating_mul(2).saturating_add(CVB_GRID_HALF_MV - 1) / CVB_GRID_HALF_MV;
    steps * CVB_GRID_HALF_MV / 2
}

// =============================================================================
// TESTS
// =============================================================================

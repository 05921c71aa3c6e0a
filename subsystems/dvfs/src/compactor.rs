//! # Curve Compaction
//!
//! Collapses a dense characterization curve into the minimal ladder of
//! distinct voltage steps a regulator switches between.
//!
//! ```text
//!   curve:   306 408 510 612 714 816 918 ...   MHz
//!   DFLL:    850 850 850 850 850 862 900 ...   mV (rounded, floored)
//!                               │
//!                               ▼
//!   steps:   (714, 850) (816, 862) (918, 900) ...
//!             ▲
//!             └── fmax_at_vmin: highest rate at the voltage floor
//! ```
//!
//! A row whose voltage does not exceed the previous step extends that step
//! to its frequency; a row with a higher voltage opens a new step. Each step
//! also carries the PLL-sourced voltage: the rounded closed-loop voltage
//! scaled by the table margin, rounded again and floored.

use crate::characterization::{round_cvb_voltage, CvbRow, CvbTable};
use crate::error::{DvfsResult, ErrorKind};
use crate::table::StepVec;
use crate::{dvfs_bail, Millivolts, MAX_DVFS_FREQS};

// =============================================================================
// COMPACTED CURVE
// =============================================================================

/// Result of compacting one characterization table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompactedCurve {
    /// Maximum frequency of each step, in MHz
    pub freqs: StepVec<u64>,
    /// Closed-loop voltage of each step
    pub dfll_mv: StepVec<Millivolts>,
    /// PLL-sourced voltage of each step
    pub pll_mv: StepVec<Millivolts>,
    /// Highest frequency reachable at the voltage floor, in MHz
    pub fmax_at_vmin: u64,
}

impl CompactedCurve {
    /// Number of steps
    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    /// Check for an empty curve
    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Index of the highest step
    pub fn top_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }
}

// =============================================================================
// COMPACTION
// =============================================================================

/// Compact a characterization table for one speedo measurement
pub fn compact(table: &CvbTable, speedo: i32) -> DvfsResult<CompactedCurve> {
    let floor = table.min_mv as i64;
    let mut curve = CompactedCurve::default();
    let mut fmax_at_vmin = None;
    let mut rows = 0;

    for row in table.rows.iter().take(MAX_DVFS_FREQS) {
        if row.freq_mhz == 0 {
            break;
        }
        rows += 1;

        let Some(raw) = row.voltage(speedo) else {
            dvfs_bail!(
                ErrorKind::InvalidTable,
                "CVB voltage overflow",
                "speedo_id {}: speedo {} at {} MHz",
                table.speedo_id,
                speedo,
                row.freq_mhz
            );
        };
        let rounded = round_cvb_voltage(raw);
        let dfll = rounded.max(floor);

        if dfll > floor && fmax_at_vmin.is_none() {
            match curve.freqs.last() {
                Some(&f) => fmax_at_vmin = Some(f),
                None => dvfs_bail!(
                    ErrorKind::InvalidTable,
                    "First CVB entry above the voltage floor",
                    "speedo_id {}: {}mV at {} MHz, floor {}mV",
                    table.speedo_id,
                    dfll,
                    row.freq_mhz,
                    floor
                ),
            }
        }

        let opens_step = curve.dfll_mv.last().map_or(true, |&prev| dfll > prev as i64);
        if opens_step {
            // TODO: apply the margin to the raw voltage once the CVB
            // coefficients are normalized; the result is rounded twice today.
            let pll = rounded
                .checked_mul(i64::from(table.margin))
                .map_or(i64::MAX, |mv| round_cvb_voltage(mv / 100).max(floor));
            let dfll_mv = step_millivolts(table, row, dfll)?;
            let pll_mv = step_millivolts(table, row, pll)?;

            if curve.freqs.try_push(row.freq_mhz).is_err() {
                break;
            }
            curve.dfll_mv.push(dfll_mv);
            curve.pll_mv.push(pll_mv);
        } else if let Some(last) = curve.freqs.last_mut() {
            *last = row.freq_mhz;
        }
    }

    // Every row sits at the floor: the whole curve runs at Vmin.
    if fmax_at_vmin.is_none() && curve.dfll_mv.first().is_some_and(|&mv| mv as i64 == floor) {
        fmax_at_vmin = curve.freqs.first().copied();
    }

    match fmax_at_vmin {
        Some(fmax) if rows > 0 && !curve.is_empty() && fmax != 0 => {
            curve.fmax_at_vmin = fmax;
            Ok(curve)
        },
        _ => dvfs_bail!(
            ErrorKind::InvalidTable,
            "Invalid CPU DVFS table",
            "speedo_id {}: {} rows, {} steps",
            table.speedo_id,
            rows,
            curve.len()
        ),
    }
}

fn step_millivolts(table: &CvbTable, row: &CvbRow, mv: i64) -> DvfsResult<Millivolts> {
    match Millivolts::try_from(mv) {
        Ok(mv) => Ok(mv),
        Err(_) => dvfs_bail!(
            ErrorKind::InvalidTable,
            "CVB voltage out of range",
            "speedo_id {}: {}mV at {} MHz",
            table.speedo_id,
            mv,
            row.freq_mhz
        ),
    }
}

// =============================================================================
// TESTS
// =============================================================================

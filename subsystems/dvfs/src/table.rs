//! # Voltage/Frequency Tables
//!
//! Per-clock-domain DVFS tables.
//!
//! Static configuration is written as [`DvfsTemplate`] rows: a clock name,
//! an applicability predicate and the maximum frequency reachable at each
//! step of the rail's voltage ladder. At boot the matching rows are
//! materialized into [`DvfsTable`]s that pair every frequency with its
//! voltage and remember the owning rail.
//!
//! ```text
//!   ladder (mV):   837     900     950    1000    1050    1100    1125
//!   freqs (kHz):     1  144000  252000  288000  372000  468000  468000
//!                  ───────────────────────────────────────────────────▶
//!                  step i: any rate ≤ freqs[i] is safe at ladder[i]
//! ```

use core::fmt;

use arrayvec::ArrayVec;

use crate::error::{DvfsResult, ErrorKind};
use crate::rail::RailId;
use crate::{dvfs_bail, dvfs_ensure, Hertz, Millivolts, ANY_ID, MAX_DVFS_FREQS};

/// Fixed-capacity step storage
pub type StepVec<T> = ArrayVec<T, MAX_DVFS_FREQS>;

// =============================================================================
// CHIP MATCHING
// =============================================================================

/// Identity of the chip being configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipId {
    /// Speedo id
    pub speedo_id: i32,
    /// Process id
    pub process_id: i32,
}

impl ChipId {
    /// Create a chip identity
    pub const fn new(speedo_id: i32, process_id: i32) -> Self {
        Self {
            speedo_id,
            process_id,
        }
    }
}

/// Applicability predicate of a table entry, `-1` fields match anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipMatch {
    /// Required speedo id or wildcard
    pub speedo_id: i32,
    /// Required process id or wildcard
    pub process_id: i32,
}

impl ChipMatch {
    /// Matches every chip
    pub const ANY: Self = Self::new(ANY_ID, ANY_ID);

    /// Create a predicate
    pub const fn new(speedo_id: i32, process_id: i32) -> Self {
        Self {
            speedo_id,
            process_id,
        }
    }

    /// Both fields must independently pass
    pub const fn matches(&self, chip: ChipId) -> bool {
        (self.process_id == ANY_ID || self.process_id == chip.process_id)
            && (self.speedo_id == ANY_ID || self.speedo_id == chip.speedo_id)
    }
}

impl fmt::Display for ChipMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speedo {}, process {}", self.speedo_id, self.process_id)
    }
}

// =============================================================================
// TEMPLATE
// =============================================================================

/// Static table row for one clock domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvfsTemplate {
    /// Clock name in the clock tree
    pub clk_name: &'static str,
    /// Applicability predicate
    pub matcher: ChipMatch,
    /// Domain is scaled automatically on rate changes
    pub auto_dvfs: bool,
    /// Multiplier from table units to Hz
    pub freqs_mult: u64,
    /// Maximum frequency at each ladder step, in table units
    pub freqs: &'static [u64],
}

impl DvfsTemplate {
    /// Create a row matching any process id
    pub const fn new(
        clk_name: &'static str,
        speedo_id: i32,
        auto_dvfs: bool,
        freqs_mult: u64,
        freqs: &'static [u64],
    ) -> Self {
        Self {
            clk_name,
            matcher: ChipMatch::new(speedo_id, ANY_ID),
            auto_dvfs,
            freqs_mult,
            freqs,
        }
    }

    /// Restrict the row to one process id
    pub const fn with_process_id(mut self, process_id: i32) -> Self {
        self.matcher.process_id = process_id;
        self
    }

    /// Check the row against a chip identity
    pub fn matches(&self, chip: ChipId) -> bool {
        let matched = self.matcher.matches(chip);
        if !matched {
            log::debug!("DVFS: rejected {} ({})", self.clk_name, self.matcher);
        }
        matched
    }
}

// =============================================================================
// TABLE
// =============================================================================

/// Materialized voltage/frequency table bound to a rail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvfsTable {
    clk_name: &'static str,
    matcher: ChipMatch,
    auto_dvfs: bool,
    freqs_mult: u64,
    rail: RailId,
    freqs: StepVec<u64>,
    millivolts: StepVec<Millivolts>,
    dfll_millivolts: Option<StepVec<Millivolts>>,
    max_millivolts: Millivolts,
}

impl DvfsTable {
    /// Pair a template's frequencies with a rail voltage ladder
    pub fn from_template(
        template: &DvfsTemplate,
        rail: RailId,
        ladder: &[Millivolts],
    ) -> DvfsResult<Self> {
        let freqs = to_steps(template.freqs, template.clk_name)?;
        let millivolts = to_steps(ladder, template.clk_name)?;

        Self::build(
            template.clk_name,
            template.matcher,
            template.auto_dvfs,
            template.freqs_mult,
            rail,
            freqs,
            millivolts,
            None,
        )
    }

    /// Build a table from computed steps
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        clk_name: &'static str,
        matcher: ChipMatch,
        auto_dvfs: bool,
        freqs_mult: u64,
        rail: RailId,
        freqs: StepVec<u64>,
        millivolts: StepVec<Millivolts>,
        dfll_millivolts: Option<StepVec<Millivolts>>,
    ) -> DvfsResult<Self> {
        let table = Self {
            clk_name,
            matcher,
            auto_dvfs,
            freqs_mult,
            rail,
            freqs,
            millivolts,
            dfll_millivolts,
            max_millivolts: 0,
        };
        table.validate()?;
        Ok(table)
    }

    /// Check structural invariants.
    ///
    /// Voltages must be strictly increasing and frequencies non-decreasing;
    /// the top steps of a characterization table may repeat a frequency.
    pub fn validate(&self) -> DvfsResult<()> {
        dvfs_ensure!(
            !self.freqs.is_empty() && !self.millivolts.is_empty(),
            ErrorKind::InvalidTable,
            "Empty DVFS table",
            "{}",
            self.clk_name
        );
        dvfs_ensure!(
            self.freqs.len() <= self.millivolts.len(),
            ErrorKind::InvalidTable,
            "More frequencies than voltage steps",
            "{}: {} freqs, {} voltages",
            self.clk_name,
            self.freqs.len(),
            self.millivolts.len()
        );
        dvfs_ensure!(
            self.freqs_mult > 0,
            ErrorKind::InvalidTable,
            "Zero frequency multiplier",
            "{}",
            self.clk_name
        );

        if self.millivolts.windows(2).any(|w| w[0] >= w[1]) {
            dvfs_bail!(
                ErrorKind::InvalidTable,
                "Voltage steps not strictly increasing",
                "{}",
                self.clk_name
            );
        }

        if self.freqs.windows(2).any(|w| w[0] > w[1]) {
            dvfs_bail!(
                ErrorKind::InvalidTable,
                "Frequencies decreasing",
                "{}",
                self.clk_name
            );
        }

        if let Some(ref dfll) = self.dfll_millivolts {
            dvfs_ensure!(
                dfll.len() == self.millivolts.len(),
                ErrorKind::InvalidTable,
                "DFLL ladder length mismatch",
                "{}",
                self.clk_name
            );
        }

        Ok(())
    }

    /// Clock name
    pub fn clk_name(&self) -> &'static str {
        self.clk_name
    }

    /// Applicability predicate
    pub fn matcher(&self) -> ChipMatch {
        self.matcher
    }

    /// Automatic scaling flag
    pub fn auto_dvfs(&self) -> bool {
        self.auto_dvfs
    }

    /// Owning rail
    pub fn rail(&self) -> RailId {
        self.rail
    }

    /// Multiplier from table units to Hz
    pub fn freqs_mult(&self) -> u64 {
        self.freqs_mult
    }

    /// Frequencies in table units
    pub fn freqs(&self) -> &[u64] {
        &self.freqs
    }

    /// Voltage ladder (PLL-sourced for closed-loop capable domains)
    pub fn millivolts(&self) -> &[Millivolts] {
        &self.millivolts
    }

    /// Closed-loop voltage ladder, if the domain has one
    pub fn dfll_millivolts(&self) -> Option<&[Millivolts]> {
        self.dfll_millivolts.as_deref()
    }

    /// Number of usable (frequency, voltage) steps
    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    /// Check for an empty table
    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Rate of step `index` in Hz
    pub fn rate_at(&self, index: usize) -> Option<Hertz> {
        self.freqs.get(index).map(|f| f * self.freqs_mult)
    }

    /// Voltage of step `index`
    pub fn millivolts_at(&self, index: usize) -> Option<Millivolts> {
        self.millivolts.get(index).copied()
    }

    /// Voltage ceiling recorded at binding time, 0 while unbound
    pub fn max_millivolts(&self) -> Millivolts {
        self.max_millivolts
    }

    pub(crate) fn set_max_millivolts(&mut self, mv: Millivolts) {
        self.max_millivolts = mv;
    }

    /// Lowest voltage that supports `rate`
    pub fn voltage_for_rate(&self, rate: Hertz) -> DvfsResult<Millivolts> {
        let step = (0..self.len()).find(|&i| self.rate_at(i).is_some_and(|r| r >= rate));

        let mv = match step.and_then(|i| self.millivolts_at(i)) {
            Some(mv) => mv,
            None => dvfs_bail!(
                ErrorKind::RateTooHigh,
                "Rate above DVFS table",
                "{}: {} Hz",
                self.clk_name,
                rate
            ),
        };

        if self.max_millivolts != 0 && mv > self.max_millivolts {
            dvfs_bail!(
                ErrorKind::RateTooHigh,
                "Rate needs more than the nominal voltage",
                "{}: {} Hz needs {}mV, limit {}mV",
                self.clk_name,
                rate,
                mv,
                self.max_millivolts
            );
        }

        Ok(mv)
    }
}

fn to_steps<T: Copy>(values: &[T], clk_name: &'static str) -> DvfsResult<StepVec<T>> {
    match StepVec::try_from(values) {
        Ok(steps) => Ok(steps),
        Err(_) => dvfs_bail!(
            ErrorKind::InvalidTable,
            "Too many DVFS steps",
            "{}: {} > {}",
            clk_name,
            values.len(),
            MAX_DVFS_FREQS
        ),
    }
}

// =============================================================================
// TESTS
// =============================================================================

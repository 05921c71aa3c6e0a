//! # Nominal Operating Points
//!
//! Selection of each rail's nominal (maximum allowed) voltage step.
//!
//! | Rail | Candidates              | Bound                                   |
//! |------|-------------------------|-----------------------------------------|
//! | core | core voltage ladder     | speedo voltage (or default), EDP limit  |
//! | cpu  | compacted CVB curve     | top step, PLL-sourced voltage           |
//! | gpu  | GPU voltage ladder      | core nominal coupling, GPU ceiling      |
//!
//! The core rail is always resolved first: the GPU bound is derived from it.

use crate::compactor::CompactedCurve;
use crate::config::GpuCoreCoupling;
use crate::error::{DvfsResult, ErrorKind};
use crate::platform::ClockTree;
use crate::table::{ChipId, DvfsTemplate};
use crate::{dvfs_bail, dvfs_ensure, Hertz, Millivolts};

// =============================================================================
// NOMINAL POINT
// =============================================================================

/// A selected step of a voltage ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NominalPoint {
    /// Index into the ladder
    pub index: usize,
    /// Voltage at that index
    pub millivolts: Millivolts,
}

impl NominalPoint {
    /// Point at `index` of a ladder
    pub fn at(ladder: &[Millivolts], index: usize) -> DvfsResult<Self> {
        match ladder.get(index) {
            Some(&millivolts) => Ok(Self { index, millivolts }),
            None => dvfs_bail!(
                ErrorKind::InvalidTable,
                "Ladder index out of range",
                "{} of {}",
                index,
                ladder.len()
            ),
        }
    }
}

// =============================================================================
// CORE RAIL
// =============================================================================

/// Core nominal target: the speedo voltage clipped to the EDP limit.
///
/// An EDP limit of 0 means no limit.
pub fn core_target_mv(speedo_mv: Millivolts, edp_limit_mv: Option<Millivolts>) -> Millivolts {
    match edp_limit_mv {
        Some(limit) if limit != 0 => speedo_mv.min(limit),
        _ => speedo_mv,
    }
}

/// Highest ladder step at or below `target_mv`
pub fn select_core_nominal(ladder: &[Millivolts], target_mv: Millivolts) -> DvfsResult<NominalPoint> {
    let count = ladder.iter().take_while(|&&mv| mv <= target_mv).count();

    match count.checked_sub(1) {
        Some(index) => NominalPoint::at(ladder, index),
        None => dvfs_bail!(
            ErrorKind::NoValidOperatingPoint,
            "Core nominal below the lowest ladder step",
            "target {}mV, lowest {}mV",
            target_mv,
            ladder.first().copied().unwrap_or(0)
        ),
    }
}

// =============================================================================
// CPU RAIL
// =============================================================================

/// Top step of the compacted curve, at its PLL-sourced voltage
pub fn select_cpu_nominal(curve: &CompactedCurve) -> DvfsResult<NominalPoint> {
    match curve.top_index() {
        Some(index) => NominalPoint::at(&curve.pll_mv, index),
        None => dvfs_bail!(ErrorKind::NoValidOperatingPoint, "Empty CPU curve"),
    }
}

// =============================================================================
// GPU RAIL
// =============================================================================

/// Upper voltage bound of the GPU rail.
///
/// Starts at the top of the GPU ladder, then clips to the core coupling and
/// to the GPU ceiling.
pub fn gpu_voltage_bound(
    ladder: &[Millivolts],
    core_nominal_mv: Millivolts,
    coupling: GpuCoreCoupling,
    ceiling_mv: Millivolts,
) -> DvfsResult<Millivolts> {
    let Some(&top) = ladder.last() else {
        dvfs_bail!(ErrorKind::InvalidTable, "Empty GPU ladder");
    };

    let mut bound = top.min(ceiling_mv);
    if let Some(coupled) = coupling.gpu_bound(core_nominal_mv) {
        bound = bound.min(coupled);
    }
    Ok(bound)
}

/// Result of GPU nominal selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuNominal {
    /// Selected step
    pub point: NominalPoint,
    /// Index of the template the selection was made on
    pub template: usize,
    /// Template matched the chip (otherwise the last template was used)
    pub matched: bool,
}

/// GPU template for a chip: the first match, else the last template.
///
/// Returns the template index and whether it matched.
pub fn pick_gpu_template(templates: &[DvfsTemplate], chip: ChipId) -> Option<(usize, bool)> {
    match templates.iter().position(|t| t.matches(chip)) {
        Some(index) => Some((index, true)),
        None => templates.len().checked_sub(1).map(|last| (last, false)),
    }
}

/// Highest GPU step within `bound_mv` that the GPU clock can use.
///
/// The scan stops at the first step above the bound, and right after the
/// first step whose rate covers the clock's maximum rate. Without a matching
/// template the last one is used.
pub fn select_gpu_nominal(
    templates: &[DvfsTemplate],
    ladder: &[Millivolts],
    chip: ChipId,
    bound_mv: Millivolts,
    clocks: &dyn ClockTree,
) -> DvfsResult<GpuNominal> {
    let Some((template, matched)) = pick_gpu_template(templates, chip) else {
        dvfs_bail!(ErrorKind::InvalidTable, "No GPU DVFS tables");
    };
    let entry = &templates[template];

    let Some(clk) = clocks.lookup(entry.clk_name) else {
        dvfs_bail!(ErrorKind::BindingFailure, "GPU clock not found", "{}", entry.clk_name);
    };
    let max_rate = clocks.max_rate(clk);

    let mut steps = 0;
    for (&freq, &mv) in entry.freqs.iter().zip(ladder) {
        if freq == 0 || mv > bound_mv {
            break;
        }
        steps += 1;
        if freq.saturating_mul(entry.freqs_mult) >= max_rate {
            break;
        }
    }

    dvfs_ensure!(
        steps > 0,
        ErrorKind::NoValidOperatingPoint,
        "No GPU step within bound",
        "bound {}mV",
        bound_mv
    );

    let point = NominalPoint::at(ladder, steps - 1)?;
    if !matched {
        let rate: Hertz = entry.freqs[point.index].saturating_mul(entry.freqs_mult);
        log::warn!(
            "DVFS: no gpu dvfs table for chip speedo_id {} process_id {}: set GPU rate limit at {} Hz",
            chip.speedo_id,
            chip.process_id,
            rate
        );
    }

    Ok(GpuNominal {
        point,
        template,
        matched,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characterization::CvbRow;
    use crate::characterization::CvbTable;
    use crate::compactor::compact;
    use crate::mock::MockClockTree;
    use crate::platform::ClockFlags;
    use crate::{ANY_ID, KHZ};

    const CORE_LADDER: [Millivolts; 7] = [837, 900, 950, 1000, 1050, 1100, 1125];
    const GPU_LADDER: [Millivolts; 9] = [850, 900, 950, 1000, 1050, 1100, 1150, 1200, 1250];
    const GPU_FREQS: &[u64] = &[72000, 180000, 252000, 324000, 420000, 540000, 648000, 756000, 804000];

    #[test]
    fn test_core_nominal_selects_highest_step_at_target() {
        let point = select_core_nominal(&CORE_LADDER, 1100).unwrap();
        assert_eq!(point.index, 5);
        assert_eq!(point.millivolts, 1100);

        assert_eq!(select_core_nominal(&CORE_LADDER, 1099).unwrap().index, 4);
        assert_eq!(select_core_nominal(&CORE_LADDER, 2000).unwrap().index, 6);
        assert_eq!(select_core_nominal(&CORE_LADDER, 837).unwrap().index, 0);
    }

    #[test]
    fn test_core_nominal_below_ladder() {
        let err = select_core_nominal(&CORE_LADDER, 800).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoValidOperatingPoint);
        assert!(select_core_nominal(&[], 1100).is_err());
    }

    #[test]
    fn test_core_target() {
        assert_eq!(core_target_mv(1100, None), 1100);
        assert_eq!(core_target_mv(1100, Some(0)), 1100);
        assert_eq!(core_target_mv(1100, Some(1000)), 1000);
        assert_eq!(core_target_mv(1000, Some(1100)), 1000);
    }

    #[test]
    fn test_cpu_nominal_is_top_step() {
        static ROWS: [CvbRow; 4] = [
            CvbRow::new(306, 800, 0, 0),
            CvbRow::new(408, 850, 0, 0),
            CvbRow::new(510, 900, 0, 0),
            CvbRow::new(612, 950, 0, 0),
        ];
        let table = CvbTable {
            speedo_id: 0,
            min_mv: 850,
            margin: 100,
            rows: &ROWS,
        };
        let curve = compact(&table, 0).unwrap();
        let point = select_cpu_nominal(&curve).unwrap();
        assert_eq!(point.index, 2);
        assert_eq!(point.millivolts, 950);

        assert!(select_cpu_nominal(&CompactedCurve::default()).is_err());
    }

    #[test]
    fn test_gpu_bound() {
        assert_eq!(
            gpu_voltage_bound(&GPU_LADDER, 1100, GpuCoreCoupling::Unconstrained, 1250),
            Ok(1250)
        );
        assert_eq!(
            gpu_voltage_bound(&GPU_LADDER, 1000, GpuCoreCoupling::MaxOffset(100), 1250),
            Ok(1100)
        );
        assert_eq!(
            gpu_voltage_bound(&GPU_LADDER, 1100, GpuCoreCoupling::Unconstrained, 1150),
            Ok(1150)
        );
        assert!(gpu_voltage_bound(&[], 1100, GpuCoreCoupling::Unconstrained, 1250).is_err());
    }

    #[test]
    fn test_gpu_nominal_respects_bound() {
        let clocks = MockClockTree::new();
        clocks.add_clock("gpu", 2_000_000_000, ClockFlags::empty());
        let templates = [DvfsTemplate::new("gpu", ANY_ID, true, KHZ, GPU_FREQS)];

        for bound in [850, 900, 1000, 1049, 1100, 1250] {
            let gpu =
                select_gpu_nominal(&templates, &GPU_LADDER, ChipId::new(0, 0), bound, &clocks).unwrap();
            assert!(gpu.point.millivolts <= bound);
            assert!(gpu.matched);
        }

        let gpu = select_gpu_nominal(&templates, &GPU_LADDER, ChipId::new(0, 0), 1049, &clocks).unwrap();
        assert_eq!(gpu.point.index, 3);

        let err = select_gpu_nominal(&templates, &GPU_LADDER, ChipId::new(0, 0), 800, &clocks).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoValidOperatingPoint);
    }

    #[test]
    fn test_gpu_nominal_stops_at_clock_max_rate() {
        let clocks = MockClockTree::new();
        clocks.add_clock("gpu", 300_000_000, ClockFlags::empty());
        let templates = [DvfsTemplate::new("gpu", ANY_ID, true, KHZ, GPU_FREQS)];

        let gpu = select_gpu_nominal(&templates, &GPU_LADDER, ChipId::new(0, 0), 1250, &clocks).unwrap();
        // 324 MHz is the first step covering 300 MHz
        assert_eq!(gpu.point.index, 3);
        assert_eq!(gpu.point.millivolts, 1000);
    }

    #[test]
    fn test_gpu_nominal_falls_back_to_last_template() {
        let clocks = MockClockTree::new();
        clocks.add_clock("gpu", 2_000_000_000, ClockFlags::empty());
        let templates = [
            DvfsTemplate::new("gpu", 0, true, KHZ, GPU_FREQS).with_process_id(2),
            DvfsTemplate::new("gpu", 1, true, KHZ, &[72000, 180000]),
        ];

        let gpu = select_gpu_nominal(&templates, &GPU_LADDER, ChipId::new(0, 1), 1250, &clocks).unwrap();
        assert!(!gpu.matched);
        assert_eq!(gpu.template, 1);
        assert_eq!(gpu.point.index, 1);
    }

    #[test]
    fn test_pick_gpu_template() {
        let templates = [
            DvfsTemplate::new("gpu", 0, true, KHZ, GPU_FREQS),
            DvfsTemplate::new("gpu", 1, true, KHZ, GPU_FREQS),
            DvfsTemplate::new("gpu", 2, true, KHZ, GPU_FREQS),
        ];
        assert_eq!(pick_gpu_template(&templates, ChipId::new(1, 0)), Some((1, true)));
        assert_eq!(pick_gpu_template(&templates, ChipId::new(7, 0)), Some((2, false)));
        assert_eq!(pick_gpu_template(&[], ChipId::new(0, 0)), None);
    }

    #[test]
    fn test_gpu_nominal_needs_clock() {
        let clocks = MockClockTree::new();
        let templates = [DvfsTemplate::new("gpu", ANY_ID, true, KHZ, GPU_FREQS)];
        let err = select_gpu_nominal(&templates, &GPU_LADDER, ChipId::new(0, 0), 1250, &clocks).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BindingFailure);

        let err = select_gpu_nominal(&[], &GPU_LADDER, ChipId::new(0, 0), 1250, &clocks).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTable);
    }
}

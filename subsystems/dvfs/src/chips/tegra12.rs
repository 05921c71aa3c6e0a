//! # Tegra12 Data Set
//!
//! Rail descriptors, voltage ladders, CPU characterization and clock-domain
//! tables of the Tegra12 family.
//!
//! | Rail     | Window (mV)  | Step | Ladder                              |
//! |----------|--------------|------|-------------------------------------|
//! | VDD_CPU  | 800 - 1250   | 100  | computed from CVB                   |
//! | VDD_CORE | 800 - 1350   | 100  | 837 ... 1125 (7 steps)              |
//! | VDD_GPU  | 850 - 1350   | 100  | 850 ... 1250 (9 steps)              |

use static_assertions::const_assert;

use crate::characterization::{CvbRow, CvbTable};
use crate::config::{ChipConfig, CpuDomain, DfllTuning, GpuCoreCoupling};
use crate::rail::{RailDescriptor, RailFlags, RailId};
use crate::table::DvfsTemplate;
use crate::{Millivolts, ANY_ID, KHZ, MAX_DVFS_FREQS};

// =============================================================================
// RAILS
// =============================================================================

/// VDD_CPU
pub const CPU_RAIL: RailDescriptor =
    RailDescriptor::new(RailId::Cpu, 800, 1250, 100).with_flags(RailFlags::JUMP_TO_ZERO);

/// VDD_CORE
pub const CORE_RAIL: RailDescriptor = RailDescriptor::new(RailId::Core, 800, 1350, 100);

/// VDD_GPU
pub const GPU_RAIL: RailDescriptor = RailDescriptor::new(RailId::Gpu, 850, 1350, 100);

/// Core voltage ladder
pub const CORE_MILLIVOLTS: &[Millivolts] = &[837, 900, 950, 1000, 1050, 1100, 1125];

/// GPU voltage ladder
pub const GPU_MILLIVOLTS: &[Millivolts] = &[850, 900, 950, 1000, 1050, 1100, 1150, 1200, 1250];

/// Core nominal target without a fused speedo voltage
pub const CORE_DEFAULT_MV: Millivolts = 1100;

/// GPU ceiling without a fused speedo voltage
pub const GPU_CEILING_MV: Millivolts = 1250;

// =============================================================================
// CPU CHARACTERIZATION
// =============================================================================

const CPU_CVB_ROWS_0: &[CvbRow] = &[
    CvbRow::new(306, 800, 0, 0),
    CvbRow::new(408, 812, 0, 0),
    CvbRow::new(510, 825, 0, 0),
    CvbRow::new(612, 850, 0, 0),
    CvbRow::new(714, 850, 0, 0),
    CvbRow::new(816, 858, 0, 0),
    CvbRow::new(918, 900, 0, 0),
    CvbRow::new(1020, 912, 0, 0),
    CvbRow::new(1122, 937, 0, 0),
    CvbRow::new(1224, 937, 0, 0),
    CvbRow::new(1326, 975, 0, 0),
    CvbRow::new(1428, 1000, 0, 0),
    CvbRow::new(1530, 1000, 0, 0),
    CvbRow::new(1632, 1100, 0, 0),
    CvbRow::new(1734, 1150, 0, 0),
    CvbRow::new(1836, 1200, 0, 0),
];

/// CPU characterization by speedo id
pub const CPU_CVB_TABLES: &[CvbTable] = &[CvbTable {
    speedo_id: 0,
    min_mv: 850,
    margin: 103,
    rows: CPU_CVB_ROWS_0,
}];

cfg_if::cfg_if! {
    if #[cfg(feature = "silicon")] {
        const CPU_AUTO: bool = true;
    } else {
        const CPU_AUTO: bool = false;
    }
}

const CPU_DOMAIN: CpuDomain = CpuDomain {
    clk_name: "cpu_g",
    auto_dvfs: CPU_AUTO,
};

const DFLL_TUNING: DfllTuning = DfllTuning {
    dfll_clk_name: "dfll_cpu",
    tune0: 0x0003_0201,
    tune1: 0x000B_B0AA,
    droop_rate_min: 640_000_000,
};

// =============================================================================
// CORE CLOCK DOMAINS
// =============================================================================

#[cfg_attr(feature = "simulation", allow(dead_code))]
const fn core_dvfs(name: &'static str, auto: bool, freqs: &'static [u64]) -> DvfsTemplate {
    DvfsTemplate::new(name, ANY_ID, auto, KHZ, freqs)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "simulation")] {
        const CORE_DVFS_TABLE: &[DvfsTemplate] = &[];
    } else {
        const CPU_LP_FREQS: &[u64] = &[1, 144000, 252000, 288000, 372000, 468000, 468000];
        const EMC_FREQS: &[u64] = &[1, 264000, 348000, 384000, 528000, 666000, 666000];
        const SBUS_FREQS: &[u64] = &[1, 81600, 102000, 136000, 204000, 204000, 204000];
        const VI_FREQS: &[u64] = &[1, 102000, 144000, 144000, 192000, 240000, 240000];
        const GRAPHICS_FREQS: &[u64] = &[1, 132000, 180000, 204000, 264000, 336000, 336000];
        const MEDIA_FREQS: &[u64] = &[1, 120000, 144000, 168000, 216000, 276000, 276000];
        const HOST1X_FREQS: &[u64] = &[1, 81600, 102000, 136000, 163000, 204000, 204000];
        const PLL_FREQS: &[u64] = &[1, 480000, 588000, 660000, 792000, 936000, 936000];
        const I2C_FREQS: &[u64] = &[1, 58300, 68000, 81600, 102000, 136000, 136000];
        const SBC_FREQS: &[u64] = &[1, 24000, 24000, 48000, 48000, 48000, 48000];
        const SDMMC_FREQS: &[u64] = &[1, 102000, 102000, 163000, 163000, 163000, 163000];
        const PWM_FREQS: &[u64] = &[1, 40800, 48000, 48000, 48000, 48000, 48000];
        const CSI_FREQS: &[u64] = &[1, 1, 1, 102000, 102000, 102000, 102000];
        const DSI_FREQS: &[u64] = &[1, 100000, 125000, 125000, 125000, 125000, 125000];
        const DSI_LP_FREQS: &[u64] = &[1, 102000, 102000, 102000, 102000, 156000, 156000];
        const HDMI_FREQS: &[u64] = &[1, 99000, 118800, 148500, 198000, 198000, 198000];
        const DISP_FREQS: &[u64] = &[1, 108000, 120000, 144000, 192000, 240000, 240000];

        const CORE_DVFS_TABLE: &[DvfsTemplate] = &[
            core_dvfs("cpu_lp", true, CPU_LP_FREQS),
            core_dvfs("emc", true, EMC_FREQS),
            core_dvfs("sbus", true, SBUS_FREQS),
            core_dvfs("vi", true, VI_FREQS),
            core_dvfs("2d", true, GRAPHICS_FREQS),
            core_dvfs("3d", true, GRAPHICS_FREQS),
            core_dvfs("epp", true, MEDIA_FREQS),
            core_dvfs("msenc", true, MEDIA_FREQS),
            core_dvfs("se", true, MEDIA_FREQS),
            core_dvfs("tsec", true, MEDIA_FREQS),
            core_dvfs("vde", true, MEDIA_FREQS),
            core_dvfs("host1x", true, HOST1X_FREQS),
            #[cfg(not(feature = "dual-cbus"))]
            core_dvfs("cbus", true, MEDIA_FREQS),
            #[cfg(feature = "dual-cbus")]
            core_dvfs("c2bus", true, GRAPHICS_FREQS),
            #[cfg(feature = "dual-cbus")]
            core_dvfs("c3bus", true, MEDIA_FREQS),
            core_dvfs("pll_m", true, PLL_FREQS),
            core_dvfs("pll_c", true, PLL_FREQS),
            core_dvfs("pll_c2", true, PLL_FREQS),
            core_dvfs("pll_c3", true, PLL_FREQS),
            core_dvfs("pll_d_out0", true, PLL_FREQS),
            core_dvfs("pll_d2_out0", true, PLL_FREQS),
            core_dvfs("pll_re_out", true, PLL_FREQS),
            core_dvfs("i2c1", true, I2C_FREQS),
            core_dvfs("i2c2", true, I2C_FREQS),
            core_dvfs("i2c3", true, I2C_FREQS),
            core_dvfs("i2c4", true, I2C_FREQS),
            core_dvfs("sbc1", true, SBC_FREQS),
            core_dvfs("sbc2", true, SBC_FREQS),
            core_dvfs("sbc3", true, SBC_FREQS),
            core_dvfs("sbc4", true, SBC_FREQS),
            core_dvfs("sbc5", true, SBC_FREQS),
            core_dvfs("sbc6", true, SBC_FREQS),
            core_dvfs("sdmmc1", true, SDMMC_FREQS),
            core_dvfs("sdmmc2", true, SDMMC_FREQS),
            core_dvfs("sdmmc3", true, SDMMC_FREQS),
            core_dvfs("sdmmc4", true, SDMMC_FREQS),
            core_dvfs("pwm", true, PWM_FREQS),
            core_dvfs("csi", true, CSI_FREQS),
            core_dvfs("dsia", true, DSI_FREQS),
            core_dvfs("dsib", true, DSI_FREQS),
            core_dvfs("dsialp", true, DSI_LP_FREQS),
            core_dvfs("dsiblp", true, DSI_LP_FREQS),
            core_dvfs("hdmi", true, HDMI_FREQS),
            // Display rates are set by the display driver.
            core_dvfs("disp1", false, DISP_FREQS),
            core_dvfs("disp2", false, DISP_FREQS),
        ];
    }
}

// =============================================================================
// GPU CLOCK DOMAINS
// =============================================================================

const GPU_FREQS: &[u64] = &[624000, 650000, 676000, 702000, 728000, 754000, 780000, 806000];

const GPU_DVFS_TABLE: &[DvfsTemplate] = &[DvfsTemplate::new("gpu", ANY_ID, true, KHZ, GPU_FREQS)];

// =============================================================================
// SIZE CHECKS
// =============================================================================

const_assert!(CORE_MILLIVOLTS.len() <= MAX_DVFS_FREQS);
const_assert!(GPU_MILLIVOLTS.len() <= MAX_DVFS_FREQS);
const_assert!(CPU_CVB_ROWS_0.len() <= MAX_DVFS_FREQS);
const_assert!(GPU_FREQS.len() <= GPU_MILLIVOLTS.len());

// =============================================================================
// CHIP CONFIGURATION
// =============================================================================

/// Tegra12 data set
pub const fn chip_config() -> ChipConfig {
    ChipConfig {
        name: "tegra12",
        rails: [CPU_RAIL, CORE_RAIL, GPU_RAIL],
        core_millivolts: CORE_MILLIVOLTS,
        gpu_millivolts: GPU_MILLIVOLTS,
        cpu_cvb_tables: CPU_CVB_TABLES,
        cpu_domain: CPU_DOMAIN,
        dfll: DFLL_TUNING,
        core_domains: CORE_DVFS_TABLE,
        gpu_domains: GPU_DVFS_TABLE,
        core_default_mv: CORE_DEFAULT_MV,
        gpu_ceiling_mv: GPU_CEILING_MV,
        gpu_coupling: GpuCoreCoupling::Unconstrained,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characterization::resolve;
    use crate::compactor::compact;
    use crate::nominal::select_cpu_nominal;
    use crate::table::{ChipId, DvfsTable};

    #[test]
    fn test_cpu_curve_speedo_0() {
        let cvb = resolve(CPU_CVB_TABLES, 0).unwrap();
        let curve = compact(cvb, 0).unwrap();

        assert_eq!(curve.fmax_at_vmin, 714);
        assert_eq!(
            curve.freqs.as_slice(),
            &[714, 816, 918, 1020, 1224, 1326, 1530, 1632, 1734, 1836]
        );
        assert_eq!(
            curve.dfll_mv.as_slice(),
            &[850, 862, 900, 912, 937, 975, 1000, 1100, 1150, 1200]
        );

        let point = select_cpu_nominal(&curve).unwrap();
        assert_eq!(point.index, 9);
        assert_eq!(point.millivolts, 1237);
        assert!(CPU_RAIL.contains(point.millivolts));
    }

    #[test]
    fn test_every_core_domain_materializes() {
        for template in CORE_DVFS_TABLE {
            assert!(template.matches(ChipId::new(0, 0)));
            let table = DvfsTable::from_template(template, RailId::Core, CORE_MILLIVOLTS).unwrap();
            assert_eq!(table.len(), CORE_MILLIVOLTS.len());
        }
        for template in GPU_DVFS_TABLE {
            assert!(DvfsTable::from_template(template, RailId::Gpu, GPU_MILLIVOLTS).is_ok());
        }
    }

    #[test]
    fn test_displays_are_manual() {
        let manual: alloc::vec::Vec<_> = CORE_DVFS_TABLE
            .iter()
            .filter(|t| !t.auto_dvfs)
            .map(|t| t.clk_name)
            .collect();
        if cfg!(feature = "simulation") {
            assert!(manual.is_empty());
        } else {
            assert_eq!(manual, ["disp1", "disp2"]);
        }
    }
}

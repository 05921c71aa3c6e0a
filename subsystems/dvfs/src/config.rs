//! # DVFS Configuration
//!
//! Two layers of configuration feed the initialization pass:
//!
//! - [`DvfsConfig`]: which rails are allowed to scale. Built from the
//!   `core-dvfs`, `cpu-dvfs` and `gpu-dvfs` cargo features, or set
//!   explicitly by the board.
//! - [`ChipConfig`]: the static data set of one SoC: rail descriptors,
//!   voltage ladders, CPU characterization and clock-domain tables.

use crate::characterization::CvbTable;
use crate::error::{DvfsResult, ErrorKind};
use crate::rail::{RailDescriptor, RailId};
use crate::table::DvfsTemplate;
use crate::{dvfs_bail, dvfs_ensure, Hertz, Millivolts, MAX_DVFS_FREQS};

// =============================================================================
// SCALING CONFIGURATION
// =============================================================================

/// Per-rail scaling switches applied at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvfsConfig {
    enabled: [bool; RailId::COUNT],
}

impl DvfsConfig {
    /// Every rail scales
    pub const fn all_enabled() -> Self {
        Self {
            enabled: [true; RailId::COUNT],
        }
    }

    /// Switches selected by cargo features
    pub const fn from_features() -> Self {
        let mut enabled = [true; RailId::COUNT];
        enabled[RailId::Cpu.index()] = cfg!(feature = "cpu-dvfs");
        enabled[RailId::Core.index()] = cfg!(feature = "core-dvfs");
        enabled[RailId::Gpu.index()] = cfg!(feature = "gpu-dvfs");
        Self { enabled }
    }

    /// Override one rail
    pub const fn with_rail(mut self, rail: RailId, enabled: bool) -> Self {
        self.enabled[rail.index()] = enabled;
        self
    }

    /// Check whether a rail may scale
    pub const fn is_enabled(&self, rail: RailId) -> bool {
        self.enabled[rail.index()]
    }
}

impl Default for DvfsConfig {
    fn default() -> Self {
        Self::from_features()
    }
}

// =============================================================================
// CHIP CONFIGURATION
// =============================================================================

/// How the core rail's nominal voltage limits the GPU rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuCoreCoupling {
    /// No cross-rail constraint beyond the GPU ladder
    Unconstrained,
    /// GPU may not exceed the core nominal by more than this many mV
    MaxOffset(Millivolts),
}

impl GpuCoreCoupling {
    /// GPU voltage bound implied by a core nominal voltage
    pub const fn gpu_bound(&self, core_nominal_mv: Millivolts) -> Option<Millivolts> {
        match *self {
            GpuCoreCoupling::Unconstrained => None,
            GpuCoreCoupling::MaxOffset(offset) => Some(core_nominal_mv.saturating_add(offset)),
        }
    }
}

/// Static part of the CPU closed-loop characterization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfllTuning {
    /// DFLL clock name
    pub dfll_clk_name: &'static str,
    /// Tuning register 0
    pub tune0: u32,
    /// Tuning register 1
    pub tune1: u32,
    /// Minimum rate for droop control
    pub droop_rate_min: Hertz,
}

/// The CPU clock domain, whose table is computed from characterization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuDomain {
    /// Clock name
    pub clk_name: &'static str,
    /// Domain is scaled automatically on rate changes
    pub auto_dvfs: bool,
}

/// Static DVFS data of one SoC
#[derive(Debug, Clone, Copy)]
pub struct ChipConfig {
    /// Chip name for logs
    pub name: &'static str,
    /// Rail descriptors, indexed by [`RailId::index`]
    pub rails: [RailDescriptor; RailId::COUNT],
    /// Core voltage ladder
    pub core_millivolts: &'static [Millivolts],
    /// GPU voltage ladder
    pub gpu_millivolts: &'static [Millivolts],
    /// CPU characterization tables
    pub cpu_cvb_tables: &'static [CvbTable],
    /// CPU clock domain
    pub cpu_domain: CpuDomain,
    /// CPU closed-loop tuning
    pub dfll: DfllTuning,
    /// Clock domains on the core rail
    pub core_domains: &'static [DvfsTemplate],
    /// Clock domains on the GPU rail
    pub gpu_domains: &'static [DvfsTemplate],
    /// Core nominal target when the fuses carry none
    pub core_default_mv: Millivolts,
    /// GPU ceiling when the fuses carry none
    pub gpu_ceiling_mv: Millivolts,
    /// Core to GPU dependency
    pub gpu_coupling: GpuCoreCoupling,
}

impl ChipConfig {
    /// Descriptor of a rail
    pub fn rail(&self, id: RailId) -> &RailDescriptor {
        &self.rails[id.index()]
    }

    /// Check the data set before it is used
    pub fn validate(&self) -> DvfsResult<()> {
        for (index, rail) in self.rails.iter().enumerate() {
            dvfs_ensure!(
                rail.id.index() == index,
                ErrorKind::InvalidTable,
                "Rail descriptor out of order",
                "{} at slot {}",
                rail.id,
                index
            );
            rail.validate()?;
        }

        check_ladder(RailId::Core, self.core_millivolts, self.rail(RailId::Core))?;
        check_ladder(RailId::Gpu, self.gpu_millivolts, self.rail(RailId::Gpu))?;
        Ok(())
    }
}

fn check_ladder(rail: RailId, ladder: &[Millivolts], desc: &RailDescriptor) -> DvfsResult<()> {
    dvfs_ensure!(
        !ladder.is_empty() && ladder.len() <= MAX_DVFS_FREQS,
        ErrorKind::InvalidTable,
        "Bad voltage ladder length",
        "{}: {} steps",
        rail,
        ladder.len()
    );

    if ladder.windows(2).any(|w| w[0] >= w[1]) {
        dvfs_bail!(ErrorKind::InvalidTable, "Voltage ladder not increasing", "{}", rail);
    }

    dvfs_ensure!(
        ladder[0] >= desc.min_mv,
        ErrorKind::InvalidTable,
        "Voltage ladder below rail minimum",
        "{}: {}mV < {}mV",
        rail,
        ladder[0],
        desc.min_mv
    );
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chips::tegra12;

    #[test]
    fn test_config_overrides() {
        let cfg = DvfsConfig::all_enabled().with_rail(RailId::Gpu, false);
        assert!(cfg.is_enabled(RailId::Cpu));
        assert!(cfg.is_enabled(RailId::Core));
        assert!(!cfg.is_enabled(RailId::Gpu));
    }

    #[test]
    fn test_default_features_enable_all_rails() {
        let cfg = DvfsConfig::from_features();
        assert_eq!(cfg.is_enabled(RailId::Core), cfg!(feature = "core-dvfs"));
        assert_eq!(cfg.is_enabled(RailId::Cpu), cfg!(feature = "cpu-dvfs"));
        assert_eq!(cfg.is_enabled(RailId::Gpu), cfg!(feature = "gpu-dvfs"));
    }

    #[test]
    fn test_coupling() {
        assert_eq!(GpuCoreCoupling::Unconstrained.gpu_bound(1100), None);
        assert_eq!(GpuCoreCoupling::MaxOffset(50).gpu_bound(1100), Some(1150));
    }

    #[test]
    fn test_tegra12_config_is_valid() {
        assert!(tegra12::chip_config().validate().is_ok());
    }

    #[test]
    fn test_bad_ladder_rejected() {
        let mut chip = tegra12::chip_config();
        chip.core_millivolts = &[900, 850];
        assert_eq!(chip.validate().unwrap_err().kind(), ErrorKind::InvalidTable);

        let mut chip = tegra12::chip_config();
        chip.gpu_millivolts = &[700, 900];
        assert!(chip.validate().is_err());

        let mut chip = tegra12::chip_config();
        chip.rails.swap(0, 1);
        assert!(chip.validate().is_err());
    }
}

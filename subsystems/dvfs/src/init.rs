//! # DVFS Initialization Pass
//!
//! Runs once at boot, single-threaded, and fills a [`PowerDomainContext`].
//!
//! ```text
//!   1. request disable for rails switched off by configuration
//!   2. core nominal      ladder vs. speedo target / EDP     fallback: idx 0
//!   3. cpu nominal       resolve + compact CVB, DFLL data   fatal
//!   4. gpu nominal       ladder vs. core-derived bound      fallback: idx 0
//!   5. bind domains      core, then cpu, then gpu
//!   6. apply disables    hold requested rails at nominal
//!   7. report
//! ```
//!
//! A rail that falls back is disabled and held at its lowest ladder step.
//! Its clock domains are still bound at that step, so every clock stays
//! capped at a rate its held voltage supports. A disabled GPU rail may sit
//! above the core-derived bound when the ladder has no lower step; the
//! breach is logged.
//!
//! Only a CPU failure aborts the pass, and only while CPU scaling is
//! configured on.

use core::fmt;

use crate::binder::{bind_domains, collect_matching};
use crate::characterization::resolve;
use crate::compactor::{compact, CompactedCurve};
use crate::config::{ChipConfig, DvfsConfig};
use crate::context::PowerDomainContext;
use crate::error::{DvfsResult, ErrorKind};
use crate::nominal::{
    core_target_mv, gpu_voltage_bound, pick_gpu_template, select_core_nominal, select_cpu_nominal,
    select_gpu_nominal, NominalPoint,
};
use crate::platform::{ClockTree, ClosedLoopController, DfllData, SiliconIdentity};
use crate::rail::RailId;
use crate::table::{ChipId, ChipMatch, DvfsTable};
use crate::{dvfs_ensure, Millivolts, ANY_ID, MHZ};

// =============================================================================
// SERVICES
// =============================================================================

/// External services the initialization pass calls into
#[derive(Clone, Copy)]
pub struct PlatformServices<'a> {
    /// Clock-tree driver
    pub clocks: &'a dyn ClockTree,
    /// Fuse readers
    pub identity: &'a dyn SiliconIdentity,
    /// CPU closed-loop controller
    pub dfll: &'a dyn ClosedLoopController,
}

impl fmt::Debug for PlatformServices<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformServices").finish_non_exhaustive()
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Resolution result of one rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailReport {
    /// Rail
    pub rail: RailId,
    /// Nominal voltage
    pub nominal_mv: Millivolts,
    /// Nominal step in the rail's ladder
    pub nominal_index: usize,
    /// Voltage scaling is active
    pub scaling_enabled: bool,
}

impl fmt::Display for RailReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nominal {}mV, scaling {}",
            self.rail.label(),
            self.nominal_mv,
            if self.scaling_enabled { "enabled" } else { "disabled" }
        )
    }
}

/// Outcome of the initialization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Per-rail results in [`RailId::ALL`] order
    pub rails: [RailReport; RailId::COUNT],
    /// Clock domains bound to a voltage table
    pub bound_domains: usize,
    /// Clock domains that could not be bound
    pub skipped_domains: usize,
}

impl InitReport {
    /// Result of one rail
    pub fn rail(&self, id: RailId) -> &RailReport {
        &self.rails[id.index()]
    }
}

// =============================================================================
// INITIALIZATION
// =============================================================================

/// Resolve every rail's nominal voltage and bind all clock domains.
///
/// Fails only on a broken chip data set, a fatal CPU characterization
/// error, or a second call on the same context.
pub fn init_dvfs(
    ctx: &mut PowerDomainContext,
    chip: &ChipConfig,
    config: &DvfsConfig,
    services: &PlatformServices<'_>,
) -> DvfsResult<InitReport> {
    dvfs_ensure!(
        !ctx.is_initialized(),
        ErrorKind::AlreadyResolved,
        "DVFS already initialized"
    );
    chip.validate()?;

    let identity = services.identity;
    log::debug!(
        "DVFS: {}: cpu speedo {}, soc speedo {}, core process {}",
        chip.name,
        identity.cpu_speedo_id(),
        identity.soc_speedo_id(),
        identity.core_process_id()
    );

    for rail in RailId::ALL {
        if !config.is_enabled(rail) {
            ctx.rail(rail).request_disabled();
        }
    }

    // Core
    let core = resolve_core(chip, identity).unwrap_or_else(|e| {
        log::error!("DVFS: failed to resolve core nominal voltage: {}", e);
        ctx.rail(RailId::Core).request_disabled();
        fallback(chip.core_millivolts)
    });
    ctx.set_nominal(RailId::Core, core.index, core.millivolts)?;

    // CPU
    let cpu = match resolve_cpu(chip, identity) {
        Ok(cpu) => Some(cpu),
        Err(e) if !config.is_enabled(RailId::Cpu) => {
            log::warn!("DVFS: cpu characterization unusable, rail stays disabled: {}", e);
            None
        },
        Err(e) => {
            log::error!("DVFS: failed to resolve cpu dvfs table: {}", e);
            return Err(e.with_rail(RailId::Cpu));
        },
    };
    match &cpu {
        Some(cpu) => ctx.set_nominal(RailId::Cpu, cpu.point.index, cpu.point.millivolts)?,
        None => {
            let hold = chip.rail(RailId::Cpu).max_mv;
            ctx.set_nominal(RailId::Cpu, 0, hold)?;
        },
    }

    // GPU
    let gpu_chip = ChipId::new(identity.gpu_speedo_id(), identity.gpu_process_id());
    let gpu_bound = gpu_bound_mv(chip, identity, core.millivolts);
    let resolved = match &gpu_bound {
        Ok(bound) => resolve_gpu(chip, gpu_chip, services.clocks, *bound),
        Err(e) => Err(e.clone()),
    };
    let (gpu, gpu_template) = match resolved {
        Ok((point, template)) => (point, Some(template)),
        Err(e) => {
            log::error!("DVFS: failed to resolve gpu nominal voltage: {}", e);
            ctx.rail(RailId::Gpu).request_disabled();
            let point = fallback(chip.gpu_millivolts);
            if let Ok(bound) = gpu_bound {
                if point.millivolts > bound {
                    log::error!(
                        "DVFS: gpu held at {}mV above its {}mV bound",
                        point.millivolts,
                        bound
                    );
                }
            }
            (point, pick_gpu_template(chip.gpu_domains, gpu_chip).map(|(index, _)| index))
        },
    };
    ctx.set_nominal(RailId::Gpu, gpu.index, gpu.millivolts)?;

    // Bind
    let soc = ChipId::new(identity.soc_speedo_id(), identity.core_process_id());
    let mut tables = collect_matching(chip.core_domains, RailId::Core, chip.core_millivolts, soc);
    if let Some(cpu) = &cpu {
        tables.push(cpu.table.clone());
    }
    if let Some(index) = gpu_template {
        let template = &chip.gpu_domains[index];
        match DvfsTable::from_template(template, RailId::Gpu, chip.gpu_millivolts) {
            Ok(table) => tables.push(table),
            Err(e) => log::error!("DVFS: bad gpu table for {:?}: {}", gpu_chip, e),
        }
    }

    let mut nominals = [None; RailId::COUNT];
    nominals[RailId::Core.index()] = Some(core);
    nominals[RailId::Gpu.index()] = Some(gpu);
    if let Some(cpu) = &cpu {
        nominals[RailId::Cpu.index()] = Some(cpu.point);
    }

    let outcome = bind_domains(services.clocks, tables, &nominals);
    let bound_domains = outcome.bound.len();
    let skipped_domains = outcome.skipped;
    ctx.install_tables(outcome.bound);

    if let Some(cpu) = &cpu {
        if let Err(e) = services.dfll.set_dfll_data(&cpu.dfll) {
            log::error!("DVFS: failed to hand off {} data: {}", cpu.dfll.dfll_clk_name, e);
        }
        ctx.set_dfll_data(cpu.dfll);
    }

    // Apply disables
    for rail in RailId::ALL {
        let rail = ctx.rail(rail);
        if rail.disable_requested() {
            if let Err(e) = rail.disable(ctx.controller()) {
                log::error!("DVFS: failed to disable {}: {}", rail.id(), e);
            }
        }
    }

    ctx.mark_initialized()?;
    let ctx: &PowerDomainContext = ctx;

    let report = InitReport {
        rails: RailId::ALL.map(|id| rail_report(ctx, id)),
        bound_domains,
        skipped_domains,
    };
    for rail in &report.rails {
        log::info!("DVFS: {}", rail);
    }
    log::info!("DVFS: {} domains bound, {} skipped", bound_domains, skipped_domains);

    Ok(report)
}

// =============================================================================
// PER-RAIL RESOLUTION
// =============================================================================

struct CpuResolution {
    point: NominalPoint,
    table: DvfsTable,
    dfll: DfllData,
}

fn fallback(ladder: &[Millivolts]) -> NominalPoint {
    NominalPoint {
        index: 0,
        millivolts: ladder.first().copied().unwrap_or(0),
    }
}

fn resolve_core(chip: &ChipConfig, identity: &dyn SiliconIdentity) -> DvfsResult<NominalPoint> {
    let speedo_mv = identity.core_speedo_mv().unwrap_or(chip.core_default_mv);
    let target = core_target_mv(speedo_mv, identity.core_edp_limit_mv());
    select_core_nominal(chip.core_millivolts, target).map_err(|e| e.with_rail(RailId::Core))
}

fn resolve_cpu(chip: &ChipConfig, identity: &dyn SiliconIdentity) -> DvfsResult<CpuResolution> {
    let speedo_id = identity.cpu_speedo_id();
    let cvb = resolve(chip.cpu_cvb_tables, speedo_id)?;

    let rail = chip.rail(RailId::Cpu);
    dvfs_ensure!(
        cvb.min_mv >= rail.min_mv,
        ErrorKind::InvalidTable,
        "CPU characterization floor below rail minimum",
        "{}mV < {}mV",
        cvb.min_mv,
        rail.min_mv
    );

    let curve = compact(cvb, identity.cpu_speedo_value())?;
    let point = select_cpu_nominal(&curve)?;
    let table = cpu_table(chip, speedo_id, &curve)?;

    let dfll = DfllData {
        dfll_clk_name: chip.dfll.dfll_clk_name,
        tune0: chip.dfll.tune0,
        tune1: chip.dfll.tune1,
        droop_rate_min: chip.dfll.droop_rate_min,
        out_rate_min: curve.fmax_at_vmin * MHZ,
        millivolts_min: cvb.min_mv,
    };

    Ok(CpuResolution { point, table, dfll })
}

fn cpu_table(chip: &ChipConfig, speedo_id: i32, curve: &CompactedCurve) -> DvfsResult<DvfsTable> {
    DvfsTable::build(
        chip.cpu_domain.clk_name,
        ChipMatch::new(speedo_id, ANY_ID),
        chip.cpu_domain.auto_dvfs,
        MHZ,
        RailId::Cpu,
        curve.freqs.clone(),
        curve.pll_mv.clone(),
        Some(curve.dfll_mv.clone()),
    )
}

fn gpu_bound_mv(
    chip: &ChipConfig,
    identity: &dyn SiliconIdentity,
    core_nominal_mv: Millivolts,
) -> DvfsResult<Millivolts> {
    let ceiling = identity.gpu_speedo_mv().unwrap_or(chip.gpu_ceiling_mv);
    gpu_voltage_bound(chip.gpu_millivolts, core_nominal_mv, chip.gpu_coupling, ceiling)
        .map_err(|e| e.with_rail(RailId::Gpu))
}

fn resolve_gpu(
    chip: &ChipConfig,
    gpu_chip: ChipId,
    clocks: &dyn ClockTree,
    bound: Millivolts,
) -> DvfsResult<(NominalPoint, usize)> {
    let gpu = select_gpu_nominal(chip.gpu_domains, chip.gpu_millivolts, gpu_chip, bound, clocks)
        .map_err(|e| e.with_rail(RailId::Gpu))?;

    log::debug!("DVFS: gpu bound {}mV, nominal {}mV", bound, gpu.point.millivolts);
    Ok((gpu.point, gpu.template))
}

fn rail_report(ctx: &PowerDomainContext, id: RailId) -> RailReport {
    let rail = ctx.rail(id);
    RailReport {
        rail: id,
        nominal_mv: rail.hold_mv(),
        nominal_index: ctx.nominal_index(id).unwrap_or(0),
        scaling_enabled: !rail.is_disabled(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! # Domain Binder
//!
//! Attaches materialized voltage tables to their clocks and caps each
//! clock's maximum rate at the rate its rail's nominal voltage supports.
//!
//! ```text
//!   template ──match──▶ DvfsTable ──bind──▶ ClockTree
//!                                   │
//!                                   ├── set_max_rate(rate at nominal)
//!                                   ├── max_millivolts = rail nominal
//!                                   └── register_voltage_table
//! ```
//!
//! Shared buses get special treatment when capping:
//!
//! | Clock             | Max rate capped | Side effect                         |
//! |-------------------|-----------------|-------------------------------------|
//! | not auto-DVFS     | no              | none                                |
//! | EMC shared bus    | no              | none                                |
//! | CBUS shared bus   | no              | users follow their client's limit   |
//! | any other clock   | yes             | none                                |
//!
//! A failure binds nothing for that domain and never aborts the pass.

use crate::error::{DvfsResult, ErrorKind};
use crate::nominal::NominalPoint;
use crate::platform::{ClockHandle, ClockTree};
use crate::rail::RailId;
use crate::table::{ChipId, DvfsTable, DvfsTemplate};
use crate::{dvfs_bail, Hertz, Millivolts};

extern crate alloc;
use alloc::vec::Vec;

// =============================================================================
// MATERIALIZATION
// =============================================================================

/// Materialize the templates that apply to this chip.
///
/// Rows failing the predicate are skipped, malformed rows are logged and
/// skipped.
pub fn collect_matching(
    templates: &[DvfsTemplate],
    rail: RailId,
    ladder: &[Millivolts],
    chip: ChipId,
) -> Vec<DvfsTable> {
    templates
        .iter()
        .filter(|t| t.matches(chip))
        .filter_map(|t| match DvfsTable::from_template(t, rail, ladder) {
            Ok(table) => Some(table),
            Err(e) => {
                log::error!("DVFS: bad table for {}: {}", t.clk_name, e);
                None
            },
        })
        .collect()
}

// =============================================================================
// RATE CAPS
// =============================================================================

/// Decide whether a domain's maximum rate may be capped at its nominal rate.
///
/// For a CBUS aggregator this also pushes the limits down to the bus users:
/// each user is capped at its client's maximum rate, clipped to the bus rate
/// at the nominal step.
pub fn can_update_max_rate(
    clocks: &dyn ClockTree,
    clk: ClockHandle,
    table: &DvfsTable,
    nominal_index: usize,
) -> bool {
    if !table.auto_dvfs() {
        return false;
    }

    let flags = clocks.flags(clk);
    if flags.is_memory_bus() {
        return false;
    }

    if flags.is_common_bus() {
        let bus_rate = table.rate_at(nominal_index);
        for user in clocks.shared_bus_users(clk) {
            let Some(client) = user.client else {
                continue;
            };
            let mut rate: Hertz = clocks.max_rate(client);
            if let Some(bus_rate) = bus_rate {
                rate = rate.min(bus_rate);
            }
            clocks.set_max_rate(user.user, rate);
            clocks.set_shared_user_rate(user.user, rate);
        }
        return false;
    }

    true
}

// =============================================================================
// BINDING
// =============================================================================

/// Bind one table at its rail's nominal step
pub fn bind_one(clocks: &dyn ClockTree, table: &mut DvfsTable, nominal: NominalPoint) -> DvfsResult<()> {
    let name = table.clk_name();
    let Some(clk) = clocks.lookup(name) else {
        log::debug!("DVFS: no clock {}", name);
        dvfs_bail!(ErrorKind::BindingFailure, "Clock not found", "{}", name);
    };

    if can_update_max_rate(clocks, clk, table, nominal.index) {
        let rate = table
            .rate_at(nominal.index)
            .or_else(|| table.len().checked_sub(1).and_then(|top| table.rate_at(top)));
        match rate {
            Some(rate) if rate != 0 => clocks.set_max_rate(clk, rate),
            _ => dvfs_bail!(ErrorKind::InvalidTable, "No rate at nominal step", "{}", name),
        }
    }

    table.set_max_millivolts(nominal.millivolts);

    if let Err(e) = clocks.register_voltage_table(clk, table) {
        log::error!("DVFS: failed to enable dvfs on {}: {}", name, e);
        return Err(e.with_clock(name));
    }
    Ok(())
}

/// Outcome of a binding pass
#[derive(Debug, Default)]
pub struct BindOutcome {
    /// Tables now registered with their clocks
    pub bound: Vec<DvfsTable>,
    /// Domains that could not be bound
    pub skipped: usize,
}

/// Bind every table whose rail has a nominal point
pub fn bind_domains(
    clocks: &dyn ClockTree,
    tables: Vec<DvfsTable>,
    nominals: &[Option<NominalPoint>; RailId::COUNT],
) -> BindOutcome {
    let mut outcome = BindOutcome::default();

    for mut table in tables {
        let Some(nominal) = nominals[table.rail().index()] else {
            outcome.skipped += 1;
            continue;
        };

        match bind_one(clocks, &mut table, nominal) {
            Ok(()) => outcome.bound.push(table),
            Err(_) => outcome.skipped += 1,
        }
    }

    outcome
}

// =============================================================================
// TESTS
// =============================================================================

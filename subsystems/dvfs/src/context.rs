//! # Power Domain Context
//!
//! The [`PowerDomainContext`] owns everything the DVFS pass produces and the
//! clock framework consults afterwards.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          POWER DOMAIN CONTEXT                               │
//! │                                                                             │
//! │   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐                       │
//! │   │   VDD_CPU   │   │  VDD_CORE   │   │   VDD_GPU   │   Rail (lock, once)   │
//! │   └──────┬──────┘   └──────┬──────┘   └──────┬──────┘                       │
//! │          │                 │                 │                              │
//! │          ▼                 ▼                 ▼                              │
//! │      cpu_g table     core domain tables   gpu table     bound DvfsTables    │
//! │                                                                             │
//! │   RailController (shared)          DfllData (CPU closed loop)               │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The context is filled once by [`crate::init_dvfs`]. Afterwards only the
//! rails' scaling state changes.

use core::fmt;

use crate::error::{DvfsResult, ErrorKind};
use crate::platform::{DfllData, RailController};
use crate::rail::{Rail, RailDescriptor, RailId};
use crate::table::DvfsTable;
use crate::toggle::ScalingToggle;
use crate::{dvfs_bail, dvfs_ensure, Hertz, Millivolts};

extern crate alloc;
use alloc::sync::Arc;
use alloc::vec::Vec;

// =============================================================================
// POWER DOMAIN CONTEXT
// =============================================================================

/// Rails, bound tables and the regulator driver of one SoC
pub struct PowerDomainContext {
    rails: [Rail; RailId::COUNT],
    controller: Arc<dyn RailController>,
    tables: Vec<DvfsTable>,
    nominal_index: [Option<usize>; RailId::COUNT],
    dfll: Option<DfllData>,
    initialized: bool,
}

impl PowerDomainContext {
    /// Create a context from rail descriptors indexed by [`RailId::index`]
    pub fn new(
        rails: [RailDescriptor; RailId::COUNT],
        controller: Arc<dyn RailController>,
    ) -> DvfsResult<Self> {
        for (index, desc) in rails.iter().enumerate() {
            dvfs_ensure!(
                desc.id.index() == index,
                ErrorKind::InvalidArgument,
                "Rail descriptor out of order",
                "{} at slot {}",
                desc.id,
                index
            );
            desc.validate()?;
        }

        Ok(Self {
            rails: rails.map(Rail::new),
            controller,
            tables: Vec::new(),
            nominal_index: [None; RailId::COUNT],
            dfll: None,
            initialized: false,
        })
    }

    // =========================================================================
    // Rails
    // =========================================================================

    /// Get a rail
    pub fn rail(&self, id: RailId) -> &Rail {
        &self.rails[id.index()]
    }

    /// All rails in [`RailId::ALL`] order
    pub fn rails(&self) -> &[Rail] {
        &self.rails
    }

    /// Regulator driver
    pub fn controller(&self) -> &dyn RailController {
        &*self.controller
    }

    /// Runtime disable toggle of a rail
    pub fn toggle(&self, id: RailId) -> ScalingToggle<'_> {
        ScalingToggle::new(self.rail(id), &*self.controller)
    }

    /// Index of the rail's nominal step in its ladder
    pub fn nominal_index(&self, id: RailId) -> Option<usize> {
        self.nominal_index[id.index()]
    }

    pub(crate) fn set_nominal(&mut self, id: RailId, index: usize, mv: Millivolts) -> DvfsResult<()> {
        self.rail(id).set_nominal_mv(mv)?;
        self.nominal_index[id.index()] = Some(index);
        Ok(())
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Tables bound to their clocks
    pub fn tables(&self) -> &[DvfsTable] {
        &self.tables
    }

    /// Bound table of a clock
    pub fn table(&self, clk_name: &str) -> Option<&DvfsTable> {
        self.tables.iter().find(|t| t.clk_name() == clk_name)
    }

    pub(crate) fn install_tables(&mut self, tables: Vec<DvfsTable>) {
        self.tables.extend(tables);
    }

    /// Voltage a clock needs to run at `rate`.
    ///
    /// Evaluated under the rail lock: a disabled rail reports the voltage it
    /// is held at.
    pub fn voltage_for_rate(&self, clk_name: &str, rate: Hertz) -> DvfsResult<Millivolts> {
        let Some(table) = self.table(clk_name) else {
            dvfs_bail!(ErrorKind::NotFound, "No DVFS table for clock", "{}", clk_name);
        };

        let rail = self.rail(table.rail());
        let state = rail.lock();
        if state.disabled {
            return Ok(rail.hold_mv());
        }
        table.voltage_for_rate(rate)
    }

    // =========================================================================
    // Closed loop
    // =========================================================================

    /// CPU closed-loop characterization handed to the DFLL
    pub fn dfll_data(&self) -> Option<&DfllData> {
        self.dfll.as_ref()
    }

    pub(crate) fn set_dfll_data(&mut self, data: DfllData) {
        self.dfll = Some(data);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Check whether the initialization pass has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn mark_initialized(&mut self) -> DvfsResult<()> {
        dvfs_ensure!(
            !self.initialized,
            ErrorKind::AlreadyResolved,
            "DVFS already initialized"
        );
        self.initialized = true;
        Ok(())
    }
}

impl fmt::Debug for PowerDomainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PowerDomainContext")
            .field("rails", &self.rails)
            .field("tables", &self.tables.len())
            .field("nominal_index", &self.nominal_index)
            .field("initialized", &self.initialized)
            .finish()
    }
}

// =============================================================================
// CONTEXT BUILDER
// =============================================================================

/// Builder for PowerDomainContext
pub struct ContextBuilder {
    rails: Option<[RailDescriptor; RailId::COUNT]>,
    controller: Option<Arc<dyn RailController>>,
}

impl ContextBuilder {
    /// Create new builder
    pub fn new() -> Self {
        Self {
            rails: None,
            controller: None,
        }
    }

    /// Set rail descriptors
    pub fn rails(mut self, rails: [RailDescriptor; RailId::COUNT]) -> Self {
        self.rails = Some(rails);
        self
    }

    /// Set regulator driver
    pub fn controller(mut self, controller: Arc<dyn RailController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Build the context
    pub fn build(self) -> DvfsResult<PowerDomainContext> {
        let Some(rails) = self.rails else {
            dvfs_bail!(ErrorKind::InvalidArgument, "No rail descriptors");
        };
        let Some(controller) = self.controller else {
            dvfs_bail!(ErrorKind::InvalidArgument, "No rail controller");
        };
        PowerDomainContext::new(rails, controller)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("rails", &self.rails)
            .field("controller", &self.controller.is_some())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

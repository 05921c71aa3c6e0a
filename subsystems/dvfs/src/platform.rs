//! # Platform Services
//!
//! Contracts of the services the resolver consumes but does not own:
//!
//! | Service               | Used for                                         |
//! |-----------------------|--------------------------------------------------|
//! | [`ClockTree`]         | clock lookup, max-rate updates, table binding    |
//! | [`SiliconIdentity`]   | speedo/process ids, EDP ceiling                  |
//! | [`RailController`]    | applying enable/disable to the regulator         |
//! | [`ClosedLoopController`] | CPU DFLL characterization hand-off            |
//!
//! Implementations live in the board and clock drivers. The resolver only
//! calls through these traits.

use bitflags::bitflags;

use crate::error::DvfsResult;
use crate::rail::RailDescriptor;
use crate::table::DvfsTable;
use crate::{Hertz, Millivolts};

extern crate alloc;
use alloc::vec::Vec;

// =============================================================================
// CLOCK TREE
// =============================================================================

/// Opaque handle to a clock owned by the clock tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClockHandle(u32);

impl ClockHandle {
    /// Create new handle
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get raw value
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

bitflags! {
    /// Shared-bus properties of a clock
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClockFlags: u32 {
        /// Clock is a shared bus whose rate aggregates user requests
        const SHARED_BUS = 1 << 0;
        /// Shared bus of the external memory controller
        const EMC        = 1 << 1;
        /// Common peripheral bus aggregating several clients
        const CBUS       = 1 << 2;
    }
}

impl ClockFlags {
    /// Memory controller shared bus
    pub fn is_memory_bus(self) -> bool {
        self.contains(ClockFlags::SHARED_BUS | ClockFlags::EMC)
    }

    /// Common-bus aggregator
    pub fn is_common_bus(self) -> bool {
        self.contains(ClockFlags::SHARED_BUS | ClockFlags::CBUS)
    }
}

/// A user of a shared bus and the client clock it stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedBusUser {
    /// The shared-bus user clock
    pub user: ClockHandle,
    /// Client clock whose limit the user follows
    pub client: Option<ClockHandle>,
}

/// Clock-tree driver
pub trait ClockTree {
    /// Find a clock by name
    fn lookup(&self, name: &str) -> Option<ClockHandle>;

    /// Maximum rate the clock can currently reach
    fn max_rate(&self, clk: ClockHandle) -> Hertz;

    /// Cap the clock's maximum rate
    fn set_max_rate(&self, clk: ClockHandle, rate: Hertz);

    /// Shared-bus flags of the clock
    fn flags(&self, clk: ClockHandle) -> ClockFlags;

    /// Users attached to a shared bus, in attach order
    fn shared_bus_users(&self, bus: ClockHandle) -> Vec<SharedBusUser>;

    /// Set the rate a shared-bus user requests from its bus
    fn set_shared_user_rate(&self, user: ClockHandle, rate: Hertz);

    /// Bind a voltage table to the clock.
    ///
    /// Afterwards every rate change on the clock is checked against it.
    fn register_voltage_table(&self, clk: ClockHandle, table: &DvfsTable) -> DvfsResult<()>;
}

// =============================================================================
// SILICON IDENTITY
// =============================================================================

/// Fuse/speedo readers
pub trait SiliconIdentity {
    /// CPU speedo id
    fn cpu_speedo_id(&self) -> i32;

    /// SoC speedo id
    fn soc_speedo_id(&self) -> i32;

    /// Core process id
    fn core_process_id(&self) -> i32;

    /// Board core EDP ceiling, if one is set
    fn core_edp_limit_mv(&self) -> Option<Millivolts>;

    /// Raw CPU speedo measurement fed to the CVB model
    fn cpu_speedo_value(&self) -> i32 {
        0
    }

    /// Characterized core voltage, if the fuses carry one
    fn core_speedo_mv(&self) -> Option<Millivolts> {
        None
    }

    /// Characterized GPU voltage ceiling, if the fuses carry one
    fn gpu_speedo_mv(&self) -> Option<Millivolts> {
        None
    }

    /// GPU speedo id
    fn gpu_speedo_id(&self) -> i32 {
        crate::ANY_ID
    }

    /// GPU process id
    fn gpu_process_id(&self) -> i32 {
        crate::ANY_ID
    }
}

// =============================================================================
// RAIL CONTROL
// =============================================================================

/// Regulator driver side of a rail
pub trait RailController: Send + Sync {
    /// Resume voltage scaling on the rail
    fn enable(&self, rail: &RailDescriptor) -> DvfsResult<()>;

    /// Stop voltage scaling and hold the rail at `hold_mv`
    fn disable(&self, rail: &RailDescriptor, hold_mv: Millivolts) -> DvfsResult<()>;

    /// Called before the rail is disabled
    fn disable_prepare(&self, _rail: &RailDescriptor) -> DvfsResult<()> {
        Ok(())
    }

    /// Called after the rail is enabled
    fn post_enable(&self, _rail: &RailDescriptor) -> DvfsResult<()> {
        Ok(())
    }
}

// =============================================================================
// CLOSED-LOOP CONTROLLER
// =============================================================================

/// CPU DFLL characterization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfllData {
    /// DFLL clock name
    pub dfll_clk_name: &'static str,
    /// Tuning register 0
    pub tune0: u32,
    /// Tuning register 1
    pub tune1: u32,
    /// Minimum rate for droop control
    pub droop_rate_min: Hertz,
    /// Highest rate reachable at the minimum voltage
    pub out_rate_min: Hertz,
    /// Minimum voltage of the closed-loop curve
    pub millivolts_min: Millivolts,
}

/// Closed-loop (DFLL) CPU clock controller
pub trait ClosedLoopController {
    /// Hand over the characterization resolved for this chip
    fn set_dfll_data(&self, data: &DfllData) -> DvfsResult<()>;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FusedNothing;

    impl SiliconIdentity for FusedNothing {
        fn cpu_speedo_id(&self) -> i32 {
            1
        }

        fn soc_speedo_id(&self) -> i32 {
            2
        }

        fn core_process_id(&self) -> i32 {
            3
        }

        fn core_edp_limit_mv(&self) -> Option<Millivolts> {
            None
        }
    }

    #[test]
    fn test_bus_flags() {
        let emc = ClockFlags::SHARED_BUS | ClockFlags::EMC;
        assert!(emc.is_memory_bus());
        assert!(!emc.is_common_bus());

        let cbus = ClockFlags::SHARED_BUS | ClockFlags::CBUS;
        assert!(cbus.is_common_bus());
        assert!(!cbus.is_memory_bus());

        // Flags alone do not make a shared bus
        assert!(!ClockFlags::EMC.is_memory_bus());
        assert!(!ClockFlags::default().is_common_bus());
    }

    #[test]
    fn test_identity_defaults() {
        let id = FusedNothing;
        assert_eq!(id.cpu_speedo_value(), 0);
        assert_eq!(id.core_speedo_mv(), None);
        assert_eq!(id.gpu_speedo_mv(), None);
        assert_eq!(id.gpu_speedo_id(), crate::ANY_ID);
        assert_eq!(id.gpu_process_id(), crate::ANY_ID);
    }
}

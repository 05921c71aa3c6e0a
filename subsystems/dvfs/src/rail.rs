//! # Voltage Rails
//!
//! Static description and runtime state of each independently regulated
//! voltage rail.
//!
//! A rail's nominal voltage is resolved once during the DVFS initialization
//! pass and is read-only afterwards. The only state that changes at runtime
//! is the scaling enable/disable flag, which lives behind a per-rail lock so
//! that a toggle is atomic with respect to voltage decisions on that rail.
//!
//! ## Rail State Machine
//!
//! ```text
//!   ┌──────────────┐   disable()    ┌──────────────────────────┐
//!   │   SCALING    │ ─────────────▶ │  DISABLED (hold nominal) │
//!   │   enabled    │ ◀───────────── │                          │
//!   └──────────────┘    enable()    └──────────────────────────┘
//! ```
//!
//! Repeating a transition in the current state is a no-op and does not
//! reach the regulator driver.

use core::fmt;

use bitflags::bitflags;
use spin::{Mutex, MutexGuard, Once};

use crate::error::{DvfsResult, ErrorKind};
use crate::platform::RailController;
use crate::{dvfs_bail, dvfs_ensure, Millivolts};

// =============================================================================
// RAIL IDENTITY
// =============================================================================

/// Rail identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RailId {
    /// CPU cluster rail
    Cpu  = 0,
    /// Core logic rail
    Core = 1,
    /// GPU rail
    Gpu  = 2,
}

impl RailId {
    /// All rails in resolution-report order
    pub const ALL: [RailId; 3] = [RailId::Cpu, RailId::Core, RailId::Gpu];

    /// Number of rails
    pub const COUNT: usize = 3;

    /// Index into per-rail arrays
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Regulator id of the rail
    pub const fn reg_id(self) -> &'static str {
        match self {
            RailId::Cpu => "vdd_cpu",
            RailId::Core => "vdd_core",
            RailId::Gpu => "vdd_gpu",
        }
    }

    /// Upper-case name used in boot logs
    pub const fn label(self) -> &'static str {
        match self {
            RailId::Cpu => "VDD_CPU",
            RailId::Core => "VDD_CORE",
            RailId::Gpu => "VDD_GPU",
        }
    }
}

impl fmt::Display for RailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reg_id())
    }
}

bitflags! {
    /// Electrical properties of a rail
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RailFlags: u32 {
        /// Regulator may jump straight to 0 mV when the rail is turned off
        const JUMP_TO_ZERO = 1 << 0;
    }
}

// =============================================================================
// RAIL DESCRIPTOR
// =============================================================================

/// Static rail description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailDescriptor {
    /// Rail id
    pub id: RailId,
    /// Lowest regulator voltage
    pub min_mv: Millivolts,
    /// Highest regulator voltage
    pub max_mv: Millivolts,
    /// Largest single voltage step the regulator may take
    pub step_mv: Millivolts,
    /// Electrical properties
    pub flags: RailFlags,
}

impl RailDescriptor {
    /// Create a descriptor
    pub const fn new(id: RailId, min_mv: Millivolts, max_mv: Millivolts, step_mv: Millivolts) -> Self {
        Self {
            id,
            min_mv,
            max_mv,
            step_mv,
            flags: RailFlags::empty(),
        }
    }

    /// Set electrical property flags
    pub const fn with_flags(mut self, flags: RailFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check that a voltage is inside the regulator window
    pub const fn contains(&self, mv: Millivolts) -> bool {
        mv >= self.min_mv && mv <= self.max_mv
    }

    /// Check descriptor consistency
    pub fn validate(&self) -> DvfsResult<()> {
        dvfs_ensure!(
            self.min_mv <= self.max_mv && self.step_mv > 0,
            ErrorKind::InvalidTable,
            "Inconsistent rail descriptor",
            "{}: min {}mV max {}mV step {}mV",
            self.id,
            self.min_mv,
            self.max_mv,
            self.step_mv
        );
        Ok(())
    }
}

// =============================================================================
// RAIL STATE
// =============================================================================

/// Mutable rail state, only touched under the rail lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RailState {
    /// Scaling is disabled and the rail holds its nominal voltage
    pub disabled: bool,
    /// Requested value of the disable toggle
    pub toggle: bool,
}

// =============================================================================
// RAIL
// =============================================================================

/// A voltage rail with its resolved nominal voltage and scaling state
#[derive(Debug)]
pub struct Rail {
    desc: RailDescriptor,
    nominal_mv: Once<Millivolts>,
    state: Mutex<RailState>,
}

impl Rail {
    /// Create a rail with scaling enabled and no nominal voltage
    pub const fn new(desc: RailDescriptor) -> Self {
        Self {
            desc,
            nominal_mv: Once::new(),
            state: Mutex::new(RailState {
                disabled: false,
                toggle: false,
            }),
        }
    }

    /// Rail id
    pub fn id(&self) -> RailId {
        self.desc.id
    }

    /// Static description
    pub fn descriptor(&self) -> &RailDescriptor {
        &self.desc
    }

    /// Resolved nominal voltage, if any
    pub fn nominal_mv(&self) -> Option<Millivolts> {
        self.nominal_mv.get().copied()
    }

    /// Record the nominal voltage.
    ///
    /// Fails with `OutOfRange` outside `[min_mv, max_mv]` and with
    /// `AlreadyResolved` on a second call.
    pub fn set_nominal_mv(&self, mv: Millivolts) -> DvfsResult<()> {
        if !self.desc.contains(mv) {
            dvfs_bail!(
                ErrorKind::OutOfRange,
                "Nominal voltage outside rail window",
                "{}: {}mV not in [{}, {}]",
                self.desc.id,
                mv,
                self.desc.min_mv,
                self.desc.max_mv
            );
        }

        let mut written = false;
        self.nominal_mv.call_once(|| {
            written = true;
            mv
        });

        dvfs_ensure!(
            written,
            ErrorKind::AlreadyResolved,
            "Nominal voltage already resolved",
            "{}",
            self.desc.id
        );
        Ok(())
    }

    /// Voltage a disabled rail is held at.
    ///
    /// This is the nominal voltage, or the regulator maximum while the
    /// nominal is still unresolved.
    pub fn hold_mv(&self) -> Millivolts {
        self.nominal_mv().unwrap_or(self.desc.max_mv)
    }

    /// Check whether scaling is disabled
    pub fn is_disabled(&self) -> bool {
        self.state.lock().disabled
    }

    /// Snapshot of the scaling state
    pub fn state(&self) -> RailState {
        *self.state.lock()
    }

    /// Take the rail lock.
    ///
    /// Voltage decisions made while the guard is held cannot interleave
    /// with a concurrent enable/disable.
    pub fn lock(&self) -> MutexGuard<'_, RailState> {
        self.state.lock()
    }

    /// Request scaling to be disabled without touching the regulator yet.
    ///
    /// Used during initialization; the request is applied to the regulator
    /// at the end of the pass.
    pub fn request_disabled(&self) {
        self.state.lock().toggle = true;
    }

    /// Check whether disabling has been requested
    pub fn disable_requested(&self) -> bool {
        self.state.lock().toggle
    }

    /// Disable scaling and hold the rail at its nominal voltage
    pub fn disable(&self, controller: &dyn RailController) -> DvfsResult<()> {
        let mut state = self.state.lock();
        self.disable_locked(&mut state, controller)
    }

    /// Re-enable scaling
    pub fn enable(&self, controller: &dyn RailController) -> DvfsResult<()> {
        let mut state = self.state.lock();
        self.enable_locked(&mut state, controller)
    }

    pub(crate) fn disable_locked(
        &self,
        state: &mut RailState,
        controller: &dyn RailController,
    ) -> DvfsResult<()> {
        if state.disabled {
            return Ok(());
        }

        controller.disable_prepare(&self.desc)?;
        controller.disable(&self.desc, self.hold_mv())?;
        state.disabled = true;

        log::debug!("DVFS: {} scaling disabled at {}mV", self.desc.id, self.hold_mv());
        Ok(())
    }

    pub(crate) fn enable_locked(
        &self,
        state: &mut RailState,
        controller: &dyn RailController,
    ) -> DvfsResult<()> {
        if !state.disabled {
            return Ok(());
        }

        controller.enable(&self.desc)?;
        controller.post_enable(&self.desc)?;
        state.disabled = false;

        log::debug!("DVFS: {} scaling enabled", self.desc.id);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRailController, RailCall};

    fn core_rail() -> Rail {
        Rail::new(RailDescriptor::new(RailId::Core, 800, 1350, 100))
    }

    #[test]
    fn test_nominal_is_write_once() {
        let rail = core_rail();
        assert_eq!(rail.nominal_mv(), None);

        rail.set_nominal_mv(1100).unwrap();
        assert_eq!(rail.nominal_mv(), Some(1100));

        let err = rail.set_nominal_mv(1050).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyResolved);
        assert_eq!(rail.nominal_mv(), Some(1100));
    }

    #[test]
    fn test_nominal_must_be_in_window() {
        let rail = core_rail();
        assert_eq!(rail.set_nominal_mv(700).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(rail.set_nominal_mv(1400).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(rail.nominal_mv(), None);
        assert!(rail.set_nominal_mv(800).is_ok());
    }

    #[test]
    fn test_hold_voltage() {
        let rail = core_rail();
        assert_eq!(rail.hold_mv(), 1350);
        rail.set_nominal_mv(1100).unwrap();
        assert_eq!(rail.hold_mv(), 1100);
    }

    #[test]
    fn test_disable_enable_reach_controller_once() {
        let rail = core_rail();
        rail.set_nominal_mv(1100).unwrap();
        let ctl = MockRailController::new();

        rail.disable(&ctl).unwrap();
        rail.disable(&ctl).unwrap();
        assert!(rail.is_disabled());

        rail.enable(&ctl).unwrap();
        rail.enable(&ctl).unwrap();
        assert!(!rail.is_disabled());

        assert_eq!(
            ctl.calls(),
            alloc::vec![
                RailCall::DisablePrepare(RailId::Core),
                RailCall::Disable(RailId::Core, 1100),
                RailCall::Enable(RailId::Core),
                RailCall::PostEnable(RailId::Core),
            ]
        );
    }

    #[test]
    fn test_failed_disable_keeps_state() {
        let rail = core_rail();
        rail.set_nominal_mv(1100).unwrap();
        let ctl = MockRailController::new();
        ctl.fail_next();

        assert_eq!(rail.disable(&ctl).unwrap_err().kind(), ErrorKind::RailControlFailed);
        assert!(!rail.is_disabled());
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(RailDescriptor::new(RailId::Gpu, 850, 1350, 100).validate().is_ok());
        assert!(RailDescriptor::new(RailId::Gpu, 1350, 850, 100).validate().is_err());
        assert!(RailDescriptor::new(RailId::Gpu, 850, 1350, 0).validate().is_err());
    }
}

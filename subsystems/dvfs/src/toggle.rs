//! # Scaling Toggles
//!
//! One boolean control per rail (`disable_cpu`, `disable_core`,
//! `disable_gpu`) lets an operator stop voltage scaling at runtime.
//!
//! Writing the toggle records the value and drives the rail:
//!
//! ```text
//!   set(true)  ──▶ rail lock ──▶ disable (hold nominal)   no-op if disabled
//!   set(false) ──▶ rail lock ──▶ enable                   no-op if enabled
//! ```
//!
//! Reads always return the last value written, even if driving the rail
//! failed.

use crate::dvfs_bail;
use crate::error::{DvfsResult, ErrorKind};
use crate::platform::RailController;
use crate::rail::{Rail, RailId};

/// Control name of a rail's toggle
pub const fn toggle_name(rail: RailId) -> &'static str {
    match rail {
        RailId::Cpu => "disable_cpu",
        RailId::Core => "disable_core",
        RailId::Gpu => "disable_gpu",
    }
}

/// Parse a boolean control value
pub fn parse_bool(arg: &str) -> DvfsResult<bool> {
    match arg.trim() {
        "y" | "Y" | "1" | "on" | "true" => Ok(true),
        "n" | "N" | "0" | "off" | "false" => Ok(false),
        other => dvfs_bail!(
            ErrorKind::InvalidArgument,
            "Not a boolean",
            "\"{}\"",
            other
        ),
    }
}

/// Runtime disable control of one rail
#[derive(Clone, Copy)]
pub struct ScalingToggle<'a> {
    rail: &'a Rail,
    controller: &'a dyn RailController,
}

impl<'a> ScalingToggle<'a> {
    /// Create a toggle driving `rail` through `controller`
    pub fn new(rail: &'a Rail, controller: &'a dyn RailController) -> Self {
        Self { rail, controller }
    }

    /// Control name
    pub fn name(&self) -> &'static str {
        toggle_name(self.rail.id())
    }

    /// Last value written
    pub fn get(&self) -> bool {
        self.rail.state().toggle
    }

    /// Value in control-file form
    pub fn get_str(&self) -> &'static str {
        if self.get() {
            "Y"
        } else {
            "N"
        }
    }

    /// Record `disable` and drive the rail to match
    pub fn set(&self, disable: bool) -> DvfsResult<()> {
        let mut state = self.rail.lock();
        state.toggle = disable;

        let result = if disable {
            self.rail.disable_locked(&mut state, self.controller)
        } else {
            self.rail.enable_locked(&mut state, self.controller)
        };

        result.map_err(|e| {
            log::error!("DVFS: {} = {} failed: {}", self.name(), disable, e);
            e.with_rail(self.rail.id())
        })
    }

    /// Parse and apply a control-file value.
    ///
    /// An unparsable value is rejected and leaves the toggle unchanged.
    pub fn set_str(&self, arg: &str) -> DvfsResult<()> {
        let disable = parse_bool(arg)?;
        self.set(disable)
    }
}

impl core::fmt::Debug for ScalingToggle<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScalingToggle")
            .field("name", &self.name())
            .field("value", &self.get())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRailController, RailCall};
    use crate::rail::RailDescriptor;

    fn cpu_rail() -> Rail {
        let rail = Rail::new(RailDescriptor::new(RailId::Cpu, 800, 1250, 100));
        rail.set_nominal_mv(1150).unwrap();
        rail
    }

    #[test]
    fn test_parse_bool() {
        for arg in ["y", "Y", "1", "on", "true", " 1\n"] {
            assert_eq!(parse_bool(arg), Ok(true));
        }
        for arg in ["n", "N", "0", "off", "false"] {
            assert_eq!(parse_bool(arg), Ok(false));
        }
        assert_eq!(parse_bool("maybe").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_disable_reaches_rail_once() {
        let rail = cpu_rail();
        let ctl = MockRailController::new();
        let toggle = ScalingToggle::new(&rail, &ctl);
        assert_eq!(toggle.name(), "disable_cpu");
        assert!(!toggle.get());

        toggle.set(true).unwrap();
        toggle.set(true).unwrap();

        assert!(toggle.get());
        assert_eq!(toggle.get_str(), "Y");
        assert!(rail.is_disabled());
        assert_eq!(
            ctl.calls(),
            alloc::vec![
                RailCall::DisablePrepare(RailId::Cpu),
                RailCall::Disable(RailId::Cpu, 1150)
            ]
        );
    }

    #[test]
    fn test_enable_after_disable() {
        let rail = cpu_rail();
        let ctl = MockRailController::new();
        let toggle = ScalingToggle::new(&rail, &ctl);

        toggle.set_str("1").unwrap();
        toggle.set_str("0").unwrap();
        toggle.set_str("N").unwrap();

        assert!(!toggle.get());
        assert!(!rail.is_disabled());
        assert_eq!(ctl.calls().len(), 4);
        assert_eq!(ctl.calls()[3], RailCall::PostEnable(RailId::Cpu));
    }

    #[test]
    fn test_bad_value_leaves_toggle_unchanged() {
        let rail = cpu_rail();
        let ctl = MockRailController::new();
        let toggle = ScalingToggle::new(&rail, &ctl);

        toggle.set(true).unwrap();
        assert!(toggle.set_str("bogus").is_err());
        assert!(toggle.get());
        assert!(rail.is_disabled());
    }

    #[test]
    fn test_failed_disable_keeps_written_value() {
        let rail = cpu_rail();
        let ctl = MockRailController::new();
        let toggle = ScalingToggle::new(&rail, &ctl);
        ctl.fail_next();

        let err = toggle.set(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RailControlFailed);
        assert_eq!(err.rail(), Some(RailId::Cpu));
        assert!(toggle.get());
        assert!(!rail.is_disabled());
    }
}

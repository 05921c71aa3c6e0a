//! In-memory platform services for unit tests.

use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::error::{DvfsError, DvfsResult, ErrorKind};
use crate::platform::{
    ClockFlags, ClockHandle, ClockTree, ClosedLoopController, DfllData, RailController,
    SharedBusUser, SiliconIdentity,
};
use crate::rail::{RailDescriptor, RailId};
use crate::table::DvfsTable;
use crate::{Hertz, Millivolts, ANY_ID};

use alloc::vec::Vec;

// =============================================================================
// CLOCK TREE
// =============================================================================

#[derive(Debug)]
struct MockClock {
    name: &'static str,
    max_rate: Hertz,
    flags: ClockFlags,
    users: Vec<SharedBusUser>,
    shared_rate: Option<Hertz>,
    table: Option<DvfsTable>,
    fail_registration: bool,
}

#[derive(Debug, Default)]
pub struct MockClockTree {
    clocks: Mutex<Vec<MockClock>>,
}

impl MockClockTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_clock(&self, name: &'static str, max_rate: Hertz, flags: ClockFlags) -> ClockHandle {
        let mut clocks = self.clocks.lock();
        clocks.push(MockClock {
            name,
            max_rate,
            flags,
            users: Vec::new(),
            shared_rate: None,
            table: None,
            fail_registration: false,
        });
        ClockHandle::new(clocks.len() as u32 - 1)
    }

    pub fn attach_user(&self, bus: ClockHandle, user: &str, client: Option<ClockHandle>) {
        let Some(user) = self.lookup(user) else {
            panic!("unknown user clock {user}");
        };
        self.clocks.lock()[bus.raw() as usize]
            .users
            .push(SharedBusUser { user, client });
    }

    pub fn fail_registration(&self, name: &str) {
        if let Some(clk) = self.clocks.lock().iter_mut().find(|c| c.name == name) {
            clk.fail_registration = true;
        }
    }

    pub fn max_rate_of(&self, name: &str) -> Option<Hertz> {
        self.clocks.lock().iter().find(|c| c.name == name).map(|c| c.max_rate)
    }

    pub fn shared_rate_of(&self, name: &str) -> Option<Hertz> {
        self.clocks.lock().iter().find(|c| c.name == name).and_then(|c| c.shared_rate)
    }

    pub fn registered(&self, name: &str) -> Option<DvfsTable> {
        self.clocks.lock().iter().find(|c| c.name == name).and_then(|c| c.table.clone())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered(name).is_some()
    }
}

impl ClockTree for MockClockTree {
    fn lookup(&self, name: &str) -> Option<ClockHandle> {
        self.clocks
            .lock()
            .iter()
            .position(|c| c.name == name)
            .map(|i| ClockHandle::new(i as u32))
    }

    fn max_rate(&self, clk: ClockHandle) -> Hertz {
        self.clocks.lock()[clk.raw() as usize].max_rate
    }

    fn set_max_rate(&self, clk: ClockHandle, rate: Hertz) {
        self.clocks.lock()[clk.raw() as usize].max_rate = rate;
    }

    fn flags(&self, clk: ClockHandle) -> ClockFlags {
        self.clocks.lock()[clk.raw() as usize].flags
    }

    fn shared_bus_users(&self, bus: ClockHandle) -> Vec<SharedBusUser> {
        self.clocks.lock()[bus.raw() as usize].users.clone()
    }

    fn set_shared_user_rate(&self, user: ClockHandle, rate: Hertz) {
        self.clocks.lock()[user.raw() as usize].shared_rate = Some(rate);
    }

    fn register_voltage_table(&self, clk: ClockHandle, table: &DvfsTable) -> DvfsResult<()> {
        let mut clocks = self.clocks.lock();
        let clock = &mut clocks[clk.raw() as usize];
        if clock.fail_registration {
            return Err(DvfsError::new(ErrorKind::BindingFailure, "registration refused"));
        }
        clock.table = Some(table.clone());
        Ok(())
    }
}

// =============================================================================
// SILICON IDENTITY
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct MockIdentity {
    pub cpu_speedo_id: i32,
    pub cpu_speedo_value: i32,
    pub soc_speedo_id: i32,
    pub core_process_id: i32,
    pub core_speedo_mv: Option<Millivolts>,
    pub core_edp_limit_mv: Option<Millivolts>,
    pub gpu_speedo_mv: Option<Millivolts>,
    pub gpu_speedo_id: i32,
    pub gpu_process_id: i32,
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self {
            cpu_speedo_id: 0,
            cpu_speedo_value: 0,
            soc_speedo_id: 0,
            core_process_id: 0,
            core_speedo_mv: None,
            core_edp_limit_mv: None,
            gpu_speedo_mv: None,
            gpu_speedo_id: ANY_ID,
            gpu_process_id: ANY_ID,
        }
    }
}

impl SiliconIdentity for MockIdentity {
    fn cpu_speedo_id(&self) -> i32 {
        self.cpu_speedo_id
    }

    fn soc_speedo_id(&self) -> i32 {
        self.soc_speedo_id
    }

    fn core_process_id(&self) -> i32 {
        self.core_process_id
    }

    fn core_edp_limit_mv(&self) -> Option<Millivolts> {
        self.core_edp_limit_mv
    }

    fn cpu_speedo_value(&self) -> i32 {
        self.cpu_speedo_value
    }

    fn core_speedo_mv(&self) -> Option<Millivolts> {
        self.core_speedo_mv
    }

    fn gpu_speedo_mv(&self) -> Option<Millivolts> {
        self.gpu_speedo_mv
    }

    fn gpu_speedo_id(&self) -> i32 {
        self.gpu_speedo_id
    }

    fn gpu_process_id(&self) -> i32 {
        self.gpu_process_id
    }
}

// =============================================================================
// RAIL CONTROLLER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailCall {
    DisablePrepare(RailId),
    Disable(RailId, Millivolts),
    Enable(RailId),
    PostEnable(RailId),
}

#[derive(Debug, Default)]
pub struct MockRailController {
    calls: Mutex<Vec<RailCall>>,
    fail_next: AtomicBool,
}

impl MockRailController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RailCall> {
        self.calls.lock().clone()
    }

    /// Make the next call fail without being recorded
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: RailCall) -> DvfsResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DvfsError::new(ErrorKind::RailControlFailed, "regulator refused"));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

impl RailController for MockRailController {
    fn enable(&self, rail: &RailDescriptor) -> DvfsResult<()> {
        self.record(RailCall::Enable(rail.id))
    }

    fn disable(&self, rail: &RailDescriptor, hold_mv: Millivolts) -> DvfsResult<()> {
        self.record(RailCall::Disable(rail.id, hold_mv))
    }

    fn disable_prepare(&self, rail: &RailDescriptor) -> DvfsResult<()> {
        self.record(RailCall::DisablePrepare(rail.id))
    }

    fn post_enable(&self, rail: &RailDescriptor) -> DvfsResult<()> {
        self.record(RailCall::PostEnable(rail.id))
    }
}

// =============================================================================
// CLOSED-LOOP CONTROLLER
// =============================================================================

#[derive(Debug, Default)]
pub struct MockDfll {
    data: Mutex<Option<DfllData>>,
}

impl MockDfll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> Option<DfllData> {
        *self.data.lock()
    }
}

impl ClosedLoopController for MockDfll {
    fn set_dfll_data(&self, data: &DfllData) -> DvfsResult<()> {
        *self.data.lock() = Some(*data);
        Ok(())
    }
}

//! # Data Store

use comms_if::eqpt::{
    ball::{BallLaunch, BallState},
    joint::JointDems,
};
use log::{info, warn};

use crate::swing_ctrl;

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Gives the reason the exec has been put into safe mode
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SafeModeCause {
    MakeSafeTc,
    CycleOverruns,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// Exec time at the start of this cycle
    pub time_s: f64,

    // Safe mode variables
    /// Determines if the exec is in safe mode.
    pub safe: bool,

    /// Gives the reason for the exec being in safe mode.
    pub safe_cause: Option<SafeModeCause>,

    // Ball
    /// Ball to throw this cycle
    pub ball_launch: Option<BallLaunch>,

    /// Latest ball snapshot
    pub ball: Option<BallState>,

    // SwingCtrl
    pub swing_ctrl_input: swing_ctrl::InputData,
    pub swing_ctrl_output: JointDems,
    pub swing_ctrl_status_rpt: swing_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Puts the exec into safe mode with the given cause.
    pub fn make_safe(&mut self, cause: SafeModeCause) {
        if !self.safe {
            warn!("Make safe requested, cause: {:?}", cause);
            self.safe = true;
            self.safe_cause = Some(cause);
        }
    }

    /// Attempts to disable the safe mode by clearing the given cause.
    ///
    /// Returns `Ok(())` if this cause was cleared and safe mode was disabled, or `Err(())`
    /// otherwise. To remove safe mode the provided cause must match the initial reason for safe
    /// mode being enabled.
    ///
    /// If safe mode was not enabled `Ok(())` is returned
    pub fn make_unsafe(&mut self, cause: SafeModeCause) -> Result<(), ()> {
        if !self.safe {
            return Ok(());
        }

        match self.safe_cause {
            Some(root_cause) if root_cause != cause => Err(()),
            _ => {
                self.safe = false;
                self.safe_cause = None;
                info!("Make unsafe requested, root cause match, safe mode disabled");
                Ok(())
            }
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle and sets the cycle time.
    pub fn cycle_start(&mut self, time_s: f64) {
        self.time_s = time_s;

        self.ball_launch = None;
        self.ball = None;

        self.swing_ctrl_input = swing_ctrl::InputData {
            time_s,
            ..Default::default()
        };
        self.swing_ctrl_output = JointDems::default();
        self.swing_ctrl_status_rpt = swing_ctrl::StatusReport::default();
    }
}

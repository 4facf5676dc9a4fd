//! # Telecommand processor module
//!
//! The telecommand processor handles various TCs coming from any source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use comms_if::tc::Tc;
use swing_lib::data_store::{DataStore, SafeModeCause};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Mutates the datastore to send commands to different modules.
pub(crate) fn exec(ds: &mut DataStore, tc: &Tc) {
    // Handle different Tcs
    match tc {
        Tc::MakeSafe => {
            debug!("Recieved MakeSafe command");
            ds.make_safe(SafeModeCause::MakeSafeTc);
        }
        Tc::MakeUnsafe => {
            debug!("Recieved MakeUnsafe command");
            ds.make_unsafe(SafeModeCause::MakeSafeTc).ok();
        }
        Tc::LaunchBall(l) => ds.ball_launch = Some(*l),
        Tc::SwingCtrl(cmd) => ds.swing_ctrl_input.cmd = Some(cmd.clone()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::swing_ctrl::SwingCmd;

    #[test]
    fn test_exec() {
        let mut ds = DataStore::default();

        exec(&mut ds, &Tc::MakeSafe);
        assert!(ds.safe);
        exec(&mut ds, &Tc::MakeUnsafe);
        assert!(!ds.safe);

        exec(&mut ds, &Tc::SwingCtrl(SwingCmd::SetSecondaryGain { gain: 0.5 }));
        assert_eq!(
            ds.swing_ctrl_input.cmd,
            Some(SwingCmd::SetSecondaryGain { gain: 0.5 })
        );
    }
}

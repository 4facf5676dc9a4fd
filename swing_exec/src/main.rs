//! Main swing executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Telecommand processing and handling
//!         - Ball simulation
//!         - Swing control processing
//!         - Cycle management
//!
//! # Modules
//!
//! All modules (e.g. `swing_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use swing_lib::{
    ball_sim::BallSim,
    data_store::{DataStore, SafeModeCause},
    params::SwingExecParams,
    swing_ctrl::{PlanMode, SwingAlert, SwingCtrl, SwingCtrlParams},
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs the swing control loop against a scripted sequence of telecommands.
#[derive(Debug, StructOpt)]
#[structopt(name = "swing_exec")]
struct Opts {
    /// Path to the TC script to execute
    #[structopt(parse(from_os_str))]
    script: PathBuf,

    /// Run cycles back to back with simulated time instead of in real time
    #[structopt(long)]
    fast: bool,

    /// Log per-sample detail of the planners
    #[structopt(long)]
    trace: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("swing_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let planner_level = if opts.trace {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    logger_init(
        LevelFilter::Debug,
        &[
            ("swing_lib::ikin", planner_level),
            ("swing_lib::traj_gen", planner_level),
            ("swing_lib::swing_ctrl", planner_level),
        ],
        &session,
    )
    .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Swing Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: SwingExecParams =
        util::params::load("swing_exec.toml").wrap_err("Could not load exec params")?;
    let mut swing_ctrl_params: SwingCtrlParams =
        util::params::load("swing_ctrl.toml").wrap_err("Could not load swing_ctrl params")?;

    // Simulated time outruns a background planner
    if opts.fast && swing_ctrl_params.plan_mode == PlanMode::Worker {
        info!("Fast mode, planning inline");
        swing_ctrl_params.plan_mode = PlanMode::Inline;
    }

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    info!("Loading script from {:?}", opts.script);

    let mut script =
        ScriptInterpreter::new(&opts.script).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} TCs\n",
        script.get_duration(),
        script.get_num_tcs()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    let mut swing_ctrl =
        SwingCtrl::new(swing_ctrl_params).wrap_err("Failed to create SwingCtrl")?;
    swing_ctrl
        .init((), &session)
        .wrap_err("Failed to initialise SwingCtrl")?;
    info!("SwingCtrl init complete");

    let mut ball_sim = BallSim::new(&exec_params.ball_sim);

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let mut script_end_s: Option<f64> = None;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        let time_s = if opts.fast {
            ds.num_cycles as f64 * exec_params.cycle_period_s
        } else {
            session::get_elapsed_seconds()
        };

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(time_s);

        // ---- TELECOMMAND PROCESSING ----

        match script.get_pending_tcs(time_s) {
            PendingTcs::None => (),
            PendingTcs::Some(tc_vec) => {
                for tc in tc_vec.iter() {
                    tc_processor::exec(&mut ds, tc);
                }
            }
            PendingTcs::EndOfScript => {
                let end_s = *script_end_s.get_or_insert_with(|| {
                    info!("End of TC script reached");
                    time_s
                });

                // Exit once the last ball has had time to fly
                if time_s - end_s > exec_params.script_end_delay_s {
                    info!("Script end delay elapsed, stopping");
                    break;
                }
            }
        }

        // ---- BALL SIMULATION ----

        if let Some(launch) = ds.ball_launch {
            ball_sim.launch(&launch, time_s);
        }
        ds.ball = ball_sim.step(time_s);

        // ---- CONTROL ALGORITHM PROCESSING ----

        ds.swing_ctrl_input.ball = ds.ball;
        ds.swing_ctrl_input.safe = ds.safe;

        // SwingCtrl processing cannot fail, failures are reported in the status report
        match swing_ctrl.proc(&ds.swing_ctrl_input) {
            Ok((o, r)) => {
                ds.swing_ctrl_output = o;
                ds.swing_ctrl_status_rpt = r;
            }
            Err(e) => match e {},
        }

        let report = &ds.swing_ctrl_status_rpt;
        if let Some(velocity_ms) = report.struck_ball_velocity_ms {
            ball_sim.deflect(velocity_ms);
        }
        match report.alert {
            Some(SwingAlert::PlanningDeadlineMissed) => {
                warn!("SwingCtrl cannot plan within the cycle budget")
            }
            Some(a) => debug!("SwingCtrl alert: {:?}", a),
            None => (),
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        if opts.fast {
            ds.num_consec_cycle_overruns = 0;
        } else {
            // Get sleep duration
            match cycle_period.checked_sub(cycle_dur) {
                Some(d) => {
                    ds.num_consec_cycle_overruns = 0;
                    ds.make_unsafe(SafeModeCause::CycleOverruns).ok();
                    thread::sleep(d);
                }
                None => {
                    warn!(
                        "Cycle overran by {:.06} s",
                        cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                    );
                    ds.num_consec_cycle_overruns += 1;

                    if ds.num_consec_cycle_overruns > exec_params.max_consec_cycle_overruns {
                        error!(
                            "More than {} consecutive cycle overruns",
                            exec_params.max_consec_cycle_overruns
                        );
                        ds.make_safe(SafeModeCause::CycleOverruns);
                    }
                }
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    swing_ctrl
        .stop_worker()
        .wrap_err("Failed to stop the SwingCtrl worker")?;

    info!("End of execution");

    session.exit();

    Ok(())
}

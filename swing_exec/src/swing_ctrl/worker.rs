//! Worker thread to allow strikes to be planned without blocking the control
//! cycle.

// -----------------------------------------------------------------------------------------------
// INCLUDES
// -----------------------------------------------------------------------------------------------

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};

use super::{PlanOutcome, PlanRequest, Planner, SwingCtrlError};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Handle to the planning worker thread, owned by the control thread.
pub(super) struct Worker {
    worker_jh: Option<JoinHandle<()>>,

    worker_sender: Sender<WorkerSignal>,
    worker_reciever: Receiver<WorkerSignal>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug)]
pub(super) enum WorkerSignal {
    /// The worker should stop it's operations
    Stop,

    /// Plan a new strike
    Plan(Box<PlanRequest>),

    /// A plan request has been processed, successfully or not
    Planned(Box<PlanOutcome>),
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Worker {
    /// Start the worker thread, which takes ownership of its own planner.
    pub fn spawn(planner: Planner) -> Result<Self, SwingCtrlError> {
        let (worker_sender, rx) = channel();
        let (tx, worker_reciever) = channel();

        let worker_jh = thread::Builder::new()
            .name("swing_ctrl::worker".into())
            .spawn(move || worker_thread(planner, tx, rx))
            .map_err(SwingCtrlError::WorkerSpawnError)?;

        Ok(Self {
            worker_jh: Some(worker_jh),
            worker_sender,
            worker_reciever,
        })
    }

    /// Send a request to the worker. Returns false if the worker has gone.
    pub fn request(&self, req: PlanRequest) -> bool {
        match self.worker_sender.send(WorkerSignal::Plan(Box::new(req))) {
            Ok(()) => true,
            Err(e) => {
                error!("Could not send plan request to the worker: {}", e);
                false
            }
        }
    }

    /// Collect every outcome the worker has finished since the last call.
    pub fn outcomes(&self) -> Vec<PlanOutcome> {
        let mut outcomes = Vec::new();

        loop {
            match self.worker_reciever.try_recv() {
                Ok(WorkerSignal::Planned(o)) => outcomes.push(*o),
                Ok(s) => warn!("Unexpected signal from worker: {:?}", s),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("Planning worker has disconnected");
                    break;
                }
            }
        }

        outcomes
    }

    /// Stop the worker and wait for it to exit.
    pub fn stop(&mut self) -> Result<(), SwingCtrlError> {
        // The worker may already have exited, in which case there's nothing to stop
        self.worker_sender.send(WorkerSignal::Stop).ok();

        match self.worker_jh.take() {
            Some(jh) => jh.join().map_err(|_| SwingCtrlError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn worker_thread(
    planner: Planner,
    main_sender: Sender<WorkerSignal>,
    main_reciever: Receiver<WorkerSignal>,
) {
    // Wait for commands from main
    while let Ok(signal) = main_reciever.recv() {
        match signal {
            WorkerSignal::Stop => break,
            WorkerSignal::Plan(req) => {
                debug!("Worker planning request {}", req.id);

                let outcome = planner.plan_strike(&req);

                if main_sender
                    .send(WorkerSignal::Planned(Box::new(outcome)))
                    .is_err()
                {
                    warn!("Control thread has gone, stopping the planning worker");
                    break;
                }
            }
            s => warn!("Unexpected signal from main: {:?}", s),
        }
    }
}

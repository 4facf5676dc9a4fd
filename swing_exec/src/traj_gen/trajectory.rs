//! Trajectory structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::DVector;
use serde::Serialize;

use crate::chain::{ChainConfig, KinematicChain, LimitReport};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// What a trajectory is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrajKind {
    /// Swing to a hit target.
    Strike,

    /// Return to the ready configuration.
    Idle,
}

/// A single point of a trajectory.
#[derive(Debug, Clone, Serialize)]
pub struct TrajSample {
    /// Units: seconds, exec time
    pub time_s: f64,

    pub q: ChainConfig,

    /// Units: radians/second or meters/second
    pub qd: DVector<f64>,
}

/// Time ordered joint space samples from the start of a swing to its end.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    pub kind: TrajKind,

    pub(super) samples: Vec<TrajSample>,

    /// Joints which were saturated while generating the trajectory.
    pub limits: LimitReport,

    /// Number of samples resolved near a singularity.
    pub singular_samples: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Trajectory {
    pub fn samples(&self) -> &[TrajSample] {
        &self.samples
    }

    pub fn first(&self) -> Option<&TrajSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&TrajSample> {
        self.samples.last()
    }

    /// Units: seconds, exec time
    pub fn start_time_s(&self) -> Option<f64> {
        self.first().map(|s| s.time_s)
    }

    /// Units: seconds, exec time
    pub fn end_time_s(&self) -> Option<f64> {
        self.last().map(|s| s.time_s)
    }

    /// True once `time_s` is past the final sample.
    pub fn is_finished(&self, time_s: f64) -> bool {
        self.end_time_s().map(|t| time_s > t).unwrap_or(true)
    }

    /// The state at `time_s`.
    ///
    /// Positions and velocities are interpolated linearly between samples.
    /// Outside the trajectory the nearest end position is held with zero
    /// velocity.
    pub fn sample_at(&self, chain: &KinematicChain, time_s: f64) -> Option<TrajSample> {
        let first = self.first()?;
        let last = self.last()?;

        if time_s <= first.time_s {
            let qd = if time_s < first.time_s {
                DVector::zeros(first.qd.len())
            } else {
                first.qd.clone()
            };
            return Some(TrajSample {
                time_s,
                q: first.q.clone(),
                qd,
            });
        }

        if time_s >= last.time_s {
            let qd = if time_s > last.time_s {
                DVector::zeros(last.qd.len())
            } else {
                last.qd.clone()
            };
            return Some(TrajSample {
                time_s,
                q: last.q.clone(),
                qd,
            });
        }

        // Index of the first sample after the time
        let idx = self.samples.partition_point(|s| s.time_s <= time_s);
        let a = &self.samples[idx - 1];
        let b = &self.samples[idx];

        let span = b.time_s - a.time_s;
        let frac = if span > 0.0 {
            (time_s - a.time_s) / span
        } else {
            0.0
        };

        let delta = chain.joint_delta(&a.q, &b.q);
        let (q, _) = chain.config(a.q.as_vector() + delta * frac).ok()?;

        Some(TrajSample {
            time_s,
            q,
            qd: &a.qd + (&b.qd - &a.qd) * frac,
        })
    }

    /// Replace everything from `at_s` onwards with `next`.
    ///
    /// Samples of `self` before `at_s` are kept, so the arm keeps flying the
    /// old trajectory until the new one starts. `next` should start from the
    /// state of `self` at `at_s`.
    pub fn splice(self, next: Trajectory, at_s: f64) -> Trajectory {
        let mut samples: Vec<TrajSample> = self
            .samples
            .into_iter()
            .filter(|s| s.time_s < at_s)
            .collect();
        samples.extend(next.samples.into_iter().filter(|s| s.time_s >= at_s));

        let mut limits = self.limits;
        limits.merge(&next.limits);

        Trajectory {
            kind: next.kind,
            samples,
            limits,
            singular_samples: self.singular_samples + next.singular_samples,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::ChainParams;

    fn traj(kind: TrajKind, chain: &KinematicChain, times: &[f64], pos: f64) -> Trajectory {
        Trajectory {
            kind,
            samples: times
                .iter()
                .map(|&t| TrajSample {
                    time_s: t,
                    q: chain.config(DVector::from_element(2, pos)).unwrap().0,
                    qd: DVector::zeros(2),
                })
                .collect(),
            limits: LimitReport::default(),
            singular_samples: 0,
        }
    }

    #[test]
    fn test_splice() {
        let chain = KinematicChain::new(&ChainParams::planar(&[1.0, 1.0], 3.0, 2.0)).unwrap();

        let old = traj(TrajKind::Idle, &chain, &[0.0, 0.1, 0.2, 0.3, 0.4], 0.1);
        let new = traj(TrajKind::Strike, &chain, &[0.25, 0.35, 0.45], 0.2);

        let spliced = old.splice(new, 0.25);
        let times: Vec<f64> = spliced.samples().iter().map(|s| s.time_s).collect();

        assert_eq!(spliced.kind, TrajKind::Strike);
        assert_eq!(times, vec![0.0, 0.1, 0.2, 0.25, 0.35, 0.45]);
        assert_eq!(spliced.samples()[2].q.as_slice(), &[0.1, 0.1]);
        assert_eq!(spliced.samples()[3].q.as_slice(), &[0.2, 0.2]);

        // Before the start the first position is held still
        let before = spliced.sample_at(&chain, -1.0).unwrap();
        assert_eq!(before.q.as_slice(), &[0.1, 0.1]);
        assert_eq!(before.qd, DVector::zeros(2));
    }
}

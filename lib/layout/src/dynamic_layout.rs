//! Continuous attractive/repulsive force (ARF) layout.
//!
//! Each tick every pair of nodes repels with `b / d²` (inverse square, with
//! `d` clamped below by `min_distance`), every edge pulls its endpoints with
//! `a · weight · d`, and a gravity term pulls each node towards the origin.
//! Velocities are integrated with damping and capped at `max_speed`.
//!
//! The engine keeps running until stopped. Structural changes made between
//! ticks are picked up when the next tick captures its frame.

use crate::background::{BackgroundWorker, RunFlag};
use crate::config::{self, ArfParameters};
use crate::engine::{LayoutEngine, LayoutKind};
use crate::frame::LayoutFrame;
use hyphae_core::{GraphStore, Result, Vec3};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// One ARF integration step over a frame.
#[derive(Debug, Clone)]
pub struct ArfSimulation {
    params: ArfParameters,
}

impl ArfSimulation {
    pub fn new(params: ArfParameters) -> Self {
        Self { params }
    }

    pub fn forces(&self, frame: &LayoutFrame) -> Vec<Vec3> {
        let p = &self.params;
        let positions = &frame.positions;

        let mut forces: Vec<Vec3> = (0..positions.len())
            .into_par_iter()
            .map(|i| {
                let here = positions[i];
                let mut force = here * -p.gravity;
                if p.repulsion > 0.0 {
                    for (j, other) in positions.iter().enumerate() {
                        if i == j {
                            continue;
                        }
                        let delta = here - *other;
                        let len = delta.length();
                        let dir = if len > 1e-9 {
                            delta / len
                        } else {
                            LayoutFrame::separation_direction(i, j)
                        };
                        let d = len.max(p.min_distance);
                        force += dir * (p.repulsion / (d * d));
                    }
                }
                force
            })
            .collect();

        for spring in &frame.springs {
            let pull = (positions[spring.b] - positions[spring.a]) * (p.spring * spring.weight);
            forces[spring.a] += pull;
            forces[spring.b] -= pull;
        }
        forces
    }

    /// Integrates one tick in place.
    pub fn step(&self, frame: &mut LayoutFrame) {
        let p = &self.params;
        let forces = self.forces(frame);
        for ((position, velocity), force) in frame
            .positions
            .iter_mut()
            .zip(frame.velocities.iter_mut())
            .zip(forces)
        {
            if !force.is_finite() {
                continue;
            }
            *velocity = ((*velocity + force * p.time_step) * p.damping).clamp_length(p.max_speed);
            *position += *velocity * p.time_step;
        }
    }
}

/// Dynamic layout engine.
pub struct DynamicLayout {
    store: Arc<GraphStore>,
    params: Arc<RwLock<ArfParameters>>,
    worker: BackgroundWorker,
}

impl DynamicLayout {
    pub fn new(store: Arc<GraphStore>, params: ArfParameters) -> Self {
        let params = config::or_default(params, ArfParameters::validate, "dynamic-layout");
        Self {
            store,
            params: Arc::new(RwLock::new(params)),
            worker: BackgroundWorker::new("dynamic-layout"),
        }
    }

    pub fn parameters(&self) -> ArfParameters {
        self.params.read().clone()
    }

    /// Applies from the next tick; a running layout is not restarted.
    pub fn set_parameters(&self, params: ArfParameters) -> Result<()> {
        params.validate()?;
        *self.params.write() = params;
        Ok(())
    }

    fn run(store: Arc<GraphStore>, params: Arc<RwLock<ArfParameters>>, flag: RunFlag) {
        let mut ticks: u64 = 0;
        while flag.is_running() {
            let started = Instant::now();
            let current = params.read().clone();
            let period = current.tick_interval();

            let mut frame = LayoutFrame::capture(&store.lock());
            if !frame.is_empty() {
                ArfSimulation::new(current).step(&mut frame);
                frame.commit(&mut store.lock());
            }
            ticks += 1;
            flag.pace(started, period);
        }
        tracing::debug!(ticks, "dynamic layout loop exited");
    }
}

impl LayoutEngine for DynamicLayout {
    fn start(&self) {
        let store = self.store.clone();
        let params = self.params.clone();
        if self.worker.start(move |flag| Self::run(store, params, flag)) {
            tracing::info!(nodes = self.store.node_count(), "dynamic layout started");
        }
    }

    fn stop(&self) {
        let was_running = self.worker.is_running();
        self.worker.stop();
        if was_running {
            tracing::info!("dynamic layout stopped");
        }
    }

    fn is_stopped(&self) -> bool {
        !self.worker.is_running()
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn kind(&self) -> LayoutKind {
        LayoutKind::Dynamic
    }
}

//! Fruchterman–Reingold spring embedder.
//!
//! Every pair of nodes repels with `k² / d` and every edge attracts its
//! endpoints with `weight · d² / k`, where `k` is the ideal edge length.
//! Per iteration a node moves along its net force by at most the current
//! temperature, and the temperature is multiplied by the cooling factor. The
//! run ends when the temperature drops below the floor or the iteration
//! budget is spent.

use crate::background::{BackgroundWorker, RunFlag};
use crate::config::{self, FruchtermanReingoldConfig};
use crate::engine::{LayoutEngine, LayoutKind, LayoutSignals};
use crate::frame::LayoutFrame;
use hyphae_core::{GraphStore, Result, Vec3};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

const MIN_SEPARATION: f64 = 1e-6;

/// Iteration state of one Fruchterman–Reingold run.
#[derive(Debug, Clone)]
pub struct FruchtermanReingold {
    config: FruchtermanReingoldConfig,
    temperature: f64,
    iterations: usize,
}

impl FruchtermanReingold {
    pub fn new(config: FruchtermanReingoldConfig) -> Self {
        Self {
            temperature: config.initial_temperature,
            iterations: 0,
            config,
        }
    }

    #[inline]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    #[inline]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_finished(&self) -> bool {
        self.temperature < self.config.min_temperature
            || self.iterations >= self.config.max_iterations
    }

    /// Net displacement per frame index before the temperature cap.
    pub fn displacements(&self, frame: &LayoutFrame) -> Vec<Vec3> {
        let k = self.config.edge_length;
        let k2 = k * k;
        let positions = &frame.positions;

        let mut disp: Vec<Vec3> = (0..positions.len())
            .into_par_iter()
            .map(|i| {
                let mut force = Vec3::ZERO;
                for (j, other) in positions.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let delta = positions[i] - *other;
                    let d = delta.length();
                    if d < MIN_SEPARATION {
                        force += LayoutFrame::separation_direction(i, j) * (k2 / MIN_SEPARATION);
                    } else {
                        force += delta * (k2 / (d * d));
                    }
                }
                force
            })
            .collect();

        for spring in &frame.springs {
            let delta = positions[spring.a] - positions[spring.b];
            let d = delta.length();
            if d < MIN_SEPARATION {
                continue;
            }
            // (d² / k) along delta / d
            let pull = delta * (spring.weight * d / k);
            disp[spring.a] -= pull;
            disp[spring.b] += pull;
        }
        disp
    }

    /// Runs one iteration on `frame`. Returns `false` once the run is over;
    /// the frame is left untouched in that case.
    pub fn step(&mut self, frame: &mut LayoutFrame) -> bool {
        if self.is_finished() {
            return false;
        }
        let disp = self.displacements(frame);
        let t = self.temperature;
        for (position, d) in frame.positions.iter_mut().zip(disp) {
            let len = d.length();
            if len > 0.0 && len.is_finite() {
                *position += d * (len.min(t) / len);
            }
        }
        self.temperature *= self.config.cooling_factor;
        self.iterations += 1;
        !self.is_finished()
    }

    /// Runs to completion on a detached frame. Returns the iteration count.
    pub fn run(&mut self, frame: &mut LayoutFrame) -> usize {
        while self.step(frame) {}
        self.iterations
    }
}

/// Static layout engine. Runs one Fruchterman–Reingold pass on a background
/// thread, then stops on its own and raises a re-frame request.
pub struct StaticLayout {
    store: Arc<GraphStore>,
    config: RwLock<FruchtermanReingoldConfig>,
    signals: Arc<LayoutSignals>,
    worker: BackgroundWorker,
}

impl StaticLayout {
    pub fn new(store: Arc<GraphStore>, config: FruchtermanReingoldConfig, signals: Arc<LayoutSignals>) -> Self {
        let config = config::or_default(config, FruchtermanReingoldConfig::validate, "static-layout");
        Self {
            store,
            config: RwLock::new(config),
            signals,
            worker: BackgroundWorker::new("static-layout"),
        }
    }

    pub fn config(&self) -> FruchtermanReingoldConfig {
        self.config.read().clone()
    }

    /// Takes effect on the next `start()`.
    pub fn set_config(&self, config: FruchtermanReingoldConfig) -> Result<()> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    fn run(store: Arc<GraphStore>, config: FruchtermanReingoldConfig, signals: Arc<LayoutSignals>, flag: RunFlag) {
        let started = Instant::now();
        let mut sim = FruchtermanReingold::new(config);
        let mut converged = false;

        while flag.is_running() {
            let mut frame = LayoutFrame::capture(&store.lock());
            let more = sim.step(&mut frame);
            frame.commit(&mut store.lock());
            if !more {
                converged = true;
                break;
            }
        }

        if converged {
            signals.request_reframe();
            flag.finish();
            tracing::info!(
                iterations = sim.iterations(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "static layout converged"
            );
        } else {
            tracing::debug!(iterations = sim.iterations(), "static layout interrupted");
        }
    }
}

impl LayoutEngine for StaticLayout {
    fn start(&self) {
        let store = self.store.clone();
        let config = self.config.read().clone();
        let signals = self.signals.clone();
        if self
            .worker
            .start(move |flag| Self::run(store, config, signals, flag))
        {
            tracing::info!(nodes = self.store.node_count(), "static layout started");
        }
    }

    fn stop(&self) {
        let was_running = self.worker.is_running();
        self.worker.stop();
        if was_running {
            tracing::info!("static layout stopped");
        }
    }

    fn is_stopped(&self) -> bool {
        !self.worker.is_running()
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    fn kind(&self) -> LayoutKind {
        LayoutKind::Static
    }
}

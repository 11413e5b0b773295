//! Force-directed edge bundling.
//!
//! Every edge is a polyline of `segments + 1` control points anchored at its
//! endpoints. Per tick each interior point feels a spring towards its two
//! neighbours on the same route and an attraction towards the matching point
//! of every compatible edge. Compatibility is the product of angle, scale and
//! position similarity, each in [0, 1].
//!
//! Routes are published as immutable slices, so a reader always sees a
//! route either entirely before or entirely after a tick.

use crate::background::{BackgroundWorker, RunFlag};
use crate::config::{self, BundlerConfig};
use ahash::AHashMap;
use hyphae_core::{EdgeId, GraphStore, Point3, Result, Vec3};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

const SOFTENING: f64 = 1.0;

/// A published set of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteSet {
    pub segments: usize,
    pub routes: AHashMap<EdgeId, Arc<[Point3]>>,
}

#[derive(Debug, Clone, Copy)]
struct Compatible {
    other: usize,
    strength: f64,
    reversed: bool,
}

/// Edge geometry captured from the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EdgeLine {
    id: EdgeId,
    source: Point3,
    target: Point3,
}

/// Simulation state owned by whoever is ticking.
#[derive(Debug, Default)]
struct BundleState {
    segments: usize,
    step_size: f64,
    lines: Vec<EdgeLine>,
    points: Vec<Vec<Point3>>,
    compatible: Vec<Vec<Compatible>>,
}

/// Angle, scale and position compatibility of two edges.
fn compatibility(p: &EdgeLine, q: &EdgeLine) -> (f64, bool) {
    let pv = p.target - p.source;
    let qv = q.target - q.source;
    let (lp, lq) = (pv.length(), qv.length());
    if lp < 1e-9 || lq < 1e-9 {
        return (0.0, false);
    }
    let cos = pv.dot(&qv) / (lp * lq);
    let angle = cos.abs();

    let avg = (lp + lq) / 2.0;
    let scale = 2.0 / (avg / lp.min(lq) + lp.max(lq) / avg);

    let mid_p = p.source.midpoint(&p.target);
    let mid_q = q.source.midpoint(&q.target);
    let position = avg / (avg + mid_p.distance(&mid_q));

    (angle * scale * position, cos < 0.0)
}

fn straight_route(line: &EdgeLine, segments: usize) -> Vec<Point3> {
    (0..=segments)
        .map(|i| line.source.lerp(&line.target, i as f64 / segments as f64))
        .collect()
}

impl BundleState {
    /// Syncs with the captured edges. Returns whether anything was rebuilt.
    fn sync(&mut self, lines: Vec<EdgeLine>, config: &BundlerConfig) -> bool {
        let structure_changed = self.segments != config.segments
            || self.lines.len() != lines.len()
            || self.lines.iter().zip(&lines).any(|(a, b)| a.id != b.id);

        if structure_changed {
            self.segments = config.segments;
            self.points = lines.iter().map(|l| straight_route(l, config.segments)).collect();
        } else if self.lines == lines {
            return false;
        } else {
            // endpoints moved, start the affected routes over
            for (i, (old, new)) in self.lines.iter().zip(&lines).enumerate() {
                if old != new {
                    self.points[i] = straight_route(new, config.segments);
                }
            }
        }

        self.lines = lines;
        self.step_size = config.step_size;
        self.compatible = (0..self.lines.len())
            .into_par_iter()
            .map(|i| {
                self.lines
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .filter_map(|(j, other)| {
                        let (strength, reversed) = compatibility(&self.lines[i], other);
                        (strength >= config.compatibility_threshold && strength > 0.0).then_some(Compatible {
                            other: j,
                            strength,
                            reversed,
                        })
                    })
                    .collect()
            })
            .collect();
        true
    }

    fn relax(&mut self, config: &BundlerConfig) {
        let segments = self.segments;
        let step = self.step_size;
        let points = &self.points;

        let next: Vec<Vec<Point3>> = (0..points.len())
            .into_par_iter()
            .map(|e| {
                let route = &points[e];
                let line = &self.lines[e];
                if line.source == line.target {
                    return route.clone();
                }
                let mut out = route.clone();
                for i in 1..segments {
                    let here = route[i];
                    let mut force: Vec3 = (route[i - 1] + route[i + 1] - here * 2.0) * config.spring;
                    for c in &self.compatible[e] {
                        let k = if c.reversed { segments - i } else { i };
                        let delta = points[c.other][k] - here;
                        let d2 = delta.length_squared();
                        if d2 > 1e-12 {
                            force += delta * (c.strength / (d2 + SOFTENING));
                        }
                    }
                    if force.is_finite() {
                        out[i] = here + force * step;
                    }
                }
                out[0] = line.source;
                out[segments] = line.target;
                out
            })
            .collect();

        self.points = next;
        self.step_size = (step * config.step_decay).max(config.min_step_size);
    }

    fn publish(&self) -> RouteSet {
        RouteSet {
            segments: self.segments,
            routes: self
                .lines
                .iter()
                .zip(&self.points)
                .map(|(line, route)| (line.id, Arc::from(route.as_slice())))
                .collect(),
        }
    }
}

struct Shared {
    store: Arc<GraphStore>,
    config: RwLock<BundlerConfig>,
    state: Mutex<BundleState>,
    routes: RwLock<Arc<RouteSet>>,
}

impl Shared {
    fn tick(&self) {
        let config = self.config.read().clone();
        let lines: Vec<EdgeLine> = {
            let g = self.store.lock();
            g.edges()
                .filter_map(|e| {
                    Some(EdgeLine {
                        id: e.id,
                        source: g.node_position(e.source)?,
                        target: g.node_position(e.target)?,
                    })
                })
                .collect()
        };

        let mut state = self.state.lock();
        if state.sync(lines, &config) {
            tracing::debug!(edges = state.lines.len(), "bundler routes rebuilt");
        }
        state.relax(&config);
        let published = Arc::new(state.publish());
        drop(state);
        *self.routes.write() = published;
    }
}

/// Background edge bundler. Start and stop mirror the layout engines.
pub struct EdgeBundler {
    shared: Arc<Shared>,
    worker: BackgroundWorker,
}

impl EdgeBundler {
    pub fn new(store: Arc<GraphStore>, config: BundlerConfig) -> Self {
        let config = config::or_default(config, BundlerConfig::validate, "edge-bundler");
        let routes = RouteSet {
            segments: config.segments,
            routes: AHashMap::new(),
        };
        Self {
            shared: Arc::new(Shared {
                store,
                config: RwLock::new(config),
                state: Mutex::new(BundleState::default()),
                routes: RwLock::new(Arc::new(routes)),
            }),
            worker: BackgroundWorker::new("edge-bundler"),
        }
    }

    pub fn config(&self) -> BundlerConfig {
        self.shared.config.read().clone()
    }

    /// A new segment count rebuilds all routes on the next tick.
    pub fn set_config(&self, config: BundlerConfig) -> Result<()> {
        config.validate()?;
        *self.shared.config.write() = config;
        Ok(())
    }

    pub fn start(&self) {
        let shared = self.shared.clone();
        if self.worker.start(move |flag| Self::run(shared, flag)) {
            tracing::info!(edges = self.shared.store.edge_count(), "edge bundler started");
        }
    }

    pub fn stop(&self) {
        let was_running = self.worker.is_running();
        self.worker.stop();
        if was_running {
            tracing::info!("edge bundler stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        !self.worker.is_running()
    }

    fn run(shared: Arc<Shared>, flag: RunFlag) {
        while flag.is_running() {
            let started = Instant::now();
            shared.tick();
            let period = shared.config.read().tick_interval();
            flag.pace(started, period);
        }
    }

    /// Runs a single tick on the calling thread.
    pub fn step(&self) {
        self.shared.tick();
    }

    /// Drops all routes; the next tick starts from straight lines.
    pub fn reset(&self) {
        let segments = self.shared.config.read().segments;
        *self.shared.state.lock() = BundleState::default();
        *self.shared.routes.write() = Arc::new(RouteSet {
            segments,
            routes: AHashMap::new(),
        });
    }

    /// Segments per route in the currently published set.
    pub fn segment_count(&self) -> usize {
        self.shared.routes.read().segments
    }

    /// Control point `index` of the route of `edge`, `0..=segment_count()`.
    pub fn segment(&self, edge: EdgeId, index: usize) -> Option<Point3> {
        self.shared.routes.read().routes.get(&edge)?.get(index).copied()
    }

    pub fn route(&self, edge: EdgeId) -> Option<Arc<[Point3]>> {
        self.shared.routes.read().routes.get(&edge).cloned()
    }

    /// The whole published set, consistent across edges.
    pub fn routes(&self) -> Arc<RouteSet> {
        self.shared.routes.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parallel_edges() -> (Arc<GraphStore>, Vec<EdgeId>) {
        let store = GraphStore::shared();
        let mut edges = Vec::new();
        {
            let mut g = store.lock();
            for y in [0.0, 2.0] {
                let a = g.add_node();
                let b = g.add_node();
                g.set_node_position(a, Point3::new(0.0, y, 0.0)).unwrap();
                g.set_node_position(b, Point3::new(20.0, y, 0.0)).unwrap();
                edges.push(g.add_edge(a, b, 1.0).unwrap());
            }
        }
        (store, edges)
    }

    #[test]
    fn test_compatibility_of_parallel_and_perpendicular_edges() {
        let p = EdgeLine {
            id: 0,
            source: Point3::new(0.0, 0.0, 0.0),
            target: Point3::new(10.0, 0.0, 0.0),
        };
        let q = EdgeLine {
            id: 1,
            source: Point3::new(10.0, 1.0, 0.0),
            target: Point3::new(0.0, 1.0, 0.0),
        };
        let r = EdgeLine {
            id: 2,
            source: Point3::new(5.0, -5.0, 0.0),
            target: Point3::new(5.0, 5.0, 0.0),
        };
        let (c, reversed) = compatibility(&p, &q);
        assert!(c > 0.9);
        assert!(reversed);
        assert!(compatibility(&p, &r).0 < 1e-9);
    }

    #[test]
    fn test_routes_have_anchored_endpoints() {
        let (store, edges) = parallel_edges();
        let bundler = EdgeBundler::new(store.clone(), BundlerConfig::default());
        assert!(bundler.route(edges[0]).is_none());

        for _ in 0..20 {
            bundler.step();
        }
        let segments = bundler.segment_count();
        assert_eq!(segments, BundlerConfig::default().segments);

        let g = store.snapshot();
        for &e in &edges {
            let route = bundler.route(e).unwrap();
            assert_eq!(route.len(), segments + 1);
            let edge = g.edge(e).unwrap();
            assert_eq!(route[0], g.node_position(edge.source).unwrap());
            assert_eq!(route[segments], g.node_position(edge.target).unwrap());
            assert_eq!(bundler.segment(e, segments), Some(route[segments]));
            assert!(route.iter().all(|p| p.is_finite()));
        }
        assert_eq!(bundler.segment(edges[0], segments + 1), None);
    }

    #[test]
    fn test_parallel_edges_bundle_together() {
        let (store, edges) = parallel_edges();
        let bundler = EdgeBundler::new(store, BundlerConfig::default());
        for _ in 0..50 {
            bundler.step();
        }
        let mid = BundlerConfig::default().segments / 2;
        let a = bundler.segment(edges[0], mid).unwrap();
        let b = bundler.segment(edges[1], mid).unwrap();
        assert!(a.distance(&b) < 2.0);
    }

    #[test]
    fn test_removed_edges_drop_out_and_segments_follow_config() {
        let (store, edges) = parallel_edges();
        let bundler = EdgeBundler::new(store.clone(), BundlerConfig::default());
        bundler.step();
        store.remove_edge(edges[1]);
        bundler
            .set_config(BundlerConfig {
                segments: 4,
                ..Default::default()
            })
            .unwrap();
        bundler.step();
        assert!(bundler.route(edges[1]).is_none());
        assert_eq!(bundler.segment_count(), 4);
        assert_eq!(bundler.route(edges[0]).unwrap().len(), 5);

        bundler.reset();
        assert!(bundler.routes().routes.is_empty());
    }

    #[test]
    fn test_background_ticks_publish_routes() {
        let (store, edges) = parallel_edges();
        let bundler = EdgeBundler::new(
            store,
            BundlerConfig {
                tick_interval_ms: 1,
                ..Default::default()
            },
        );
        bundler.start();
        let deadline = Instant::now() + Duration::from_secs(10);
        while bundler.route(edges[0]).is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        bundler.stop();
        assert!(bundler.is_stopped());
        assert!(bundler.route(edges[0]).is_some());
    }

    #[test]
    fn test_routes_stay_anchored_while_endpoints_move() {
        let (store, edges) = parallel_edges();
        let bundler = EdgeBundler::new(
            store.clone(),
            BundlerConfig {
                tick_interval_ms: 1,
                ..Default::default()
            },
        );
        let moving = store.snapshot().edge(edges[0]).unwrap().source;
        bundler.start();

        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mover = {
            let store = store.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut x = 0.0;
                while !done.load(std::sync::atomic::Ordering::Acquire) {
                    x -= 1.0;
                    store.set_node_position(moving, Point3::new(x, 0.0, 0.0)).unwrap();
                    std::thread::sleep(Duration::from_millis(1));
                }
                x
            })
        };

        for _ in 0..200 {
            let set = bundler.routes();
            for (&edge, route) in set.routes.iter() {
                assert_eq!(route.len(), set.segments + 1);
                assert!(route.iter().all(|p| p.is_finite()));
                if edge == edges[0] {
                    let source = route[0];
                    assert_eq!((source.y, source.z), (0.0, 0.0));
                    assert!(source.x <= 0.0 && source.x.fract() == 0.0);
                    assert_eq!(route[set.segments], Point3::new(20.0, 0.0, 0.0));
                } else {
                    assert_eq!(route[0], Point3::new(0.0, 2.0, 0.0));
                    assert_eq!(route[set.segments], Point3::new(20.0, 2.0, 0.0));
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        done.store(true, std::sync::atomic::Ordering::Release);
        let last = Point3::new(mover.join().unwrap(), 0.0, 0.0);
        let deadline = Instant::now() + Duration::from_secs(10);
        while bundler.segment(edges[0], 0) != Some(last) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        bundler.stop();
        assert_eq!(bundler.segment(edges[0], 0), Some(last));
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let (store, edges) = parallel_edges();
        let bundler = EdgeBundler::new(
            store.clone(),
            BundlerConfig {
                segments: 0,
                ..Default::default()
            },
        );
        assert_eq!(bundler.config(), BundlerConfig::default());
        bundler.step();
        let segments = bundler.segment_count();
        assert_eq!(segments, BundlerConfig::default().segments);
        let route = bundler.route(edges[0]).unwrap();
        assert_eq!(route.len(), segments + 1);
        assert_eq!(route[0], Point3::new(0.0, 0.0, 0.0));
    }
}

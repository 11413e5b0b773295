use crate::bundler::EdgeBundler;
use crate::config::LayoutConfig;
use crate::dynamic_layout::DynamicLayout;
use crate::engine::{LayoutEngine, LayoutKind, LayoutSignals};
use crate::static_layout::StaticLayout;
use hyphae_core::{GraphStore, Point3, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Positions are scattered within this scale on reset.
pub const RESET_SCALE: f64 = 100.0;

/// Result of re-framing the view: where the graph was centred and the
/// render scales derived from its bounding radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrame {
    /// Centroid before the shift; the graph is now centred on the origin.
    pub center: Point3,
    pub radius: f64,
    pub node_radius: f64,
    pub arrow_height: f64,
    pub arrow_width: f64,
    pub edge_thickness: f64,
    pub edge_offset: f64,
}

impl ViewFrame {
    pub fn from_bounds(center: Point3, radius: f64) -> Self {
        let node_radius = radius / 80.0;
        let arrow_height = node_radius / 2.0;
        Self {
            center,
            radius,
            node_radius,
            arrow_height,
            arrow_width: arrow_height / 2.0,
            edge_thickness: node_radius / 7.0,
            edge_offset: node_radius + arrow_height,
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    active: LayoutKind,
    skip_layout: bool,
    bundling: bool,
}

/// Owns both layout engines and the bundler. At most one engine writes to
/// the store at any time: switching strategies stops the previous engine
/// before the next one can start.
pub struct LayoutController {
    store: Arc<GraphStore>,
    static_layout: StaticLayout,
    dynamic_layout: DynamicLayout,
    bundler: EdgeBundler,
    signals: Arc<LayoutSignals>,
    state: Mutex<ControlState>,
}

impl LayoutController {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self::with_config(store, LayoutConfig::default())
    }

    pub fn with_config(store: Arc<GraphStore>, config: LayoutConfig) -> Self {
        let signals = Arc::new(LayoutSignals::new());
        Self {
            static_layout: StaticLayout::new(store.clone(), config.static_layout, signals.clone()),
            dynamic_layout: DynamicLayout::new(store.clone(), config.dynamic),
            bundler: EdgeBundler::new(store.clone(), config.bundler),
            store,
            signals,
            state: Mutex::new(ControlState::default()),
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn static_layout(&self) -> &StaticLayout {
        &self.static_layout
    }

    pub fn dynamic_layout(&self) -> &DynamicLayout {
        &self.dynamic_layout
    }

    pub fn bundler(&self) -> &EdgeBundler {
        &self.bundler
    }

    /// Applies a full configuration. Takes effect for static runs on the next
    /// start and for the dynamic layout and bundler on their next tick.
    pub fn apply_config(&self, config: LayoutConfig) -> Result<()> {
        config.validate()?;
        self.static_layout.set_config(config.static_layout)?;
        self.dynamic_layout.set_parameters(config.dynamic)?;
        self.bundler.set_config(config.bundler)
    }

    fn engine(&self, kind: LayoutKind) -> &dyn LayoutEngine {
        match kind {
            LayoutKind::Static => &self.static_layout,
            LayoutKind::Dynamic => &self.dynamic_layout,
        }
    }

    pub fn layout_type(&self) -> LayoutKind {
        self.state.lock().active
    }

    /// Selects the active strategy. Switching stops whatever is running;
    /// selecting the dynamic layout also stops the bundler.
    pub fn set_layout_type(&self, kind: LayoutKind) {
        let mut state = self.state.lock();
        self.switch_to(&mut state, kind);
    }

    fn switch_to(&self, state: &mut ControlState, kind: LayoutKind) {
        if kind == LayoutKind::Dynamic {
            self.bundler.stop();
            state.bundling = false;
        }
        if state.active != kind {
            self.stop_all(state);
            tracing::debug!(from = ?state.active, to = ?kind, "layout strategy switched");
        }
        state.active = kind;
    }

    fn stop_all(&self, state: &mut ControlState) {
        self.bundler.stop();
        state.bundling = false;
        self.static_layout.stop();
        self.dynamic_layout.stop();
    }

    pub fn start_layout(&self) {
        let state = self.state.lock();
        self.engine(state.active).start();
    }

    /// Stops the bundler and both engines, blocking until all have exited.
    pub fn stop_layout(&self) {
        let mut state = self.state.lock();
        self.stop_all(&mut state);
    }

    /// Restarts the active layout if it is dynamic and layout is not skipped.
    /// A static layout is never resumed since starting it re-runs the whole
    /// embedding.
    pub fn resume_layout(&self) {
        let state = self.state.lock();
        self.resume(&state);
    }

    fn resume(&self, state: &ControlState) {
        let engine = self.engine(state.active);
        if engine.is_dynamic() && !state.skip_layout {
            engine.start();
        }
    }

    pub fn layout_is_stopped(&self) -> bool {
        let state = self.state.lock();
        self.engine(state.active).is_stopped()
    }

    pub fn set_skip_layout(&self, skip: bool) {
        self.state.lock().skip_layout = skip;
    }

    pub fn skip_layout(&self) -> bool {
        self.state.lock().skip_layout
    }

    /// Stops everything, scatters the nodes and starts the active engine.
    /// Nothing is scattered when layout is skipped or the graph is empty.
    pub fn reset_layout(&self) {
        self.reset(false);
    }

    /// Like [`LayoutController::reset_layout`], but moves the randomized
    /// positions onto the origin before the engine starts, so the first
    /// rendered frame is already in view. Returns `None` when nothing was
    /// reset.
    pub fn reset_layout_centered(&self) -> Option<ViewFrame> {
        self.reset(true)
    }

    fn reset(&self, recenter: bool) -> Option<ViewFrame> {
        let mut state = self.state.lock();
        self.stop_all(&mut state);

        if state.skip_layout || self.store.node_count() == 0 {
            tracing::debug!(skip = state.skip_layout, "layout reset without restart");
            return None;
        }
        let view = {
            let mut graph = self.store.lock();
            graph.randomize_positions(RESET_SCALE);
            graph.clear_velocities();
            recenter.then(|| {
                let (center, radius) = graph.locate();
                graph.move_nodes(-center);
                ViewFrame::from_bounds(center, radius)
            })
        };
        self.engine(state.active).start();
        view
    }

    pub fn bundling(&self) -> bool {
        self.state.lock().bundling
    }

    /// Turning bundling on stops the layout and starts the bundler; turning
    /// it off stops the bundler and resumes a dynamic layout.
    pub fn set_bundling(&self, enabled: bool) {
        let mut state = self.state.lock();
        if self.store.node_count() == 0 {
            return;
        }
        if enabled {
            self.stop_all(&mut state);
            self.bundler.start();
            state.bundling = true;
        } else {
            self.bundler.stop();
            state.bundling = false;
            self.resume(&state);
        }
    }

    /// Shifts the graph so its centroid sits at the origin and returns the
    /// render scales for the new frame. A running layout is paused for the
    /// shift and resumed afterwards if it is dynamic.
    pub fn recenter(&self) -> ViewFrame {
        let mut state = self.state.lock();
        let was_running = !self.engine(state.active).is_stopped();
        self.stop_all(&mut state);

        let (center, radius) = {
            let mut graph = self.store.lock();
            let (center, radius) = graph.locate();
            graph.move_nodes(-center);
            (center, radius)
        };

        if was_running {
            self.resume(&state);
        }
        ViewFrame::from_bounds(center, radius)
    }

    /// Returns and clears the re-frame request raised when a static run
    /// converges.
    pub fn take_reframe_request(&self) -> bool {
        self.signals.take_reframe_request()
    }

    pub fn signals(&self) -> &Arc<LayoutSignals> {
        &self.signals
    }
}

// Copyright @yucwang 2026

use crate::math::constants::{ Float, Matrix4f, Vector2f, Vector3f };

use std::collections::HashMap;

const DRAG_DEGREES_PER_PIXEL: Float = 0.5;

/// View-dirtying interactions the render session understands. Window/input
/// backends are external; they only have to translate their events into
/// these.
#[derive(Debug, Clone, Copy)]
pub enum InputEvent {
    DragStart { pos: Vector2f },
    DragMove { pos: Vector2f },
    DragEnd,
    Scroll { delta: Float },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DragStart,
    DragMove,
    DragEnd,
    Scroll,
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::DragStart { .. } => EventKind::DragStart,
            InputEvent::DragMove { .. } => EventKind::DragMove,
            InputEvent::DragEnd => EventKind::DragEnd,
            InputEvent::Scroll { .. } => EventKind::Scroll,
        }
    }
}

/// Camera state driven by the handler table. `dirtied` flips on any
/// view-changing event and is drained by the session loop, which resets the
/// progressive pass.
#[derive(Debug, Clone)]
pub struct ViewState {
    cached_view: Matrix4f,
    drag_start: Option<Vector2f>,
    drag_delta: Matrix4f,
    dirtied: bool,
}

impl ViewState {
    pub fn new(initial: Matrix4f) -> Self {
        Self {
            cached_view: initial,
            drag_start: None,
            drag_delta: Matrix4f::identity(),
            dirtied: false,
        }
    }

    pub fn view(&self) -> Matrix4f {
        if self.drag_start.is_some() {
            self.drag_delta * self.cached_view
        } else {
            self.cached_view
        }
    }

    fn rotation_for(&self, pos: Vector2f) -> Matrix4f {
        let start = match self.drag_start {
            Some(start) => start,
            None => return Matrix4f::identity(),
        };
        let delta = (pos - start) * DRAG_DEGREES_PER_PIXEL;
        let azimuth = nalgebra::Rotation3::from_axis_angle(
            &Vector3f::y_axis(), delta.x.to_radians());
        let altitude = nalgebra::Rotation3::from_axis_angle(
            &Vector3f::x_axis(), delta.y.to_radians());
        azimuth.to_homogeneous() * altitude.to_homogeneous()
    }
}

type Handler = Box<dyn Fn(&mut ViewState, &InputEvent)>;

/// Event routing without listener inheritance or a global window registry:
/// one context owns the view state and a handler table keyed by event kind,
/// and the session threads it through its loop.
pub struct InputContext {
    state: ViewState,
    handlers: HashMap<EventKind, Handler>,
}

impl InputContext {
    pub fn new(initial_view: Matrix4f) -> Self {
        let mut context = Self {
            state: ViewState::new(initial_view),
            handlers: HashMap::new(),
        };
        context.register_default_handlers();
        context
    }

    pub fn register(&mut self, kind: EventKind, handler: Handler) {
        self.handlers.insert(kind, handler);
    }

    pub fn dispatch(&mut self, event: InputEvent) {
        if let Some(handler) = self.handlers.remove(&event.kind()) {
            handler(&mut self.state, &event);
            self.handlers.insert(event.kind(), handler);
        }
    }

    pub fn view(&self) -> Matrix4f {
        self.state.view()
    }

    /// Read and clear the dirty flag. True means the next iteration must
    /// restart accumulation.
    pub fn take_dirtied(&mut self) -> bool {
        let dirtied = self.state.dirtied;
        self.state.dirtied = false;
        dirtied
    }

    fn register_default_handlers(&mut self) {
        self.register(EventKind::DragStart, Box::new(|state, event| {
            if let InputEvent::DragStart { pos } = event {
                state.drag_start = Some(*pos);
                state.drag_delta = Matrix4f::identity();
                state.dirtied = true;
            }
        }));
        self.register(EventKind::DragMove, Box::new(|state, event| {
            if let InputEvent::DragMove { pos } = event {
                if state.drag_start.is_some() {
                    state.drag_delta = state.rotation_for(*pos);
                    state.dirtied = true;
                }
            }
        }));
        self.register(EventKind::DragEnd, Box::new(|state, _| {
            if state.drag_start.take().is_some() {
                state.cached_view = state.drag_delta * state.cached_view;
                state.drag_delta = Matrix4f::identity();
            }
        }));
        self.register(EventKind::Scroll, Box::new(|state, event| {
            if let InputEvent::Scroll { delta } = event {
                let scale = 1.0 + (delta * 0.1).clamp(-0.9, 0.9);
                state.cached_view[(0, 3)] *= scale;
                state.cached_view[(1, 3)] *= scale;
                state.cached_view[(2, 3)] *= scale;
                state.dirtied = true;
            }
        }));
    }
}

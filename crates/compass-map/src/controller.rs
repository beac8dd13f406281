//! Map interaction state machine.
//!
//! Valid mode transitions:
//! - Normal -> RouteAwaitingStart (route mode enabled)
//! - RouteAwaitingStart -> RouteAwaitingEnd (start picked)
//! - RouteAwaitingEnd -> Normal (end picked, route requested)
//! - RouteAwaitingStart | RouteAwaitingEnd -> RouteAwaitingStart (re-enable)
//! - RouteAwaitingStart | RouteAwaitingEnd -> Normal (cancel)
//!
//! A pointer event in Normal mode is an exploration click. Route mode
//! covers exactly one start/end pair; the next route needs a fresh enable.

use tracing::debug;

use compass_core::types::{Coordinate, InteractionMode, RouteRequest, TravelProfile};

use crate::error::MapError;

/// What a pointer event means in the current mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerOutcome {
    /// Normal mode: look the coordinate up and ask the chat about it.
    Explore(Coordinate),
    /// Route start recorded; waiting for the end.
    RouteStartSet(Coordinate),
    /// Both endpoints recorded; the route should be planned.
    RouteReady(RouteRequest),
}

#[derive(Debug, Clone, Default)]
pub struct MapInteractionController {
    mode: InteractionMode,
    profile: TravelProfile,
    route_start: Option<Coordinate>,
}

impl MapInteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Profile of the current or most recent route selection.
    pub fn profile(&self) -> TravelProfile {
        self.profile
    }

    pub fn route_start(&self) -> Option<Coordinate> {
        self.route_start
    }

    /// Enter route mode from any state, dropping a partial selection.
    pub fn enable_route_mode(&mut self, profile: TravelProfile) -> Result<(), MapError> {
        self.route_start = None;
        self.profile = profile;
        if self.mode == InteractionMode::RouteAwaitingStart {
            debug!(profile = %profile, "Route mode re-enabled");
            return Ok(());
        }
        self.transition(InteractionMode::RouteAwaitingStart)
    }

    /// Leave route mode. Returns false when already in Normal mode.
    pub fn cancel_route_mode(&mut self) -> bool {
        if !self.mode.is_route_mode() {
            return false;
        }
        self.route_start = None;
        self.mode = InteractionMode::Normal;
        debug!("Route mode cancelled");
        true
    }

    /// Interpret a pointer event and advance the state machine.
    pub fn handle_pointer(&mut self, coordinate: Coordinate) -> Result<PointerOutcome, MapError> {
        match self.mode {
            InteractionMode::Normal => Ok(PointerOutcome::Explore(coordinate)),
            InteractionMode::RouteAwaitingStart => {
                self.transition(InteractionMode::RouteAwaitingEnd)?;
                self.route_start = Some(coordinate);
                Ok(PointerOutcome::RouteStartSet(coordinate))
            }
            InteractionMode::RouteAwaitingEnd => {
                let start = self.route_start.take().ok_or(MapError::InvalidTransition {
                    from: InteractionMode::RouteAwaitingEnd,
                    to: InteractionMode::Normal,
                })?;
                self.transition(InteractionMode::Normal)?;
                Ok(PointerOutcome::RouteReady(RouteRequest {
                    start,
                    end: coordinate,
                    profile: self.profile,
                }))
            }
        }
    }

    fn transition(&mut self, target: InteractionMode) -> Result<(), MapError> {
        if self.mode.can_transition_to(&target) {
            debug!("Map mode: {} -> {}", self.mode, target);
            self.mode = target;
            Ok(())
        } else {
            Err(MapError::InvalidTransition {
                from: self.mode,
                to: target,
            })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Map side of the travel assistant.
//!
//! Holds the interaction state machine (free exploration vs. route
//! selection), the overlay of markers and route lines, the prompt
//! templates, the hover debouncer, and `TravelAssistant`, which ties the
//! map gestures to the chat session. `SharedAssistant` serves one
//! assistant to concurrent requests.

pub mod assistant;
pub mod controller;
pub mod error;
pub mod hover;
pub mod overlay;
pub mod prompt;
pub mod shared;

pub use assistant::{
    ClickOutcome, DispatchOutcome, MapState, PlaceDetail, SearchOutcome, TravelAssistant,
};
pub use controller::{MapInteractionController, PointerOutcome};
pub use error::MapError;
pub use hover::{HoverDebouncer, HoverOutcome, HoverTicket};
pub use overlay::{MapOverlay, MapView, Marker, MarkerKind, RouteLine};
pub use prompt::PromptTemplates;
pub use shared::{AssistantFactory, SharedAssistant};

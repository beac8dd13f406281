//! Error types for map interaction.

use compass_chat::ChatError;
use compass_core::error::CompassError;
use compass_core::types::InteractionMode;
use compass_geo::GeoError;
use compass_storage::ExportError;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid mode transition: {from} -> {to}")]
    InvalidTransition {
        from: InteractionMode,
        to: InteractionMode,
    },
    /// The map or the session changed while the result was awaited.
    #[error("superseded by a newer map or session change")]
    Superseded,
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl From<MapError> for CompassError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::Geo(e) => e.into(),
            MapError::Chat(e) => e.into(),
            MapError::Export(e) => e.into(),
            other => CompassError::Api(other.to_string()),
        }
    }
}

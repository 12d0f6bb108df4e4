pub mod client;
pub mod models;

pub use client::{AuthorizationRequest, NowPlayingClient, PlayerCommand, TokenPair};
pub use models::{Playback, TrackSnapshot, format_duration};

pub mod config;
pub mod error;
pub mod poller;
pub mod spotify;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use poller::NowPlayingPoller;
pub use spotify::{NowPlayingClient, Playback, TrackSnapshot};
pub use store::{FileStore, MemoryStore, TokenStore};

pub mod autoplay;
pub mod display;
pub mod filters;
pub mod lavalink;
pub mod node;
pub mod player;
pub mod queue;
pub mod selector;
pub mod session;
pub mod track;

pub use player::MusicPlayer;
pub use session::Session;

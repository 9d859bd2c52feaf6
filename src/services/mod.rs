pub mod lyrics;
pub mod music;

pub use music::MusicPlayer;

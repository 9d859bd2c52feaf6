pub mod playlist;

pub use playlist::{PLAYLIST_CAPACITY, Playlist, PlaylistStore, playlist_id};

pub mod filters;
pub mod music;
pub mod playlist;
pub mod voice;

use crate::repository::PlaylistStore;
use crate::services::music::lavalink::LavalinkNode;
use crate::services::music::MusicPlayer;
use crate::utils::embed;
use poise::serenity_prelude::CreateEmbed;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

#[derive(Clone)]
pub struct Data {
    pub music_player: MusicPlayer,
    pub node: Arc<LavalinkNode>,
    pub songbird: Arc<songbird::Songbird>,
    pub playlists: Arc<PlaylistStore>,
}

/// Every command the framework registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        music::connect(),
        music::disconnect(),
        music::play(),
        music::skip(),
        music::remove(),
        music::clean(),
        music::pause(),
        music::resume(),
        music::stop(),
        music::queue(),
        music::repeat(),
        music::shuffle(),
        music::autoplay(),
        music::lyrics(),
        music::seek(),
        music::dashboard(),
        filters::timescale(),
        filters::tremolo(),
        filters::vibrato(),
        filters::lowpass(),
        filters::rotation(),
        filters::equalizer(),
        filters::filters(),
        playlist::playlist(),
    ]
}

/// Helper to send embed response
pub(crate) async fn send_embed(ctx: Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

pub(crate) async fn send_success(ctx: Context<'_>, title: &str, description: &str) -> Result<(), Error> {
    send_embed(ctx, embed::success(title, description)).await
}

use crate::commands::Data;
use crate::commands::voice::placement;
use crate::error::MusicError;
use crate::services::music::Session;
use crate::services::music::display::{Control, DisplayTarget};
use crate::services::music::lavalink;
use crate::services::music::session::SEEK_STEP_MS;
use lavalink_rs::model::events::Events;
use serenity::all::{ComponentInteraction, Context, CreateInteractionResponse};
use std::sync::Arc;

/// Node hooks, all forwarded to the session registry.
pub fn lavalink_events() -> Events {
    Events {
        track_start: Some(|client, _session_id, event| {
            Box::pin(lavalink::on_track_start(client, event))
        }),
        track_end: Some(|client, _session_id, event| {
            Box::pin(lavalink::on_track_end(client, event))
        }),
        track_exception: Some(|client, _session_id, event| {
            Box::pin(lavalink::on_track_exception(client, event))
        }),
        track_stuck: Some(|client, _session_id, event| {
            Box::pin(lavalink::on_track_stuck(client, event))
        }),
        player_update: Some(|client, _session_id, event| {
            Box::pin(lavalink::on_player_update(client, event))
        }),
        websocket_closed: Some(|client, _session_id, event| {
            Box::pin(lavalink::on_websocket_closed(client, event))
        }),
        ..Default::default()
    }
}

/// Applies one display button to the session.
pub async fn apply_control(session: &Arc<Session>, control: Control) -> Result<(), MusicError> {
    match control {
        Control::Shuffle => {
            session.toggle_shuffle().await;
        }
        Control::Previous => {
            session.seek(0).await?;
        }
        Control::Pause => session.set_pause(true).await?,
        Control::Resume => session.set_pause(false).await?,
        Control::Next => session.skip(None, false).await?,
        Control::Repeat => {
            session.cycle_loop_mode().await;
        }
        Control::Autoplay => {
            if session.autoplay_available() {
                session.toggle_autoplay().await;
            }
        }
        Control::Rewind => {
            session.seek_by(-(SEEK_STEP_MS as i64)).await?;
        }
        Control::Forward => {
            session.seek_by(SEEK_STEP_MS as i64).await?;
        }
        Control::Stop => session.stop().await?,
        Control::Lyrics => {
            session.toggle_lyrics().await;
        }
    }
    Ok(())
}

/// Handles a press on the live display. Presses from members outside the
/// bot's voice channel are acknowledged and otherwise ignored.
pub async fn handle_control(
    ctx: &Context,
    interaction: &ComponentInteraction,
    data: &Data,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(control) = Control::parse(&interaction.data.custom_id) else {
        return Ok(());
    };
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };

    interaction
        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
        .await?;

    let place = placement(&ctx.cache, guild_id, interaction.user.id);
    if let Err(e) = place.check(false) {
        tracing::debug!(guild = %guild_id, user = %interaction.user.id, reason = %e, "control ignored");
        return Ok(());
    }
    let Some(session) = data.music_player.get(guild_id) else {
        return Ok(());
    };

    tracing::debug!(guild = %guild_id, ?control, "display control");
    if let Err(e) = apply_control(&session, control).await {
        // Buttons have no reply surface, the display shows the outcome.
        tracing::debug!(guild = %guild_id, ?control, reason = %e, "control had no effect");
    }
    session.refresh_display(DisplayTarget::Keep).await;
    Ok(())
}

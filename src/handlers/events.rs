use crate::commands::Data;
use crate::handlers::music::handle_control;
use crate::utils::embed;
use serenity::all::{ChannelId, Context, CreateMessage, FullEvent, GuildId, Interaction, VoiceState};

/// Main event handler for Discord events
pub async fn handle_event(
    ctx: &Context,
    event: &FullEvent,
    data: &Data,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            tracing::info!(user = %data_about_bot.user.name, guilds = data_about_bot.guilds.len(), "connected to gateway");
        }
        FullEvent::VoiceStateUpdate { old, new } => {
            handle_voice_state_update(ctx, old.as_ref(), new, data).await;
        }
        FullEvent::InteractionCreate {
            interaction: Interaction::Component(component),
        } => {
            handle_control(ctx, component, data).await?;
        }
        _ => {}
    }

    Ok(())
}

/// Tracks the bot's own voice connection and leaves channels that empty out.
async fn handle_voice_state_update(
    ctx: &Context,
    old: Option<&VoiceState>,
    new: &VoiceState,
    data: &Data,
) {
    let Some(guild_id) = new.guild_id else {
        return;
    };
    let bot_id = ctx.cache.current_user().id;
    let old_channel = old.and_then(|vs| vs.channel_id);

    if new.user_id == bot_id {
        if new.channel_id.is_none() && old_channel.is_some() {
            if let Some(session) = data.music_player.get(guild_id) {
                tracing::info!(guild = %guild_id, "bot was removed from voice");
                session.on_voice_lost().await;
            }
            let _ = data.node.disconnect(guild_id).await;
        }
        return;
    }

    if let Some(left) = old_channel.filter(|c| Some(*c) != new.channel_id) {
        auto_disconnect(ctx, data, guild_id, left).await;
    }
}

fn listeners_left(ctx: &Context, guild_id: GuildId, channel: ChannelId) -> Option<usize> {
    let bot_id = ctx.cache.current_user().id;
    let guild = ctx.cache.guild(guild_id)?;

    let bot_channel = guild.voice_states.get(&bot_id).and_then(|vs| vs.channel_id);
    if bot_channel != Some(channel) {
        return None;
    }

    Some(
        guild
            .voice_states
            .iter()
            .filter(|(user_id, vs)| {
                vs.channel_id == Some(channel)
                    && **user_id != bot_id
                    && !guild.members.get(*user_id).is_some_and(|m| m.user.bot)
            })
            .count(),
    )
}

/// Leave the channel once the last listener is gone
async fn auto_disconnect(ctx: &Context, data: &Data, guild_id: GuildId, channel: ChannelId) {
    if listeners_left(ctx, guild_id, channel) != Some(0) {
        return;
    }
    tracing::info!(guild = %guild_id, %channel, "voice channel is empty, leaving");

    let text_channel = match data.music_player.get(guild_id) {
        Some(session) => {
            let text_channel = session.text_channel().await;
            session.on_voice_lost().await;
            text_channel
        }
        None => None,
    };

    if let Err(e) = data.songbird.leave(guild_id).await {
        tracing::debug!(guild = %guild_id, error = %e, "songbird leave failed");
    }
    let _ = data.node.disconnect(guild_id).await;

    if let Some(text_channel) = text_channel {
        let message = CreateMessage::new().embed(embed::info(
            "Disconnected",
            "Everyone left the voice channel, so I left too.",
        ));
        if let Err(e) = text_channel.send_message(&ctx.http, message).await {
            tracing::warn!(guild = %guild_id, error = %e, "failed to post leave notice");
        }
    }
}

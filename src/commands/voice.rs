use crate::commands::{Context, Error};
use crate::error::MusicError;
use crate::services::music::Session;
use lavalink_rs::model::player::ConnectionInfo;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use std::sync::Arc;

/// Where the member and the bot currently are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoicePlacement {
    pub user: Option<ChannelId>,
    pub bot: Option<ChannelId>,
    pub bot_can_join: bool,
}

impl VoicePlacement {
    /// Validates a member's control of the player. Returns the channel the
    /// bot still has to join, if `should_connect` allows joining.
    pub fn check(&self, should_connect: bool) -> Result<Option<ChannelId>, MusicError> {
        let user = self.user.ok_or(MusicError::UserNotInVoice)?;
        match self.bot {
            None if should_connect => {
                if !self.bot_can_join {
                    return Err(MusicError::MissingVoicePermissions);
                }
                Ok(Some(user))
            }
            None => Err(MusicError::BotNotInVoice),
            Some(bot) if bot != user => Err(MusicError::UserInDifferentChannel(bot)),
            Some(_) => Ok(None),
        }
    }
}

/// Reads voice placement for `user` from the cache.
pub fn placement(
    cache: &poise::serenity_prelude::Cache,
    guild_id: GuildId,
    user: UserId,
) -> VoicePlacement {
    let bot_id = cache.current_user().id;
    let Some(guild) = cache.guild(guild_id) else {
        return VoicePlacement {
            user: None,
            bot: None,
            bot_can_join: false,
        };
    };

    let user_channel = guild.voice_states.get(&user).and_then(|vs| vs.channel_id);
    let bot_channel = guild.voice_states.get(&bot_id).and_then(|vs| vs.channel_id);

    let bot_can_join = match (
        user_channel.and_then(|c| guild.channels.get(&c)),
        guild.members.get(&bot_id),
    ) {
        (Some(channel), Some(member)) => {
            let perms = guild.user_permissions_in(channel, member);
            perms.connect() && perms.speak()
        }
        // Without a cached view, let the gateway decide.
        _ => true,
    };

    VoicePlacement {
        user: user_channel,
        bot: bot_channel,
        bot_can_join,
    }
}

/// Runs the voice checks every player-mutating command shares and joins the
/// member's channel when `should_connect` is set. Returns the guild session.
pub async fn require_voice(ctx: Context<'_>, should_connect: bool) -> Result<Arc<Session>, Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let place = placement(ctx.serenity_context().cache.as_ref(), guild_id, ctx.author().id);

    if let Some(channel) = place.check(should_connect)? {
        join(ctx, guild_id, channel).await?;
    }

    let session = ctx.data().music_player.session(guild_id);
    session.attach(ctx.channel_id()).await;
    Ok(session)
}

/// Joins `channel` through the voice gateway and hands the connection to the
/// node.
pub async fn join(ctx: Context<'_>, guild_id: GuildId, channel: ChannelId) -> Result<(), Error> {
    let data = ctx.data();
    let songbird = data.songbird.clone();

    let (connection, _call) = songbird
        .join_gateway(guild_id, channel)
        .await
        .map_err(|e| format!("Failed to join voice channel: {e}"))?;

    let connection = ConnectionInfo {
        endpoint: connection.endpoint,
        token: connection.token,
        session_id: connection.session_id,
    };

    if let Err(e) = data.node.connect(guild_id, connection).await {
        let _ = songbird.leave(guild_id).await;
        return Err(MusicError::from(e).into());
    }

    let session = data.music_player.session(guild_id);
    session.attach(ctx.channel_id()).await;
    session.on_connected().await;
    tracing::info!(guild = %guild_id, %channel, "joined voice");
    Ok(())
}

/// Leaves voice and resets the session.
pub async fn leave(ctx: Context<'_>, guild_id: GuildId) -> Result<(), Error> {
    let data = ctx.data();
    if let Err(e) = data.songbird.leave(guild_id).await {
        tracing::debug!(guild = %guild_id, error = %e, "songbird leave failed");
    }
    if let Some(session) = data.music_player.get(guild_id) {
        session.on_voice_lost().await;
    }
    if let Err(e) = data.node.disconnect(guild_id).await {
        tracing::debug!(guild = %guild_id, error = %e, "node player already gone");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ChannelId = ChannelId::new(1);
    const B: ChannelId = ChannelId::new(2);

    fn place(user: Option<ChannelId>, bot: Option<ChannelId>) -> VoicePlacement {
        VoicePlacement {
            user,
            bot,
            bot_can_join: true,
        }
    }

    #[test]
    fn member_must_be_in_voice() {
        assert_eq!(place(None, Some(A)).check(false), Err(MusicError::UserNotInVoice));
    }

    #[test]
    fn bot_must_be_in_voice_unless_connecting() {
        assert_eq!(place(Some(A), None).check(false), Err(MusicError::BotNotInVoice));
        assert_eq!(place(Some(A), None).check(true), Ok(Some(A)));
    }

    #[test]
    fn member_must_share_the_bot_channel() {
        assert_eq!(
            place(Some(A), Some(B)).check(true),
            Err(MusicError::UserInDifferentChannel(B))
        );
        assert_eq!(place(Some(A), Some(A)).check(false), Ok(None));
    }

    #[test]
    fn joining_needs_connect_and_speak() {
        let mut placement = place(Some(A), None);
        placement.bot_can_join = false;
        assert_eq!(placement.check(true), Err(MusicError::MissingVoicePermissions));
    }
}

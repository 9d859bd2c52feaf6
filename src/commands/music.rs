use crate::commands::voice::{self, placement, require_voice};
use crate::commands::{Context, Error, send_embed, send_success};
use crate::error::MusicError;
use crate::services::music::Session;
use crate::services::music::display::{DisplayTarget, MessageRef};
use crate::services::music::node::{self, LoadKind};
use crate::services::music::queue::LoopMode;
use crate::services::music::session::{NOTICE_DISPLAY_DELAY, SessionSnapshot};
use crate::services::music::track::{QueuedTrack, Requester};
use crate::utils::embed;
use crate::utils::format::{format_time, parse_time, truncate};
use poise::serenity_prelude::{
    AutocompleteChoice, ButtonStyle, ComponentInteractionCollector, CreateActionRow, CreateButton,
    CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, Mentionable,
};
use std::sync::Arc;
use std::time::Duration;

const CONFLICT_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_TIMEOUT: Duration = Duration::from_secs(60);
pub const QUEUE_PAGE_SIZE: usize = 10;

/// Sends `embed` and lets the reply take over as the display after `delay`.
async fn reply_as_display(
    ctx: Context<'_>,
    session: &Arc<Session>,
    embed: CreateEmbed,
    delay: Duration,
) -> Result<(), Error> {
    let reply = ctx.send(poise::CreateReply::default().embed(embed)).await?;
    let message = reply.message().await?;
    session.request_display(
        DisplayTarget::Replace(MessageRef {
            channel_id: message.channel_id,
            message_id: message.id,
        }),
        delay,
    );
    Ok(())
}

/// Connect to your voice channel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn connect(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    ctx.defer().await?;

    let place = placement(ctx.serenity_context().cache.as_ref(), guild_id, ctx.author().id);
    let session = ctx.data().music_player.session(guild_id);
    session.attach(ctx.channel_id()).await;

    match place.check(true) {
        Ok(Some(channel)) => {
            voice::join(ctx, guild_id, channel).await?;
            let embed = embed::success("Connected", &format!("Joined {}!", channel.mention()));
            reply_as_display(ctx, &session, embed, NOTICE_DISPLAY_DELAY).await
        }
        Ok(None) => {
            let embed = embed::success("Connected", "I'm already in your voice channel.");
            reply_as_display(ctx, &session, embed, NOTICE_DISPLAY_DELAY).await
        }
        Err(MusicError::UserInDifferentChannel(current)) => {
            let target = place.user.ok_or(MusicError::UserNotInVoice)?;
            if !place.bot_can_join {
                return Err(MusicError::MissingVoicePermissions.into());
            }
            move_after_confirmation(ctx, &session, current, target).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Asks before pulling the bot away from members listening elsewhere.
async fn move_after_confirmation(
    ctx: Context<'_>,
    session: &Arc<Session>,
    current: poise::serenity_prelude::ChannelId,
    target: poise::serenity_prelude::ChannelId,
) -> Result<(), Error> {
    let guild_id = session.guild_id();
    let continue_id = format!("{}continue", ctx.id());

    let prompt = embed::warning(
        "Already Connected",
        &format!(
            "I'm playing in {}. Moving will interrupt their music. Continue?",
            current.mention()
        ),
    );
    let row = CreateActionRow::Buttons(vec![
        CreateButton::new(&continue_id)
            .label("Continue")
            .style(ButtonStyle::Success),
    ]);

    let reply = ctx
        .send(
            poise::CreateReply::default()
                .embed(prompt)
                .components(vec![row]),
        )
        .await?;
    let msg = reply.message().await?;

    let press = ComponentInteractionCollector::new(ctx.serenity_context().shard.clone())
        .message_id(msg.id)
        .author_id(ctx.author().id)
        .filter(move |press| press.data.custom_id == continue_id)
        .timeout(CONFLICT_TIMEOUT)
        .await;

    let Some(press) = press else {
        // Timeout - remove the button
        let _ = reply
            .edit(
                ctx,
                poise::CreateReply::default()
                    .embed(embed::error("Cancelled", "No confirmation received."))
                    .components(vec![]),
            )
            .await;
        return Ok(());
    };
    press
        .create_response(ctx.http(), CreateInteractionResponse::Acknowledge)
        .await?;

    if let Err(e) = session.stop().await {
        tracing::warn!(guild = %guild_id, error = %e, "failed to stop before moving channels");
    }
    voice::leave(ctx, guild_id).await?;
    voice::join(ctx, guild_id, target).await?;

    reply
        .edit(
            ctx,
            poise::CreateReply::default()
                .embed(embed::success("Connected", &format!("Moved to {}!", target.mention())))
                .components(vec![]),
        )
        .await?;
    session.request_display(
        DisplayTarget::Replace(MessageRef {
            channel_id: msg.channel_id,
            message_id: msg.id,
        }),
        NOTICE_DISPLAY_DELAY,
    );
    Ok(())
}

/// Leave the voice channel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn disconnect(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    voice::leave(ctx, session.guild_id()).await?;
    reply_as_display(
        ctx,
        &session,
        embed::info("Disconnected", "Left the voice channel. 👋"),
        NOTICE_DISPLAY_DELAY,
    )
    .await
}

async fn autocomplete_query(ctx: Context<'_>, partial: &str) -> Vec<AutocompleteChoice> {
    let partial = partial.trim();
    if partial.is_empty() || partial.starts_with("http://") || partial.starts_with("https://") {
        return Vec::new();
    }
    let Some(guild_id) = ctx.guild_id() else {
        return Vec::new();
    };

    let node = ctx.data().node.clone();
    match node::search(node.as_ref(), guild_id, partial).await {
        Ok(result) => result
            .tracks
            .iter()
            .filter_map(|t| {
                let uri = t.uri()?;
                Some(AutocompleteChoice::new(
                    format!("{} by {}", truncate(t.title(), 80), truncate(t.author(), 16)),
                    uri.to_string(),
                ))
            })
            .take(25)
            .collect(),
        Err(e) => {
            tracing::debug!(guild = %guild_id, error = %e, "autocomplete search failed");
            Vec::new()
        }
    }
}

/// Play a song or playlist
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or song title"]
    #[autocomplete = "autocomplete_query"]
    query: String,
    #[description = "Queue position to insert at"]
    #[min = 1]
    index: Option<usize>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let session = require_voice(ctx, true).await?;
    let guild_id = session.guild_id();

    let loaded = node::search(ctx.data().node.as_ref(), guild_id, &query)
        .await
        .map_err(MusicError::from)?;
    if loaded.tracks.is_empty() {
        return Err(MusicError::NoResults(query).into());
    }

    let requester = Requester::User(ctx.author().id);
    let mention = requester.mention();
    let playlist_name = match &loaded.kind {
        LoadKind::Playlist { name } => Some(name.clone()),
        _ => None,
    };

    let mut tracks = loaded.tracks;
    if playlist_name.is_none() {
        tracks.truncate(1);
    }
    let count = tracks.len();
    let first = tracks[0].clone();
    let queued = tracks
        .into_iter()
        .map(|t| QueuedTrack::new(t, requester))
        .collect();

    let enqueued = session.enqueue(queued, index).await?;
    tracing::info!(guild = %guild_id, query = %query, count, position = enqueued.position, "queued");

    let added = match playlist_name {
        Some(name) => embed::playlist_added(&name, &first, count, &mention),
        None => embed::added_to_queue(&first, enqueued.position, &mention),
    };

    let snapshot = session.snapshot().await;
    let mut reply = poise::CreateReply::default().embed(added);
    if !snapshot.filters.is_empty() {
        let active = snapshot
            .filters
            .iter()
            .map(|k| k.label())
            .collect::<Vec<_>>()
            .join(", ");
        reply = reply.embed(embed::info(
            "Filters Active",
            &format!(
                "Audio filters may change how this sounds. Use `/filters reset` to turn them off.\nActive: {active}"
            ),
        ));
    }

    let handle = ctx.send(reply).await?;
    let message = handle.message().await?;
    session.request_display(
        DisplayTarget::Replace(MessageRef {
            channel_id: message.channel_id,
            message_id: message.id,
        }),
        NOTICE_DISPLAY_DELAY,
    );
    Ok(())
}

/// Skip the current song, or jump to a queue position
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn skip(
    ctx: Context<'_>,
    #[description = "Queue position to skip to"]
    #[min = 1]
    target: Option<usize>,
    #[description = "Discard the tracks in front of the target"]
    #[rename = "move"]
    move_to_front: Option<bool>,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    session.skip(target, move_to_front.unwrap_or(false)).await?;

    let description = match target {
        Some(target) => format!("Skipped to position **{target}**."),
        None => "Skipped the current song.".to_string(),
    };
    reply_as_display(ctx, &session, embed::success("Skipped", &description), NOTICE_DISPLAY_DELAY).await
}

/// Remove a song from the queue
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Position in queue (1, 2, 3, ...)"]
    #[min = 1]
    target: usize,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let removed = session.remove_at(target).await?;
    send_success(
        ctx,
        "Removed",
        &format!("Removed **{}** from the queue.", removed.track.markdown_link()),
    )
    .await
}

/// Clear the queue
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn clean(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let cleared = session.clear().await;
    send_success(ctx, "Queue Cleared", &format!("Removed {cleared} song(s).")).await
}

/// Pause the player
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    session.set_pause(true).await?;
    reply_as_display(ctx, &session, embed::success("Paused", "Music paused."), NOTICE_DISPLAY_DELAY).await
}

/// Resume the player
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    session.set_pause(false).await?;
    reply_as_display(ctx, &session, embed::success("Resumed", "Music resumed."), NOTICE_DISPLAY_DELAY).await
}

/// Stop playback and clear the queue
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    session.stop().await?;
    reply_as_display(
        ctx,
        &session,
        embed::success("Stopped", "Playback stopped and the queue was cleared."),
        NOTICE_DISPLAY_DELAY,
    )
    .await
}

/// Queue lines grouped into pages. Autoplay entries are marked.
pub fn queue_pages(snapshot: &SessionSnapshot) -> Vec<String> {
    snapshot
        .queue
        .chunks(QUEUE_PAGE_SIZE)
        .enumerate()
        .map(|(page, tracks)| {
            tracks
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let marker = if t.is_autoplay() { " 🔥" } else { "" };
                    format!(
                        "**[{}]** {} `{}`{}",
                        page * QUEUE_PAGE_SIZE + i + 1,
                        truncate(t.track.title(), 80),
                        format_time(t.track.duration_ms()),
                        marker
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}

fn queue_page_embed(pages: &[String], page: usize) -> CreateEmbed {
    embed::info("Queue", &pages[page]).footer(poise::serenity_prelude::CreateEmbedFooter::new(
        format!("Page {}/{}", page + 1, pages.len()),
    ))
}

fn pager_row(ctx_id: u64, page: usize, total: usize) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(format!("{ctx_id}prev"))
            .emoji('⏪')
            .style(ButtonStyle::Primary)
            .disabled(page == 0),
        CreateButton::new(format!("{ctx_id}next"))
            .emoji('⏩')
            .style(ButtonStyle::Primary)
            .disabled(page + 1 >= total),
        CreateButton::new(format!("{ctx_id}close"))
            .emoji('⏹')
            .style(ButtonStyle::Danger),
    ])
}

/// Show the queue
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn queue(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let Some(session) = ctx.data().music_player.get(guild_id) else {
        return send_embed(ctx, embed::info("Queue Empty", "No songs in queue")).await;
    };

    let pages = queue_pages(&session.snapshot().await);
    if pages.is_empty() {
        return send_embed(ctx, embed::info("Queue Empty", "No songs in queue")).await;
    }

    let ctx_id = ctx.id();
    let mut page = 0;
    let reply = ctx
        .send(
            poise::CreateReply::default()
                .embed(queue_page_embed(&pages, page))
                .components(vec![pager_row(ctx_id, page, pages.len())]),
        )
        .await?;
    let msg = reply.message().await?;

    while let Some(press) = ComponentInteractionCollector::new(ctx.serenity_context().shard.clone())
        .message_id(msg.id)
        .author_id(ctx.author().id)
        .timeout(PAGE_TIMEOUT)
        .await
    {
        let id = press.data.custom_id.strip_prefix(&ctx_id.to_string()).unwrap_or_default();
        match id {
            "prev" => page = page.saturating_sub(1),
            "next" => page = (page + 1).min(pages.len() - 1),
            "close" => {
                press
                    .create_response(ctx.http(), CreateInteractionResponse::Acknowledge)
                    .await?;
                msg.delete(ctx.http()).await.ok();
                return Ok(());
            }
            _ => continue,
        }
        press
            .create_response(
                ctx.http(),
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(queue_page_embed(&pages, page))
                        .components(vec![pager_row(ctx_id, page, pages.len())]),
                ),
            )
            .await?;
    }

    // Timeout - remove buttons
    let _ = reply
        .edit(
            ctx,
            poise::CreateReply::default()
                .embed(queue_page_embed(&pages, page))
                .components(vec![]),
        )
        .await;
    Ok(())
}

/// Change the repeat mode
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn repeat(
    ctx: Context<'_>,
    #[description = "Repeat mode"] mode: LoopMode,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    session.set_loop_mode(mode).await;
    reply_as_display(
        ctx,
        &session,
        embed::success("Repeat", &format!("Repeat mode set to **{}**.", mode.label())),
        NOTICE_DISPLAY_DELAY,
    )
    .await
}

/// Toggle shuffle
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn shuffle(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let on = session.toggle_shuffle().await;
    let state = if on { "on" } else { "off" };
    reply_as_display(
        ctx,
        &session,
        embed::success("Shuffle", &format!("Shuffle is now **{state}**.")),
        NOTICE_DISPLAY_DELAY,
    )
    .await
}

/// Toggle autoplay recommendations
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn autoplay(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    if !session.autoplay_available() {
        return send_embed(ctx, embed::error("Autoplay", "Autoplay is disabled on this bot.")).await;
    }
    let on = session.toggle_autoplay().await;
    let state = if on { "on" } else { "off" };
    send_success(ctx, "Autoplay", &format!("Autoplay is now **{state}**.")).await
}

/// Toggle the lyrics panel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn lyrics(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let on = session.toggle_lyrics().await;
    let state = if on { "shown" } else { "hidden" };
    send_success(ctx, "Lyrics", &format!("Lyrics are now **{state}**.")).await
}

/// Jump to a position in the current song
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn seek(
    ctx: Context<'_>,
    #[description = "Position such as 1:30, or seconds"] position: String,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let Some(ms) = parse_time(&position) else {
        return send_embed(
            ctx,
            embed::error("Invalid Time", "Use `SS`, `MM:SS` or `HH:MM:SS`."),
        )
        .await;
    };
    let landed = session.seek(ms).await?;
    send_success(ctx, "Seek", &format!("Jumped to `{}`.", format_time(landed))).await
}

/// Show the live player here
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn dashboard(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    reply_as_display(ctx, &session, embed::music("Now Playing", "Loading the player..."), Duration::ZERO).await
}

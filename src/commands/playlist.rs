use crate::commands::voice::require_voice;
use crate::commands::{Context, Error, send_embed, send_success};
use crate::error::MusicError;
use crate::repository::{PLAYLIST_CAPACITY, Playlist};
use crate::services::music::display::{DisplayTarget, MessageRef};
use crate::services::music::node::{self, LoadKind};
use crate::services::music::session::NOTICE_DISPLAY_DELAY;
use crate::services::music::track::{QueuedTrack, Requester};
use crate::utils::embed;
use crate::utils::format::{format_time, truncate};
use poise::serenity_prelude::{AutocompleteChoice, CreateEmbedFooter};

/// Member's own playlists, labelled by name with the id as value.
async fn autocomplete_owned(ctx: Context<'_>, partial: &str) -> Vec<AutocompleteChoice> {
    let partial = partial.to_lowercase();
    match ctx.data().playlists.list(ctx.author().id).await {
        Ok(playlists) => playlists
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&partial))
            .take(25)
            .map(|p| {
                AutocompleteChoice::new(format!("{} ({} tracks)", p.name, p.tracks.len()), p.id)
            })
            .collect(),
        Err(e) => {
            tracing::warn!(user = %ctx.author().id, error = %e, "failed to list playlists");
            Vec::new()
        }
    }
}

fn visibility_label(public: bool) -> &'static str {
    if public { "public" } else { "private" }
}

/// Track listing for `/playlist show`.
pub fn describe(playlist: &Playlist) -> String {
    if playlist.tracks.is_empty() {
        return "This playlist is empty.".to_string();
    }
    playlist
        .tracks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                "**[{}]** {} `{}`",
                i + 1,
                truncate(t.title(), 80),
                format_time(t.duration_ms())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Manage saved playlists
#[poise::command(
    slash_command,
    prefix_command,
    subcommands(
        "create",
        "list",
        "rename",
        "set_visibility",
        "add",
        "remove",
        "delete",
        "show",
        "play"
    ),
    subcommand_required
)]
pub async fn playlist(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Create an empty playlist
#[poise::command(slash_command, prefix_command)]
pub async fn create(
    ctx: Context<'_>,
    #[description = "Playlist name"]
    #[max_length = 100]
    name: String,
    #[description = "Let anyone with the id play it"] public: Option<bool>,
) -> Result<(), Error> {
    let created = ctx
        .data()
        .playlists
        .create(ctx.author().id, &name, public.unwrap_or(false))
        .await?;
    tracing::info!(user = %ctx.author().id, id = %created.id, "playlist created");
    send_success(
        ctx,
        "Playlist Created",
        &format!(
            "**{}** is ready ({}).\nID: `{}`",
            created.name,
            visibility_label(created.public),
            created.id
        ),
    )
    .await
}

/// List your playlists
#[poise::command(slash_command, prefix_command)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let playlists = ctx.data().playlists.list(ctx.author().id).await?;
    if playlists.is_empty() {
        return send_embed(
            ctx,
            embed::info("Playlists", "You have no playlists. Use `/playlist create`."),
        )
        .await;
    }

    let lines = playlists
        .iter()
        .map(|p| {
            format!(
                "**{}** · {}/{} tracks · {}\n`{}`",
                p.name,
                p.tracks.len(),
                PLAYLIST_CAPACITY,
                visibility_label(p.public),
                p.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    send_embed(ctx, embed::info("Your Playlists", &lines)).await
}

/// Rename one of your playlists
#[poise::command(slash_command, prefix_command)]
pub async fn rename(
    ctx: Context<'_>,
    #[description = "Playlist"]
    #[autocomplete = "autocomplete_owned"]
    id: String,
    #[description = "New name"]
    #[max_length = 100]
    name: String,
) -> Result<(), Error> {
    let renamed = ctx
        .data()
        .playlists
        .rename(ctx.author().id, &id, &name)
        .await?;
    send_success(
        ctx,
        "Playlist Renamed",
        &format!("Now called **{}**.\nNew ID: `{}`", renamed.name, renamed.id),
    )
    .await
}

/// Make a playlist public or private
#[poise::command(slash_command, prefix_command, rename = "visibility")]
pub async fn set_visibility(
    ctx: Context<'_>,
    #[description = "Playlist"]
    #[autocomplete = "autocomplete_owned"]
    id: String,
    #[description = "Anyone with the id may play it"] public: bool,
) -> Result<(), Error> {
    let updated = ctx
        .data()
        .playlists
        .set_visibility(ctx.author().id, &id, public)
        .await?;
    send_success(
        ctx,
        "Visibility Updated",
        &format!(
            "**{}** is now {}.",
            updated.name,
            visibility_label(updated.public)
        ),
    )
    .await
}

/// Add a song, or a whole playlist link, to one of your playlists
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Playlist"]
    #[autocomplete = "autocomplete_owned"]
    id: String,
    #[description = "URL or song title"] query: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    ctx.defer().await?;

    let loaded = node::search(ctx.data().node.as_ref(), guild_id, &query)
        .await
        .map_err(MusicError::from)?;
    if loaded.tracks.is_empty() {
        return Err(MusicError::NoResults(query).into());
    }

    let mut tracks = loaded.tracks;
    if !matches!(loaded.kind, LoadKind::Playlist { .. }) {
        tracks.truncate(1);
    }
    let added = tracks.len();
    let first = tracks[0].markdown_link();

    let total = ctx
        .data()
        .playlists
        .append(ctx.author().id, &id, tracks)
        .await?;

    let description = if added == 1 {
        format!("Added {first}. The playlist now has {total}/{PLAYLIST_CAPACITY} tracks.")
    } else {
        format!("Added {added} tracks. The playlist now has {total}/{PLAYLIST_CAPACITY} tracks.")
    };
    send_success(ctx, "Playlist Updated", &description).await
}

/// Remove a song from one of your playlists
#[poise::command(slash_command, prefix_command)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Playlist"]
    #[autocomplete = "autocomplete_owned"]
    id: String,
    #[description = "Position in the playlist (1, 2, 3, ...)"]
    #[min = 1]
    position: usize,
) -> Result<(), Error> {
    let removed = ctx
        .data()
        .playlists
        .remove_track_at(ctx.author().id, &id, position)
        .await?;
    send_success(
        ctx,
        "Playlist Updated",
        &format!("Removed {}.", removed.markdown_link()),
    )
    .await
}

/// Delete one of your playlists
#[poise::command(slash_command, prefix_command)]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Playlist"]
    #[autocomplete = "autocomplete_owned"]
    id: String,
) -> Result<(), Error> {
    let deleted = ctx.data().playlists.delete(ctx.author().id, &id).await?;
    tracing::info!(user = %ctx.author().id, id = %deleted.id, "playlist deleted");
    send_success(
        ctx,
        "Playlist Deleted",
        &format!("**{}** is gone.", deleted.name),
    )
    .await
}

/// Show the songs in a playlist
#[poise::command(slash_command, prefix_command)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "Playlist id"]
    #[autocomplete = "autocomplete_owned"]
    id: String,
) -> Result<(), Error> {
    let playlist = ctx.data().playlists.resolve(&id, ctx.author().id).await?;
    let embed = embed::info(&playlist.name, &describe(&playlist)).footer(CreateEmbedFooter::new(
        format!(
            "{}/{} tracks · {}",
            playlist.tracks.len(),
            PLAYLIST_CAPACITY,
            visibility_label(playlist.public)
        ),
    ));
    send_embed(ctx, embed).await
}

/// Queue every song of a playlist
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Playlist id"]
    #[autocomplete = "autocomplete_owned"]
    id: String,
) -> Result<(), Error> {
    let playlist = ctx.data().playlists.resolve(&id, ctx.author().id).await?;
    if playlist.tracks.is_empty() {
        return send_embed(ctx, embed::info(&playlist.name, "This playlist is empty.")).await;
    }

    let session = require_voice(ctx, true).await?;
    let requester = Requester::User(ctx.author().id);
    let count = playlist.tracks.len();
    let first = playlist.tracks[0].clone();
    let queued = playlist
        .tracks
        .into_iter()
        .map(|t| QueuedTrack::new(t, requester))
        .collect();
    session.enqueue(queued, None).await?;

    let reply = ctx
        .send(poise::CreateReply::default().embed(embed::playlist_added(
            &playlist.name,
            &first,
            count,
            &requester.mention(),
        )))
        .await?;
    let message = reply.message().await?;
    session.request_display(
        DisplayTarget::Replace(MessageRef {
            channel_id: message.channel_id,
            message_id: message.id,
        }),
        NOTICE_DISPLAY_DELAY,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::music::track::fixtures::track;
    use poise::serenity_prelude::UserId;

    fn playlist(tracks: Vec<crate::services::music::track::Track>) -> Playlist {
        Playlist {
            id: "id".to_string(),
            name: "mix".to_string(),
            owner: UserId::new(1),
            public: false,
            tracks,
        }
    }

    #[test]
    fn describe_numbers_tracks_from_one() {
        let text = describe(&playlist(vec![track("a"), track("b")]));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("**[1]** a title"));
        assert!(lines[1].contains("`03:00`"));
    }

    #[test]
    fn describe_empty_playlist() {
        assert_eq!(describe(&playlist(Vec::new())), "This playlist is empty.");
    }
}

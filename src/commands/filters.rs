use crate::commands::voice::require_voice;
use crate::commands::{Context, Error, send_success};
use crate::services::music::Session;
use crate::services::music::filters::{Filter, FilterKind};
use std::sync::Arc;

async fn apply(ctx: Context<'_>, session: &Arc<Session>, filter: Filter) -> Result<(), Error> {
    let label = filter.kind().label();
    session.set_filter(filter).await?;
    tracing::debug!(guild = %session.guild_id(), filter = label, "filter applied");
    send_success(ctx, "Filter Applied", &format!("**{label}** is now active.")).await
}

/// Change speed, pitch and rate
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn timescale(
    ctx: Context<'_>,
    #[description = "Playback speed (default 1.0)"] speed: Option<f64>,
    #[description = "Pitch (default 1.0)"] pitch: Option<f64>,
    #[description = "Rate (default 1.0)"] rate: Option<f64>,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let filter = Filter::Timescale {
        speed: speed.unwrap_or(1.0),
        pitch: pitch.unwrap_or(1.0),
        rate: rate.unwrap_or(1.0),
    };
    apply(ctx, &session, filter).await
}

/// Oscillate the volume
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn tremolo(
    ctx: Context<'_>,
    #[description = "Frequency (default 2.0)"] frequency: Option<f64>,
    #[description = "Depth between 0 and 1 (default 0.5)"] depth: Option<f64>,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let filter = Filter::Tremolo {
        frequency: frequency.unwrap_or(2.0),
        depth: depth.unwrap_or(0.5),
    };
    apply(ctx, &session, filter).await
}

/// Oscillate the pitch
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn vibrato(
    ctx: Context<'_>,
    #[description = "Frequency (default 2.0)"] frequency: Option<f64>,
    #[description = "Depth between 0 and 1 (default 0.5)"] depth: Option<f64>,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let filter = Filter::Vibrato {
        frequency: frequency.unwrap_or(2.0),
        depth: depth.unwrap_or(0.5),
    };
    apply(ctx, &session, filter).await
}

/// Muffle high frequencies
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn lowpass(
    ctx: Context<'_>,
    #[description = "Smoothing, greater than 1 (default 20)"] smoothing: Option<f64>,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let filter = Filter::LowPass {
        smoothing: smoothing.unwrap_or(20.0),
    };
    apply(ctx, &session, filter).await
}

/// Pan the audio around the listener
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn rotation(
    ctx: Context<'_>,
    #[description = "Rotation speed in Hz (default 0.2)"] hz: Option<f64>,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let filter = Filter::Rotation {
        rotation_hz: hz.unwrap_or(0.2),
    };
    apply(ctx, &session, filter).await
}

/// Boost or cut one equalizer band
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn equalizer(
    ctx: Context<'_>,
    #[description = "Band, 0 (lowest) to 14 (highest)"]
    #[min = 0]
    #[max = 14]
    band: u8,
    #[description = "Gain between -0.25 and 1.0"] gain: f64,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;

    // Keep the other bands already set.
    let mut bands = match session.filter(FilterKind::Equalizer).await {
        Some(Filter::Equalizer { bands }) => bands,
        _ => Vec::new(),
    };
    bands.retain(|(b, _)| *b != band);
    bands.push((band, gain));
    bands.sort_by_key(|(b, _)| *b);

    apply(ctx, &session, Filter::Equalizer { bands }).await
}

/// Manage active filters
#[poise::command(slash_command, prefix_command, guild_only, subcommands("reset", "remove"))]
pub async fn filters(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    let active = session.snapshot().await.filters;
    let description = if active.is_empty() {
        "No filters are active.".to_string()
    } else {
        active
            .iter()
            .map(|k| format!("• {}", k.label()))
            .collect::<Vec<_>>()
            .join("\n")
    };
    send_success(ctx, "Active Filters", &description).await
}

/// Turn every filter off
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    session.clear_filters().await?;
    send_success(ctx, "Filters Reset", "All filters have been removed.").await
}

/// Turn one filter off
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Filter to remove"] kind: FilterKind,
) -> Result<(), Error> {
    let session = require_voice(ctx, false).await?;
    session.remove_filter(kind).await?;
    send_success(
        ctx,
        "Filter Removed",
        &format!("**{}** is no longer active.", kind.label()),
    )
    .await
}

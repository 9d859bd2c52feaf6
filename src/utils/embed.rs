use crate::services::music::display::{ButtonTone, ButtonView, EmbedView};
use crate::services::music::track::Track;
use crate::utils::format::format_time;
use poise::serenity_prelude::{
    ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedAuthor,
    CreateEmbedFooter, ReactionType,
};

pub const COLOR_SUCCESS: u32 = 0x2ECC71; // Green
pub const COLOR_ERROR: u32 = 0xE74C3C; // Red
pub const COLOR_WARNING: u32 = 0xF39C12; // Orange
pub const COLOR_INFO: u32 = 0x3498DB; // Blue
pub const COLOR_MUSIC: u32 = 0x1DB954; // Spotify Green
pub const COLOR_LYRICS: u32 = 0x5865F2; // Blurple

pub fn success(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("[OK] {}", title))
        .description(description)
        .color(COLOR_SUCCESS)
}

pub fn error(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("[ERROR] {}", title))
        .description(description)
        .color(COLOR_ERROR)
}

pub fn warning(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("[WARN] {}", title))
        .description(description)
        .color(COLOR_WARNING)
}

pub fn info(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .color(COLOR_INFO)
}

pub fn music(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .color(COLOR_MUSIC)
}

pub fn added_to_queue(track: &Track, position: usize, requester: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("Added to Queue")
        .description(format!("**{}**", track.markdown_link()))
        .field("Duration", format_time(track.duration_ms()), true)
        .field("Position", format!("#{}", position), true)
        .field("Requested by", requester, true)
        .color(COLOR_MUSIC);

    if let Some(art) = track.artwork_url() {
        embed = embed.thumbnail(art);
    }

    embed
}

pub fn playlist_added(
    name: &str,
    first: &Track,
    track_count: usize,
    requester: &str,
) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("🎶 {}", name))
        .description(format!(
            "**{}** and **{} more tracks** added to queue",
            first.markdown_link(),
            track_count.saturating_sub(1)
        ))
        .field("Total Tracks", format!("{}", track_count), true)
        .field("Requested by", requester, true)
        .color(COLOR_MUSIC);

    if let Some(art) = first.artwork_url() {
        embed = embed.thumbnail(art);
    }

    embed
}

/// Discord side of a rendered display embed.
pub fn from_view(view: &EmbedView) -> CreateEmbed {
    let mut embed = CreateEmbed::new().color(view.color);

    if let Some(author) = &view.author {
        embed = embed.author(CreateEmbedAuthor::new(author));
    }
    if let Some(title) = &view.title {
        embed = embed.title(title);
    }
    if let Some(url) = &view.url {
        embed = embed.url(url);
    }
    if let Some(description) = &view.description {
        embed = embed.description(description);
    }
    for (name, value, inline) in &view.fields {
        embed = embed.field(name, value, *inline);
    }
    if let Some(image) = &view.image {
        embed = embed.image(image);
    }
    if let Some(thumbnail) = &view.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(footer) = &view.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }

    embed
}

pub fn action_rows(rows: &[Vec<ButtonView>]) -> Vec<CreateActionRow> {
    rows.iter()
        .map(|row| CreateActionRow::Buttons(row.iter().map(button).collect()))
        .collect()
}

fn button(view: &ButtonView) -> CreateButton {
    let style = match view.tone {
        ButtonTone::Primary => ButtonStyle::Primary,
        ButtonTone::Secondary => ButtonStyle::Secondary,
        ButtonTone::Success => ButtonStyle::Success,
        ButtonTone::Danger => ButtonStyle::Danger,
    };
    CreateButton::new(view.control.custom_id())
        .style(style)
        .emoji(ReactionType::Unicode(view.emoji.to_string()))
        .disabled(view.disabled)
}

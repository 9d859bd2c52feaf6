pub const PROGRESS_BAR_WIDTH: usize = 10;

/// `MM:SS`, or `HH:MM:SS` once the value reaches an hour.
pub fn format_time(ms: u64) -> String {
    let secs = (ms + 500) / 1000;
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Fixed-width bar of `PROGRESS_BAR_WIDTH` cells between two end caps.
pub fn progress_bar(position_ms: u64, duration_ms: u64) -> String {
    let duration = ((duration_ms + 500) / 1000).max(1);
    let position = ((position_ms + 500) / 1000).min(duration);

    let filled = ((position as f64 / duration as f64) * PROGRESS_BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(PROGRESS_BAR_WIDTH);

    let mut bar = String::with_capacity((PROGRESS_BAR_WIDTH + 3) * 3);
    bar.push('⬜');
    bar.extend(std::iter::repeat_n('⬜', filled));
    bar.push('⬜');
    bar.extend(std::iter::repeat_n('⬛', PROGRESS_BAR_WIDTH - filled));
    bar.push('⬛');
    bar
}

/// Parses `SS`, `MM:SS` or `HH:MM:SS` into milliseconds.
pub fn parse_time(input: &str) -> Option<u64> {
    let parts: Vec<&str> = input.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut secs: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        let value: u64 = part.trim().parse().ok()?;
        if i > 0 && value >= 60 {
            return None;
        }
        secs = secs.checked_mul(60)?.checked_add(value)?;
    }
    secs.checked_mul(1000)
}

/// Cuts `text` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

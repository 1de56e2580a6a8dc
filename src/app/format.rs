use chrono::{DateTime, Local};

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_last_watched(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Renders seconds as `m:ss`, or `h:mm:ss` from one hour on.
pub(crate) fn format_position(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings_and_marks_cut_ones() {
        assert_eq!(truncate("Frieren", 10), "Frieren");
        assert_eq!(truncate("Sousou no Frieren", 10), "Sousou ...");
    }

    #[test]
    fn format_position_switches_to_hours() {
        assert_eq!(format_position(0.0), "0:00");
        assert_eq!(format_position(615.4), "10:15");
        assert_eq!(format_position(3725.0), "1:02:05");
        assert_eq!(format_position(-3.0), "0:00");
    }

    #[test]
    fn format_last_watched_keeps_raw_when_invalid() {
        assert_eq!(format_last_watched("yesterday"), "yesterday");
        let formatted = format_last_watched("2026-02-25T18:27:06.100701256Z");
        assert_eq!(formatted.len(), "2026-02-25 18:27".len());
    }
}

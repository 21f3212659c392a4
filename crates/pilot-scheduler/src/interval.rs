//! Parses `SCHEDULER_PRODUCT_UPDATE_INTERVAL`: either a Go-`cron`-style
//! `@every <duration>` shorthand (the config default) or a cron expression.
//! `tokio-cron-scheduler` requires the 6-field seconds-prefixed form (see
//! `DATA_CLEANUP_CRON` in `lib.rs`); a conventional 5-field expression is
//! normalized to 6-field by prefixing a `0` seconds field.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Every(Duration),
    Cron(String),
}

pub fn parse(spec: &str) -> Schedule {
    match spec.strip_prefix("@every ") {
        Some(rest) => Schedule::Every(parse_duration(rest.trim()).unwrap_or(Duration::from_secs(3600))),
        None => Schedule::Cron(normalize_cron(spec)),
    }
}

/// `tokio-cron-scheduler` rejects the conventional 5-field cron form
/// (minute hour day-of-month month day-of-week) — it wants a leading
/// seconds field. Prepend `0` when the input only has 5 fields.
fn normalize_cron(spec: &str) -> String {
    let spec = spec.trim();
    match spec.split_whitespace().count() {
        5 => format!("0 {spec}"),
        _ => spec.to_string(),
    }
}

/// Accepts `30s`, `10m`, `2h`, `1d` — the subset of Go's `time.ParseDuration`
/// units the original scheduler's config actually used.
fn parse_duration(s: &str) -> Option<Duration> {
    let unit_len = s.chars().last()?.is_ascii_alphabetic().then_some(1)?;
    let (num, unit) = s.split_at(s.len() - unit_len);
    let n: u64 = num.parse().ok()?;
    let secs = match unit {
        "s" => n,
        "m" => n * 60,
        "h" => n * 3600,
        "d" => n * 86400,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_hour_default() {
        assert_eq!(parse("@every 1h"), Schedule::Every(Duration::from_secs(3600)));
    }

    #[test]
    fn parses_every_minutes() {
        assert_eq!(parse("@every 30m"), Schedule::Every(Duration::from_secs(1800)));
    }

    #[test]
    fn falls_back_to_cron_for_anything_else() {
        assert_eq!(parse("0 * * * *"), Schedule::Cron("0 0 * * * *".to_string()));
    }

    #[test]
    fn six_field_cron_passes_through_unchanged() {
        assert_eq!(parse("0 0 2 * * *"), Schedule::Cron("0 0 2 * * *".to_string()));
    }

    #[test]
    fn unparseable_every_duration_falls_back_to_one_hour() {
        assert_eq!(parse("@every nonsense"), Schedule::Every(Duration::from_secs(3600)));
    }
}

use color_eyre::Result;
use color_eyre::eyre::eyre;
use regex::Regex;
use shoplock_autolock::MAX_LOCK_TIMEOUT;
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

/// Installs the tracing subscriber once per process. `RUST_LOG` wins over the
/// verbosity flag when set.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        let default_level = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    });
}

/// Parses timeouts like "10", "10s", "90 seconds", "2m", "1h".
/// A bare number is taken as seconds.
pub fn parse_duration(expr: &str) -> Result<Duration> {
    let expr = expr.trim().to_lowercase();
    let re = Regex::new(r"^(\d+)\s*(s|sec|secs|second|seconds|m|min|mins|minute|minutes|h|hour|hours)?$")
        .map_err(|e| eyre!("Regex error: {}", e))?;

    let caps = re
        .captures(&expr)
        .ok_or_else(|| eyre!("Invalid duration '{}'. Use e.g. '30s', '5m' or '1h'", expr))?;

    let number: u64 = caps[1].parse().map_err(|_| eyre!("Invalid number in duration"))?;
    let multiplier = match caps.get(2).map(|unit| unit.as_str()) {
        None | Some("s" | "sec" | "secs" | "second" | "seconds") => 1,
        Some("m" | "min" | "mins" | "minute" | "minutes") => 60,
        Some(_) => 3600,
    };
    let seconds = number
        .checked_mul(multiplier)
        .filter(|seconds| *seconds <= MAX_LOCK_TIMEOUT.as_secs())
        .ok_or_else(|| eyre!("Duration '{}' exceeds the maximum of {}", expr, format_duration(MAX_LOCK_TIMEOUT)))?;

    if seconds == 0 {
        return Err(eyre!("Duration must be at least one second"));
    }
    Ok(Duration::from_secs(seconds))
}

#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total >= 3600 {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    } else if total >= 60 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

#[must_use]
pub const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_plain_seconds() {
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("90 seconds").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_minutes_and_hours() {
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("5 Minutes").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("ten seconds").is_err());
        assert!(parse_duration("5 days").is_err());
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(parse_duration("18446744073709551615").is_err());
        assert!(parse_duration("18446744073709551615h").is_err());
        assert!(parse_duration("169h").is_err());
        assert_eq!(parse_duration("168h").unwrap(), MAX_LOCK_TIMEOUT);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(10)), "10.0s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3720)), "1h 2m");
    }

    #[test]
    fn test_yes_no() {
        assert_eq!(yes_no(true), "yes");
        assert_eq!(yes_no(false), "no");
    }
}

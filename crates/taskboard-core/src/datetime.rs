use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{error, info, warn};

const TIMEZONE_CONFIG_FILE: &str = "taskboard-time.toml";
const TIMEZONE_ENV_VAR: &str = "TASKBOARD_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "TASKBOARD_TIME_CONFIG";

/// Source of the current instant. The board never reads wall time directly.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Rc<Cell<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Rc::new(Cell::new(instant)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.instant.set(instant);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.instant.set(self.instant.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant.get()
    }
}

/// Maps instants onto calendar days in one time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    tz: Tz,
}

impl Calendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self::new(chrono_tz::UTC)
    }

    /// Resolution order: `TASKBOARD_TIMEZONE`, the `taskboard-time.toml` file,
    /// the `timezone` config value, then UTC.
    #[tracing::instrument]
    pub fn resolve(configured: Option<&str>) -> Self {
        if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
            && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
        {
            return Self::new(tz);
        }

        if let Some(path) = timezone_config_path()
            && let Some(tz) = load_timezone_from_file(&path)
        {
            return Self::new(tz);
        }

        if let Some(raw) = configured
            && let Some(tz) = parse_timezone(raw, "config:timezone")
        {
            return Self::new(tz);
        }

        Self::utc()
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    pub fn today(&self, clock: &impl Clock) -> NaiveDate {
        self.day_of(clock.now())
    }

    pub fn format_day(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.tz)
            .format("%Y-%m-%d")
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &Path) -> Option<Tz> {
    if !path.exists() {
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            error!(file = %path.display(), error = %err, "failed reading timezone config file");
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!(file = %path.display(), error = %err, "failed parsing timezone config file");
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        warn!(file = %path.display(), "timezone config had no timezone field");
        return None;
    };

    parse_timezone(&timezone, &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            info!(source, timezone = %trimmed, "configured timezone");
            Some(tz)
        }
        Err(err) => {
            warn!(source, timezone = %trimmed, error = %err, "failed to parse timezone id");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{Calendar, Clock, FixedClock, load_timezone_from_file, parse_timezone};

    #[test]
    fn day_boundary_follows_timezone() {
        let instant = Utc
            .with_ymd_and_hms(2026, 2, 17, 3, 0, 0)
            .single()
            .expect("valid instant");

        assert_eq!(
            Calendar::utc().day_of(instant),
            NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date")
        );
        assert_eq!(
            Calendar::new(chrono_tz::America::Mexico_City).day_of(instant),
            NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
        );
    }

    #[test]
    fn fixed_clock_clones_share_time() {
        let start = Utc
            .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid instant");
        let clock = FixedClock::new(start);
        let handle = clock.clone();
        handle.advance(Duration::days(1));
        assert_eq!(clock.now(), start + Duration::days(1));
    }

    #[test]
    fn rejects_unknown_timezone_names() {
        assert!(parse_timezone("Mars/Olympus_Mons", "test").is_none());
        assert!(parse_timezone("  ", "test").is_none());
        assert_eq!(
            parse_timezone("Europe/Berlin", "test"),
            Some(chrono_tz::Europe::Berlin)
        );
    }

    #[test]
    fn reads_timezone_from_toml_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("taskboard-time.toml");
        std::fs::write(&path, "[time]\ntimezone = \"Asia/Tokyo\"\n").expect("write toml");
        assert_eq!(
            load_timezone_from_file(&path),
            Some(chrono_tz::Asia::Tokyo)
        );
    }
}

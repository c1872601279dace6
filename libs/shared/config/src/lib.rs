use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use tracing::warn;

/// Clinic calendar settings shared by the slot table and the appointment search.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingConfig {
    /// First slot start of the bookable slot table.
    pub slot_day_start: NaiveTime,
    /// Last slot start of the bookable slot table (inclusive).
    pub slot_day_end: NaiveTime,
    /// Opening hour of the appointment search grid.
    pub business_start_hour: u32,
    /// Closing hour of the appointment search grid (exclusive).
    pub business_end_hour: u32,
    /// Slot granularity, also the fixed appointment duration.
    pub slot_duration_minutes: u32,
    /// Number of calendar days scanned by the next-available search.
    pub search_horizon_days: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_day_end: NaiveTime::from_hms_opt(19, 30, 0).unwrap_or(NaiveTime::MIN),
            business_start_hour: 9,
            business_end_hour: 17,
            slot_duration_minutes: 30,
            search_horizon_days: 14,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            slot_day_start: time_var("CLINIC_SLOT_DAY_START", defaults.slot_day_start),
            slot_day_end: time_var("CLINIC_SLOT_DAY_END", defaults.slot_day_end),
            business_start_hour: parsed_var("CLINIC_BUSINESS_START_HOUR", defaults.business_start_hour),
            business_end_hour: parsed_var("CLINIC_BUSINESS_END_HOUR", defaults.business_end_hour),
            slot_duration_minutes: parsed_var("CLINIC_SLOT_MINUTES", defaults.slot_duration_minutes),
            search_horizon_days: parsed_var("CLINIC_SEARCH_HORIZON_DAYS", defaults.search_horizon_days),
        };

        if !config.is_valid() {
            warn!("Scheduling configuration is inconsistent, falling back to defaults");
            return defaults;
        }

        config
    }

    /// A grid is usable when the slot length divides an hour, the slot table bounds
    /// sit on that grid and both windows are non-empty.
    pub fn is_valid(&self) -> bool {
        self.slot_duration_minutes > 0
            && 60 % self.slot_duration_minutes == 0
            && self.is_on_grid(self.slot_day_start)
            && self.is_on_grid(self.slot_day_end)
            && self.slot_day_start <= self.slot_day_end
            && self.business_start_hour < self.business_end_hour
            && self.business_end_hour <= 24
            && self.search_horizon_days > 0
    }

    fn is_on_grid(&self, time: NaiveTime) -> bool {
        time.second() == 0 && time.nanosecond() == 0 && time.minute() % self.slot_duration_minutes == 0
    }

    pub fn slot_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.slot_duration_minutes))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            data_dir: env::var("CLINIC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    warn!("CLINIC_DATA_DIR not set, using ./data");
                    PathBuf::from("data")
                }),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_default(),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_default(),
            scheduling: SchedulingConfig::from_env(),
        };

        if !config.is_supabase_configured() && !config.supabase_url.is_empty() {
            warn!("SUPABASE_URL set without SUPABASE_ANON_PUBLIC_KEY, using the file store");
        }

        config
    }

    /// Local configuration rooted at `data_dir`, used by tests and tooling.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            data_dir: data_dir.into(),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            scheduling: SchedulingConfig::default(),
        }
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("scheduling_store.json")
    }

    pub fn training_data_path(&self) -> PathBuf {
        self.data_dir.join("training_data.json")
    }
}

fn parsed_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn time_var(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", name, raw, default.format("%H:%M"));
            default
        }),
        Err(_) => default,
    }
}

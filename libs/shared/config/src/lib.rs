use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "supabase" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub catalogue_seed_path: Option<String>,
    pub slot_minutes: i64,
    pub max_range_days: i64,
    pub clinic_utc_offset_minutes: i32,
    pub realtime_session_buffer: usize,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            catalogue_seed_path: None,
            slot_minutes: 30,
            max_range_days: 31,
            clinic_utc_offset_minutes: 0,
            realtime_session_buffer: 64,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_default(),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: parsed_var("STORAGE_BACKEND", defaults.storage_backend),
            catalogue_seed_path: env::var("CATALOGUE_SEED_PATH").ok(),
            slot_minutes: parsed_var("BOOKING_SLOT_MINUTES", defaults.slot_minutes),
            max_range_days: parsed_var("BOOKING_MAX_RANGE_DAYS", defaults.max_range_days),
            clinic_utc_offset_minutes: parsed_var(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            realtime_session_buffer: parsed_var(
                "REALTIME_SESSION_BUFFER",
                defaults.realtime_session_buffer,
            ),
            port: parsed_var("PORT", defaults.port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// JWT validation needs the signing secret; everything else has a usable default.
    pub fn is_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    /// Bearer used for server-side PostgREST calls.
    pub fn supabase_server_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parsed_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

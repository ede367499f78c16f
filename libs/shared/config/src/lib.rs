use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Which persistence backend serves the booking stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
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
    pub page_size: usize,
    pub request_timeout_secs: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_SERVICE_ROLE_KEY not set, falling back to the anon key");
                supabase_anon_key.clone()
            });
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, using in-memory storage", e);
                StorageBackend::Memory
            }),
            Err(_) if !supabase_url.is_empty() => StorageBackend::Supabase,
            Err(_) => {
                warn!("STORAGE_BACKEND not set and Supabase not configured, using in-memory storage");
                StorageBackend::Memory
            }
        };

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            supabase_jwt_secret,
            storage_backend,
            page_size: parse_or_default("PAGE_SIZE", 10),
            request_timeout_secs: parse_or_default("REQUEST_TIMEOUT_SECS", 10),
            port: parse_or_default("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let auth_ready = !self.supabase_jwt_secret.is_empty();
        match self.storage_backend {
            StorageBackend::Memory => auth_ready,
            StorageBackend::Supabase => {
                auth_ready
                    && !self.supabase_url.is_empty()
                    && !self.supabase_service_role_key.is_empty()
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_or_default<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_aliases() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!(" Supabase ".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert_eq!("postgrest".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn memory_backend_only_needs_jwt_secret() {
        let config = AppConfig {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: "secret".to_string(),
            storage_backend: StorageBackend::Memory,
            page_size: 10,
            request_timeout_secs: 10,
            port: 3000,
        };
        assert!(config.is_configured());

        let supabase = AppConfig { storage_backend: StorageBackend::Supabase, ..config };
        assert!(!supabase.is_configured());
    }
}

use anyhow::{bail, Context, Result};

/// Which `Store` implementation backs the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
    Redis,
    S3,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "s3" | "object" => Ok(Self::S3),
            other => bail!("Unknown STORAGE_BACKEND '{other}' (expected memory, postgres, redis or s3)"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
            Self::Redis => "redis",
            Self::S3 => "s3",
        }
    }
}

/// Connection settings for the S3-compatible bucket used for records and videos.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Feature switches for the optional video flow. A flag is on only when its
/// variable is exactly `"true"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureFlags {
    pub video_recording: bool,
    pub video_storage: bool,
    pub video_playback: bool,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a variable required by the selected backend is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub s3: Option<S3Settings>,
    pub groq_api_key: Option<String>,
    pub features: FeatureFlags,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_backend = StorageBackend::parse(
            &std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
        )?;

        let features = FeatureFlags {
            video_recording: flag("ENABLE_VIDEO_RECORDING"),
            video_storage: flag("ENABLE_VIDEO_STORAGE"),
            video_playback: flag("ENABLE_VIDEO_PLAYBACK"),
        };

        let database_url = match storage_backend {
            StorageBackend::Postgres => Some(require_env("DATABASE_URL")?),
            _ => optional_env("DATABASE_URL"),
        };
        let redis_url = match storage_backend {
            StorageBackend::Redis => Some(require_env("REDIS_URL")?),
            _ => optional_env("REDIS_URL"),
        };
        let s3 = if storage_backend == StorageBackend::S3 || features.video_storage {
            Some(S3Settings {
                bucket: require_env("S3_BUCKET")?,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            })
        } else {
            None
        };

        Ok(Config {
            storage_backend,
            database_url,
            redis_url,
            s3,
            groq_api_key: optional_env("GROQ_API_KEY"),
            features,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn flag(key: &str) -> bool {
    std::env::var(key).map(|v| v == "true").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parse_accepts_aliases() {
        assert_eq!(StorageBackend::parse("Postgres").unwrap(), StorageBackend::Postgres);
        assert_eq!(StorageBackend::parse("postgresql").unwrap(), StorageBackend::Postgres);
        assert_eq!(StorageBackend::parse(" redis ").unwrap(), StorageBackend::Redis);
        assert_eq!(StorageBackend::parse("object").unwrap(), StorageBackend::S3);
        assert_eq!(StorageBackend::parse("memory").unwrap(), StorageBackend::Memory);
    }

    #[test]
    fn test_storage_backend_parse_rejects_unknown() {
        let err = StorageBackend::parse("sqlite").unwrap_err();
        assert!(err.to_string().contains("sqlite"));
    }
}

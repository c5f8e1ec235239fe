use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    /// Base URL prepended to object keys when building public attachment
    /// URLs. Defaults to the virtual-hosted S3 form when unset.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub s3: Option<S3Config>,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let s3 = match env::var("S3_BUCKET") {
            Ok(bucket) if !bucket.trim().is_empty() => Some(S3Config {
                bucket,
                region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
                public_base_url: env::var("S3_PUBLIC_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            redis_url,
            port,
            s3,
        })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            port: 3000,
            s3: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_attachments() {
        let config = Config::test_defaults();
        assert_eq!(config.port, 3000);
        assert!(config.s3.is_none());
    }
}

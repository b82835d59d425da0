use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub app_env: String,
    pub cors_origins: Vec<String>,
    pub db: DbConfig,
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub tenant: TenantConfig,
    pub billing: BillingConfig,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
    pub key_prefix: String,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

#[derive(Clone, Debug)]
pub struct TenantConfig {
    pub header: String,
    /// Seconds a subscription snapshot stays in Redis. Zero disables the cache.
    pub subscription_cache_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BillingConfig {
    pub default_tax_rate: Decimal,
    pub default_subscription_days: i64,
    pub release_on_cancel: RoomReleasePolicy,
}

/// What happens to an assigned room when its reservation is cancelled or
/// marked as a no-show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomReleasePolicy {
    /// Always reset the room to `Available`.
    Always,
    /// Leave the room alone while another active reservation references it.
    Unclaimed,
}

impl FromStr for RoomReleasePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "unclaimed" => Ok(Self::Unclaimed),
            other => Err(format!("unknown room release policy '{other}'")),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let redis_url = non_empty("REDIS_URL");
        let redis_host = non_empty("REDIS_HOST");
        let redis = if redis_url.is_some() || redis_host.is_some() {
            Some(RedisConfig {
                url: redis_url,
                host: redis_host.unwrap_or_else(|| "localhost".to_string()),
                port: env_or_parse("REDIS_PORT", 6379),
                password: non_empty("REDIS_PASSWORD"),
                db: env_or_parse("REDIS_DB", 0),
                key_prefix: "pms:".to_string(),
            })
        } else {
            None
        };

        Self {
            port: env_or_parse("PORT", 3000),
            app_env: env_or("APP_ENV", "development"),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:5173,http://localhost:3000")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_or_parse("DB_PORT", 5432),
                database: env_or("DB_NAME", "hotel_pms"),
                user: env_or("DB_USER", "hotel_admin"),
                password: env_or("DB_PASSWORD", ""),
                pool_min: env_or_parse("DB_POOL_MIN", 2),
                pool_max: env_or_parse("DB_POOL_MAX", 20),
            },
            redis,
            jwt: JwtConfig {
                secret: env_or("JWT_SECRET", "change-me-to-a-secure-random-string"),
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: env_or_parse("RATE_LIMIT_MAX", 300),
            },
            tenant: TenantConfig {
                header: env_or("TENANT_HEADER", "x-hotel-id").to_ascii_lowercase(),
                subscription_cache_secs: env_or_parse("SUBSCRIPTION_CACHE_SECS", 30),
            },
            billing: BillingConfig {
                default_tax_rate: env_or_parse("DEFAULT_TAX_RATE", Decimal::new(16, 2)),
                default_subscription_days: env_or_parse("DEFAULT_SUBSCRIPTION_DAYS", 30),
                release_on_cancel: env_or_parse("ROOM_RELEASE_ON_CANCEL", RoomReleasePolicy::Always),
            },
        }
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db.user, self.db.password, self.db.host, self.db.port, self.db.database
        )
    }

    pub fn redis_url(&self) -> Option<String> {
        let redis = self.redis.as_ref()?;
        if let Some(url) = &redis.url {
            return Some(url.clone());
        }
        Some(match &redis.password {
            Some(pw) => format!("redis://:{}@{}:{}/{}", pw, redis.host, redis.port, redis.db),
            None => format!("redis://{}:{}/{}", redis.host, redis.port, redis.db),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Configuration with no external services, for router-level tests.
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            app_env: "test".to_string(),
            cors_origins: vec![],
            db: DbConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "hotel_pms_test".to_string(),
                user: "hotel_admin".to_string(),
                password: String::new(),
                pool_min: 0,
                pool_max: 1,
            },
            redis: None,
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: 1_000,
            },
            tenant: TenantConfig {
                header: "x-hotel-id".to_string(),
                subscription_cache_secs: 0,
            },
            billing: BillingConfig {
                default_tax_rate: Decimal::new(16, 2),
                default_subscription_days: 30,
                release_on_cancel: RoomReleasePolicy::Always,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_policy_parses_case_insensitively() {
        assert_eq!("always".parse::<RoomReleasePolicy>(), Ok(RoomReleasePolicy::Always));
        assert_eq!(" Unclaimed ".parse::<RoomReleasePolicy>(), Ok(RoomReleasePolicy::Unclaimed));
        assert!("sometimes".parse::<RoomReleasePolicy>().is_err());
    }

    #[test]
    fn redis_url_is_built_from_parts() {
        let mut config = Config::for_tests();
        assert_eq!(config.redis_url(), None);

        config.redis = Some(RedisConfig {
            url: None,
            host: "cache".to_string(),
            port: 6380,
            password: Some("pw".to_string()),
            db: 2,
            key_prefix: "pms:".to_string(),
        });
        assert_eq!(config.redis_url().as_deref(), Some("redis://:pw@cache:6380/2"));
    }
}

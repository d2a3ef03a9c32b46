use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/tixhub";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MONNIFY_BASE_URL: &str = "https://sandbox.monnify.com";
const DEFAULT_REDIRECT_URL: &str = "http://localhost:5173/payment/callback";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct MonnifyConfig {
    pub base_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub contract_code: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub production: bool,
    pub cors_allowed_origins: String,
    pub payment_redirect_url: String,
    pub monnify: MonnifyConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            host: parse_or("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or("PORT", DEFAULT_PORT)?,
            production: env::var("RUST_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            cors_allowed_origins: var_or("CORS_ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS),
            payment_redirect_url: var_or("PAYMENT_REDIRECT_URL", DEFAULT_REDIRECT_URL),
            monnify: MonnifyConfig {
                base_url: var_or("MONNIFY_BASE_URL", DEFAULT_MONNIFY_BASE_URL),
                api_key: required("MONNIFY_API_KEY")?,
                secret_key: required("MONNIFY_SECRET_KEY")?,
                contract_code: required("MONNIFY_CONTRACT_CODE")?,
            },
        })
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: DEFAULT_DATABASE_URL.to_string(),
        database_max_connections: 1,
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        production: false,
        cors_allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
        payment_redirect_url: DEFAULT_REDIRECT_URL.to_string(),
        monnify: MonnifyConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "MK_TEST".to_string(),
            secret_key: "SECRET".to_string(),
            contract_code: "0000000000".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_rejects_garbage() {
        std::env::set_var("TIXHUB_TEST_PORT_GARBAGE", "not-a-port");
        let result: Result<u16, _> = parse_or("TIXHUB_TEST_PORT_GARBAGE", 1);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        std::env::remove_var("TIXHUB_TEST_PORT_GARBAGE");
    }

    #[test]
    fn test_required_treats_blank_as_missing() {
        std::env::set_var("TIXHUB_TEST_BLANK_SECRET", "  ");
        assert!(matches!(
            required("TIXHUB_TEST_BLANK_SECRET"),
            Err(ConfigError::Missing("TIXHUB_TEST_BLANK_SECRET"))
        ));
        std::env::remove_var("TIXHUB_TEST_BLANK_SECRET");
    }

    #[test]
    fn test_bind_address_uses_host_and_port() {
        let config = test_config();
        assert_eq!(config.bind_address().to_string(), "127.0.0.1:0");
    }
}

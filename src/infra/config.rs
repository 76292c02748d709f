use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub cors_origin: HeaderValue,
    /// Shared secret for verifying provider webhook signatures.
    pub webhook_secret: SecretString,
    /// How long processed-event records are kept before the retention sweep
    /// purges them. Must cover the provider's maximum redelivery window.
    pub event_retention_days: i64,
    pub retention_sweep_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let webhook_secret: SecretString =
            SecretString::new(get_env::<String>("BILLING_WEBHOOK_SECRET").into());

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        let event_retention_days: i64 = get_env_default("EVENT_RETENTION_DAYS", 90);
        let retention_sweep_secs: u64 = get_env_default("RETENTION_SWEEP_SECS", 3_600);

        Self {
            bind_addr,
            database_url,
            cors_origin,
            webhook_secret,
            event_retention_days,
            retention_sweep_secs,
        }
    }
}

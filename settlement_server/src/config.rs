use std::{env, net::IpAddr, time::Duration};

use log::*;
use settle_common::{
    helpers::{env_duration_secs, env_flag, env_or_default, split_list},
    Secret,
};
use settlement_engine::{
    helpers::{GatewaySecrets, SecretVariant},
    notifications::QueueConfig,
    recovery_objects::RecoveryConfig,
    settlement_objects::{ExecutionStrategy, TxOptions},
};

const DEFAULT_STL_HOST: &str = "127.0.0.1";
const DEFAULT_STL_PORT: u16 = 8370;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_EXTENDED_TX_TIMEOUT: Duration = Duration::from_secs(180);
const DEFAULT_NOTIFICATION_POLL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub gateway: GatewayConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the `for=` field of the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// Bounds for every settlement and reversal unit of work.
    pub tx_options: TxOptions,
    pub recovery: RecoveryConfig,
    pub notifications: QueueConfig,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    pub secret: Secret<String>,
    pub test_secret: Option<Secret<String>>,
    /// Verify callbacks with the sandbox secret instead of the production one.
    pub use_test_secret: bool,
    /// If supplied, requests against /gateway endpoints will be checked against this list of IP addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_STL_HOST.to_string(),
            port: DEFAULT_STL_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            gateway: GatewayConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            tx_options: TxOptions::default(),
            recovery: RecoveryConfig::default(),
            notifications: QueueConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("STL_HOST").ok().unwrap_or_else(|| DEFAULT_STL_HOST.into());
        let port = env_or_default("STL_PORT", DEFAULT_STL_PORT);
        let database_url = env::var("STL_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ STL_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let max_connections = env_or_default("STL_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let gateway = GatewayConfig::from_env_or_defaults();
        let use_x_forwarded_for = env_flag("STL_USE_X_FORWARDED_FOR", false);
        let use_forwarded = env_flag("STL_USE_FORWARDED", false);
        let tx_options = configure_tx_options();
        let recovery = configure_recovery(&tx_options);
        let notifications = configure_notifications();
        Self {
            host,
            port,
            database_url,
            max_connections,
            gateway,
            use_x_forwarded_for,
            use_forwarded,
            tx_options,
            recovery,
            notifications,
        }
    }
}

impl GatewayConfig {
    pub fn from_env_or_defaults() -> Self {
        let secret = Secret::from_env("STL_GATEWAY_SECRET").unwrap_or_else(|| {
            error!(
                "🪛️ STL_GATEWAY_SECRET is not set. Please set it to the gateway's signing secret. Every callback will \
                 be rejected until you do."
            );
            Secret::default()
        });
        let test_secret = Secret::from_env("STL_GATEWAY_TEST_SECRET");
        let use_test_secret = env_flag("STL_GATEWAY_USE_TEST_SECRET", false);
        if use_test_secret {
            warn!("🚨️ Gateway callbacks are verified with the SANDBOX secret. Do not run production like this.");
            if test_secret.is_none() {
                error!("🪛️ STL_GATEWAY_USE_TEST_SECRET is set, but STL_GATEWAY_TEST_SECRET is not.");
            }
        }
        let whitelist = env::var("STL_GATEWAY_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The gateway IP whitelist was configured, but is empty. The server will run, but won't \
                     authorise any gateway callbacks."
                );
            },
            None => {
                info!("🪛️ No gateway IP whitelist is set. Only signature validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Gateway IP whitelist: {addrs}");
            },
        }
        Self { secret, test_secret, use_test_secret, whitelist }
    }

    pub fn secrets(&self) -> GatewaySecrets {
        GatewaySecrets::new(self.secret.clone(), self.test_secret.clone())
    }

    pub fn variant(&self) -> SecretVariant {
        if self.use_test_secret {
            SecretVariant::Test
        } else {
            SecretVariant::Production
        }
    }
}

fn parse_whitelist(value: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&value.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Gateway IP whitelist is disabled. If this is not what you want, set STL_GATEWAY_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = split_list(value)
        .into_iter()
        .filter_map(|s| {
            s.parse()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in STL_GATEWAY_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn configure_tx_options() -> TxOptions {
    let strategy = if env_flag("STL_PARALLEL_LOOKUPS", true) {
        ExecutionStrategy::Parallel
    } else {
        info!("🪛️ Parallel lookups are disabled. Items and buyers will be read inside each unit of work.");
        ExecutionStrategy::Sequential
    };
    TxOptions {
        acquire_timeout: env_duration_secs("STL_ACQUIRE_TIMEOUT_SECS", DEFAULT_ACQUIRE_TIMEOUT),
        execution_timeout: env_duration_secs("STL_TX_TIMEOUT_SECS", DEFAULT_TX_TIMEOUT),
        strategy,
        ..Default::default()
    }
}

fn configure_recovery(tx_options: &TxOptions) -> RecoveryConfig {
    let defaults = RecoveryConfig::default();
    let extended_methods = match env::var("STL_RECOVERY_EXTENDED_METHODS") {
        Ok(s) => split_list(&s),
        Err(_) => defaults.extended_methods,
    };
    RecoveryConfig {
        concurrency: env_or_default("STL_RECOVERY_CONCURRENCY", defaults.concurrency),
        standard_batch_size: env_or_default("STL_RECOVERY_BATCH_SIZE", defaults.standard_batch_size),
        extended_batch_size: env_or_default("STL_RECOVERY_EXTENDED_BATCH_SIZE", defaults.extended_batch_size),
        standard_timeout: tx_options.execution_timeout,
        extended_timeout: env_duration_secs("STL_EXTENDED_TX_TIMEOUT_SECS", DEFAULT_EXTENDED_TX_TIMEOUT),
        extended_methods,
        retry: defaults.retry,
        tx_options: tx_options.clone(),
    }
}

fn configure_notifications() -> QueueConfig {
    let defaults = QueueConfig::default();
    let retention_hours = env_or_default("STL_NOTIFICATION_RETENTION_HOURS", defaults.retention.as_secs() / 3600);
    QueueConfig {
        poll_interval: env_duration_secs("STL_NOTIFICATION_POLL_SECS", DEFAULT_NOTIFICATION_POLL),
        max_attempts: env_or_default("STL_NOTIFICATION_MAX_ATTEMPTS", defaults.max_attempts),
        retention: Duration::from_secs(retention_hours * 3600),
    }
}

use std::env;

// ============================================================================
// Configuration
// ============================================================================
//
// Loaded from environment variables with defaults that work against a local
// docker-compose stack. No configuration file is read; the environment is the
// single source.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub kafka: KafkaConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub sslmode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    pub fn dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.database, self.sslmode
        )
    }
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated broker list, as rdkafka expects it.
    pub brokers: String,
    pub topic: String,
    pub group: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            postgres: PostgresConfig {
                host: env_or("POSTGRES_HOST", "localhost"),
                port: env_or("POSTGRES_PORT", "5432"),
                user: env_or("POSTGRES_USER", "postgres"),
                password: env_or("POSTGRES_PASSWORD", "postgres"),
                database: env_or("POSTGRES_DB", "orders"),
                sslmode: env_or("POSTGRES_SSLMODE", "disable"),
                max_connections: parse_or("POSTGRES_MAX_CONNECTIONS", 10),
            },
            kafka: KafkaConfig {
                brokers: env_or("KAFKA_BROKERS", "localhost:9092"),
                topic: env_or("KAFKA_TOPIC", "orders"),
                group: env_or("KAFKA_GROUP", "order-service"),
            },
            http: HttpConfig {
                port: parse_or("HTTP_PORT", 8080),
                metrics_port: parse_or("METRICS_PORT", 9090),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub simulation: SimulationConfig,
    pub modules: ModulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig { pub url: String }

impl Default for DbConfig {
    fn default() -> Self {
        Self { url: "postgres://localhost/pv_emulator".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Voltage samples per generated curve.
    pub curve_points: usize,
    pub default_irradiance_wm2: f64,
    pub default_temperature_c: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            curve_points: 200,
            default_irradiance_wm2: 1000.0,
            default_temperature_c: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Power temperature coefficient assumed when a module omits one [%/°C].
    pub default_gamma_pmp: f64,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self { default_gamma_pmp: -0.35 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("PVE__").split("__"));
        Ok(figment.extract()?)
    }
}

use crate::prelude::*;

use serde::Deserialize;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverter: Inverter,

    #[serde(default = "Config::default_shift")]
    pub shift: Shift,

    pub pvoutput: PvOutput,
    pub mqtt: Mqtt,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    /// Dry-run mode: log PVOutput and MQTT traffic instead of sending it.
    #[serde(default)]
    pub test: bool,
}

// Inverter {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    pub port: String,

    #[serde(default = "Config::default_unit_id")]
    pub unit_id: u8,

    #[serde(default = "Config::default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "Config::default_poll_interval")]
    pub poll_interval: u64,
}
impl Inverter {
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Seconds between polls while the shift is active.
    pub fn poll_interval(&self) -> u64 {
        self.poll_interval
    }
} // }}}

// Shift {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Shift {
    #[serde(default = "Config::default_shift_start")]
    pub start: u32,

    #[serde(default = "Config::default_shift_stop")]
    pub stop: u32,
}
impl Shift {
    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn stop(&self) -> u32 {
        self.stop
    }
} // }}}

// PvOutput {{{
#[derive(Clone, Debug, Deserialize)]
pub struct PvOutput {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub api_key: String,
    pub system_id: String,

    #[serde(default = "Config::default_pvoutput_base_url")]
    pub base_url: String,
}
impl PvOutput {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
} // }}}

// HomeAssistant {{{
#[derive(Clone, Debug, Deserialize)]
pub struct HomeAssistant {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_mqtt_homeassistant_prefix")]
    pub prefix: String,
}

impl HomeAssistant {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,

    #[serde(default = "Config::default_mqtt_homeassistant")]
    pub homeassistant: HomeAssistant,
}
impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn homeassistant(&self) -> &HomeAssistant {
        &self.homeassistant
    }
} // }}}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(file)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    pub fn inverter(&self) -> Inverter {
        self.config.lock().unwrap().inverter.clone()
    }

    pub fn shift(&self) -> Shift {
        self.config.lock().unwrap().shift.clone()
    }

    pub fn pvoutput(&self) -> PvOutput {
        self.config.lock().unwrap().pvoutput.clone()
    }

    pub fn mqtt(&self) -> Mqtt {
        self.config.lock().unwrap().mqtt.clone()
    }

    pub fn loglevel(&self) -> String {
        self.config.lock().unwrap().loglevel.clone()
    }

    pub fn test_mode(&self) -> bool {
        self.config.lock().unwrap().test
    }

    pub fn set_test_mode(&self, test: bool) {
        self.config.lock().unwrap().test = test;
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        let config: Self = serde_yaml::from_str(&content)?;

        info!("Configuration loaded successfully:");
        info!("  Inverter:");
        info!("    Port: {}", config.inverter.port);
        info!("    Unit id: {}", config.inverter.unit_id);
        info!("    Baud rate: {}", config.inverter.baud_rate);
        info!("    Poll interval: {}s", config.inverter.poll_interval);
        info!(
            "  Shift window: {:02}:00 - {:02}:00",
            config.shift.start, config.shift.stop
        );

        info!(
            "  PVOutput: {}",
            if config.pvoutput.enabled { "enabled" } else { "disabled" }
        );
        if config.pvoutput.enabled {
            info!("    System id: {}", config.pvoutput.system_id);
            info!("    Base URL: {}", config.pvoutput.base_url);
        }

        info!(
            "  MQTT: {}",
            if config.mqtt.enabled { "enabled" } else { "disabled" }
        );
        if config.mqtt.enabled {
            info!("    Host: {}", config.mqtt.host);
            info!("    Port: {}", config.mqtt.port);
            info!("    Namespace: {}", config.mqtt.namespace);
            info!(
                "    Home Assistant: {}",
                if config.mqtt.homeassistant.enabled { "enabled" } else { "disabled" }
            );
        }

        info!("  Log Level: {}", config.loglevel);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.inverter.port.is_empty() {
            bail!("inverter.port cannot be empty");
        }
        if self.inverter.unit_id == 0 {
            bail!("inverter.unit_id must be between 1 and 247");
        }
        if self.inverter.poll_interval == 0 {
            bail!("inverter.poll_interval must be at least 1 second");
        }

        // ShiftWindow applies the same bounds at runtime; fail early here
        scheduler::ShiftWindow::new(self.shift.start, self.shift.stop)?;

        if self.pvoutput.enabled {
            if self.pvoutput.api_key.is_empty() {
                bail!("pvoutput.api_key cannot be empty");
            }
            if self.pvoutput.system_id.is_empty() {
                bail!("pvoutput.system_id cannot be empty");
            }
            if let Err(e) = url::Url::parse(&self.pvoutput.base_url) {
                bail!("invalid pvoutput.base_url: {}", e);
            }
        }

        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                bail!("mqtt.port must be between 1 and 65535");
            }
            if self.mqtt.host.is_empty() {
                bail!("mqtt.host cannot be empty");
            }
        }

        Ok(())
    }

    fn default_shift() -> Shift {
        Shift {
            start: Self::default_shift_start(),
            stop: Self::default_shift_stop(),
        }
    }

    fn default_shift_start() -> u32 {
        5
    }

    fn default_shift_stop() -> u32 {
        21
    }

    fn default_unit_id() -> u8 {
        1
    }

    fn default_baud_rate() -> u32 {
        9600
    }

    fn default_poll_interval() -> u64 {
        10
    }

    fn default_pvoutput_base_url() -> String {
        "https://pvoutput.org/service/r2".to_string()
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_namespace() -> String {
        "growatt".to_string()
    }

    fn default_mqtt_homeassistant() -> HomeAssistant {
        HomeAssistant {
            enabled: Self::default_enabled(),
            prefix: Self::default_mqtt_homeassistant_prefix(),
        }
    }

    fn default_mqtt_homeassistant_prefix() -> String {
        "homeassistant".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

use std::{
    fmt::Display,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use argh::FromArgs;
use cubesat_aprs::{InertialShape, Schema, SchemaKind};
use directories::ProjectDirs;
use rumqttc::MqttOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "CUBESATSIM_";
const KEEP_ALIVE: Duration = Duration::from_secs(60);

#[derive(FromArgs, Debug)]
/// Relay CubeSatSim APRS telemetry from stdin to an MQTT broker
pub struct RelayArgs {
    /// MQTT broker host [default: localhost]
    #[argh(option)]
    pub mqtt_host: Option<String>,
    /// MQTT broker port [default: 1883]
    #[argh(option)]
    pub mqtt_port: Option<u16>,
    /// MQTT topic to publish to [default: cubesatsim/data]
    #[argh(option)]
    pub mqtt_topic: Option<String>,
    /// MQTT username (if required)
    #[argh(option)]
    pub mqtt_username: Option<String>,
    /// MQTT password (if required)
    #[argh(option)]
    pub mqtt_password: Option<String>,
    /// sentence schema: battery, environment, gps or rails [default: rails]
    #[argh(option)]
    pub schema: Option<SchemaKind>,
    /// MPU6050 readout: angles or axes [default: angles]
    #[argh(option)]
    pub inertial: Option<InertialShape>,
    /// also append published records to hourly files in this directory
    #[argh(option)]
    pub archive_dir: Option<PathBuf>,
    /// read configuration from this JSON5 file instead of the stored default
    #[argh(option)]
    pub config: Option<PathBuf>,
    /// print records to stdout instead of publishing them
    #[argh(switch)]
    pub dry_run: bool,
    /// store the resolved configuration as the default
    #[argh(switch)]
    pub save_config: bool,
}

#[derive(Error, Debug)]
/// Errors raised while resolving the configuration
pub enum ConfigError {
    #[error("Could not read {0:?}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("Could not parse {0:?}: {1}")]
    Parse(PathBuf, json5::Error),
    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
/// Configuration for the relay
pub struct RelayCfg {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_topic: String,
    pub mqtt_username: Option<String>,
    #[serde(skip_serializing)]
    pub mqtt_password: Option<String>,
    pub schema: SchemaKind,
    pub inertial: InertialShape,
    pub archive_dir: Option<PathBuf>,
}

impl Default for RelayCfg {
    fn default() -> Self {
        Self {
            mqtt_host: "localhost".into(),
            mqtt_port: 1883,
            mqtt_topic: "cubesatsim/data".into(),
            mqtt_username: None,
            mqtt_password: None,
            schema: SchemaKind::default(),
            inertial: InertialShape::default(),
            archive_dir: None,
        }
    }
}

impl RelayCfg {
    /// Resolve the configuration: arguments, then environment, then file, then defaults
    pub fn resolve(args: &RelayArgs) -> Result<Self, ConfigError> {
        let mut cfg = match &args.config {
            Some(path) => Self::load_file(path)?,
            None => match Self::load_default() {
                Ok(cfg) => cfg,
                Err(e) => {
                    if e.kind() != ErrorKind::NotFound {
                        log::warn!("Ignoring stored configuration: {e}");
                    }
                    Self::default()
                }
            },
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.apply_args(args);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load the configuration from a JSON5 file
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        json5::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Store the configuration in the default location
    pub fn store_default(&self) -> Result<(), std::io::Error> {
        let mut path = get_default_path();
        std::fs::create_dir_all(&path)?;
        path.push("config.json");
        std::fs::write(
            path,
            serde_json::to_string_pretty(self)
                .map_err(|e| std::io::Error::new(ErrorKind::Other, e))?,
        )
    }

    /// Load the configuration from the default location
    pub fn load_default() -> Result<Self, std::io::Error> {
        let mut path = get_default_path();
        path.push("config.json");
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| std::io::Error::new(ErrorKind::Other, e))
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        if let Some(host) = var("MQTT_HOST") {
            self.mqtt_host = host;
        }
        if let Some(port) = var("MQTT_PORT") {
            self.mqtt_port = parse_env("MQTT_PORT", port)?;
        }
        if let Some(topic) = var("MQTT_TOPIC") {
            self.mqtt_topic = topic;
        }
        if let Some(username) = var("MQTT_USERNAME") {
            self.mqtt_username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            self.mqtt_password = Some(password);
        }
        if let Some(schema) = var("SCHEMA") {
            self.schema = parse_env("SCHEMA", schema)?;
        }
        if let Some(inertial) = var("INERTIAL") {
            self.inertial = parse_env("INERTIAL", inertial)?;
        }
        if let Some(dir) = var("ARCHIVE_DIR") {
            self.archive_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    fn apply_args(&mut self, args: &RelayArgs) {
        if let Some(host) = &args.mqtt_host {
            self.mqtt_host = host.clone();
        }
        if let Some(port) = args.mqtt_port {
            self.mqtt_port = port;
        }
        if let Some(topic) = &args.mqtt_topic {
            self.mqtt_topic = topic.clone();
        }
        if args.mqtt_username.is_some() {
            self.mqtt_username = args.mqtt_username.clone();
        }
        if args.mqtt_password.is_some() {
            self.mqtt_password = args.mqtt_password.clone();
        }
        if let Some(schema) = args.schema {
            self.schema = schema;
        }
        if let Some(inertial) = args.inertial {
            self.inertial = inertial;
        }
        if args.archive_dir.is_some() {
            self.archive_dir = args.archive_dir.clone();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt_host.is_empty() {
            return Err(ConfigError::Empty("mqtt_host"));
        }
        if self.mqtt_topic.is_empty() {
            return Err(ConfigError::Empty("mqtt_topic"));
        }
        if self.mqtt_username.as_deref() == Some("") {
            return Err(ConfigError::Empty("mqtt_username"));
        }
        if self.mqtt_password.as_deref() == Some("") {
            return Err(ConfigError::Empty("mqtt_password"));
        }
        Ok(())
    }

    /// The schema selected for this beacon
    pub fn decoder_schema(&self) -> Schema {
        Schema::new(self.schema, self.inertial)
    }

    /// Broker connection settings.
    ///
    /// The session is persistent so QoS 1 messages still in flight when the
    /// link drops are sent again after reconnecting.
    pub fn mqtt_options(&self) -> MqttOptions {
        let client_id = format!("cubesatsim-relay-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, self.mqtt_host.as_str(), self.mqtt_port);
        options.set_keep_alive(KEEP_ALIVE).set_clean_session(false);
        match (&self.mqtt_username, &self.mqtt_password) {
            (Some(username), Some(password)) => {
                options.set_credentials(username.as_str(), password.as_str());
            }
            (None, None) => {}
            _ => log::warn!("MQTT credentials need both a username and a password, connecting anonymously"),
        }
        options
    }
}

fn parse_env<T>(name: &str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name: format!("{ENV_PREFIX}{name}"),
        reason: e.to_string(),
        value,
    })
}

fn get_default_path() -> PathBuf {
    if let Some(path) = ProjectDirs::from("", "", "cubesatsim_relay") {
        path.config_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

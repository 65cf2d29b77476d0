use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: Endpoints,
    pub client: ClientConfig,
    pub key_asset: KeyAssetConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub auth1_url: String,
    pub auth2_url: String,
    /// Schedule document URL with `{date}` and `{area}` placeholders.
    pub schedule_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth1_url: "https://radiko.jp/v2/api/auth1_fms".to_string(),
            auth2_url: "https://radiko.jp/v2/api/auth2_fms".to_string(),
            schedule_url: "http://radiko.jp/v3/program/date/{date}/{area}.xml".to_string(),
        }
    }
}

impl Endpoints {
    pub fn schedule_url_for(&self, date: &str, area_id: &str) -> String {
        self.schedule_url
            .replace("{date}", date)
            .replace("{area}", area_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub app: String,
    pub app_version: String,
    pub user: String,
    pub device: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app: "pc_ts".to_string(),
            app_version: "4.0.0".to_string(),
            user: "test-stream".to_string(),
            device: "pc".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .build()
            .map_err(|e| Error::Config(format!("cannot build http client: {e}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeyAssetConfig {
    /// Download the player and pull the key resource out with `swfextract`.
    Player {
        #[serde(default = "default_player_url")]
        player_url: String,
        #[serde(default = "default_swfextract")]
        swfextract: PathBuf,
        #[serde(default = "default_resource_id")]
        resource_id: u32,
    },
    /// An already-extracted key file on disk.
    File { path: PathBuf },
}

impl Default for KeyAssetConfig {
    fn default() -> Self {
        KeyAssetConfig::Player {
            player_url: default_player_url(),
            swfextract: default_swfextract(),
            resource_id: default_resource_id(),
        }
    }
}

fn default_player_url() -> String {
    "http://radiko.jp/apps/js/flash/myplayer-release.swf".to_string()
}

fn default_swfextract() -> PathBuf {
    PathBuf::from("swfextract")
}

fn default_resource_id() -> u32 {
    12
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub ffmpeg: PathBuf,
    pub extension: String,
    pub output_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            extension: "aac".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Loads the configuration file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

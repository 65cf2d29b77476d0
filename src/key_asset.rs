use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::KeyAssetConfig;
use crate::error::{describe_http, Error, Result};

const PLAYER_FILE: &str = "myplayer-release.swf";
const KEY_FILE: &str = "authkey.png";

/// Source of the binary blob the partial key is sliced from.
#[async_trait]
pub trait KeyAssetProvider: Send + Sync {
    async fn fetch_key_asset(&self) -> Result<Vec<u8>>;
}

/// A fixed key asset held in memory.
#[derive(Debug, Clone)]
pub struct StaticKeyAsset(pub Vec<u8>);

#[async_trait]
impl KeyAssetProvider for StaticKeyAsset {
    async fn fetch_key_asset(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// An already-extracted key file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileKeyAsset {
    pub path: PathBuf,
}

#[async_trait]
impl KeyAssetProvider for FileKeyAsset {
    async fn fetch_key_asset(&self) -> Result<Vec<u8>> {
        read_asset(&self.path).await
    }
}

/// Downloads the flash player and extracts its embedded key resource with `swfextract`.
///
/// Both files are written to a temporary directory that is removed once the
/// key bytes have been read, whether or not extraction succeeded.
#[derive(Debug, Clone)]
pub struct PlayerKeyAsset {
    pub client: reqwest::Client,
    pub player_url: String,
    pub swfextract: PathBuf,
    pub resource_id: u32,
}

impl PlayerKeyAsset {
    async fn download_player(&self, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(&self.player_url)
            .send()
            .await
            .map_err(|e| Error::KeyAsset(describe_http(&e)))?;
        if !response.status().is_success() {
            return Err(Error::KeyAsset(format!(
                "{} returned {}",
                self.player_url,
                response.status()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::KeyAsset(describe_http(&e)))?;
        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| Error::KeyAsset(format!("cannot write {}: {e}", dest.display())))?;
        tracing::debug!(bytes = body.len(), "downloaded player");
        Ok(())
    }

    async fn extract_key(&self, player: &Path, key: &Path) -> Result<()> {
        let output = Command::new(&self.swfextract)
            .arg("-b")
            .arg(self.resource_id.to_string())
            .arg(player)
            .arg("-o")
            .arg(key)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::KeyAsset(format!("cannot run {}: {e}", self.swfextract.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::KeyAsset(format!(
                "{} exited with {}: {}",
                self.swfextract.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyAssetProvider for PlayerKeyAsset {
    #[tracing::instrument(skip(self), fields(player = %self.player_url))]
    async fn fetch_key_asset(&self) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir()
            .map_err(|e| Error::KeyAsset(format!("cannot create temp dir: {e}")))?;
        let player = workdir.path().join(PLAYER_FILE);
        let key = workdir.path().join(KEY_FILE);

        self.download_player(&player).await?;
        self.extract_key(&player, &key).await?;
        read_asset(&key).await
    }
}

async fn read_asset(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::KeyAsset(format!("cannot read {}: {e}", path.display())))
}

/// Builds the provider selected by the configuration.
pub fn provider_from_config(
    config: &KeyAssetConfig,
    client: reqwest::Client,
) -> Box<dyn KeyAssetProvider> {
    match config {
        KeyAssetConfig::Player {
            player_url,
            swfextract,
            resource_id,
        } => Box::new(PlayerKeyAsset {
            client,
            player_url: player_url.clone(),
            swfextract: swfextract.clone(),
            resource_id: *resource_id,
        }),
        KeyAssetConfig::File { path } => Box::new(FileKeyAsset { path: path.clone() }),
    }
}

/// Key asset bytes together with the window the server asked for.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    offset: usize,
    length: usize,
    asset: Vec<u8>,
}

impl KeyMaterial {
    /// Fails with [`Error::KeyAsset`] unless `offset + length` lies within the asset.
    pub fn new(offset: usize, length: usize, asset: Vec<u8>) -> Result<Self> {
        if length == 0 {
            return Err(Error::KeyAsset("key length must be positive".to_string()));
        }
        match offset.checked_add(length) {
            Some(end) if end <= asset.len() => Ok(Self {
                offset,
                length,
                asset,
            }),
            _ => Err(Error::KeyAsset(format!(
                "key window {offset}+{length} exceeds asset size {}",
                asset.len()
            ))),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn slice(&self) -> &[u8] {
        &self.asset[self.offset..self.offset + self.length]
    }

    /// Base64 of the requested slice, sent as the partial key.
    pub fn partial_key(&self) -> String {
        STANDARD.encode(self.slice())
    }
}

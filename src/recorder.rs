use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{AuthSession, Authenticator};
use crate::capture::MediaCapture;
use crate::config::Config;
use crate::error::Result;
use crate::key_asset::{provider_from_config, KeyAssetProvider};
use crate::page::{resolve_stream, StreamDescriptor};
use crate::progress::{observe, ProgressObserver, Silent, Stage};
use crate::schedule::{ProgramTitle, TitleResolver};

/// Everything produced by one successful run.
#[derive(Debug, Clone)]
pub struct Recording {
    pub stream: StreamDescriptor,
    pub session: AuthSession,
    pub title: ProgramTitle,
    pub output: PathBuf,
}

/// Scrape, authenticate, resolve the title, then capture. Strictly in that order.
pub struct Recorder {
    client: reqwest::Client,
    authenticator: Authenticator,
    titles: TitleResolver,
    capture: MediaCapture,
    observer: Arc<dyn ProgressObserver>,
}

impl Recorder {
    pub fn new(config: &Config) -> Result<Self> {
        let client = config.client.http_client()?;
        let key_assets = provider_from_config(&config.key_asset, client.clone());
        Ok(Self::with_key_assets(client, config, key_assets))
    }

    pub fn with_key_assets(
        client: reqwest::Client,
        config: &Config,
        key_assets: Box<dyn KeyAssetProvider>,
    ) -> Self {
        Self {
            authenticator: Authenticator::new(
                client.clone(),
                &config.endpoints,
                &config.client,
                key_assets,
            ),
            titles: TitleResolver::new(client.clone(), &config.endpoints),
            capture: MediaCapture::new(&config.capture),
            client,
            observer: Arc::new(Silent),
        }
    }

    /// Reports every stage of [`Recorder::record`], handshake steps included.
    pub fn observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        let observer: Arc<dyn ProgressObserver> = Arc::new(observer);
        self.authenticator.set_observer(observer.clone());
        self.observer = observer;
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn record(&self, url: &str) -> Result<Recording> {
        let observer = self.observer.as_ref();

        let stream = observe(
            observer,
            Stage::ResolveStream,
            resolve_stream(&self.client, url),
        )
        .await?;

        let session = self.authenticator.authenticate(&stream.station_id).await?;

        let title = observe(
            observer,
            Stage::ResolveTitle,
            self.titles
                .resolve_title(&stream.station_id, &stream.window_start, &session.area_id),
        )
        .await?;

        let file = self
            .capture
            .output_path(&title)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| title.to_string());
        let output = observe(
            observer,
            Stage::Capture { file },
            self.capture
                .capture(&stream.stream_url, &session.token, &title),
        )
        .await?;

        Ok(Recording {
            stream,
            session,
            title,
            output,
        })
    }
}

use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};
use std::sync::Arc;

use crate::config::{ClientConfig, Endpoints};
use crate::error::{describe_http, Error, Result};
use crate::key_asset::{KeyAssetProvider, KeyMaterial};
use crate::progress::{observe, ProgressObserver, Silent, Stage};

const AUTH_TOKEN_HEADER: &str = "x-radiko-authtoken";
const KEY_OFFSET_HEADER: &str = "x-radiko-keyoffset";
const KEY_LENGTH_HEADER: &str = "x-radiko-keylength";

/// Result of a completed handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub area_id: String,
    pub raw_auth_body: String,
}

/// What the first handshake step hands back: the token and the key window to slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth1Grant {
    pub token: String,
    pub key_offset: usize,
    pub key_length: usize,
}

impl Auth1Grant {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let token = required_header(headers, AUTH_TOKEN_HEADER)?;
        if token.is_empty() {
            return Err(Error::Auth(format!("{AUTH_TOKEN_HEADER} is empty")));
        }
        Ok(Self {
            token: token.to_string(),
            key_offset: integer_header(headers, KEY_OFFSET_HEADER)?,
            key_length: integer_header(headers, KEY_LENGTH_HEADER)?,
        })
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    let value = headers
        .get(name)
        .ok_or_else(|| Error::Auth(format!("missing response header {name}")))?;
    value
        .to_str()
        .map(str::trim)
        .map_err(|_| Error::Auth(format!("response header {name} is not valid text")))
}

fn integer_header(headers: &HeaderMap, name: &str) -> Result<usize> {
    let value = required_header(headers, name)?;
    value
        .parse()
        .map_err(|_| Error::Auth(format!("response header {name} is not an integer: {value:?}")))
}

/// Takes the area id from the comma separated body of the second step.
pub fn parse_area_id(body: &str) -> Result<String> {
    body.trim()
        .split(',')
        .next()
        .map(str::trim)
        .filter(|area| !area.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Auth(format!("no area id in auth2 response {body:?}")))
}

/// Runs the two-step token handshake.
pub struct Authenticator {
    client: reqwest::Client,
    auth1_url: String,
    auth2_url: String,
    identity: ClientConfig,
    key_assets: Box<dyn KeyAssetProvider>,
    observer: Arc<dyn ProgressObserver>,
}

impl Authenticator {
    pub fn new(
        client: reqwest::Client,
        endpoints: &Endpoints,
        identity: &ClientConfig,
        key_assets: Box<dyn KeyAssetProvider>,
    ) -> Self {
        Self {
            client,
            auth1_url: endpoints.auth1_url.clone(),
            auth2_url: endpoints.auth2_url.clone(),
            identity: identity.clone(),
            key_assets,
            observer: Arc::new(Silent),
        }
    }

    /// Reports the key asset fetch, both steps and the key slicing to `observer`.
    pub fn set_observer(&mut self, observer: Arc<dyn ProgressObserver>) {
        self.observer = observer;
    }

    fn identified(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("pragma", "no-cache")
            .header("X-Radiko-App", &self.identity.app)
            .header("X-Radiko-App-Version", &self.identity.app_version)
            .header("X-Radiko-User", &self.identity.user)
            .header("X-Radiko-Device", &self.identity.device)
    }

    /// Fetches the key asset, then performs both handshake steps.
    ///
    /// A failed step is terminal. Nothing is retried, and the key window from
    /// step one is only valid for the asset fetched in this same call.
    #[tracing::instrument(skip(self))]
    pub async fn authenticate(&self, station_id: &str) -> Result<AuthSession> {
        let observer = self.observer.as_ref();

        let asset = observe(
            observer,
            Stage::FetchKeyAsset,
            self.key_assets.fetch_key_asset(),
        )
        .await?;
        tracing::debug!(bytes = asset.len(), "key asset ready");

        let grant = observe(observer, Stage::Auth1, self.auth1()).await?;
        let partial_key = observe(observer, Stage::PartialKey, async {
            let key = KeyMaterial::new(grant.key_offset, grant.key_length, asset)?;
            tracing::debug!(offset = key.offset(), length = key.length(), "sliced partial key");
            Ok::<_, Error>(key.partial_key())
        })
        .await?;

        let (area_id, raw_auth_body) = observe(observer, Stage::Auth2, async {
            let body = self.auth2(&grant.token, &partial_key).await?;
            parse_area_id(&body).map(|area| (area, body))
        })
        .await?;
        tracing::info!(area = %area_id, "authenticated");

        Ok(AuthSession {
            token: grant.token,
            area_id,
            raw_auth_body,
        })
    }

    pub async fn auth1(&self) -> Result<Auth1Grant> {
        let response = self
            .identified(self.client.post(&self.auth1_url))
            .send()
            .await
            .map_err(|e| Error::Auth(format!("auth1: {}", describe_http(&e))))?;
        ensure_ok("auth1", response.status())?;

        let grant = Auth1Grant::from_headers(response.headers())?;
        tracing::debug!(token_len = grant.token.len(), "auth1 granted");
        Ok(grant)
    }

    pub async fn auth2(&self, token: &str, partial_key: &str) -> Result<String> {
        let response = self
            .identified(self.client.post(&self.auth2_url))
            .header("X-Radiko-Authtoken", token)
            .header("X-Radiko-Partialkey", partial_key)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("auth2: {}", describe_http(&e))))?;
        ensure_ok("auth2", response.status())?;

        response
            .text()
            .await
            .map_err(|e| Error::Auth(format!("auth2: {}", describe_http(&e))))
    }
}

fn ensure_ok(step: &str, status: StatusCode) -> Result<()> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(Error::Auth(format!("{step} returned {status}")))
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use radiko_dl::Config;

/// Canned responses for the stub radiko endpoints, plus what the stub saw.
pub struct StubRadiko {
    pub auth1_status: StatusCode,
    pub auth1_headers: Vec<(&'static str, String)>,
    pub auth2_status: StatusCode,
    pub auth2_body: String,
    /// Schedule documents keyed by `yyyymmdd`.
    pub schedules: HashMap<String, String>,
    pub page_html: String,
    pub player: Vec<u8>,
    /// Holds the auth1 response back this long.
    pub auth1_stall: Option<Duration>,
    /// Holds every schedule response back this long.
    pub schedule_stall: Option<Duration>,

    pub auth1_calls: AtomicUsize,
    pub auth2_calls: AtomicUsize,
    pub auth1_request: Mutex<Option<HeaderMap>>,
    pub auth2_request: Mutex<Option<HeaderMap>>,
    pub schedule_requests: Mutex<Vec<(String, String)>>,
}

impl Default for StubRadiko {
    fn default() -> Self {
        Self {
            auth1_status: StatusCode::OK,
            auth1_headers: grant("tok123", 100, 16),
            auth2_status: StatusCode::OK,
            auth2_body: "JP13,tokyo".to_string(),
            schedules: HashMap::new(),
            page_html: String::new(),
            player: Vec::new(),
            auth1_stall: None,
            schedule_stall: None,
            auth1_calls: AtomicUsize::new(0),
            auth2_calls: AtomicUsize::new(0),
            auth1_request: Mutex::new(None),
            auth2_request: Mutex::new(None),
            schedule_requests: Mutex::new(Vec::new()),
        }
    }
}

impl StubRadiko {
    pub fn auth1_calls(&self) -> usize {
        self.auth1_calls.load(Ordering::SeqCst)
    }

    pub fn auth2_calls(&self) -> usize {
        self.auth2_calls.load(Ordering::SeqCst)
    }

    pub fn auth2_header(&self, name: &str) -> Option<String> {
        self.auth2_request
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|headers| headers.get(name))
            .map(|value| value.to_str().unwrap().to_string())
    }

    pub fn auth1_header(&self, name: &str) -> Option<String> {
        self.auth1_request
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|headers| headers.get(name))
            .map(|value| value.to_str().unwrap().to_string())
    }

    pub fn requested_dates(&self) -> Vec<String> {
        self.schedule_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(date, _)| date.clone())
            .collect()
    }
}

pub fn grant(token: &str, offset: usize, length: usize) -> Vec<(&'static str, String)> {
    vec![
        ("x-radiko-authtoken", token.to_string()),
        ("x-radiko-keyoffset", offset.to_string()),
        ("x-radiko-keylength", length.to_string()),
    ]
}

/// Serves `stub` on an ephemeral local port and returns its base url.
pub async fn serve(stub: Arc<StubRadiko>) -> String {
    let router = Router::new()
        .route("/v2/api/auth1_fms", post(auth1))
        .route("/v2/api/auth2_fms", post(auth2))
        .route("/v3/program/date/{date}/{file}", get(schedule))
        .route("/page", get(page))
        .route("/player.swf", get(player))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Default configuration pointed at a stub server.
pub fn config_for(base: &str) -> Config {
    let mut config = Config::default();
    config.endpoints.auth1_url = format!("{base}/v2/api/auth1_fms");
    config.endpoints.auth2_url = format!("{base}/v2/api/auth2_fms");
    config.endpoints.schedule_url = format!("{base}/v3/program/date/{{date}}/{{area}}.xml");
    config.client.timeout_secs = 5;
    config
}

/// 116 bytes of known content.
pub fn known_asset() -> Vec<u8> {
    (0u8..116).map(|b| b.wrapping_mul(3)).collect()
}

pub fn schedule_xml(station_id: &str, ft: &str, title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<radiko>
  <stations>
    <station id="{station_id}">
      <name>Station</name>
      <progs>
        <prog id="1" ft="{ft}" to="29991231235959">
          <title>{title}</title>
        </prog>
      </progs>
    </station>
  </stations>
</radiko>"#
    )
}

#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn auth1(State(stub): State<Arc<StubRadiko>>, headers: HeaderMap) -> (StatusCode, HeaderMap) {
    stub.auth1_calls.fetch_add(1, Ordering::SeqCst);
    *stub.auth1_request.lock().unwrap() = Some(headers);
    if let Some(stall) = stub.auth1_stall {
        tokio::time::sleep(stall).await;
    }

    let mut response = HeaderMap::new();
    for (name, value) in &stub.auth1_headers {
        response.insert(*name, HeaderValue::from_str(value).unwrap());
    }
    (stub.auth1_status, response)
}

async fn auth2(State(stub): State<Arc<StubRadiko>>, headers: HeaderMap) -> (StatusCode, String) {
    stub.auth2_calls.fetch_add(1, Ordering::SeqCst);
    *stub.auth2_request.lock().unwrap() = Some(headers);
    (stub.auth2_status, stub.auth2_body.clone())
}

async fn schedule(
    State(stub): State<Arc<StubRadiko>>,
    UrlPath((date, file)): UrlPath<(String, String)>,
) -> (StatusCode, String) {
    let area = file.trim_end_matches(".xml").to_string();
    stub.schedule_requests
        .lock()
        .unwrap()
        .push((date.clone(), area));
    if let Some(stall) = stub.schedule_stall {
        tokio::time::sleep(stall).await;
    }
    match stub.schedules.get(&date) {
        Some(xml) => (StatusCode::OK, xml.clone()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn page(State(stub): State<Arc<StubRadiko>>) -> (StatusCode, String) {
    (StatusCode::OK, stub.page_html.clone())
}

async fn player(State(stub): State<Arc<StubRadiko>>) -> (StatusCode, Vec<u8>) {
    if stub.player.is_empty() {
        (StatusCode::NOT_FOUND, Vec::new())
    } else {
        (StatusCode::OK, stub.player.clone())
    }
}

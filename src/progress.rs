use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};

/// Step of a run as reported to the user, in the order the steps happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    ResolveStream,
    FetchKeyAsset,
    Auth1,
    PartialKey,
    Auth2,
    ResolveTitle,
    Capture { file: String },
}

impl Stage {
    /// Short label, stable across runs.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ResolveStream => "resolve-stream",
            Stage::FetchKeyAsset => "key-asset",
            Stage::Auth1 => "auth1",
            Stage::PartialKey => "partial-key",
            Stage::Auth2 => "auth2",
            Stage::ResolveTitle => "resolve-title",
            Stage::Capture { .. } => "capture",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Stage::ResolveStream => "Obtaining streaming url... ".to_string(),
            Stage::FetchKeyAsset => "Fetching key asset... ".to_string(),
            Stage::Auth1 => "Authenticating with auth1_fms... ".to_string(),
            Stage::PartialKey => "Creating partial key... ".to_string(),
            Stage::Auth2 => "Authenticating with auth2_fms... ".to_string(),
            Stage::ResolveTitle => "Obtaining program title... ".to_string(),
            Stage::Capture { file } => format!("Downloading {file}... "),
        }
    }
}

/// Notified at stage boundaries. Implementations only report; they cannot
/// alter the outcome of a stage.
pub trait ProgressObserver: Send + Sync {
    fn stage_started(&self, _stage: &Stage) {}

    fn stage_finished(&self, _stage: &Stage) {}

    fn stage_failed(&self, _stage: &Stage, _error: &Error) {}
}

/// Runs `work` between `stage_started` and `stage_finished`/`stage_failed`.
pub async fn observe<T>(
    observer: &dyn ProgressObserver,
    stage: Stage,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    observer.stage_started(&stage);
    let result = work.await;
    match &result {
        Ok(_) => observer.stage_finished(&stage),
        Err(e) => observer.stage_failed(&stage, e),
    }
    result
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressObserver for Silent {}

/// Terminal spinner that prints `<message>done` when a stage completes.
#[derive(Default)]
pub struct Spinner {
    current: Mutex<Option<ProgressBar>>,
}

impl Spinner {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{msg}{spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["-", "/", "|", "\\", ""])
    }

    fn take(&self) -> Option<ProgressBar> {
        self.current.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl ProgressObserver for Spinner {
    fn stage_started(&self, stage: &Stage) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(Self::style());
        bar.set_message(stage.message());
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut slot) = self.current.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn stage_finished(&self, stage: &Stage) {
        if let Some(bar) = self.take() {
            bar.finish_with_message(format!("{}done", stage.message()));
        }
    }

    fn stage_failed(&self, stage: &Stage, _error: &Error) {
        if let Some(bar) = self.take() {
            bar.abandon_with_message(format!("{}failed", stage.message()));
        }
    }
}

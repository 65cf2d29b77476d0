use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::schedule::ProgramTitle;

/// Captures the authenticated stream into a local audio file with ffmpeg.
#[derive(Debug, Clone)]
pub struct MediaCapture {
    ffmpeg: PathBuf,
    extension: String,
    output_dir: PathBuf,
}

impl MediaCapture {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            extension: config.extension.trim_start_matches('.').to_string(),
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn output_path(&self, title: &ProgramTitle) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", title.as_str(), self.extension))
    }

    /// Runs ffmpeg and returns the path of the finished file.
    ///
    /// The output path is reserved with an exclusive create before ffmpeg
    /// starts, so a file that already exists is never touched. Once reserved,
    /// any failure removes the file again.
    #[tracing::instrument(skip(self, token))]
    pub async fn capture(
        &self,
        stream_url: &str,
        token: &str,
        title: &ProgramTitle,
    ) -> Result<PathBuf> {
        let output = self.output_path(title);
        reserve(&output).await?;

        match self.run_ffmpeg(stream_url, token, &output).await {
            Ok(()) => {
                tracing::info!(path = %output.display(), "capture finished");
                Ok(output)
            }
            Err(e) => {
                if let Err(remove) = tokio::fs::remove_file(&output).await {
                    tracing::warn!(error = %remove, path = %output.display(), "failed to remove partial output");
                }
                Err(e)
            }
        }
    }

    async fn run_ffmpeg(&self, stream_url: &str, token: &str, output: &Path) -> Result<()> {
        let status = Command::new(&self.ffmpeg)
            .args(["-loglevel", "fatal", "-y", "-headers"])
            .arg(format!("X-Radiko-AuthToken: {token}\r\n"))
            .arg("-i")
            .arg(stream_url)
            .args(["-vn", "-acodec", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| Error::MediaCapture(format!("cannot run {}: {e}", self.ffmpeg.display())))?;

        if !status.success() {
            return Err(Error::MediaCapture(format!(
                "{} exited with {status}",
                self.ffmpeg.display()
            )));
        }

        let written = tokio::fs::metadata(output)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(Error::MediaCapture(format!(
                "{} did not produce {}",
                self.ffmpeg.display(),
                output.display()
            )));
        }
        Ok(())
    }
}

/// Creates an empty file at `path`, failing if anything is already there.
async fn reserve(path: &Path) -> Result<()> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map(drop)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                Error::MediaCapture(format!("{} already exists", path.display()))
            }
            _ => Error::MediaCapture(format!("cannot create {}: {e}", path.display())),
        })
}

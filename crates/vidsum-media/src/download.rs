//! Source download using yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::wait_with_limits;
use crate::error::{MediaError, MediaResult};

/// Metadata probed from a remote source without downloading it.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    /// Duration in seconds, when the source advertises one
    pub duration: Option<f64>,
    /// Display title
    pub title: Option<String>,
    /// Extractor name (site), used for stable cache keys
    pub extractor: Option<String>,
    /// Extractor-scoped video id
    pub video_id: Option<String>,
    /// Whether manual or automatic subtitles are advertised
    pub has_subtitles: bool,
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    duration: Option<f64>,
    title: Option<String>,
    extractor_key: Option<String>,
    extractor: Option<String>,
    id: Option<String>,
    #[serde(default)]
    subtitles: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    automatic_captions: serde_json::Map<String, serde_json::Value>,
}

/// Probe a URL for metadata (`yt-dlp -J`, no download).
pub async fn fetch_metadata(url: &str, timeout: Duration) -> MediaResult<SourceMetadata> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    debug!("Probing source metadata for {}", url);

    let output = run_ytdlp(
        |cmd| {
            cmd.args(["-J", "--no-download", "--no-warnings"]).arg(url);
        },
        timeout,
        None,
    )
    .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::download_failed(format!(
            "yt-dlp probe failed: {}",
            stderr.lines().last().unwrap_or("Unknown error")
        )));
    }

    let info: YtDlpInfo = serde_json::from_slice(&output.stdout)?;
    Ok(SourceMetadata {
        duration: info.duration.filter(|d| *d > 0.0),
        title: info.title,
        extractor: info.extractor_key.or(info.extractor),
        video_id: info.id,
        has_subtitles: !info.subtitles.is_empty() || !info.automatic_captions.is_empty(),
    })
}

/// Download a video from a URL, capped at `max_size` bytes.
pub async fn download_video(
    url: &str,
    output_path: impl AsRef<Path>,
    max_size: u64,
    timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    info!("Downloading video from {} to {}", url, output_path.display());

    let output = run_ytdlp(
        |cmd| {
            cmd.args([
                "-f",
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
                "--max-filesize",
                &max_size.to_string(),
                "--no-playlist",
                "--no-warnings",
                "-o",
            ])
            .arg(output_path)
            .arg(url);
        },
        timeout,
        cancel,
    )
    .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        // yt-dlp aborts with a distinctive message when --max-filesize trips
        if stderr.contains("File is larger than max-filesize")
            || stderr.contains("exceeds the maximum")
        {
            return Err(MediaError::TooLarge { limit: max_size });
        }
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            stderr.lines().last().unwrap_or("Unknown error")
        )));
    }

    if !output_path.exists() {
        // A zero-status run without output also happens when the size cap
        // made yt-dlp skip the download.
        return Err(MediaError::download_failed("Output file not created"));
    }

    let file_size = output_path.metadata()?.len();
    info!(
        "Downloaded video: {} ({:.1} MB)",
        output_path.display(),
        file_size as f64 / (1024.0 * 1024.0)
    );

    Ok(())
}

/// Try to download subtitles for a URL into `out_dir`.
///
/// Prefers manual subtitles, falls back to automatic captions. Returns the
/// produced subtitle file, or `None` when the source has none; only
/// infrastructure problems surface as errors.
pub async fn download_subtitles(
    url: &str,
    out_dir: impl AsRef<Path>,
    max_size: u64,
    timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<Option<PathBuf>> {
    let out_dir = out_dir.as_ref();
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;
    tokio::fs::create_dir_all(out_dir).await?;

    debug!("Fetching subtitles for {}", url);

    let template = out_dir.join("subtitle.%(ext)s");
    let output = run_ytdlp(
        |cmd| {
            cmd.args([
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                "en.*,en",
                "--convert-subs",
                "vtt",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
                "-o",
            ])
            .arg(&template)
            .arg(url);
        },
        timeout,
        cancel,
    )
    .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            "Subtitle download failed: {}",
            stderr.lines().last().unwrap_or("unknown")
        );
        return Ok(None);
    }

    let Some(path) = find_subtitle_file(out_dir).await? else {
        return Ok(None);
    };

    let size = path.metadata()?.len();
    if size > max_size {
        warn!(
            "Subtitle file {} exceeds cap ({} > {} bytes), discarding",
            path.display(),
            size,
            max_size
        );
        let _ = tokio::fs::remove_file(&path).await;
        return Ok(None);
    }

    Ok(Some(path))
}

/// First subtitle-looking file in a directory.
async fn find_subtitle_file(dir: &Path) -> MediaResult<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if matches!(ext.as_str(), "vtt" | "srt" | "ass" | "ssa") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Spawn yt-dlp with piped output and wait under timeout/cancellation.
async fn run_ytdlp<F>(
    configure: F,
    timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<std::process::Output>
where
    F: FnOnce(&mut Command),
{
    let mut command = Command::new("yt-dlp");
    configure(&mut command);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;

    // Drain both pipes while waiting so the child never blocks on a full one.
    let mut stdout_pipe = child.stdout.take().expect("stdout not captured");
    let mut stderr_pipe = child.stderr.take().expect("stderr not captured");
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let status = wait_with_limits(&mut child, timeout, cancel, "yt-dlp").await?;
    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}

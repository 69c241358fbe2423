use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::error::{JimakuError, Result};
use crate::task::ProgressSink;

use super::{DownloadOptions, PlatformDownloader, VideoInfo, validate_url};

/// Raw `yt-dlp -J` output, trimmed to the fields the API exposes
#[derive(Debug, Deserialize)]
struct YtDlpMetadata {
    title: Option<String>,
    description: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    ext: Option<String>,
    height: Option<u32>,
}

/// Subprocess wrapper around the yt-dlp binary
pub struct YtDlp {
    config: DownloadConfig,
}

impl YtDlp {
    pub fn new(config: DownloadConfig) -> Self {
        Self { config }
    }

    /// Configured retry flags; platforms may append their own, and yt-dlp
    /// honors the last occurrence of a flag.
    fn retry_args(&self, cmd: &mut Command) {
        cmd.arg("--retries")
            .arg(self.config.retries.to_string())
            .arg("--extractor-retries")
            .arg(self.config.extractor_retries.to_string());
    }

    /// Verify the binary is on PATH
    pub async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--version")
            .output()
            .await
            .map_err(|e| JimakuError::Download(format!("yt-dlp not found: {}", e)))?;

        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout);
            info!("yt-dlp is available: {}", version.trim());
            Ok(())
        } else {
            Err(JimakuError::Download(
                "yt-dlp version check failed".to_string(),
            ))
        }
    }

    /// Fetch video metadata without downloading anything
    pub async fn fetch_info(
        &self,
        url: &str,
        platform: &dyn PlatformDownloader,
    ) -> Result<VideoInfo> {
        validate_url(url)?;
        debug!("Fetching video info for {}", url);

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-J").arg("--no-warnings");
        self.retry_args(&mut cmd);
        if let Some(proxy) = &self.config.proxy {
            cmd.arg("--proxy").arg(proxy);
        }
        cmd.args(platform.extra_args(&DownloadOptions::default()));
        cmd.arg(url);

        let output = cmd
            .output()
            .await
            .map_err(|e| JimakuError::Download(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JimakuError::Download(format!(
                "yt-dlp metadata fetch failed: {}",
                stderr.trim()
            )));
        }

        let metadata: YtDlpMetadata = serde_json::from_slice(&output.stdout)?;
        Ok(Self::to_video_info(metadata, platform.platform_name()))
    }

    fn to_video_info(metadata: YtDlpMetadata, platform: &str) -> VideoInfo {
        let mut heights: Vec<u32> = metadata
            .formats
            .iter()
            .filter_map(|f| f.height)
            .collect();
        heights.sort_unstable();
        heights.dedup();
        let available_qualities = heights.iter().rev().map(|h| format!("{}p", h)).collect();

        let mut available_formats: Vec<String> = metadata
            .formats
            .iter()
            .filter_map(|f| f.ext.clone())
            .collect();
        available_formats.sort();
        available_formats.dedup();

        VideoInfo {
            title: metadata.title.unwrap_or_else(|| "Unknown title".to_string()),
            description: metadata.description,
            duration: metadata.duration.map(|d| d as u64),
            thumbnail: metadata.thumbnail,
            uploader: metadata.uploader,
            platform: platform.to_string(),
            available_qualities,
            available_formats,
        }
    }

    /// Download a video, forwarding yt-dlp progress lines to the sink.
    /// Returns the path of the downloaded file.
    pub async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        platform: &dyn PlatformDownloader,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        validate_url(url)?;
        info!("Starting download: {} ({})", url, platform.platform_name());

        let output_template = match &options.output_filename {
            Some(name) => options.output_dir.join(name),
            None => options.output_dir.join("%(title)s.%(ext)s"),
        };

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("--newline")
            .arg("--no-warnings")
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-o")
            .arg(&output_template)
            .arg("-f")
            .arg(format_selector(options));
        self.retry_args(&mut cmd);

        if options.audio_only {
            cmd.arg("--extract-audio")
                .arg("--audio-format")
                .arg("mp3")
                .arg("--audio-quality")
                .arg("192K");
        }

        if options.subtitles {
            cmd.arg("--write-subs").arg("--write-auto-subs");
            if options.subtitle_language != "auto" {
                cmd.arg("--sub-langs").arg(&options.subtitle_language);
            }
        }

        if let Some(proxy) = options.proxy.as_ref().or(self.config.proxy.as_ref()) {
            cmd.arg("--proxy").arg(proxy);
        }

        cmd.args(platform.extra_args(options));
        cmd.arg(url);

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| JimakuError::Download(format!("Failed to spawn yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| JimakuError::Download("yt-dlp stdout unavailable".to_string()))?;

        let mut output_file: Option<PathBuf> = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| JimakuError::Download(format!("Failed to read yt-dlp output: {}", e)))?
        {
            if let Some((percent, message)) = parse_progress_line(&line) {
                progress.report(percent, &message).await;
            } else if !line.starts_with('[') && !line.trim().is_empty() {
                // `--print after_move:filepath` emits the final path as a bare line
                output_file = Some(PathBuf::from(line.trim()));
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| JimakuError::Download(format!("yt-dlp did not exit cleanly: {}", e)))?;

        if !status.success() {
            let mut stderr_text = String::new();
            if let Some(stderr) = child.stderr.take() {
                let mut err_lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = err_lines.next_line().await {
                    stderr_text.push_str(&line);
                    stderr_text.push('\n');
                }
            }
            return Err(JimakuError::Download(format!(
                "yt-dlp exited with {}: {}",
                status,
                stderr_text.trim()
            )));
        }

        match output_file {
            Some(path) if path.exists() => {
                info!("Download finished: {}", path.display());
                Ok(path)
            }
            Some(path) => {
                warn!("yt-dlp reported a path that does not exist: {}", path.display());
                Err(JimakuError::Download(
                    "downloaded file missing after yt-dlp exit".to_string(),
                ))
            }
            None => Err(JimakuError::Download(
                "yt-dlp did not report an output file".to_string(),
            )),
        }
    }
}

/// Map quality/format/audio_only request fields onto a yt-dlp format selector
pub fn format_selector(options: &DownloadOptions) -> String {
    if options.audio_only {
        return "bestaudio/best".to_string();
    }
    match options.quality.as_str() {
        "best" => format!("best[ext={}]/best", options.format),
        "worst" => format!("worst[ext={}]/worst", options.format),
        quality if quality.ends_with('p') => {
            let height = &quality[..quality.len() - 1];
            format!(
                "best[height<={h}][ext={f}]/best[height<={h}]/best",
                h = height,
                f = options.format
            )
        }
        _ => format!("best[ext={}]/best", options.format),
    }
}

/// Parse a yt-dlp progress line like
/// `[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59`
pub fn parse_progress_line(line: &str) -> Option<(f32, String)> {
    static PROGRESS_RE: OnceLock<Regex> = OnceLock::new();
    let re = PROGRESS_RE.get_or_init(|| {
        Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%(?:\s+of\s+~?\s*(\S+))?(?:\s+at\s+(\S+))?(?:\s+ETA\s+(\S+))?")
            .expect("progress regex is valid")
    });

    let caps = re.captures(line)?;
    let percent: f32 = caps.get(1)?.as_str().parse().ok()?;

    let mut message = format!("Downloading {:.1}%", percent);
    if let Some(size) = caps.get(2) {
        message.push_str(&format!(" of {}", size.as_str()));
    }
    if let Some(speed) = caps.get(3) {
        message.push_str(&format!(" at {}", speed.as_str()));
    }
    if let Some(eta) = caps.get(4) {
        message.push_str(&format!(" ETA {}", eta.as_str()));
    }

    Some((percent, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(quality: &str, format: &str, audio_only: bool) -> DownloadOptions {
        DownloadOptions {
            quality: quality.to_string(),
            format: format.to_string(),
            audio_only,
            ..DownloadOptions::default()
        }
    }

    #[test]
    fn format_selector_for_quality_levels() {
        assert_eq!(format_selector(&options("best", "mp4", false)), "best[ext=mp4]/best");
        assert_eq!(format_selector(&options("worst", "webm", false)), "worst[ext=webm]/worst");
        assert_eq!(
            format_selector(&options("720p", "mp4", false)),
            "best[height<=720][ext=mp4]/best[height<=720]/best"
        );
        assert_eq!(format_selector(&options("best", "mp4", true)), "bestaudio/best");
    }

    #[test]
    fn parses_full_progress_line() {
        let line = "[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59";
        let (percent, message) = parse_progress_line(line).unwrap();
        assert_eq!(percent, 12.5);
        assert!(message.contains("310.04MiB"));
        assert!(message.contains("ETA 11:59"));
    }

    #[test]
    fn parses_bare_percentage() {
        let (percent, _) = parse_progress_line("[download] 100%").unwrap();
        assert_eq!(percent, 100.0);
    }

    #[test]
    fn ignores_non_progress_lines() {
        assert!(parse_progress_line("[youtube] extracting URL").is_none());
        assert!(parse_progress_line("/data/files/movie.mp4").is_none());
        assert!(parse_progress_line("[download] Destination: movie.mp4").is_none());
    }

    #[test]
    fn metadata_maps_to_video_info() {
        let raw = r#"{
            "title": "Test video",
            "duration": 93.4,
            "uploader": "someone",
            "formats": [
                {"ext": "mp4", "height": 720},
                {"ext": "mp4", "height": 1080},
                {"ext": "webm", "height": 1080},
                {"ext": "m4a", "height": null}
            ]
        }"#;
        let metadata: YtDlpMetadata = serde_json::from_str(raw).unwrap();
        let info = YtDlp::to_video_info(metadata, "YouTube");
        assert_eq!(info.title, "Test video");
        assert_eq!(info.duration, Some(93));
        assert_eq!(info.available_qualities, vec!["1080p", "720p"]);
        assert_eq!(info.available_formats, vec!["m4a", "mp4", "webm"]);
        assert_eq!(info.platform, "YouTube");
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::config::MediaConfig;
use crate::error::{JimakuError, Result};

use super::commands::MediaCommandBuilder;

/// Styling for hard-burned subtitles, rendered as an ASS force_style string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnStyle {
    pub font_size: u32,
    pub font_color: String,
    pub outline_color: String,
    pub outline_width: u32,
    pub font_name: String,
}

impl Default for BurnStyle {
    fn default() -> Self {
        Self {
            font_size: 24,
            font_color: "white".to_string(),
            outline_color: "black".to_string(),
            outline_width: 2,
            font_name: "Arial".to_string(),
        }
    }
}

impl BurnStyle {
    /// `subtitles=<path>[:force_style='...']` filter value
    pub fn subtitle_filter(&self, subtitle_path: &Path) -> String {
        let mut filter = format!("subtitles={}", subtitle_path.display());

        let mut style_params = vec![format!("FontSize={}", self.font_size)];
        if self.font_color != "white" {
            style_params.push(format!("PrimaryColour=&H{}&", color_to_hex(&self.font_color)));
        }
        if self.outline_color != "transparent" {
            style_params.push(format!(
                "OutlineColour=&H{}&",
                color_to_hex(&self.outline_color)
            ));
        }
        style_params.push(format!("Outline={}", self.outline_width));
        if self.font_name != "Arial" {
            style_params.push(format!("FontName={}", self.font_name));
        }

        filter.push_str(&format!(":force_style='{}'", style_params.join(",")));
        filter
    }
}

/// Map a color name to the BGR hex digits ASS styling expects
fn color_to_hex(color: &str) -> &str {
    match color.to_ascii_lowercase().as_str() {
        "white" => "FFFFFF",
        "black" => "000000",
        "red" => "0000FF",
        "green" => "00FF00",
        "blue" => "FF0000",
        "yellow" => "00FFFF",
        "cyan" => "FFFF00",
        "magenta" => "FF00FF",
        _ => "FFFFFF",
    }
}

#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Extract the audio track as 16kHz mono wav suitable for transcription
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Hard-burn subtitles into the video stream
    async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        style: &BurnStyle,
    ) -> Result<()>;

    /// Add subtitles as a soft mov_text track
    async fn mux_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
    ) -> Result<()>;

    /// Media duration in seconds via ffprobe
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Verify ffmpeg is runnable, returning its version banner line
    async fn check_availability(&self) -> Result<String>;
}

/// ffmpeg-backed implementation
pub struct FfmpegProcessor {
    config: MediaConfig,
    builder: MediaCommandBuilder,
}

impl FfmpegProcessor {
    pub fn new(config: MediaConfig) -> Self {
        let builder = MediaCommandBuilder::new(&config.binary_path);
        Self { config, builder }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!(
            "Extracting audio from {} to {}",
            video_path.display(),
            audio_path.display()
        );
        self.builder.extract_audio(video_path, audio_path).execute().await
    }

    async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        style: &BurnStyle,
    ) -> Result<()> {
        info!(
            "Burning {} into {}",
            subtitle_path.display(),
            video_path.display()
        );
        self.builder
            .burn_subtitles(
                video_path,
                style.subtitle_filter(subtitle_path),
                output_path,
                &self.config.burn_options,
            )
            .execute()
            .await
    }

    async fn mux_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        info!(
            "Muxing {} into {}",
            subtitle_path.display(),
            video_path.display()
        );
        self.builder
            .mux_subtitles(video_path, subtitle_path, output_path)
            .execute()
            .await
    }

    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        let output = super::commands::MediaCommand::new(&self.config.probe_path, "Duration probe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(media_path.to_string_lossy().to_string())
            .execute_with_output()
            .await?;

        output
            .trim()
            .parse::<f64>()
            .map_err(|_| JimakuError::Media(format!("Unparseable duration: {}", output.trim())))
    }

    async fn check_availability(&self) -> Result<String> {
        let output = self.builder.version_check().execute_with_output().await?;
        let banner = output.lines().next().unwrap_or("unknown").to_string();
        Ok(banner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_style_renders_minimal_filter() {
        let style = BurnStyle::default();
        let filter = style.subtitle_filter(&PathBuf::from("subs.srt"));
        assert!(filter.starts_with("subtitles=subs.srt"));
        assert!(filter.contains("FontSize=24"));
        assert!(filter.contains("Outline=2"));
        assert!(!filter.contains("PrimaryColour"));
        assert!(!filter.contains("FontName"));
    }

    #[test]
    fn custom_style_adds_colors_and_font() {
        let style = BurnStyle {
            font_size: 32,
            font_color: "yellow".to_string(),
            outline_color: "black".to_string(),
            outline_width: 3,
            font_name: "Noto Sans".to_string(),
        };
        let filter = style.subtitle_filter(&PathBuf::from("subs.srt"));
        assert!(filter.contains("FontSize=32"));
        assert!(filter.contains("PrimaryColour=&H00FFFF&"));
        assert!(filter.contains("OutlineColour=&H000000&"));
        assert!(filter.contains("FontName=Noto Sans"));
    }

    #[test]
    fn unknown_colors_fall_back_to_white() {
        assert_eq!(color_to_hex("chartreuse"), "FFFFFF");
        assert_eq!(color_to_hex("RED"), "0000FF");
    }
}

use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{JimakuError, Result};

/// A single ffmpeg/ffprobe invocation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn subtitle_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:s").arg(codec)
    }

    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Run the command, discarding stdout
    pub async fn execute(&self) -> Result<()> {
        self.execute_with_output().await.map(|_| ())
    }

    /// Run the command and return its stdout
    pub async fn execute_with_output(&self) -> Result<String> {
        debug!(
            "Running media command ({}): {} {:?}",
            self.description, self.binary_path, self.args
        );

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| JimakuError::Media(format!("Failed to execute media processor: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JimakuError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Builder for the operations the pipeline needs
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Extract the audio track as 16kHz mono PCM wav
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Hard-burn a subtitle file into the video stream
    pub fn burn_subtitles<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_filter: String,
        output_path: P,
        additional_options: &[String],
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Subtitle burning")
            .overwrite()
            .input(&video_path)
            .video_filter(subtitle_filter)
            .video_codec("libx264")
            .copy_audio();

        for option in additional_options {
            cmd = cmd.arg(option);
        }

        cmd.output(output_path)
    }

    /// Mux a subtitle file in as a soft mov_text track
    pub fn mux_subtitles<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        output_path: P,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Subtitle muxing")
            .overwrite()
            .input(&video_path)
            .input(&subtitle_path)
            .copy_video()
            .copy_audio()
            .subtitle_codec("mov_text")
            .args(["-map", "0", "-map", "1"])
            .output(output_path)
    }

    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_audio_forces_whisper_input_format() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.extract_audio("in.mp4", "out.wav");
        let joined = cmd.args.join(" ");
        assert!(joined.contains("-acodec pcm_s16le") || joined.contains("-c:a pcm_s16le"));
        assert!(joined.contains("-ar 16000"));
        assert!(joined.contains("-ac 1"));
        assert!(joined.ends_with("out.wav"));
    }

    #[test]
    fn mux_maps_both_inputs() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.mux_subtitles("in.mp4", "subs.srt", "out.mp4");
        let joined = cmd.args.join(" ");
        assert!(joined.contains("-c:s mov_text"));
        assert!(joined.contains("-map 0 -map 1"));
    }

    #[test]
    fn burn_appends_extra_options_before_output() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let extra = vec!["-preset".to_string(), "fast".to_string()];
        let cmd = builder.burn_subtitles("in.mp4", "subtitles=subs.srt".to_string(), "out.mp4", &extra);
        let preset_pos = cmd.args.iter().position(|a| a == "-preset").unwrap();
        let output_pos = cmd.args.iter().position(|a| a == "out.mp4").unwrap();
        assert!(preset_pos < output_pos);
    }
}

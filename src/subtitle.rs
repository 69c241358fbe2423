use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::{JimakuError, Result};

/// A single timed subtitle cue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub index: usize,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

/// An ordered collection of cues plus detected language
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtitleDocument {
    pub cues: Vec<SubtitleCue>,
    pub language: Option<String>,
}

impl SubtitleDocument {
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.cues.last().map(|c| c.end).unwrap_or(0.0)
    }
}

/// Generate an SRT subtitle file from a document
pub async fn write_srt<P: AsRef<Path>>(document: &SubtitleDocument, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    let mut srt_content = String::new();
    for (index, cue) in document.cues.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            cue.text.trim()
        ));
    }

    fs::write(output_path, srt_content).await.map_err(JimakuError::Io)?;
    Ok(())
}

/// Generate a WebVTT subtitle file from a document
pub async fn write_vtt<P: AsRef<Path>>(document: &SubtitleDocument, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating VTT file: {}", output_path.display());

    let mut vtt_content = String::from("WEBVTT\n\n");
    for cue in &document.cues {
        vtt_content.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_time(cue.start),
            format_vtt_time(cue.end),
            cue.text.trim()
        ));
    }

    fs::write(output_path, vtt_content).await.map_err(JimakuError::Io)?;
    Ok(())
}

/// Parse an SRT file into a document. Tolerates CRLF line endings and skips
/// cues with empty text.
pub fn parse_srt(content: &str) -> Result<SubtitleDocument> {
    let normalized = content.replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in normalized.split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() < 2 {
            continue;
        }

        // First line is the numeric index, second the timing; some files omit
        // the index so the timing line may come first.
        let timing_line = if lines[0].contains("-->") {
            lines[0]
        } else if lines.len() >= 2 && lines[1].contains("-->") {
            lines[1]
        } else {
            continue;
        };
        let text_start = if lines[0].contains("-->") { 1 } else { 2 };

        let (start, end) = parse_srt_timing(timing_line)?;
        let text = lines[text_start..].join("\n");
        if text.trim().is_empty() {
            continue;
        }

        cues.push(SubtitleCue {
            index: cues.len() + 1,
            start,
            end,
            text,
        });
    }

    Ok(SubtitleDocument {
        cues,
        language: None,
    })
}

/// Read and parse an SRT file
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<SubtitleDocument> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .map_err(|_| JimakuError::FileNotFound(path.display().to_string()))?;
    parse_srt(&content)
}

fn parse_srt_timing(line: &str) -> Result<(f64, f64)> {
    let mut parts = line.split("-->");
    let start = parts
        .next()
        .ok_or_else(|| JimakuError::Subtitle(format!("Invalid timing line: {}", line)))?;
    let end = parts
        .next()
        .ok_or_else(|| JimakuError::Subtitle(format!("Invalid timing line: {}", line)))?;
    Ok((parse_srt_time(start.trim())?, parse_srt_time(end.trim())?))
}

fn parse_srt_time(value: &str) -> Result<f64> {
    // HH:MM:SS,mmm (VTT uses '.' instead of ',')
    let value = value.replace(',', ".");
    let fields: Vec<&str> = value.split(':').collect();
    if fields.len() != 3 {
        return Err(JimakuError::Subtitle(format!("Invalid timestamp: {}", value)));
    }
    let hours: f64 = fields[0]
        .parse()
        .map_err(|_| JimakuError::Subtitle(format!("Invalid timestamp: {}", value)))?;
    let minutes: f64 = fields[1]
        .parse()
        .map_err(|_| JimakuError::Subtitle(format!("Invalid timestamp: {}", value)))?;
    let seconds: f64 = fields[2]
        .parse()
        .map_err(|_| JimakuError::Subtitle(format!("Invalid timestamp: {}", value)))?;
    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0) as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Format time in seconds to VTT time format (HH:MM:SS.mmm)
fn format_vtt_time(seconds: f64) -> String {
    format_srt_time(seconds).replace(',', ".")
}

/// Output name for a translated subtitle file: `<stem>.<lang>.srt`
pub fn translated_filename(source: &Path, target_language: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "subtitles".to_string());
    format!("{}.{}.srt", stem, target_language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(65.123), "00:01:05,123");
        assert_eq!(format_srt_time(3661.500), "01:01:01,500");
    }

    #[test]
    fn test_parse_srt_time() {
        assert_eq!(parse_srt_time("00:00:00,000").unwrap(), 0.0);
        assert!((parse_srt_time("00:01:05,123").unwrap() - 65.123).abs() < 1e-9);
        assert!(parse_srt_time("65,123").is_err());
    }

    #[test]
    fn parse_round_trips_generated_srt() {
        let content = "1\n00:00:01,000 --> 00:00:02,500\nHello there\n\n\
                       2\n00:00:03,000 --> 00:00:04,000\nSecond line\nwith continuation\n\n";
        let document = parse_srt(content).unwrap();
        assert_eq!(document.cues.len(), 2);
        assert_eq!(document.cues[0].text, "Hello there");
        assert_eq!(document.cues[1].text, "Second line\nwith continuation");
        assert!((document.cues[0].end - 2.5).abs() < 1e-9);
    }

    #[test]
    fn parse_tolerates_crlf_and_empty_cues() {
        let content = "1\r\n00:00:01,000 --> 00:00:02,000\r\nFirst\r\n\r\n\
                       2\r\n00:00:03,000 --> 00:00:04,000\r\n\r\n\
                       3\r\n00:00:05,000 --> 00:00:06,000\r\nThird\r\n\r\n";
        let document = parse_srt(content).unwrap();
        assert_eq!(document.cues.len(), 2);
        assert_eq!(document.cues[1].text, "Third");
        assert_eq!(document.cues[1].index, 2);
    }

    #[test]
    fn parse_accepts_missing_index_lines() {
        let content = "00:00:01,000 --> 00:00:02,000\nNo index here\n\n";
        let document = parse_srt(content).unwrap();
        assert_eq!(document.cues.len(), 1);
        assert_eq!(document.cues[0].text, "No index here");
    }

    #[test]
    fn test_translated_filename() {
        assert_eq!(
            translated_filename(Path::new("/tmp/movie.srt"), "zh-cn"),
            "movie.zh-cn.srt"
        );
    }

    #[tokio::test]
    async fn write_and_read_srt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let document = SubtitleDocument {
            cues: vec![SubtitleCue {
                index: 1,
                start: 1.0,
                end: 2.0,
                text: "Hi".to_string(),
            }],
            language: Some("en".to_string()),
        };
        write_srt(&document, &path).await.unwrap();
        let reloaded = read_srt(&path).await.unwrap();
        assert_eq!(reloaded.cues.len(), 1);
        assert_eq!(reloaded.cues[0].text, "Hi");
    }

    #[tokio::test]
    async fn vtt_output_has_header_and_dot_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.vtt");
        let document = SubtitleDocument {
            cues: vec![SubtitleCue {
                index: 1,
                start: 0.5,
                end: 1.5,
                text: "Hi".to_string(),
            }],
            language: None,
        };
        write_vtt(&document, &path).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("WEBVTT"));
        assert!(content.contains("00:00:00.500 --> 00:00:01.500"));
    }
}

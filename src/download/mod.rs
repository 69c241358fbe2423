// Platform dispatch for video downloads
//
// All real download work is delegated to the yt-dlp binary; this module is
// the per-platform configuration table (user agents, referer headers, retry
// tuning) plus the subprocess plumbing around it.

pub mod platforms;
pub mod ytdlp;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

pub use ytdlp::YtDlp;

use crate::error::{JimakuError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOptions {
    pub quality: String,
    pub format: String,
    pub audio_only: bool,
    pub subtitles: bool,
    pub subtitle_language: String,
    pub output_filename: Option<String>,
    pub output_dir: PathBuf,
    pub proxy: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            quality: "best".to_string(),
            format: "mp4".to_string(),
            audio_only: false,
            subtitles: false,
            subtitle_language: "auto".to_string(),
            output_filename: None,
            output_dir: PathBuf::new(),
            proxy: None,
        }
    }
}

/// Metadata returned by `yt-dlp -J`, trimmed to what the API exposes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub description: Option<String>,
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    pub platform: String,
    pub available_qualities: Vec<String>,
    pub available_formats: Vec<String>,
}

/// Per-platform yt-dlp configuration
pub trait PlatformDownloader: Send + Sync {
    fn platform_name(&self) -> &'static str;

    fn supported_domains(&self) -> &'static [&'static str];

    /// Extra yt-dlp arguments for this platform (headers, user agent, ...)
    fn extra_args(&self, options: &DownloadOptions) -> Vec<String>;

    fn supports_url(&self, url: &str) -> bool {
        match host_of(url) {
            Some(host) => self
                .supported_domains()
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{}", d))),
            None => false,
        }
    }
}

/// Extract the lowercase host from an http(s) URL
pub fn host_of(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.split('@').next_back()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Reject anything that is not a plausible http(s) video URL
pub fn validate_url(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(JimakuError::InvalidUrl(url.to_string()));
    }
    match host_of(url) {
        Some(host) if host.contains('.') => Ok(()),
        _ => Err(JimakuError::InvalidUrl(url.to_string())),
    }
}

/// Selects the downloader for a URL: exact domain match first, then suffix
/// match, then each downloader's own probe, and finally the generic fallback.
pub struct DownloaderFactory {
    downloaders: Vec<Box<dyn PlatformDownloader>>,
    generic: Box<dyn PlatformDownloader>,
    domain_map: HashMap<&'static str, usize>,
}

impl DownloaderFactory {
    pub fn new() -> Self {
        let downloaders: Vec<Box<dyn PlatformDownloader>> = vec![
            Box::new(platforms::YouTube),
            Box::new(platforms::Bilibili),
            Box::new(platforms::Douyin),
            Box::new(platforms::Twitter),
            Box::new(platforms::Tencent),
            Box::new(platforms::Youku),
            Box::new(platforms::Xiaohongshu),
            Box::new(platforms::WeChat),
        ];

        let mut domain_map = HashMap::new();
        for (index, downloader) in downloaders.iter().enumerate() {
            for domain in downloader.supported_domains() {
                domain_map.insert(*domain, index);
            }
        }

        Self {
            downloaders,
            generic: Box::new(platforms::Generic),
            domain_map,
        }
    }

    pub fn get(&self, url: &str) -> &dyn PlatformDownloader {
        let Some(host) = host_of(url) else {
            return self.generic.as_ref();
        };

        if let Some(index) = self.domain_map.get(host.as_str()) {
            return self.downloaders[*index].as_ref();
        }

        for (domain, index) in &self.domain_map {
            if host.ends_with(&format!(".{}", domain)) {
                debug!("Matched {} by domain suffix {}", url, domain);
                return self.downloaders[*index].as_ref();
            }
        }

        for downloader in &self.downloaders {
            if downloader.supports_url(url) {
                return downloader.as_ref();
            }
        }

        self.generic.as_ref()
    }

    /// Platform table for the /downloads/platforms endpoint
    pub fn platforms(&self) -> Vec<PlatformInfo> {
        let mut platforms: Vec<PlatformInfo> = self
            .downloaders
            .iter()
            .map(|d| PlatformInfo {
                name: d.platform_name().to_string(),
                domains: d.supported_domains().iter().map(|s| s.to_string()).collect(),
            })
            .collect();
        platforms.push(PlatformInfo {
            name: self.generic.platform_name().to_string(),
            domains: vec!["*".to_string()],
        });
        platforms
    }
}

impl Default for DownloaderFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    pub name: String,
    pub domains: Vec<String>,
}

/// Quality table for the /downloads/quality-options endpoint
pub const QUALITY_OPTIONS: &[(&str, &str)] = &[
    ("best", "Best available"),
    ("worst", "Lowest available"),
    ("1080p", "1080p"),
    ("720p", "720p"),
    ("480p", "480p"),
    ("360p", "360p"),
    ("audio_only", "Audio only"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://www.youtube.com/watch?v=x").unwrap(), "www.youtube.com");
        assert_eq!(host_of("http://b23.tv/abc").unwrap(), "b23.tv");
        assert_eq!(host_of("https://example.com:8080/v").unwrap(), "example.com");
        assert!(host_of("ftp://example.com").is_none());
        assert!(host_of("https:///nohost").is_none());
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://www.youtube.com/watch?v=abc").is_ok());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("https://localhost/video").is_err());
    }

    #[test]
    fn factory_matches_known_domains() {
        let factory = DownloaderFactory::new();
        assert_eq!(factory.get("https://youtube.com/watch?v=x").platform_name(), "YouTube");
        assert_eq!(factory.get("https://youtu.be/x").platform_name(), "YouTube");
        assert_eq!(factory.get("https://www.bilibili.com/video/BV1").platform_name(), "Bilibili");
        assert_eq!(factory.get("https://x.com/user/status/1").platform_name(), "Twitter/X");
        assert_eq!(factory.get("https://v.qq.com/x/cover/abc.html").platform_name(), "Tencent Video");
        assert_eq!(factory.get("https://v.youku.com/v_show/id_x.html").platform_name(), "Youku");
        assert_eq!(factory.get("https://xhslink.com/abc").platform_name(), "Xiaohongshu");
        assert_eq!(
            factory.get("https://channels.weixin.qq.com/video/1").platform_name(),
            "WeChat Channels"
        );
    }

    #[test]
    fn factory_matches_subdomains() {
        let factory = DownloaderFactory::new();
        assert_eq!(factory.get("https://m.youtube.com/watch?v=x").platform_name(), "YouTube");
        assert_eq!(factory.get("https://live.bilibili.com/1").platform_name(), "Bilibili");
    }

    #[test]
    fn factory_falls_back_to_generic() {
        let factory = DownloaderFactory::new();
        assert_eq!(factory.get("https://vimeo.com/12345").platform_name(), "Generic");
        assert_eq!(factory.get("garbage").platform_name(), "Generic");
    }

    #[test]
    fn platform_table_includes_generic_wildcard() {
        let factory = DownloaderFactory::new();
        let platforms = factory.platforms();
        let generic = platforms.last().unwrap();
        assert_eq!(generic.domains, vec!["*".to_string()]);
    }
}

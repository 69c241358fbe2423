use super::{DownloadOptions, PlatformDownloader};

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_7_1 like Mac OS X) \
                         AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Mobile/15E148 Safari/604.1";

const WECHAT_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_7_1 like Mac OS X) \
                         AppleWebKit/605.1.15 (KHTML, like Gecko) MicroMessenger/8.0.13(0x18000d2c) \
                         NetType/WIFI Language/zh_CN";

fn header_args(pairs: &[(&str, &str)]) -> Vec<String> {
    let mut args = Vec::new();
    for (name, value) in pairs {
        args.push("--add-headers".to_string());
        args.push(format!("{}:{}", name, value));
    }
    args
}

/// Override the configured retry counts for flaky extractors
fn retry_args(retries: u32, extractor_retries: u32) -> Vec<String> {
    vec![
        "--retries".to_string(),
        retries.to_string(),
        "--extractor-retries".to_string(),
        extractor_retries.to_string(),
    ]
}

pub struct YouTube;

impl PlatformDownloader for YouTube {
    fn platform_name(&self) -> &'static str {
        "YouTube"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &["youtube.com", "youtu.be"]
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        vec![
            "--user-agent".to_string(),
            DESKTOP_UA.to_string(),
            "--sleep-interval".to_string(),
            "1".to_string(),
            "--max-sleep-interval".to_string(),
            "3".to_string(),
        ]
    }
}

pub struct Bilibili;

impl PlatformDownloader for Bilibili {
    fn platform_name(&self) -> &'static str {
        "Bilibili"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &["bilibili.com", "b23.tv"]
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--user-agent".to_string(),
            DESKTOP_UA.to_string(),
            "--referer".to_string(),
            "https://www.bilibili.com/".to_string(),
            "--sleep-interval".to_string(),
            "1".to_string(),
            "--max-sleep-interval".to_string(),
            "3".to_string(),
        ];
        args.extend(header_args(&[("Referer", "https://www.bilibili.com/")]));
        args
    }
}

pub struct Douyin;

impl PlatformDownloader for Douyin {
    fn platform_name(&self) -> &'static str {
        "Douyin/TikTok"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &["douyin.com", "tiktok.com", "vm.tiktok.com"]
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--user-agent".to_string(),
            MOBILE_UA.to_string(),
            "--sleep-interval".to_string(),
            "2".to_string(),
            "--max-sleep-interval".to_string(),
            "5".to_string(),
        ];
        args.extend(retry_args(15, 5));
        args
    }
}

pub struct Twitter;

impl PlatformDownloader for Twitter {
    fn platform_name(&self) -> &'static str {
        "Twitter/X"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &["twitter.com", "x.com", "t.co"]
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        vec!["--user-agent".to_string(), DESKTOP_UA.to_string()]
    }
}

pub struct Tencent;

impl PlatformDownloader for Tencent {
    fn platform_name(&self) -> &'static str {
        "Tencent Video"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &["v.qq.com", "film.qq.com", "tv.qq.com"]
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--user-agent".to_string(),
            DESKTOP_UA.to_string(),
            "--referer".to_string(),
            "https://v.qq.com/".to_string(),
            "--sleep-interval".to_string(),
            "1".to_string(),
            "--max-sleep-interval".to_string(),
            "3".to_string(),
        ];
        args.extend(header_args(&[("Referer", "https://v.qq.com/")]));
        args
    }
}

pub struct Youku;

impl PlatformDownloader for Youku {
    fn platform_name(&self) -> &'static str {
        "Youku"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &["youku.com", "v.youku.com"]
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--user-agent".to_string(),
            DESKTOP_UA.to_string(),
            "--referer".to_string(),
            "https://www.youku.com/".to_string(),
            "--sleep-interval".to_string(),
            "1".to_string(),
            "--max-sleep-interval".to_string(),
            "3".to_string(),
        ];
        args.extend(header_args(&[("Referer", "https://www.youku.com/")]));
        args
    }
}

pub struct Xiaohongshu;

impl PlatformDownloader for Xiaohongshu {
    fn platform_name(&self) -> &'static str {
        "Xiaohongshu"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &["xiaohongshu.com", "xhslink.com"]
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--user-agent".to_string(),
            MOBILE_UA.to_string(),
            "--referer".to_string(),
            "https://www.xiaohongshu.com/".to_string(),
            "--sleep-interval".to_string(),
            "2".to_string(),
            "--max-sleep-interval".to_string(),
            "5".to_string(),
        ];
        args.extend(header_args(&[
            ("Referer", "https://www.xiaohongshu.com/"),
            ("X-Requested-With", "XMLHttpRequest"),
        ]));
        args.extend(retry_args(15, 5));
        args
    }
}

pub struct WeChat;

impl PlatformDownloader for WeChat {
    fn platform_name(&self) -> &'static str {
        "WeChat Channels"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &["channels.weixin.qq.com", "mp.weixin.qq.com", "weixin.qq.com"]
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--user-agent".to_string(),
            WECHAT_UA.to_string(),
            "--referer".to_string(),
            "https://channels.weixin.qq.com/".to_string(),
            "--sleep-interval".to_string(),
            "2".to_string(),
            "--max-sleep-interval".to_string(),
            "5".to_string(),
        ];
        args.extend(header_args(&[
            ("Referer", "https://channels.weixin.qq.com/"),
            ("X-Requested-With", "com.tencent.mm"),
        ]));
        args.extend(retry_args(15, 5));
        args
    }
}

/// Fallback for any site yt-dlp itself can extract
pub struct Generic;

impl PlatformDownloader for Generic {
    fn platform_name(&self) -> &'static str {
        "Generic"
    }

    fn supported_domains(&self) -> &'static [&'static str] {
        &[]
    }

    fn supports_url(&self, _url: &str) -> bool {
        true
    }

    fn extra_args(&self, _options: &DownloadOptions) -> Vec<String> {
        vec![
            "--user-agent".to_string(),
            DESKTOP_UA.to_string(),
            "--sleep-interval".to_string(),
            "1".to_string(),
            "--max-sleep-interval".to_string(),
            "3".to_string(),
        ]
    }
}

//! 图片地址规范化 (URL Canonicalizer)
//!
//! 纯函数：内容图片判定 + 全分辨率改写，无任何 I/O。

use url::Url;

use crate::core::model::CanonicalImageUrl;
use crate::utils::to_absolute_url;

/// 车辆图片 CDN 域名
const IMAGE_HOSTS: &[&str] = &["cs.copart.com", "vis.copart.com"];
/// 站点主域名；其余子域只有命中内容路径才算图片
const SITE_DOMAIN: &str = "copart.com";
/// 车辆图片路径特征
const IMAGE_PATH_MARKERS: &[&str] = &["/vhl/", "/lpp/"];
/// 装饰/广告/图标特征，优先级高于包含规则
const EXCLUSION_MARKERS: &[&str] = &[
    "logo",
    "flag",
    "banner",
    "sprite",
    "icon",
    "watermark",
    "/ads/",
    "/ad/",
    "adserver",
    "adservice",
    "doubleclick",
    "googlesyndication",
];
/// 矢量与循环动画格式
const EXCLUDED_EXTENSIONS: &[&str] = &["svg", "gif"];
/// 降采样后缀，统一改写为 `_ful`
const REDUCED_SUFFIXES: &[&str] = &["_thumb", "_thb", "_sm", "_l"];
const FULL_SUFFIX: &str = "_ful";
const REWRITABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// 协议相对地址提升为 https
fn promote_scheme(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => raw.to_string(),
    }
}

/// 判断是否为真实内容图片
pub fn is_content_image(raw: &str) -> bool {
    let Ok(url) = Url::parse(&promote_scheme(raw)) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let path = url.path().to_ascii_lowercase();

    let excluded = EXCLUSION_MARKERS
        .iter()
        .any(|m| host.contains(m) || path.contains(m))
        || extension_of(&path).is_some_and(|ext| EXCLUDED_EXTENSIONS.contains(&ext));
    if excluded {
        return false;
    }

    if IMAGE_HOSTS.contains(&host.as_str()) {
        return true;
    }
    is_site_host(&host) && IMAGE_PATH_MARKERS.iter().any(|m| path.contains(m))
}

/// 按域名标签匹配，`notcopart.com` 之类的仿冒域名不算
fn is_site_host(host: &str) -> bool {
    host == SITE_DOMAIN
        || host
            .strip_suffix(SITE_DOMAIN)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// 规范化为全分辨率地址 (幂等)
pub fn canonicalize(raw: &str) -> CanonicalImageUrl {
    let promoted = promote_scheme(raw);
    let Ok(mut url) = Url::parse(&promoted) else {
        return CanonicalImageUrl::new_unchecked(promoted);
    };

    if let Some(rewritten) = rewrite_reduced_suffix(url.path()) {
        url.set_path(&rewritten);
    }
    CanonicalImageUrl::new_unchecked(url.to_string())
}

/// 解析相对地址、过滤非内容图片并规范化
pub fn content_url(base: &Url, raw: &str) -> Option<CanonicalImageUrl> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }
    let absolute = to_absolute_url(base, &promote_scheme(raw));
    is_content_image(&absolute).then(|| canonicalize(&absolute))
}

fn extension_of(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext)
}

fn rewrite_reduced_suffix(path: &str) -> Option<String> {
    let (dir, file) = path.rsplit_once('/')?;
    let (stem, ext) = file.rsplit_once('.')?;
    if !REWRITABLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        return None;
    }

    let lower = stem.to_ascii_lowercase();
    let suffix = REDUCED_SUFFIXES.iter().find(|s| lower.ends_with(*s))?;
    let base = &stem[..stem.len() - suffix.len()];
    if base.is_empty() {
        return None;
    }
    Some(format!("{}/{}{}.{}", dir, base, FULL_SUFFIX, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "//cs.copart.com/v1/AUTH_svc.pdoc00001/lpp/0923/abc123_thb.jpg",
        "https://cs.copart.com/v1/AUTH_svc.pdoc00001/lpp/0923/abc123_sm.jpg",
        "https://cs.copart.com/v1/AUTH_svc.pdoc00001/lpp/0923/abc123_l.JPG",
        "https://cs.copart.com/v1/AUTH_svc.pdoc00001/lpp/0923/abc123_thumb.jpg?v=2",
        "https://cs.copart.com/v1/AUTH_svc.pdoc00001/lpp/0923/abc123_ful.jpg",
        "https://vis.copart.com/VHL/60925615/photo_hrs.webp",
        "https://cs.copart.com/lpp/no-extension",
    ];

    #[test]
    fn promotes_protocol_relative() {
        let url = canonicalize("//cs.copart.com/lpp/a_ful.jpg");
        assert_eq!(url.as_str(), "https://cs.copart.com/lpp/a_ful.jpg");
    }

    #[test]
    fn rewrites_reduced_variants_to_full() {
        for raw in &SAMPLES[..4] {
            let url = canonicalize(raw);
            assert!(url.as_str().contains("abc123_ful."), "{} -> {}", raw, url);
        }
        assert!(canonicalize(SAMPLES[3]).as_str().ends_with("_ful.jpg?v=2"));
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for raw in SAMPLES {
            let once = canonicalize(raw);
            let twice = canonicalize(once.as_str());
            assert_eq!(once, twice, "{}", raw);
        }
    }

    #[test]
    fn suffix_only_matches_at_end_of_stem() {
        let url = canonicalize("https://cs.copart.com/lpp/small_lot.jpg");
        assert_eq!(url.as_str(), "https://cs.copart.com/lpp/small_lot.jpg");
        let url = canonicalize("https://cs.copart.com/lpp/_sm.jpg");
        assert_eq!(url.as_str(), "https://cs.copart.com/lpp/_sm.jpg");
    }

    #[test]
    fn accepts_image_host_content() {
        assert!(is_content_image(SAMPLES[0]));
        assert!(is_content_image(SAMPLES[5]));
        assert!(is_content_image("https://www.copart.com/VHL/123/a.jpg"));
    }

    #[test]
    fn site_decoration_and_lookalike_hosts_are_rejected() {
        let rejected = [
            "https://www.copart.com/images/payment-visa.png",
            "https://www.copart.com/content/us/en/member-benefits-hero.jpg",
            "https://copart.attacker.example/x.jpg",
            "https://notcopart.example/x.jpg",
            "https://notcopart.com/lpp/0923/a.jpg",
            "https://img.example.net/VHL/123/a.jpg",
        ];
        for url in rejected {
            assert!(!is_content_image(url), "{}", url);
        }
    }

    #[test]
    fn rejects_foreign_and_malformed() {
        assert!(!is_content_image("https://cdn.example.net/photos/a.jpg"));
        assert!(!is_content_image("not a url"));
        assert!(!is_content_image("data:image/png;base64,AAAA"));
        assert!(!is_content_image("ftp://cs.copart.com/a.jpg"));
    }

    #[test]
    fn exclusion_takes_precedence() {
        let both = [
            "https://cs.copart.com/content/copart-logo_thb.jpg",
            "https://cs.copart.com/images/flags/us.png",
            "https://cs.copart.com/static/banner-spring.jpg",
            "https://cs.copart.com/static/lot-details-sprite.png",
            "https://cs.copart.com/static/vhl/icon-camera.png",
            "https://cs.copart.com/VHL/123/loader.svg",
            "https://cs.copart.com/VHL/123/spinner.gif",
            "https://cs.copart.com/ads/VHL/creative.jpg",
            "https://copart.doubleclick.net/VHL/pixel.jpg",
        ];
        for url in both {
            assert!(!is_content_image(url), "{}", url);
        }
    }

    #[test]
    fn content_url_resolves_and_filters() {
        let base = Url::parse("https://www.copart.com/lot/62228515/clean-title").unwrap();
        let got = content_url(&base, "//cs.copart.com/lpp/x_thb.jpg").unwrap();
        assert_eq!(got.as_str(), "https://cs.copart.com/lpp/x_ful.jpg");

        // 相对地址继承列表页域名
        let got = content_url(&base, "/VHL/1/y_sm.jpg").unwrap();
        assert_eq!(got.as_str(), "https://www.copart.com/VHL/1/y_ful.jpg");

        assert!(content_url(&base, "/content/logo.png").is_none());
        assert!(content_url(&base, "  ").is_none());
    }
}

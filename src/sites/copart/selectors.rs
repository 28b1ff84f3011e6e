//! Copart 定位器集合
//!
//! 每个逻辑目标一条候选链，按特异性从高到低排列。

use std::sync::OnceLock;

use crate::interfaces::locator::{Locator, LocatorChain};

/// 站点定位器集合
pub struct SiteLocators {
    /// 列表页已渲染出图片
    pub page_ready: LocatorChain,
    /// "See all photos" 入口
    pub open_gallery: LocatorChain,
    /// 画廊弹层已打开的标志元素
    pub gallery_marker: LocatorChain,
    /// "X of Y" 计数器
    pub counter: LocatorChain,
    /// 轮播中的缩略图
    pub thumbnails: LocatorChain,
    /// 缩略图翻页按钮
    pub next_page: LocatorChain,
    /// 回退提取时的页面图片
    pub page_images: LocatorChain,
}

static LOCATORS: OnceLock<SiteLocators> = OnceLock::new();

impl SiteLocators {
    /// 获取全局定位器实例
    pub fn get() -> &'static SiteLocators {
        LOCATORS.get_or_init(|| SiteLocators {
            page_ready: LocatorChain::new("page-ready", vec![Locator::css("img")]),
            open_gallery: LocatorChain::new(
                "open-gallery",
                vec![
                    Locator::Classes {
                        scope: None,
                        tag: Some("span"),
                        classes: &["p-cursor-pointer", "p-fs-14", "see-all-photos-block"],
                    },
                    Locator::test_hook("see-all-photos"),
                    Locator::classes(None, &["see-all-photos-block"]),
                    Locator::attribute_contains(Some("button"), "aria-label", "See all"),
                    Locator::text("button", "See all"),
                    Locator::attribute_contains(Some("button"), "aria-label", "photo"),
                    Locator::text("span", "Photos"),
                ],
            ),
            gallery_marker: LocatorChain::new(
                "gallery-marker",
                vec![
                    Locator::css("#zoomImgElement"),
                    Locator::css(".image-galleria-dialog img"),
                    Locator::classes(None, &["gallery-main-image"]),
                    Locator::test_hook("main-image"),
                ],
            ),
            counter: LocatorChain::new(
                "counter",
                vec![Locator::classes(Some("span"), &["nav-count"])],
            ),
            thumbnails: LocatorChain::new(
                "thumbnails",
                vec![
                    Locator::scoped_classes(
                        ".image-galleria-dialog .p-galleria-thumbnail-item",
                        Some("img"),
                        &["p-galleria-img-thumbnail"],
                    ),
                    Locator::css(".p-galleria-thumbnail-item img"),
                    Locator::classes(None, &["thumbnail-image"]),
                    Locator::test_hook("thumbnail"),
                ],
            ),
            next_page: LocatorChain::new(
                "next-page",
                vec![
                    Locator::scoped_classes(
                        ".image-galleria-dialog .galleria-thumbnail-controls",
                        Some("span"),
                        &["lot-details-sprite", "thumbnail-next-image-icon"],
                    ),
                    Locator::classes(None, &["thumbnail-next-image-icon"]),
                    Locator::classes(None, &["p-galleria-thumbnail-next"]),
                    Locator::test_hook("next-thumbnail"),
                ],
            ),
            page_images: LocatorChain::new("page-images", vec![Locator::css("img")]),
        })
    }
}

/// 图片来源属性的读取顺序 (懒加载属性优先)
pub const IMAGE_SOURCE_ATTRIBUTES: &[&str] = &["data-original", "data-src", "src"];

/// 缩略图只读 `src`
pub const THUMBNAIL_SOURCE_ATTRIBUTE: &str = "src";

pub mod download;
pub mod gallery;
pub mod locator;
pub mod navigation;
pub mod pagination;
pub mod pipeline;
pub mod timing;

pub use download::DownloadPipeline;
pub use gallery::{GalleryEngine, GalleryReport};
pub use locator::LocatorResolver;
pub use navigation::{NavigationController, NavigationOutcome};
pub use pagination::{GalleryState, PaginationCursor, page_ceiling, parse_counter};
pub use pipeline::{ListingReport, Scraper, extract_with};
pub use timing::{HumanTiming, ZeroTiming};

pub mod fetcher;
pub mod locator;
pub mod renderer;
pub mod timing;

pub use fetcher::ImageFetcher;
pub use locator::{Locator, LocatorChain, Query};
pub use renderer::{BoundingBox, PageRenderer, Point};
pub use timing::{PathStep, TimingStrategy};

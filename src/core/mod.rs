pub mod config;
pub mod error;
pub mod event;
pub mod model;

pub use config::AppConfig;
pub use error::{Result, ScrapeError};
pub use event::{EventReceiver, EventSender, ScrapeEvent, create_event_channel};
pub use model::{CanonicalImageUrl, DownloadOutcome, ExtractionResult, ListingReference};

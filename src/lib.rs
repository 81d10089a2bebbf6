pub mod api;
pub mod config;
pub mod error;
pub mod notifier;
pub mod scanner;
pub mod storage;
pub mod types;

pub use api::{ListingSource, VintedClient, VintedSource};
pub use config::{Config, ScanSettings};
pub use error::{Result, ScannerError};
pub use notifier::{NotificationDispatcher, NotificationSink};
pub use scanner::{CycleReport, ListingScanner};
pub use storage::SeenListings;
pub use types::{Listing, Price};

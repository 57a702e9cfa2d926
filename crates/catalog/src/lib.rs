pub mod classifier;
pub mod fetcher;


pub use classifier::{CatalogEntry, CatalogSummary};
pub use fetcher::{CatalogSource, EpicCatalogClient, FetchError};

//! Website ingestions: lifecycle rows, the crawl persistence seam, the
//! supervised background runner, and the request-path service layer.

pub mod models;
pub mod runner;
pub mod service;
pub mod store;

pub use models::{IngestionStatus, PageStatus, WebsiteIngestion, WebsitePage};
pub use runner::{IngestionJob, IngestionRunner};
pub use service::IngestionService;
pub use store::{IngestionStore, PgIngestionStore};

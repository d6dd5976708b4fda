pub mod embedded_state;
pub mod engine;
pub mod http;
pub mod normalizer;
pub mod otomoto;
pub mod pagination;
pub mod traits;
pub mod types;

pub use engine::{ExtractionEngine, ExtractionReport, StopReason};
pub use http::{HttpFetcher, UserAgentPool};
pub use otomoto::OtomotoAdapter;
pub use traits::{HeaderProvider, PageFetcher, SourceAdapter};

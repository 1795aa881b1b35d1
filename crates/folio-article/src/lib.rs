//! Article view orchestration.
//!
//! Renders one encyclopedia article into an embedded rendering surface:
//! resolves the article's addresses ([`address`]), routes document and
//! sub-resource requests through a cache-backed fetcher ([`fetcher`]),
//! loads the lead image independently of the document ([`lead_image`]),
//! and bridges events raised by the rendered content back into native
//! state ([`bridge`]). The [`Orchestrator`] coordinates all of it for one
//! article; the [`NavigationStack`] holds the articles opened by
//! following links.

pub mod address;
pub mod alert;
pub mod bridge;
pub mod fetcher;
pub mod image;
pub mod lead_image;
pub mod metadata;
pub mod nav;
pub mod orchestrator;
pub mod reveal;
pub mod state;
pub mod surface;

#[cfg(test)]
pub(crate) mod test_utils;

// -----------------------------------------------------------------------
// Public re-exports
// -----------------------------------------------------------------------

pub use address::{ArticleKey, ArticleReference, Endpoint, Url};
pub use alert::{AlertSink, LogAlertSink};
pub use bridge::{BridgeEventHandler, InboundEvent, MessageBridge};
pub use fetcher::{CachedContentFetcher, ContentFetcher, ResourceRequest, ResourceResponse};
pub use lead_image::{ImageFetcher, ThreadedImageFetcher};
pub use metadata::{ArticleMetadata, MemoryMetadataStore, MetadataStore, SaveAffordance};
pub use nav::NavigationStack;
pub use orchestrator::{ArticleDeps, EventOutcome, Orchestrator};
pub use state::{ProgressIndicator, ViewState};
pub use surface::{ProcessPool, RenderingSurface, SurfaceConfiguration, SurfaceId, ViewFactory};

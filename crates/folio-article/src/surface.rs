//! Rendering surface boundary.
//!
//! The surface is an external component (an embedded web view or a
//! headless stand-in) that renders the article document. The orchestrator
//! talks to it through [`RenderingSurface`] and obtains one per article
//! from a [`ViewFactory`], together with the chrome it drives (progress
//! indicator, save affordance).
//!
//! Each surface is created from a [`SurfaceConfiguration`]: the shared
//! [`ProcessPool`], the registry of custom-scheme handlers the surface
//! must route requests through, and the [`SurfaceId`] the host tags the
//! surface's inbound messages with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::address::Url;
use crate::fetcher::{ContentFetcher, ResourceRequest};
use crate::image::{DecodedImage, LeadImageFrame};
use crate::metadata::SaveAffordance;
use crate::reveal::PendingVisualHandoff;
use crate::state::ProgressIndicator;

// -----------------------------------------------------------------------
// Process pool
// -----------------------------------------------------------------------

static PROCESS_POOL: OnceLock<Arc<ProcessPool>> = OnceLock::new();

/// Process-wide rendering resource shared by every surface.
///
/// Initialized once at startup with [`ProcessPool::global`] and handed to
/// each orchestrator by `Arc`, never looked up implicitly.
#[derive(Debug)]
pub struct ProcessPool {
    surfaces_configured: AtomicU64,
}

impl ProcessPool {
    /// The process-wide pool, created on first call.
    pub fn global() -> Arc<ProcessPool> {
        Arc::clone(PROCESS_POOL.get_or_init(|| {
            log::debug!("Initializing rendering process pool");
            Arc::new(ProcessPool {
                surfaces_configured: AtomicU64::new(0),
            })
        }))
    }

    /// Number of surface configurations built against this pool.
    pub fn surfaces_configured(&self) -> u64 {
        self.surfaces_configured.load(Ordering::Relaxed)
    }
}

// -----------------------------------------------------------------------
// Surface configuration
// -----------------------------------------------------------------------

static NEXT_SURFACE: AtomicU64 = AtomicU64::new(1);

/// Identity of one article surface, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// How a surface must be built: shared pool plus custom-scheme routing.
#[derive(Clone)]
pub struct SurfaceConfiguration {
    id: SurfaceId,
    process_pool: Arc<ProcessPool>,
    scheme_handlers: Vec<Arc<dyn ContentFetcher>>,
}

impl SurfaceConfiguration {
    pub fn new(process_pool: Arc<ProcessPool>) -> Self {
        process_pool
            .surfaces_configured
            .fetch_add(1, Ordering::Relaxed);
        Self {
            id: SurfaceId(NEXT_SURFACE.fetch_add(1, Ordering::Relaxed)),
            process_pool,
            scheme_handlers: Vec::new(),
        }
    }

    /// Identity of the surface built from this configuration.
    pub fn surface_id(&self) -> SurfaceId {
        self.id
    }

    pub fn process_pool(&self) -> &Arc<ProcessPool> {
        &self.process_pool
    }

    /// Route requests under the handler's scheme to it. A later handler
    /// for the same scheme replaces the earlier one.
    pub fn register_scheme_handler(&mut self, handler: Arc<dyn ContentFetcher>) {
        let scheme = handler.scheme().to_lowercase();
        self.scheme_handlers
            .retain(|h| !h.scheme().eq_ignore_ascii_case(&scheme));
        log::debug!("Registered scheme handler for {scheme}://");
        self.scheme_handlers.push(handler);
    }

    /// The handler responsible for `url`, if its scheme is registered.
    pub fn handler_for(&self, url: &Url) -> Option<&Arc<dyn ContentFetcher>> {
        self.scheme_handlers
            .iter()
            .find(|h| h.scheme().eq_ignore_ascii_case(&url.scheme))
    }

    pub fn handles_scheme(&self, scheme: &str) -> bool {
        self.scheme_handlers
            .iter()
            .any(|h| h.scheme().eq_ignore_ascii_case(scheme))
    }

    pub fn registered_schemes(&self) -> Vec<&str> {
        self.scheme_handlers.iter().map(|h| h.scheme()).collect()
    }
}

impl std::fmt::Debug for SurfaceConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceConfiguration")
            .field("id", &self.id)
            .field("schemes", &self.registered_schemes())
            .finish()
    }
}

// -----------------------------------------------------------------------
// Boundaries
// -----------------------------------------------------------------------

/// The surface an article renders into.
///
/// Inbound messages from the content environment do not come back through
/// this trait; the host tags them with the surface's [`SurfaceId`] and
/// delivers them to the orchestrator that owns the surface.
pub trait RenderingSurface {
    /// Start loading the top-level document.
    fn load(&mut self, request: &ResourceRequest);

    /// Deliver an encoded message to the content environment.
    fn post_message(&mut self, message: &str);

    fn alpha(&self) -> f32;
    fn set_alpha(&mut self, alpha: f32);

    /// Width available to the lead image, in points.
    fn width(&self) -> u32;

    fn show_lead_image(&mut self, image: &DecodedImage, frame: LeadImageFrame);

    /// Cover the surface with a transition placeholder.
    fn insert_placeholder(&mut self, handoff: &PendingVisualHandoff);
    fn remove_placeholder(&mut self, handoff: &PendingVisualHandoff);
}

/// Builds the per-article views an orchestrator drives.
pub trait ViewFactory {
    fn make_surface(&self, configuration: SurfaceConfiguration) -> Box<dyn RenderingSurface>;
    fn make_progress_indicator(&self) -> Box<dyn ProgressIndicator>;
    fn make_save_affordance(&self) -> Box<dyn SaveAffordance>;
}

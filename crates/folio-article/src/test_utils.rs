//! Shared test doubles.
//!
//! Every double records what it was asked to do behind an `Rc<RefCell>`,
//! so a test can hand a boxed clone to the code under test and inspect
//! the original afterwards.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use folio_types::config::ArticleConfig;
use folio_types::error::{FolioError, Result};

use crate::address::{ArticleKey, Url};
use crate::alert::AlertSink;
use crate::bridge::{InboundEvent, encode_event};
use crate::fetcher::{ContentFetcher, ContentType, ResourceRequest, ResourceResponse};
use crate::image::{DecodedImage, LeadImageFrame};
use crate::lead_image::{ImageFetcher, ImageReply};
use crate::metadata::{
    MemoryMetadataStore, MetadataStore, MetadataSubscription, SaveAffordance, SharedMetadata,
};
use crate::orchestrator::ArticleDeps;
use crate::reveal::PendingVisualHandoff;
use crate::state::ProgressIndicator;
use crate::surface::{ProcessPool, RenderingSurface, SurfaceConfiguration, ViewFactory};

pub const CAT: &str = "https://en.wikipedia.org/wiki/Cat";

/// Width of every surface built by [`TestViewFactory`].
pub const SURFACE_WIDTH: u32 = 320;

// -----------------------------------------------------------------------
// Bridge messages
// -----------------------------------------------------------------------

pub fn document_ready() -> String {
    encode_event(&InboundEvent::DocumentReady).unwrap()
}

pub fn lead_image_discovered(source: &str, width: Option<u32>, height: Option<u32>) -> String {
    encode_event(&InboundEvent::LeadImageDiscovered {
        source: source.to_string(),
        width,
        height,
    })
    .unwrap()
}

pub fn link_activated(title: &str) -> String {
    encode_event(&InboundEvent::LinkActivated {
        title: title.to_string(),
    })
    .unwrap()
}

// -----------------------------------------------------------------------
// Surface
// -----------------------------------------------------------------------

/// A recorded surface call. Alpha changes are tracked separately.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Load(String),
    PostMessage(String),
    ShowLeadImage {
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },
    InsertPlaceholder(u64),
    RemovePlaceholder(u64),
}

#[derive(Debug)]
struct SurfaceLog {
    calls: Vec<SurfaceCall>,
    alpha: f32,
}

#[derive(Debug, Clone)]
pub struct RecordingSurface {
    log: Rc<RefCell<SurfaceLog>>,
    width: u32,
}

impl RecordingSurface {
    pub fn new(width: u32) -> Self {
        Self {
            log: Rc::new(RefCell::new(SurfaceLog {
                calls: Vec::new(),
                alpha: 1.0,
            })),
            width,
        }
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.log.borrow().calls.clone()
    }

    pub fn alpha_value(&self) -> f32 {
        self.log.borrow().alpha
    }

    /// Placeholders currently covering the surface.
    pub fn placeholders(&self) -> usize {
        let log = self.log.borrow();
        let inserted = log
            .calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::InsertPlaceholder(_)))
            .count();
        let removed = log
            .calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::RemovePlaceholder(_)))
            .count();
        inserted - removed
    }

    fn record(&self, call: SurfaceCall) {
        self.log.borrow_mut().calls.push(call);
    }
}

impl RenderingSurface for RecordingSurface {
    fn load(&mut self, request: &ResourceRequest) {
        self.record(SurfaceCall::Load(request.url.clone()));
    }

    fn post_message(&mut self, message: &str) {
        self.record(SurfaceCall::PostMessage(message.to_string()));
    }

    fn alpha(&self) -> f32 {
        self.log.borrow().alpha
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.log.borrow_mut().alpha = alpha;
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn show_lead_image(&mut self, image: &DecodedImage, frame: LeadImageFrame) {
        self.record(SurfaceCall::ShowLeadImage {
            width: image.width,
            height: image.height,
            frame_width: frame.width,
            frame_height: frame.height,
        });
    }

    fn insert_placeholder(&mut self, handoff: &PendingVisualHandoff) {
        self.record(SurfaceCall::InsertPlaceholder(handoff.id()));
    }

    fn remove_placeholder(&mut self, handoff: &PendingVisualHandoff) {
        self.record(SurfaceCall::RemovePlaceholder(handoff.id()));
    }
}

// -----------------------------------------------------------------------
// Chrome
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressCall {
    Start,
    Stop,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingProgress(Rc<RefCell<Vec<ProgressCall>>>);

impl RecordingProgress {
    pub fn calls(&self) -> Vec<ProgressCall> {
        self.0.borrow().clone()
    }
}

impl ProgressIndicator for RecordingProgress {
    fn start(&mut self) {
        self.0.borrow_mut().push(ProgressCall::Start);
    }

    fn stop(&mut self) {
        self.0.borrow_mut().push(ProgressCall::Stop);
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSave(Rc<RefCell<Vec<bool>>>);

impl RecordingSave {
    pub fn states(&self) -> Vec<bool> {
        self.0.borrow().clone()
    }
}

impl SaveAffordance for RecordingSave {
    fn set_saved(&mut self, is_saved: bool) {
        self.0.borrow_mut().push(is_saved);
    }
}

#[derive(Debug, Default)]
pub struct RecordingAlerts(RefCell<Vec<(String, bool, bool)>>);

impl RecordingAlerts {
    pub fn shown(&self) -> Vec<(String, bool, bool)> {
        self.0.borrow().clone()
    }
}

impl AlertSink for RecordingAlerts {
    fn show_error(&self, error: &FolioError, sticky: bool, dismiss_previous: bool) {
        self.0
            .borrow_mut()
            .push((error.to_string(), sticky, dismiss_previous));
    }
}

/// Builds recording views and keeps a handle to each.
#[derive(Default)]
pub struct TestViewFactory {
    surfaces: RefCell<Vec<RecordingSurface>>,
    configurations: RefCell<Vec<SurfaceConfiguration>>,
    progress: RefCell<Vec<RecordingProgress>>,
    saves: RefCell<Vec<RecordingSave>>,
}

impl TestViewFactory {
    pub fn surfaces_made(&self) -> usize {
        self.surfaces.borrow().len()
    }

    pub fn surface(&self, index: usize) -> RecordingSurface {
        self.surfaces.borrow()[index].clone()
    }

    pub fn configuration(&self, index: usize) -> SurfaceConfiguration {
        self.configurations.borrow()[index].clone()
    }

    pub fn progress(&self, index: usize) -> RecordingProgress {
        self.progress.borrow()[index].clone()
    }

    pub fn save(&self, index: usize) -> RecordingSave {
        self.saves.borrow()[index].clone()
    }
}

impl ViewFactory for TestViewFactory {
    fn make_surface(&self, configuration: SurfaceConfiguration) -> Box<dyn RenderingSurface> {
        let surface = RecordingSurface::new(SURFACE_WIDTH);
        self.surfaces.borrow_mut().push(surface.clone());
        self.configurations.borrow_mut().push(configuration);
        Box::new(surface)
    }

    fn make_progress_indicator(&self) -> Box<dyn ProgressIndicator> {
        let progress = RecordingProgress::default();
        self.progress.borrow_mut().push(progress.clone());
        Box::new(progress)
    }

    fn make_save_affordance(&self) -> Box<dyn SaveAffordance> {
        let save = RecordingSave::default();
        self.saves.borrow_mut().push(save.clone());
        Box::new(save)
    }
}

// -----------------------------------------------------------------------
// Fetchers and stores
// -----------------------------------------------------------------------

/// Image fetcher whose replies the test completes by hand.
#[derive(Default)]
pub struct ManualImageFetcher {
    pending: RefCell<VecDeque<ImageReply>>,
    addresses: RefCell<Vec<Url>>,
    started: Cell<usize>,
}

impl ManualImageFetcher {
    pub fn started(&self) -> usize {
        self.started.get()
    }

    pub fn addresses(&self) -> Vec<Url> {
        self.addresses.borrow().clone()
    }

    pub fn take_next(&self) -> Option<ImageReply> {
        self.pending.borrow_mut().pop_front()
    }

    /// Complete the oldest pending fetch. Panics when none is pending.
    pub fn complete_next(&self, bytes: Result<Vec<u8>>) {
        let reply = self.take_next().expect("no pending image fetch");
        reply.complete(bytes);
    }
}

impl ImageFetcher for ManualImageFetcher {
    fn begin(&self, reply: ImageReply) {
        self.started.set(self.started.get() + 1);
        self.addresses.borrow_mut().push(reply.address().clone());
        self.pending.borrow_mut().push_back(reply);
    }
}

/// Content fetcher answering every request with the same body.
pub struct StaticFetcher {
    scheme: String,
    body: String,
}

impl StaticFetcher {
    pub fn new(scheme: &str, body: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            body: body.to_string(),
        }
    }
}

impl ContentFetcher for StaticFetcher {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn resolve(&self, request: &ResourceRequest) -> Result<ResourceResponse> {
        Ok(ResourceResponse {
            url: request.url.clone(),
            content_type: ContentType::Html,
            body: self.body.clone().into_bytes(),
            status: 200,
        })
    }
}

/// Metadata store that refuses to persist.
#[derive(Default)]
pub struct ReadOnlyMetadataStore(MemoryMetadataStore);

impl MetadataStore for ReadOnlyMetadataStore {
    fn fetch_or_create(&self, key: &ArticleKey) -> Option<SharedMetadata> {
        self.0.fetch_or_create(key)
    }

    fn persist(&self, key: &ArticleKey) -> Result<()> {
        Err(FolioError::Persistence(format!("{key}: read-only store")))
    }

    fn subscribe(&self, key: &ArticleKey) -> MetadataSubscription {
        self.0.subscribe(key)
    }

    fn unsubscribe(&self, subscription: MetadataSubscription) {
        self.0.unsubscribe(subscription);
    }
}

// -----------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------

/// Orchestrator dependencies wired to recording doubles.
pub struct Harness {
    pub deps: ArticleDeps,
    pub views: Rc<TestViewFactory>,
    pub images: Rc<ManualImageFetcher>,
    pub store: Rc<MemoryMetadataStore>,
    pub alerts: Rc<RecordingAlerts>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ArticleConfig::default())
    }

    pub fn with_config(config: ArticleConfig) -> Self {
        let views = Rc::new(TestViewFactory::default());
        let images = Rc::new(ManualImageFetcher::default());
        let store = Rc::new(MemoryMetadataStore::new());
        let alerts = Rc::new(RecordingAlerts::default());
        let deps = ArticleDeps {
            fetcher: Arc::new(StaticFetcher::new(&config.scheme, "<html></html>")),
            config: Rc::new(config),
            images: Rc::clone(&images) as Rc<dyn ImageFetcher>,
            metadata: Rc::clone(&store) as Rc<dyn MetadataStore>,
            views: Rc::clone(&views) as Rc<dyn ViewFactory>,
            alerts: Rc::clone(&alerts) as Rc<dyn AlertSink>,
            process_pool: ProcessPool::global(),
        };
        Self {
            deps,
            views,
            images,
            store,
            alerts,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

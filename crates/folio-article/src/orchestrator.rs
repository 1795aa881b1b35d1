//! Article orchestrator.
//!
//! One [`Orchestrator`] per displayed article. It owns the rendering
//! surface, the bridge to the content environment, the view state machine
//! and the lead image loader, and coordinates the two independent fetches
//! (document and lead image) into a single reveal.
//!
//! Lifecycle: [`Orchestrator::new`] checks the construction preconditions,
//! [`Orchestrator::setup`] builds the surface and starts loading, and the
//! host then feeds it bridge messages ([`Orchestrator::handle_message`]),
//! background completions ([`Orchestrator::poll`]) and animation time
//! ([`Orchestrator::tick`]) on one thread until [`Orchestrator::teardown`]
//! or drop.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use folio_types::config::{ArticleConfig, RenderParameters};
use folio_types::error::{FolioError, Result};

use crate::address::{
    ArticleKey, ArticleReference, Endpoint, Url, article_reference, document_address,
    lead_image_address,
};
use crate::alert::AlertSink;
use crate::bridge::{BridgeEventHandler, InboundEvent, MessageBridge};
use crate::fetcher::{ContentFetcher, ResourceRequest};
use crate::image::{DecodedImage, layout_lead_image};
use crate::lead_image::{
    ImageFetcher, ImageOrigin, LeadImageCompletion, LeadImageLoader, LeadImageOutcome,
};
use crate::metadata::{MetadataStore, MetadataSubscription, SaveAffordance, SharedMetadata};
use crate::reveal::{PendingVisualHandoff, RevealController};
use crate::state::{ViewState, ViewStateMachine};
use crate::surface::{
    ProcessPool, RenderingSurface, SurfaceConfiguration, SurfaceId, ViewFactory,
};

/// Everything an orchestrator needs from its host. Cloned into every
/// orchestrator opened from a link.
#[derive(Clone)]
pub struct ArticleDeps {
    pub config: Rc<ArticleConfig>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub images: Rc<dyn ImageFetcher>,
    pub metadata: Rc<dyn MetadataStore>,
    pub views: Rc<dyn ViewFactory>,
    pub alerts: Rc<dyn AlertSink>,
    pub process_pool: Arc<ProcessPool>,
}

/// What handling one bridge event led to.
pub enum EventOutcome {
    Handled,
    /// Dropped (wrong state, duplicate, or unresolvable).
    Ignored,
    /// A link asks for another article; the host pushes it.
    Navigate(Box<Orchestrator>),
}

impl fmt::Debug for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventOutcome::Handled => f.write_str("Handled"),
            EventOutcome::Ignored => f.write_str("Ignored"),
            EventOutcome::Navigate(next) => write!(f, "Navigate({})", next.reference()),
        }
    }
}

pub struct Orchestrator {
    reference: ArticleReference,
    key: ArticleKey,
    deps: ArticleDeps,
    metadata: SharedMetadata,
    render_parameters: RenderParameters,
    surface_config: SurfaceConfiguration,
    surface: Option<Box<dyn RenderingSurface>>,
    bridge: MessageBridge,
    state: ViewStateMachine,
    lead_image: LeadImageLoader,
    reveal: RevealController,
    save_affordance: Box<dyn SaveAffordance>,
    subscription: Option<MetadataSubscription>,
    document_request: Option<ResourceRequest>,
    torn_down: bool,
}

impl Orchestrator {
    /// Build an orchestrator for a canonical article address.
    ///
    /// Returns `None` when the address yields no language or no metadata
    /// record can be obtained. Nothing is requested in that case.
    pub fn new(address: &str, deps: ArticleDeps) -> Option<Self> {
        match ArticleReference::parse(address) {
            Ok(reference) => Self::with_reference(reference, deps),
            Err(e) => {
                let err = FolioError::ConstructionPrecondition(e.to_string());
                log::error!("Cannot open {address}: {err}");
                None
            },
        }
    }

    pub fn with_reference(reference: ArticleReference, deps: ArticleDeps) -> Option<Self> {
        let key = reference.key();
        let Some(metadata) = deps.metadata.fetch_or_create(&key) else {
            let err = FolioError::ConstructionPrecondition(format!("no metadata record for {key}"));
            log::error!("Cannot open {reference}: {err}");
            return None;
        };

        if !deps.fetcher.scheme().eq_ignore_ascii_case(&deps.config.scheme) {
            log::warn!(
                "Content fetcher serves {}:// but documents load from {}://",
                deps.fetcher.scheme(),
                deps.config.scheme
            );
        }
        let mut surface_config = SurfaceConfiguration::new(Arc::clone(&deps.process_pool));
        surface_config.register_scheme_handler(Arc::clone(&deps.fetcher));

        let bridge = MessageBridge::new();
        let state = ViewStateMachine::new(deps.views.make_progress_indicator());

        log::info!("Opening article {reference}");
        Some(Self {
            render_parameters: deps.config.render_parameters(),
            lead_image: LeadImageLoader::new(Rc::clone(&deps.images)),
            reveal: RevealController::new(deps.config.reveal_duration_ms),
            save_affordance: deps.views.make_save_affordance(),
            reference,
            key,
            metadata,
            surface_config,
            surface: None,
            bridge,
            state,
            subscription: None,
            document_request: None,
            torn_down: false,
            deps,
        })
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Subscribe to metadata updates, build the surface, send the render
    /// parameters and start loading.
    pub fn setup(&mut self) -> Result<()> {
        if self.torn_down {
            return Err(FolioError::State("setup after teardown".to_string()));
        }
        if self.surface.is_some() {
            return Err(FolioError::State(format!("{} is already set up", self.reference)));
        }
        self.subscription = Some(self.deps.metadata.subscribe(&self.key));

        let mut surface = self.deps.views.make_surface(self.surface_config.clone());
        self.reveal.hide(&mut *surface);
        self.bridge.setup(&mut *surface, &self.render_parameters)?;
        self.surface = Some(surface);

        self.refresh_save_affordance();
        self.load()
    }

    /// Enter `Loading`, start the known lead image and request the
    /// document. At most one document request is ever outstanding.
    pub fn load(&mut self) -> Result<()> {
        if self.surface.is_none() {
            return Err(FolioError::State("load before setup".to_string()));
        }
        if self.document_request.is_some() {
            return Err(FolioError::State(format!(
                "document request for {} already outstanding",
                self.reference
            )));
        }
        self.state.enter(ViewState::Loading)?;
        self.load_initial_lead_image();

        let address = match document_address(
            &self.reference,
            Endpoint::MobileHtml,
            &self.deps.config.scheme,
        ) {
            Ok(address) => address,
            Err(e) => {
                log::error!("Cannot resolve document for {}: {e}", self.reference);
                self.deps.alerts.show_error(&e, true, true);
                return Err(e);
            },
        };

        let request = ResourceRequest::new(address.to_string());
        log::info!("Loading {}", request.url);
        if let Some(surface) = self.surface.as_deref_mut() {
            surface.load(&request);
        }
        self.document_request = Some(request);
        Ok(())
    }

    /// Unsubscribe, stop the progress indicator and stop accepting
    /// background completions. Idempotent; also run on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(subscription) = self.subscription.take() {
            self.deps.metadata.unsubscribe(subscription);
        }
        if let Err(e) = self.state.enter(ViewState::Unknown) {
            log::warn!("Teardown of {}: {e}", self.reference);
        }
        self.lead_image.shutdown();
        if let Some(surface) = self.surface.as_deref_mut() {
            self.reveal.clear_handoff(surface);
        }
        self.document_request = None;
        log::debug!("Tore down {}", self.reference);
    }

    // -- Event loop ---------------------------------------------------------

    /// Decode and handle one message from the content environment.
    pub fn handle_message(&mut self, raw: &str) -> EventOutcome {
        MessageBridge::dispatch(raw, self).unwrap_or(EventOutcome::Ignored)
    }

    /// Apply background completions and metadata notifications.
    pub fn poll(&mut self) {
        for completion in self.lead_image.poll() {
            self.apply_lead_image(completion);
        }
        let updated = self
            .subscription
            .as_ref()
            .is_some_and(|subscription| subscription.drain() > 0);
        if updated {
            self.refresh_save_affordance();
        }
    }

    /// Advance the reveal animation.
    pub fn tick(&mut self, dt_ms: u32) {
        if let Some(surface) = self.surface.as_deref_mut() {
            self.reveal.tick(surface, dt_ms);
        }
    }

    /// Start fading the surface in. Returns `false` when a fade-in has
    /// already started (or there is no surface yet).
    pub fn reveal(&mut self) -> bool {
        match self.surface.as_deref_mut() {
            Some(surface) => self.reveal.reveal(surface),
            None => false,
        }
    }

    // -- User actions -------------------------------------------------------

    /// Mark the article saved or unsaved. Persistence is best-effort.
    pub fn toggle_save(&mut self, should_save: bool) {
        self.metadata.borrow_mut().is_saved = should_save;
        if let Err(e) = self.deps.metadata.persist(&self.key) {
            log::debug!("Save state for {} not persisted: {e}", self.key);
        }
    }

    /// Cover the surface with the image an outgoing view hands over and
    /// use it as the lead image.
    pub fn prepare_incoming_transition(&mut self, image: DecodedImage) -> bool {
        let Some(surface) = self.surface.as_deref_mut() else {
            log::debug!("No surface yet for {}; skipping transition", self.reference);
            return false;
        };
        let handoff = PendingVisualHandoff::new(image.clone());
        if !self.reveal.install_handoff(surface, handoff) {
            return false;
        }
        let frame = layout_lead_image(surface.width(), self.deps.config.lead_image_height);
        surface.show_lead_image(&image, frame);
        self.lead_image.adopt(image);
        true
    }

    // -- Accessors ----------------------------------------------------------

    pub fn reference(&self) -> &ArticleReference {
        &self.reference
    }

    /// Identity of this article's surface, fixed at construction.
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_config.surface_id()
    }

    pub fn state(&self) -> ViewState {
        self.state.state()
    }

    pub fn state_history(&self) -> &[ViewState] {
        self.state.history()
    }

    pub fn render_parameters(&self) -> &RenderParameters {
        &self.render_parameters
    }

    pub fn is_set_up(&self) -> bool {
        self.surface.is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn is_revealed(&self) -> bool {
        self.reveal.is_revealed()
    }

    pub fn is_animating(&self) -> bool {
        self.reveal.is_animating()
    }

    pub fn reveal_count(&self) -> u32 {
        self.reveal.reveal_count()
    }

    pub fn lead_image(&self) -> Option<&DecodedImage> {
        self.lead_image.image()
    }

    pub fn lead_image_in_flight(&self) -> Option<&Url> {
        self.lead_image.in_flight_address()
    }

    pub fn document_request(&self) -> Option<&ResourceRequest> {
        self.document_request.as_ref()
    }

    pub fn is_saved(&self) -> bool {
        self.metadata.borrow().is_saved
    }

    // -- Internals ----------------------------------------------------------

    fn load_initial_lead_image(&mut self) {
        let (source, original_width) = {
            let metadata = self.metadata.borrow();
            (
                metadata.lead_image_source.clone(),
                metadata.lead_image_original_width,
            )
        };
        let Some(source) = source else {
            return;
        };
        match lead_image_address(
            self.reference.address(),
            &source,
            self.deps.config.lead_image_width,
            original_width,
        ) {
            Some(address) => {
                self.lead_image.load(address, ImageOrigin::Metadata);
            },
            None => log::debug!("Unusable lead image source {source:?}"),
        }
    }

    fn apply_lead_image(&mut self, completion: LeadImageCompletion) {
        match completion.outcome {
            LeadImageOutcome::Loaded(image) => {
                if let Some(surface) = self.surface.as_deref_mut() {
                    let frame =
                        layout_lead_image(surface.width(), self.deps.config.lead_image_height);
                    surface.show_lead_image(&image, frame);
                }
                self.reveal();
            },
            LeadImageOutcome::Failed(e) => {
                log::error!("Error loading lead image {}: {e}", completion.address);
                if completion.origin == ImageOrigin::Metadata {
                    self.reveal();
                }
            },
        }
    }

    fn refresh_save_affordance(&mut self) {
        let is_saved = self.metadata.borrow().is_saved;
        self.save_affordance.set_saved(is_saved);
    }

    fn document_ready(&mut self) -> EventOutcome {
        if self.state.state() != ViewState::Loading {
            log::warn!(
                "documentReady for {} in state {}; ignoring",
                self.reference,
                self.state.state()
            );
            return EventOutcome::Ignored;
        }
        if let Err(e) = self.state.enter(ViewState::Data) {
            log::warn!("{e}");
            return EventOutcome::Ignored;
        }
        self.document_request = None;
        log::info!("Document ready: {}", self.reference);
        self.reveal();
        EventOutcome::Handled
    }

    fn lead_image_discovered(&mut self, source: &str, width: Option<u32>) -> EventOutcome {
        if self.lead_image.is_busy() {
            log::debug!("Lead image already present or loading; ignoring {source:?}");
            return EventOutcome::Ignored;
        }
        let Some(address) = lead_image_address(
            self.reference.address(),
            source,
            self.deps.config.lead_image_width,
            width,
        ) else {
            log::debug!("Unusable lead image source {source:?}");
            return EventOutcome::Ignored;
        };
        if self.lead_image.load(address, ImageOrigin::Discovered) {
            EventOutcome::Handled
        } else {
            EventOutcome::Ignored
        }
    }

    fn link_activated(&mut self, title: &str) -> EventOutcome {
        if self.state.state() != ViewState::Data {
            log::warn!("Link {title:?} activated before the document was ready; ignoring");
            return EventOutcome::Ignored;
        }
        let reference = match article_reference(self.reference.host(), title) {
            Ok(reference) => reference,
            Err(e) => {
                let err = FolioError::LinkResolution(e.to_string());
                log::error!("Dropping link {title:?}: {err}");
                return EventOutcome::Ignored;
            },
        };
        match Orchestrator::with_reference(reference, self.deps.clone()) {
            Some(next) => EventOutcome::Navigate(Box::new(next)),
            None => {
                log::error!("Dropping link {title:?}: could not open the article");
                EventOutcome::Ignored
            },
        }
    }
}

impl BridgeEventHandler for Orchestrator {
    type Outcome = EventOutcome;

    fn handle_event(&mut self, event: InboundEvent) -> EventOutcome {
        if self.torn_down {
            log::debug!("{} after teardown; ignoring", event.kind());
            return EventOutcome::Ignored;
        }
        match event {
            InboundEvent::DocumentReady => self.document_ready(),
            InboundEvent::LeadImageDiscovered { source, width, .. } => {
                self.lead_image_discovered(&source, width)
            },
            InboundEvent::LinkActivated { title } => self.link_activated(&title),
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("reference", &self.reference.to_string())
            .field("state", &self.state.state())
            .field("revealed", &self.reveal.is_revealed())
            .finish()
    }
}

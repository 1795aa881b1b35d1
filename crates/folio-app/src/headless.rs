//! Headless views for the command-line host.
//!
//! [`HeadlessSurface`] fetches the document through the surface's scheme
//! handler on a worker thread and plays the content environment's part:
//! it reports the first image it finds as the lead image, then signals
//! `documentReady`. Messages go to the main loop over a channel, tagged
//! with the [`SurfaceId`] of the surface that raised them.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use folio_article::bridge::encode_event;
use folio_article::fetcher::ResourceRequest;
use folio_article::image::{DecodedImage, LeadImageFrame};
use folio_article::reveal::PendingVisualHandoff;
use folio_article::{
    InboundEvent, ProgressIndicator, RenderingSurface, SaveAffordance, SurfaceConfiguration,
    SurfaceId, Url, ViewFactory,
};

/// A bridge message and the surface it was raised on.
pub type Outbound = (SurfaceId, String);

/// Width the headless surface pretends to have.
const SURFACE_WIDTH: u32 = 640;

pub struct HeadlessViewFactory {
    outbox: Sender<Outbound>,
}

impl HeadlessViewFactory {
    pub fn new(outbox: Sender<Outbound>) -> Self {
        Self { outbox }
    }
}

impl ViewFactory for HeadlessViewFactory {
    fn make_surface(&self, configuration: SurfaceConfiguration) -> Box<dyn RenderingSurface> {
        Box::new(HeadlessSurface {
            configuration,
            outbox: self.outbox.clone(),
            alpha: 1.0,
        })
    }

    fn make_progress_indicator(&self) -> Box<dyn ProgressIndicator> {
        Box::new(LogProgress)
    }

    fn make_save_affordance(&self) -> Box<dyn SaveAffordance> {
        Box::new(LogSaveAffordance)
    }
}

pub struct HeadlessSurface {
    configuration: SurfaceConfiguration,
    outbox: Sender<Outbound>,
    alpha: f32,
}

impl RenderingSurface for HeadlessSurface {
    fn load(&mut self, request: &ResourceRequest) {
        let Some(url) = Url::parse(&request.url) else {
            log::error!("Surface cannot parse {}", request.url);
            return;
        };
        let Some(handler) = self.configuration.handler_for(&url) else {
            log::error!("No scheme handler for {}://", url.scheme);
            return;
        };
        let handler = Arc::clone(handler);
        let request = request.clone();
        let outbox = self.outbox.clone();
        let id = self.configuration.surface_id();
        let spawned = std::thread::Builder::new()
            .name("document".to_string())
            .spawn(move || match handler.resolve(&request) {
                Ok(response) if response.is_success() => {
                    let html = String::from_utf8_lossy(&response.body);
                    log::info!("Fetched document ({} bytes)", response.body.len());
                    let mut events = Vec::new();
                    if let Some((source, width)) = find_lead_image(&html) {
                        events.push(InboundEvent::LeadImageDiscovered {
                            source,
                            width,
                            height: None,
                        });
                    }
                    events.push(InboundEvent::DocumentReady);
                    for event in events {
                        match encode_event(&event) {
                            Ok(raw) => {
                                if outbox.send((id, raw)).is_err() {
                                    return;
                                }
                            },
                            Err(e) => log::error!("Cannot encode {}: {e}", event.kind()),
                        }
                    }
                },
                Ok(response) => {
                    log::error!("Document fetch returned status {}", response.status);
                },
                Err(e) => log::error!("Document fetch failed: {e}"),
            });
        if let Err(e) = spawned {
            log::error!("Could not spawn document worker: {e}");
        }
    }

    fn post_message(&mut self, message: &str) {
        log::debug!("-> content: {message}");
    }

    fn alpha(&self) -> f32 {
        self.alpha
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    fn width(&self) -> u32 {
        SURFACE_WIDTH
    }

    fn show_lead_image(&mut self, image: &DecodedImage, frame: LeadImageFrame) {
        log::info!(
            "Lead image {}x{} in {}x{} frame",
            image.width,
            image.height,
            frame.width,
            frame.height
        );
    }

    fn insert_placeholder(&mut self, handoff: &PendingVisualHandoff) {
        log::debug!("Placeholder {} inserted", handoff.id());
    }

    fn remove_placeholder(&mut self, handoff: &PendingVisualHandoff) {
        log::debug!("Placeholder {} removed", handoff.id());
    }
}

struct LogProgress;

impl ProgressIndicator for LogProgress {
    fn start(&mut self) {
        log::info!("Loading...");
    }

    fn stop(&mut self) {
        log::debug!("Progress stopped");
    }
}

struct LogSaveAffordance;

impl SaveAffordance for LogSaveAffordance {
    fn set_saved(&mut self, is_saved: bool) {
        log::info!("Saved for later: {is_saved}");
    }
}

/// First `<img>` in the document: its `src` and optional `width`.
pub fn find_lead_image(html: &str) -> Option<(String, Option<u32>)> {
    let start = html.find("<img")?;
    let tag_end = html[start..].find('>').map_or(html.len(), |i| start + i);
    let tag = &html[start..tag_end];
    let source = attribute(tag, "src")?;
    let width = attribute(tag, "width").and_then(|w| w.parse().ok());
    Some((source, width))
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    let needle = format!(" {name}=\"");
    let start = tag.find(&needle)? + needle.len();
    let end = tag[start..].find('"')? + start;
    let value = &tag[start..end];
    (!value.is_empty()).then(|| value.to_string())
}

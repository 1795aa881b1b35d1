//! Lead image loading.
//!
//! The hero image is fetched independently of the document. A fetch is
//! started through an [`ImageFetcher`], which answers through an
//! [`ImageReply`] from whatever thread it likes; the reply decodes the
//! bytes and sends the result down a channel that the owning orchestrator
//! drains on its own thread. The reply holds only the channel sender, so
//! a torn-down orchestrator is never kept alive by a late fetch: its
//! receiver is gone and the result is dropped.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use folio_types::error::{FolioError, Result};

use crate::address::Url;
use crate::fetcher::NetworkClient;
use crate::image::{DecodedImage, decode_image};

/// Where a lead image address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    /// Known from the article's metadata record when the load started.
    Metadata,
    /// Discovered by the rendered document.
    Discovered,
}

/// Result of one lead image fetch.
#[derive(Debug)]
pub enum LeadImageOutcome {
    Loaded(DecodedImage),
    Failed(FolioError),
}

/// A completed fetch, as applied by the loader.
#[derive(Debug)]
pub struct LeadImageCompletion {
    pub address: Url,
    pub origin: ImageOrigin,
    pub outcome: LeadImageOutcome,
}

struct Delivery {
    ticket: u64,
    completion: LeadImageCompletion,
}

/// One-shot reply handle for a started fetch.
///
/// `Send`, so fetchers may complete it from a worker thread. Dropping it
/// without calling [`ImageReply::complete`] (a worker that could not be
/// spawned, or one that panicked) delivers a failure, so the loader never
/// stays busy on a fetch that can no longer finish.
pub struct ImageReply {
    ticket: u64,
    address: Url,
    origin: ImageOrigin,
    sender: Option<Sender<Delivery>>,
}

impl ImageReply {
    /// The address being fetched.
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Decode the fetched bytes (on the calling thread) and deliver the
    /// result to the loader.
    pub fn complete(mut self, bytes: Result<Vec<u8>>) {
        let outcome = match bytes.and_then(|b| decode_image(&b)) {
            Ok(image) => LeadImageOutcome::Loaded(image),
            Err(e) => LeadImageOutcome::Failed(e),
        };
        self.deliver(outcome);
    }

    fn deliver(&mut self, outcome: LeadImageOutcome) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        let delivery = Delivery {
            ticket: self.ticket,
            completion: LeadImageCompletion {
                address: self.address.clone(),
                origin: self.origin,
                outcome,
            },
        };
        if sender.send(delivery).is_err() {
            log::debug!("Lead image arrived after its view was torn down; dropping");
        }
    }
}

impl Drop for ImageReply {
    fn drop(&mut self) {
        if self.sender.is_some() {
            log::warn!("Lead image fetch for {} ended without a result", self.address);
            self.deliver(LeadImageOutcome::Failed(FolioError::ImageLoad(format!(
                "fetch abandoned: {}",
                self.address
            ))));
        }
    }
}

/// Starts lead image fetches.
///
/// Implementations must not block the caller; they complete the reply
/// later, or drop it to report a failure.
pub trait ImageFetcher {
    fn begin(&self, reply: ImageReply);
}

/// Fetches lead images on a worker thread per request.
pub struct ThreadedImageFetcher {
    client: Arc<dyn NetworkClient>,
}

impl ThreadedImageFetcher {
    pub fn new(client: Arc<dyn NetworkClient>) -> Self {
        Self { client }
    }
}

impl ImageFetcher for ThreadedImageFetcher {
    fn begin(&self, reply: ImageReply) {
        let client = Arc::clone(&self.client);
        let spawned = std::thread::Builder::new()
            .name("lead-image".to_string())
            .spawn(move || {
                let bytes = client.get(reply.address()).and_then(|resp| {
                    if resp.is_success() {
                        Ok(resp.body)
                    } else {
                        Err(FolioError::ImageLoad(format!(
                            "status {} for {}",
                            resp.status, resp.url
                        )))
                    }
                });
                reply.complete(bytes);
            });
        if let Err(e) = spawned {
            log::error!("Could not spawn lead image worker: {e}");
        }
    }
}

// -----------------------------------------------------------------------
// LeadImageLoader
// -----------------------------------------------------------------------

/// Guards and tracks the single lead image of one orchestrator.
pub struct LeadImageLoader {
    fetcher: Rc<dyn ImageFetcher>,
    sender: Sender<Delivery>,
    receiver: Option<Receiver<Delivery>>,
    in_flight: Option<(u64, Url)>,
    image: Option<DecodedImage>,
    next_ticket: u64,
}

impl LeadImageLoader {
    pub fn new(fetcher: Rc<dyn ImageFetcher>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            fetcher,
            sender,
            receiver: Some(receiver),
            in_flight: None,
            image: None,
            next_ticket: 0,
        }
    }

    /// True when an image is present or a fetch is outstanding.
    pub fn is_busy(&self) -> bool {
        self.image.is_some() || self.in_flight.is_some()
    }

    pub fn image(&self) -> Option<&DecodedImage> {
        self.image.as_ref()
    }

    pub fn in_flight_address(&self) -> Option<&Url> {
        self.in_flight.as_ref().map(|(_, url)| url)
    }

    /// Start a fetch. Returns `false` (and does nothing) when busy or
    /// shut down.
    pub fn load(&mut self, address: Url, origin: ImageOrigin) -> bool {
        if self.is_busy() || self.receiver.is_none() {
            return false;
        }
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        log::debug!("Loading lead image {address} ({origin:?})");
        self.in_flight = Some((ticket, address.clone()));
        self.fetcher.begin(ImageReply {
            ticket,
            address,
            origin,
            sender: Some(self.sender.clone()),
        });
        true
    }

    /// Use an image handed over by a navigation transition.
    pub fn adopt(&mut self, image: DecodedImage) {
        self.in_flight = None;
        self.image = Some(image);
    }

    /// Apply every completion that has arrived for the current fetch.
    /// Completions for superseded fetches are discarded.
    pub fn poll(&mut self) -> Vec<LeadImageCompletion> {
        let Some(receiver) = self.receiver.as_ref() else {
            return Vec::new();
        };
        let mut applied = Vec::new();
        for delivery in receiver.try_iter() {
            let current = matches!(self.in_flight, Some((t, _)) if t == delivery.ticket);
            if !current {
                log::debug!(
                    "Discarding stale lead image for {}",
                    delivery.completion.address
                );
                continue;
            }
            self.in_flight = None;
            if let LeadImageOutcome::Loaded(image) = &delivery.completion.outcome {
                self.image = Some(image.clone());
            }
            applied.push(delivery.completion);
        }
        applied
    }

    /// Stop accepting completions. Fetches still running complete into a
    /// closed channel.
    pub fn shutdown(&mut self) {
        self.receiver = None;
        self.in_flight = None;
    }
}

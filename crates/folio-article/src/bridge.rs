//! Native/content message bridge.
//!
//! Messages cross the bridge as a versioned JSON envelope:
//!
//! ```text
//! {"version":1,"kind":"documentReady","payload":{}}
//! ```
//!
//! Outbound, the only message is `setup`, carrying the render parameters,
//! and it is sent exactly once per surface. Inbound messages decode into
//! [`InboundEvent`]s; unknown kinds and malformed payloads are logged and
//! dropped, never fatal.

use serde::{Deserialize, Serialize};

use folio_types::config::RenderParameters;
use folio_types::error::{FolioError, Result};

use crate::surface::RenderingSurface;

/// Envelope version spoken by this side of the bridge.
pub const PROTOCOL_VERSION: u32 = 1;

pub const KIND_SETUP: &str = "setup";
pub const KIND_DOCUMENT_READY: &str = "documentReady";
pub const KIND_LEAD_IMAGE_DISCOVERED: &str = "leadImageDiscovered";
pub const KIND_LINK_ACTIVATED: &str = "linkActivated";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LeadImagePayload {
    source: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LinkPayload {
    title: String,
}

/// A decoded content-to-native message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// The document finished loading.
    DocumentReady,
    /// The document found a lead image the native side does not know yet.
    LeadImageDiscovered {
        source: String,
        width: Option<u32>,
        height: Option<u32>,
    },
    /// The user followed an internal article link.
    LinkActivated { title: String },
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::DocumentReady => KIND_DOCUMENT_READY,
            InboundEvent::LeadImageDiscovered { .. } => KIND_LEAD_IMAGE_DISCOVERED,
            InboundEvent::LinkActivated { .. } => KIND_LINK_ACTIVATED,
        }
    }
}

/// Receives decoded inbound events.
pub trait BridgeEventHandler {
    type Outcome;

    fn handle_event(&mut self, event: InboundEvent) -> Self::Outcome;
}

/// One surface's end of the bridge.
#[derive(Debug, Default)]
pub struct MessageBridge {
    setup_sent: bool,
}

impl MessageBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set_up(&self) -> bool {
        self.setup_sent
    }

    /// Send the one-time `setup` message to the surface.
    pub fn setup(
        &mut self,
        surface: &mut dyn RenderingSurface,
        parameters: &RenderParameters,
    ) -> Result<()> {
        if self.setup_sent {
            return Err(FolioError::Bridge(
                "setup already sent to this surface".to_string(),
            ));
        }
        let message = encode_setup(parameters)?;
        surface.post_message(&message);
        self.setup_sent = true;
        log::debug!("Bridge setup sent (theme {})", parameters.theme);
        Ok(())
    }

    /// Decode one inbound message.
    pub fn decode(raw: &str) -> Result<InboundEvent> {
        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| FolioError::Bridge(format!("malformed envelope: {e}")))?;
        if envelope.version != PROTOCOL_VERSION {
            return Err(FolioError::Bridge(format!(
                "unsupported protocol version {}",
                envelope.version
            )));
        }
        match envelope.kind.as_str() {
            KIND_DOCUMENT_READY => Ok(InboundEvent::DocumentReady),
            KIND_LEAD_IMAGE_DISCOVERED => {
                let p: LeadImagePayload = payload(&envelope)?;
                Ok(InboundEvent::LeadImageDiscovered {
                    source: p.source,
                    width: p.width,
                    height: p.height,
                })
            },
            KIND_LINK_ACTIVATED => {
                let p: LinkPayload = payload(&envelope)?;
                Ok(InboundEvent::LinkActivated { title: p.title })
            },
            KIND_SETUP => Err(FolioError::Bridge(
                "setup is only sent to the content".to_string(),
            )),
            other => Err(FolioError::Bridge(format!("unknown message kind {other:?}"))),
        }
    }

    /// Decode `raw` and hand it to `handler`. Returns `None` when the
    /// message was dropped.
    pub fn dispatch<H: BridgeEventHandler + ?Sized>(
        raw: &str,
        handler: &mut H,
    ) -> Option<H::Outcome> {
        match Self::decode(raw) {
            Ok(event) => {
                log::trace!("Bridge message: {}", event.kind());
                Some(handler.handle_event(event))
            },
            Err(e) => {
                log::warn!("Dropping bridge message: {e}");
                None
            },
        }
    }
}

fn payload<T: for<'de> Deserialize<'de>>(envelope: &Envelope) -> Result<T> {
    serde_json::from_value(envelope.payload.clone()).map_err(|e| {
        FolioError::Bridge(format!("bad {} payload: {e}", envelope.kind))
    })
}

/// Encode the `setup` message.
pub fn encode_setup(parameters: &RenderParameters) -> Result<String> {
    encode(KIND_SETUP, serde_json::to_value(parameters)?)
}

/// Encode an inbound-kind event. Used by surfaces that generate events
/// natively rather than from script.
pub fn encode_event(event: &InboundEvent) -> Result<String> {
    let payload = match event {
        InboundEvent::DocumentReady => serde_json::json!({}),
        InboundEvent::LeadImageDiscovered {
            source,
            width,
            height,
        } => serde_json::json!({ "source": source, "width": width, "height": height }),
        InboundEvent::LinkActivated { title } => serde_json::json!({ "title": title }),
    };
    encode(event.kind(), payload)
}

fn encode(kind: &str, payload: serde_json::Value) -> Result<String> {
    let envelope = Envelope {
        version: PROTOCOL_VERSION,
        kind: kind.to_string(),
        payload,
    };
    Ok(serde_json::to_string(&envelope)?)
}

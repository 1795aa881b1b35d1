//! Surface reveal: easing, tweens and the fade-in controller.
//!
//! The surface starts transparent and fades in once, when the first of
//! these happens: the document is ready, the initial lead image loads, or
//! the initial lead image fails. A navigation transition may cover the
//! surface with a placeholder; it stays until the fade-in completes or a
//! newer placeholder supersedes it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::image::DecodedImage;
use crate::surface::RenderingSurface;

/// Easing curves.
///
/// Input `t` is clamped to `[0.0, 1.0]`.
pub mod easing {
    pub fn ease_out_quad(t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        t * (2.0 - t)
    }
}

/// Interpolates between two values over a fixed duration.
#[derive(Debug, Clone)]
pub struct Tween {
    pub start: f32,
    pub end: f32,
    pub duration_ms: u32,
    pub elapsed_ms: u32,
    pub easing: fn(f32) -> f32,
}

impl Tween {
    pub fn new(start: f32, end: f32, duration_ms: u32, easing: fn(f32) -> f32) -> Self {
        Self {
            start,
            end,
            duration_ms,
            elapsed_ms: 0,
            easing,
        }
    }

    /// Advance by `dt_ms` and return the current value.
    pub fn tick(&mut self, dt_ms: u32) -> f32 {
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms).min(self.duration_ms);
        self.value()
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }

    pub fn value(&self) -> f32 {
        let t = if self.duration_ms > 0 {
            self.elapsed_ms as f32 / self.duration_ms as f32
        } else {
            1.0
        };
        self.start + (self.end - self.start) * (self.easing)(t)
    }
}

// -----------------------------------------------------------------------
// Visual handoff
// -----------------------------------------------------------------------

static NEXT_HANDOFF: AtomicU64 = AtomicU64::new(1);

/// Placeholder installed over an incoming surface during a navigation
/// transition, showing the image the previous view handed over.
#[derive(Debug, Clone)]
pub struct PendingVisualHandoff {
    id: u64,
    pub image: DecodedImage,
}

impl PendingVisualHandoff {
    pub fn new(image: DecodedImage) -> Self {
        Self {
            id: NEXT_HANDOFF.fetch_add(1, Ordering::Relaxed),
            image,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

// -----------------------------------------------------------------------
// RevealController
// -----------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Phase {
    Hidden,
    Revealing(Tween),
    Visible,
}

/// Drives the one-time fade-in of a surface.
#[derive(Debug)]
pub struct RevealController {
    phase: Phase,
    duration_ms: u32,
    handoff: Option<PendingVisualHandoff>,
    reveals: u32,
}

impl RevealController {
    pub fn new(duration_ms: u32) -> Self {
        Self {
            phase: Phase::Hidden,
            duration_ms,
            handoff: None,
            reveals: 0,
        }
    }

    /// Make the surface transparent and wait for a reveal.
    pub fn hide(&mut self, surface: &mut dyn RenderingSurface) {
        surface.set_alpha(0.0);
        self.phase = Phase::Hidden;
    }

    /// Start the fade-in. A no-op (returning `false`) once a fade-in has
    /// started, including while a placeholder is still covering the
    /// surface.
    pub fn reveal(&mut self, surface: &mut dyn RenderingSurface) -> bool {
        if !matches!(self.phase, Phase::Hidden) {
            return false;
        }
        self.reveals += 1;
        log::debug!("Revealing surface over {}ms", self.duration_ms);
        self.phase = Phase::Revealing(Tween::new(
            surface.alpha(),
            1.0,
            self.duration_ms,
            easing::ease_out_quad,
        ));
        if self.duration_ms == 0 {
            self.tick(surface, 0);
        }
        true
    }

    /// Advance the fade-in. Clears the placeholder when it completes.
    pub fn tick(&mut self, surface: &mut dyn RenderingSurface, dt_ms: u32) {
        let Phase::Revealing(tween) = &mut self.phase else {
            return;
        };
        surface.set_alpha(tween.tick(dt_ms));
        if tween.is_finished() {
            self.phase = Phase::Visible;
            if let Some(handoff) = self.handoff.take() {
                surface.remove_placeholder(&handoff);
            }
        }
    }

    /// Cover the surface with a transition placeholder, replacing any
    /// earlier one. Ignored once the surface is fully visible.
    pub fn install_handoff(
        &mut self,
        surface: &mut dyn RenderingSurface,
        handoff: PendingVisualHandoff,
    ) -> bool {
        if matches!(self.phase, Phase::Visible) {
            log::debug!("Surface already visible; skipping transition placeholder");
            return false;
        }
        if let Some(previous) = self.handoff.take() {
            surface.remove_placeholder(&previous);
        }
        surface.insert_placeholder(&handoff);
        self.handoff = Some(handoff);
        true
    }

    /// Remove any placeholder immediately.
    pub fn clear_handoff(&mut self, surface: &mut dyn RenderingSurface) {
        if let Some(handoff) = self.handoff.take() {
            surface.remove_placeholder(&handoff);
        }
    }

    pub fn handoff(&self) -> Option<&PendingVisualHandoff> {
        self.handoff.as_ref()
    }

    /// True once the fade-in has started.
    pub fn is_revealed(&self) -> bool {
        !matches!(self.phase, Phase::Hidden)
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.phase, Phase::Revealing(_))
    }

    /// Number of fade-ins started (never more than one per surface).
    pub fn reveal_count(&self) -> u32 {
        self.reveals
    }
}

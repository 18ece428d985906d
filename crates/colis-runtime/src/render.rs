//! Frame rendering pipeline
//!
//! Image frames are decoded on the blocking pool so that decoding never
//! holds up the next message. Every pending decode belongs to one
//! connection: tearing the connection down aborts them and bumps the
//! generation, so a late decode can never draw onto a replaced surface.
//! The generation check and the render happen under one lock, so a bump
//! either waits for an in-flight render or prevents it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use colis_core::ColisError;

/// Display surface size in device pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Viewport { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::new(1280, 720)
    }
}

/// Target rectangle for a frame inside the viewport
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// User-controlled zoom factor, always inside its configured range
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Zoom(f64);

impl Zoom {
    pub fn clamped(value: f64, min: f64, max: f64) -> Self {
        if value.is_nan() {
            return Zoom(min);
        }
        Zoom(value.clamp(min, max))
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

/// Aspect-preserving fit of an image into the viewport, scaled by `zoom`
/// and centred.
pub fn fit_frame(image_width: u32, image_height: u32, viewport: Viewport, zoom: Zoom) -> Placement {
    if image_width == 0 || image_height == 0 {
        return Placement::default();
    }
    let (iw, ih) = (image_width as f64, image_height as f64);
    let (vw, vh) = (viewport.width as f64, viewport.height as f64);

    let scale = (vw / iw).min(vh / ih) * zoom.value();
    let width = iw * scale;
    let height = ih * scale;

    Placement {
        x: (vw - width) / 2.0,
        y: (vh - height) / 2.0,
        width,
        height,
    }
}

/// External display surface
pub trait FrameRenderer: Send + Sync + 'static {
    fn viewport(&self) -> Viewport;
    fn render(&self, frame: &DynamicImage, placement: Placement);
}

/// Renderer without a display: keeps count and the last placement
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    viewport: Viewport,
    rendered: AtomicU64,
    last: Mutex<Option<(u32, u32, Placement)>>,
}

impl HeadlessRenderer {
    pub fn new(viewport: Viewport) -> Self {
        HeadlessRenderer {
            viewport,
            ..HeadlessRenderer::default()
        }
    }

    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::SeqCst)
    }

    /// Image size and placement of the most recent frame
    pub fn last(&self) -> Option<(u32, u32, Placement)> {
        *self.last.lock()
    }
}

impl FrameRenderer for HeadlessRenderer {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn render(&self, frame: &DynamicImage, placement: Placement) {
        self.rendered.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some((frame.width(), frame.height(), placement));
        trace!(w = frame.width(), h = frame.height(), ?placement, "frame rendered");
    }
}

/// Decodes frames and hands them to the renderer, scoped to one connection
pub struct FramePipeline<R: FrameRenderer> {
    renderer: Arc<R>,
    generation: Arc<Mutex<u64>>,
    pending: JoinSet<()>,
}

impl<R: FrameRenderer> FramePipeline<R> {
    pub fn new(renderer: Arc<R>) -> Self {
        FramePipeline {
            renderer,
            generation: Arc::new(Mutex::new(0)),
            pending: JoinSet::new(),
        }
    }

    pub fn renderer(&self) -> &Arc<R> {
        &self.renderer
    }

    /// Current connection generation
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Number of decodes not yet reaped
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queue one encoded frame for decode and render
    pub fn submit(&mut self, data: Bytes, zoom: Zoom) {
        let issued = self.generation();
        let generation = Arc::clone(&self.generation);
        let renderer = Arc::clone(&self.renderer);

        self.pending.spawn(async move {
            let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&data)).await;
            let frame = match decoded {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => {
                    let error = ColisError::ImageDecode(e.to_string());
                    debug!(%error, "undecodable frame dropped");
                    return;
                }
                Err(e) => {
                    trace!(error = %e, "decode task did not complete");
                    return;
                }
            };

            let current = generation.lock();
            if *current != issued {
                trace!(issued, "stale decode discarded");
                return;
            }
            let placement = fit_frame(frame.width(), frame.height(), renderer.viewport(), zoom);
            renderer.render(&frame, placement);
            drop(current);
        });
    }

    /// Forget finished decodes
    pub fn reap(&mut self) {
        while self.pending.try_join_next().is_some() {}
    }

    /// Connection teardown: abort outstanding decodes and invalidate any
    /// that are already past the point of cancellation
    pub fn cancel_pending(&mut self) {
        *self.generation.lock() += 1;
        if !self.pending.is_empty() {
            trace!(count = self.pending.len(), "cancelling pending decodes");
        }
        self.pending.abort_all();
        self.reap();
    }
}

impl<R: FrameRenderer> Drop for FramePipeline<R> {
    fn drop(&mut self) {
        *self.generation.lock() += 1;
    }
}

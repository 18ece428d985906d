//! Stream simulator
//!
//! `ScriptedConnector` stands in for the detector endpoint: every connect
//! call consumes the next scripted step and is timestamped, so tests can
//! check the reconnect schedule on a paused clock.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use tokio::time::Instant;

use colis_core::{ColisError, ColisResult};
use colis_runtime::{FrameRenderer, Placement, Viewport};
use colis_transport::{Connector, MessageSource};
use colis_wire::InboundMessage;

/// How a scripted session ends once its messages are delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closes the connection
    Close,
    /// Transport fault
    Fault,
    /// Stay open without sending anything
    Hold,
}

/// One message and the pause before it
#[derive(Clone, Debug)]
pub struct ScriptedMessage {
    pub after: Duration,
    pub message: InboundMessage,
}

/// Messages delivered over one connection
#[derive(Clone, Debug)]
pub struct ScriptedSession {
    pub messages: Vec<ScriptedMessage>,
    pub end: SessionEnd,
}

impl ScriptedSession {
    pub fn new(end: SessionEnd) -> Self {
        ScriptedSession {
            messages: Vec::new(),
            end,
        }
    }

    /// Session that closes immediately
    pub fn closed() -> Self {
        Self::new(SessionEnd::Close)
    }

    /// Append a message sent `after` the previous one
    pub fn then(mut self, after: Duration, message: InboundMessage) -> Self {
        self.messages.push(ScriptedMessage { after, message });
        self
    }

    /// Append messages at a fixed spacing
    pub fn paced(mut self, spacing: Duration, messages: impl IntoIterator<Item = InboundMessage>) -> Self {
        for message in messages {
            self.messages.push(ScriptedMessage {
                after: spacing,
                message,
            });
        }
        self
    }
}

/// Outcome of one connect attempt
#[derive(Clone, Debug)]
pub enum ConnectStep {
    Accept(ScriptedSession),
    Refuse,
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<ConnectStep>,
    attempts: Vec<Instant>,
}

/// Deterministic connector. Once the script runs out, connect attempts
/// never complete.
#[derive(Clone, Debug, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new(steps: impl IntoIterator<Item = ConnectStep>) -> Self {
        let connector = ScriptedConnector::default();
        for step in steps {
            connector.push(step);
        }
        connector
    }

    /// Connector accepting each session in turn
    pub fn sessions(sessions: impl IntoIterator<Item = ScriptedSession>) -> Self {
        Self::new(sessions.into_iter().map(ConnectStep::Accept))
    }

    pub fn push(&self, step: ConnectStep) {
        self.script.lock().steps.push_back(step);
    }

    /// Instants of every connect attempt so far
    pub fn attempts(&self) -> Vec<Instant> {
        self.script.lock().attempts.clone()
    }

    /// Gaps between consecutive connect attempts
    pub fn attempt_gaps(&self) -> Vec<Duration> {
        let attempts = self.attempts();
        attempts.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().steps.len()
    }
}

impl Connector for ScriptedConnector {
    type Source = ScriptedSource;

    async fn connect(&self) -> ColisResult<ScriptedSource> {
        let step = {
            let mut script = self.script.lock();
            script.attempts.push(Instant::now());
            script.steps.pop_front()
        };

        match step {
            Some(ConnectStep::Accept(session)) => Ok(ScriptedSource {
                messages: session.messages.into(),
                end: session.end,
                closed: false,
            }),
            Some(ConnectStep::Refuse) => Err(ColisError::ConnectionFailed),
            None => std::future::pending().await,
        }
    }

    fn endpoint(&self) -> String {
        "scripted://detector".to_string()
    }
}

/// Source replaying one scripted session
#[derive(Debug)]
pub struct ScriptedSource {
    messages: VecDeque<ScriptedMessage>,
    end: SessionEnd,
    closed: bool,
}

impl ScriptedSource {
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl MessageSource for ScriptedSource {
    async fn next_message(&mut self) -> Option<ColisResult<InboundMessage>> {
        if let Some(next) = self.messages.pop_front() {
            if !next.after.is_zero() {
                tokio::time::sleep(next.after).await;
            }
            return Some(Ok(next.message));
        }

        match self.end {
            SessionEnd::Close => None,
            SessionEnd::Fault => Some(Err(ColisError::TransportError(
                "connection reset by peer".to_string(),
            ))),
            SessionEnd::Hold => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// One frame seen by `RecordingRenderer`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub placement: Placement,
}

/// Renderer that keeps every frame it was given
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    viewport: Viewport,
    frames: Mutex<Vec<RenderedFrame>>,
}

impl RecordingRenderer {
    pub fn new(viewport: Viewport) -> Self {
        RecordingRenderer {
            viewport,
            frames: Mutex::new(Vec::new()),
        }
    }

    pub fn frames(&self) -> Vec<RenderedFrame> {
        self.frames.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl FrameRenderer for RecordingRenderer {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn render(&self, frame: &DynamicImage, placement: Placement) {
        self.frames.lock().push(RenderedFrame {
            width: frame.width(),
            height: frame.height(),
            placement,
        });
    }
}

/// Encode a flat-colour JPEG frame like the ones a detector sends
pub fn jpeg_frame(width: u32, height: u32) -> Bytes {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 150])));
    let mut out = Cursor::new(Vec::new());
    // Writing into memory only fails for unsupported formats
    if image.write_to(&mut out, ImageFormat::Jpeg).is_err() {
        return Bytes::new();
    }
    Bytes::from(out.into_inner())
}

/// Telemetry text in the detector's single-object shape
pub fn dimensions_message(id: u64, length_cm: f64, width_cm: f64, height_cm: f64) -> InboundMessage {
    InboundMessage::text(
        serde_json::json!({
            "type": "dimensions",
            "id": id,
            "length_cm": length_cm,
            "width_cm": width_cm,
            "height_cm": height_cm,
            "length_px": length_cm * 4.0,
            "width_px": width_cm * 4.0,
        })
        .to_string(),
    )
}

//! Connection supervisor
//!
//! Owns the lifecycle of the live stream connection:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> (Closed | Errored) -> Connecting
//! ```
//!
//! Every close, transport fault and failed connect attempt schedules a new
//! attempt after the fixed reconnect delay. There is no retry limit. A zoom
//! change tears the connection down and reconnects at once.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use colis_core::StationConfig;
use colis_transport::{Connector, MessageSource};
use colis_wire::InboundMessage;

use crate::render::{FramePipeline, FrameRenderer, Zoom};
use crate::station::{Dispatch, Station};

/// Connection state as seen by the presentation layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
    Errored,
}

/// Counters kept by the supervisor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Successful connects
    pub connects: u64,
    /// Connect attempts that failed
    pub connect_failures: u64,
    /// Reconnects scheduled after a close or fault
    pub reconnects_scheduled: u64,
    /// Immediate reconnects caused by a zoom change
    pub zoom_reconnects: u64,
    pub messages: u64,
    pub frames: u64,
    pub telemetry: u64,
    pub dropped: u64,
}

/// How one connection ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkOutcome {
    Closed,
    Errored,
    ZoomChanged,
    Shutdown,
}

enum PumpEvent {
    Message(InboundMessage),
    Closed,
    Errored,
    ZoomChanged,
    Shutdown,
}

/// Control side of a running supervisor. Dropping every handle shuts the
/// supervisor down.
#[derive(Clone)]
pub struct SupervisorHandle {
    zoom: Arc<watch::Sender<Zoom>>,
    shutdown: Arc<watch::Sender<bool>>,
    state: watch::Receiver<LinkState>,
    stats: Arc<Mutex<SupervisorStats>>,
    zoom_range: (f64, f64),
}

impl SupervisorHandle {
    /// Change the zoom factor (clamped to the configured range); returns
    /// the value in effect. A changed value reconnects the stream.
    pub fn set_zoom(&self, value: f64) -> f64 {
        let zoom = Zoom::clamped(value, self.zoom_range.0, self.zoom_range.1);
        self.zoom.send_if_modified(|current| {
            if *current == zoom {
                false
            } else {
                *current = zoom;
                true
            }
        });
        zoom.value()
    }

    pub fn zoom(&self) -> f64 {
        self.zoom.borrow().value()
    }

    /// Request shutdown; honoured in every state
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    pub fn stats(&self) -> SupervisorStats {
        *self.stats.lock()
    }
}

/// Drives one connector against the station
pub struct Supervisor<C: Connector, R: FrameRenderer> {
    connector: C,
    station: Arc<Station>,
    frames: FramePipeline<R>,
    zoom: watch::Receiver<Zoom>,
    shutdown: watch::Receiver<bool>,
    state: watch::Sender<LinkState>,
    stats: Arc<Mutex<SupervisorStats>>,
    reconnect_delay: Duration,
}

impl<C: Connector, R: FrameRenderer> Supervisor<C, R> {
    pub fn new(connector: C, station: Arc<Station>, renderer: Arc<R>) -> (Self, SupervisorHandle) {
        let config: &StationConfig = station.config();
        let zoom_range = (config.zoom_min(), config.zoom_max());
        let initial = Zoom::clamped(config.initial_zoom, zoom_range.0, zoom_range.1);
        let reconnect_delay = config.reconnect_delay();

        let (zoom_tx, zoom_rx) = watch::channel(initial);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
        let stats = Arc::new(Mutex::new(SupervisorStats::default()));

        let handle = SupervisorHandle {
            zoom: Arc::new(zoom_tx),
            shutdown: Arc::new(shutdown_tx),
            state: state_rx,
            stats: Arc::clone(&stats),
            zoom_range,
        };

        let supervisor = Supervisor {
            connector,
            station,
            frames: FramePipeline::new(renderer),
            zoom: zoom_rx,
            shutdown: shutdown_rx,
            state: state_tx,
            stats,
            reconnect_delay,
        };

        (supervisor, handle)
    }

    /// Run on the current runtime until shutdown
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Supervise the connection until shutdown is requested
    pub async fn run(mut self) {
        let endpoint = self.connector.endpoint();
        info!(%endpoint, delay = %humantime::format_duration(self.reconnect_delay), "supervisor started");

        let mut attempt: u64 = 0;
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            self.set_state(LinkState::Connecting);

            let connected = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut self.shutdown) => break,
                result = self.connector.connect() => result,
            };

            let outcome = match connected {
                Ok(mut source) => {
                    self.stats.lock().connects += 1;
                    self.station
                        .start_cadence(tokio::time::Instant::now().into_std());
                    self.set_state(LinkState::Connected);
                    // The new connection starts at the current zoom; only
                    // later changes tear it down
                    self.zoom.borrow_and_update();

                    let outcome = self.pump(&mut source).await;
                    source.close().await;
                    self.frames.cancel_pending();
                    outcome
                }
                Err(e) => {
                    self.stats.lock().connect_failures += 1;
                    warn!(%endpoint, error = %e, "connect failed");
                    LinkOutcome::Errored
                }
            };

            match outcome {
                LinkOutcome::Shutdown => break,
                LinkOutcome::ZoomChanged => {
                    self.stats.lock().zoom_reconnects += 1;
                    self.set_state(LinkState::Closed);
                    info!(zoom = self.zoom.borrow().value(), "zoom changed, reconnecting");
                    continue;
                }
                LinkOutcome::Closed => self.set_state(LinkState::Closed),
                LinkOutcome::Errored => self.set_state(LinkState::Errored),
            }

            attempt += 1;
            self.stats.lock().reconnects_scheduled += 1;
            info!(
                attempt,
                delay = %humantime::format_duration(self.reconnect_delay),
                "reconnect scheduled"
            );

            tokio::select! {
                biased;
                _ = shutdown_signalled(&mut self.shutdown) => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.frames.cancel_pending();
        self.set_state(LinkState::Disconnected);
        info!(%endpoint, "supervisor stopped");
    }

    async fn pump(&mut self, source: &mut C::Source) -> LinkOutcome {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut self.shutdown) => PumpEvent::Shutdown,
                changed = self.zoom.changed() => match changed {
                    Ok(()) => PumpEvent::ZoomChanged,
                    // Every handle is gone
                    Err(_) => PumpEvent::Shutdown,
                },
                next = source.next_message() => match next {
                    Some(Ok(message)) => PumpEvent::Message(message),
                    Some(Err(e)) => {
                        warn!(error = %e, "stream fault");
                        PumpEvent::Errored
                    }
                    None => PumpEvent::Closed,
                },
            };

            match event {
                PumpEvent::Message(message) => self.dispatch(message),
                PumpEvent::Closed => return LinkOutcome::Closed,
                PumpEvent::Errored => return LinkOutcome::Errored,
                PumpEvent::ZoomChanged => return LinkOutcome::ZoomChanged,
                PumpEvent::Shutdown => return LinkOutcome::Shutdown,
            }
        }
    }

    fn dispatch(&mut self, message: InboundMessage) {
        let received_at = tokio::time::Instant::now().into_std();
        self.frames.reap();

        let dispatch = self.station.handle_message(message, received_at);
        {
            let mut stats = self.stats.lock();
            stats.messages += 1;
            match &dispatch {
                Dispatch::Frame(_) => stats.frames += 1,
                Dispatch::Merged(_) => stats.telemetry += 1,
                Dispatch::Ignored(_) => stats.dropped += 1,
            }
        }

        if let Dispatch::Frame(bytes) = dispatch {
            let zoom = *self.zoom.borrow();
            self.frames.submit(bytes, zoom);
        }
    }

    fn set_state(&self, state: LinkState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(from = ?previous, to = ?state, "link state");
        } else {
            debug!(?state, "link state unchanged");
        }
    }
}

/// Resolves once shutdown was requested or every handle is gone
async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use colis_core::{ColisError, ColisResult, Timestamp};
    use colis_time::ManualClock;

    use crate::render::HeadlessRenderer;

    enum Step {
        Refuse,
        Serve(Vec<InboundMessage>),
        Hold(Vec<InboundMessage>),
    }

    struct TestConnector {
        script: Mutex<VecDeque<Step>>,
    }

    impl TestConnector {
        fn new(steps: Vec<Step>) -> Self {
            TestConnector {
                script: Mutex::new(steps.into()),
            }
        }
    }

    struct TestSource {
        messages: VecDeque<InboundMessage>,
        hold: bool,
    }

    impl MessageSource for TestSource {
        async fn next_message(&mut self) -> Option<ColisResult<InboundMessage>> {
            match self.messages.pop_front() {
                Some(message) => Some(Ok(message)),
                None if self.hold => std::future::pending().await,
                None => None,
            }
        }

        async fn close(&mut self) {}
    }

    impl Connector for TestConnector {
        type Source = TestSource;

        async fn connect(&self) -> ColisResult<TestSource> {
            let step = self.script.lock().pop_front();
            match step {
                Some(Step::Refuse) => Err(ColisError::ConnectionFailed),
                Some(Step::Serve(messages)) => Ok(TestSource {
                    messages: messages.into(),
                    hold: false,
                }),
                Some(Step::Hold(messages)) => Ok(TestSource {
                    messages: messages.into(),
                    hold: true,
                }),
                None => std::future::pending().await,
            }
        }

        fn endpoint(&self) -> String {
            "test://script".to_string()
        }
    }

    fn start(steps: Vec<Step>) -> (Arc<Station>, SupervisorHandle, JoinHandle<()>) {
        let clock = ManualClock::new(Timestamp::from_millis(1_000));
        let station = Arc::new(Station::new(StationConfig::default(), Arc::new(clock)));
        let renderer = Arc::new(HeadlessRenderer::default());
        let (supervisor, handle) =
            Supervisor::new(TestConnector::new(steps), Arc::clone(&station), renderer);
        (station, handle, supervisor.spawn())
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_close_schedules_one_reconnect() {
        let (_, handle, task) = start(vec![
            Step::Serve(vec![]),
            Step::Serve(vec![]),
            Step::Serve(vec![]),
        ]);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.stats().connects, 1);
        assert_eq!(handle.stats().reconnects_scheduled, 1);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(handle.stats().connects, 2);

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        let stats = handle.stats();
        assert_eq!(stats.connects, 3);
        assert_eq!(stats.reconnects_scheduled, 3);
        assert_eq!(handle.state(), LinkState::Connecting);

        handle.shutdown();
        task.await.unwrap();
        assert_eq!(handle.state(), LinkState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_waits_the_same_delay() {
        let (_, handle, task) = start(vec![Step::Refuse, Step::Hold(vec![])]);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(handle.state(), LinkState::Errored);
        assert_eq!(handle.stats().connect_failures, 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(handle.state(), LinkState::Connected);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_dispatched_by_kind() {
        let (station, handle, task) = start(vec![Step::Hold(vec![
            InboundMessage::text(r#"{"id":"a","length_cm":1,"width_cm":2,"height_cm":3}"#),
            InboundMessage::text("not json"),
            InboundMessage::binary(vec![1, 2, 3]),
        ])]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let stats = handle.stats();
        assert_eq!(stats.messages, 3);
        assert_eq!(stats.telemetry, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.frames, 1);
        assert!(station.package("a").is_some());

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zoom_change_reconnects_immediately() {
        let (_, handle, task) = start(vec![Step::Hold(vec![]), Step::Hold(vec![])]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.stats().connects, 1);

        // Same value, nothing happens
        assert_eq!(handle.set_zoom(0.9), 0.9);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.stats().connects, 1);

        assert_eq!(handle.set_zoom(4.0), 1.5);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let stats = handle.stats();
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.zoom_reconnects, 1);
        assert_eq!(stats.reconnects_scheduled, 0);
        assert_eq!(handle.state(), LinkState::Connected);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zoom_change_while_disconnected_applies_on_next_connect() {
        let (_, handle, task) = start(vec![Step::Serve(vec![]), Step::Hold(vec![]), Step::Hold(vec![])]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.state(), LinkState::Closed);
        assert_eq!(handle.set_zoom(1.2), 1.2);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        let stats = handle.stats();
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.zoom_reconnects, 0);
        assert_eq!(stats.reconnects_scheduled, 1);
        assert_eq!(handle.state(), LinkState::Connected);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_reconnect_delay() {
        let (_, handle, task) = start(vec![Step::Serve(vec![])]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.state(), LinkState::Closed);

        handle.shutdown();
        task.await.unwrap();
        assert_eq!(handle.state(), LinkState::Disconnected);
        assert_eq!(handle.stats().connects, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_supervisor() {
        let (_, handle, task) = start(vec![Step::Hold(vec![])]);
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(handle);
        task.await.unwrap();
    }
}

//! End-to-end Integration Test Suite
//!
//! Runs a full station (supervisor, frame pipeline, registry, eviction and
//! billing) against scripted detector sessions:
//! - Reconnect schedule after closes, faults and refused connects
//! - Telemetry to invoice
//! - Eviction of departed packages
//! - Frame placement and zoom-triggered reconnects
//! - Noisy streams through the supervisor

use std::sync::Arc;

use tokio::task::JoinHandle;

use colis_core::{StationConfig, Timestamp};
use colis_runtime::{Station, Supervisor, SupervisorHandle, Viewport};
use colis_time::ManualClock;

use crate::simulator::{RecordingRenderer, ScriptedConnector};

/// A running station wired to a scripted connector and a manual clock
pub struct TestBench {
    pub station: Arc<Station>,
    pub clock: ManualClock,
    pub connector: ScriptedConnector,
    pub renderer: Arc<RecordingRenderer>,
    pub handle: SupervisorHandle,
    supervisor: JoinHandle<()>,
    eviction: Option<JoinHandle<()>>,
}

impl TestBench {
    /// Start the supervisor on the current runtime
    pub fn start(config: StationConfig, connector: ScriptedConnector) -> Self {
        let clock = ManualClock::new(Timestamp::from_millis(1_700_000_000_000));
        let station = Arc::new(Station::new(config, Arc::new(clock.clone())));
        let renderer = Arc::new(RecordingRenderer::new(Viewport::default()));

        let (supervisor, handle) =
            Supervisor::new(connector.clone(), Arc::clone(&station), Arc::clone(&renderer));

        TestBench {
            station,
            clock,
            connector,
            renderer,
            handle,
            supervisor: supervisor.spawn(),
            eviction: None,
        }
    }

    /// Also run the periodic eviction sweep
    pub fn with_eviction(mut self) -> Self {
        self.eviction = Some(self.station.spawn_eviction_task());
        self
    }

    /// Shut everything down and wait for the supervisor to finish
    pub async fn stop(self) {
        self.handle.shutdown();
        let _ = self.supervisor.await;
        if let Some(eviction) = self.eviction {
            eviction.abort();
        }
    }
}

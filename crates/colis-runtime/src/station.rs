//! Station - owner of the package catalog and the billing desk
//!
//! All mutation goes through the station: telemetry merges and eviction
//! sweeps take the registry write lock, so neither can interleave with the
//! other. Billing sessions refer to packages by id and re-read the registry
//! on every operation.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use colis_billing::{generate_invoice, BillingSession, Calculation, InvoicePrinter, InvoiceSnapshot, Tariff};
use colis_core::{ColisError, ColisResult, PackageId, PackageRecord, StationConfig};
use colis_state::{MergeReport, ObjectRegistry, SharedRegistry};
use colis_time::{CadenceMonitor, Clock};
use colis_wire::{classify, normalize_batch, Classified, IgnoreReason, InboundMessage};

/// What the dispatch loop must do after the station handled a message
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch {
    /// Encoded image for the renderer
    Frame(Bytes),
    /// Telemetry merged into the registry
    Merged(MergeReport),
    /// Dropped without state change
    Ignored(IgnoreReason),
}

#[derive(Debug, Default)]
struct BillingDesk {
    sessions: HashMap<PackageId, BillingSession>,
    invoices: HashMap<PackageId, InvoiceSnapshot>,
}

/// The station: registry, cadence and billing for one camera stream
pub struct Station {
    config: StationConfig,
    tariff: Tariff,
    clock: Arc<dyn Clock>,
    registry: SharedRegistry,
    cadence: Mutex<CadenceMonitor>,
    desk: Mutex<BillingDesk>,
}

impl Station {
    pub fn new(config: StationConfig, clock: Arc<dyn Clock>) -> Self {
        Station {
            tariff: Tariff::from_config(&config),
            cadence: Mutex::new(CadenceMonitor::new(config.fps_window_size)),
            registry: ObjectRegistry::shared(),
            desk: Mutex::new(BillingDesk::default()),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn tariff(&self) -> Tariff {
        self.tariff
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    // ------------------------------------------------------------------
    // Stream side
    // ------------------------------------------------------------------

    /// Handle one received message: observe cadence, classify, merge
    pub fn handle_message(&self, message: InboundMessage, received_at: Instant) -> Dispatch {
        self.cadence.lock().observe(received_at);

        match classify(message) {
            Classified::Frame(bytes) => Dispatch::Frame(bytes),
            Classified::Telemetry(batch) => {
                let records = normalize_batch(&batch, self.clock.now());
                let report = self.registry.write().merge(records);
                debug!(
                    inserted = report.inserted,
                    updated = report.updated,
                    regressed = report.regressed,
                    "telemetry merged"
                );
                Dispatch::Merged(report)
            }
            Classified::Ignored(reason) => Dispatch::Ignored(reason),
        }
    }

    /// Reset the cadence reference when a new connection opens
    pub fn start_cadence(&self, at: Instant) {
        self.cadence.lock().start(at);
    }

    pub fn fps(&self) -> u32 {
        self.cadence.lock().fps()
    }

    /// Remove records older than the staleness threshold
    pub fn evict_stale(&self) -> Vec<PackageId> {
        let now = self.clock.now();
        self.registry
            .write()
            .evict_stale(now, self.config.staleness_threshold())
    }

    /// Run `evict_stale` every eviction interval, first sweep one interval
    /// from now. The task ends by itself once the station is dropped.
    pub fn spawn_eviction_task(self: &Arc<Self>) -> JoinHandle<()> {
        let station: Weak<Station> = Arc::downgrade(self);
        let period = self.config.eviction_interval();

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                let Some(station) = station.upgrade() else {
                    break;
                };
                station.evict_stale();
            }
        })
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    /// Packages currently in view, most recently updated first
    pub fn list_packages(&self) -> Vec<PackageRecord> {
        self.registry.read().list()
    }

    pub fn package(&self, id: &str) -> Option<PackageRecord> {
        self.registry.read().get(id).cloned()
    }

    // ------------------------------------------------------------------
    // Billing
    // ------------------------------------------------------------------

    /// Open (or reopen) billing for a completed package
    pub fn open_billing(&self, id: &str) -> ColisResult<BillingSession> {
        let mut desk = self.desk.lock();
        let package = self.live_package(&mut desk, id)?;

        let session = BillingSession::open(&package, self.tariff).map_err(|e| {
            info!(id, error = %e, "billing refused");
            e
        })?;
        desk.sessions.insert(package.id.clone(), session.clone());
        Ok(session)
    }

    pub fn billing_session(&self, id: &str) -> Option<BillingSession> {
        self.desk.lock().sessions.get(id).cloned()
    }

    /// Store the user's free-text weight entry; returns the parsed kg
    pub fn set_actual_weight(&self, id: &str, input: &str) -> ColisResult<f64> {
        let mut desk = self.desk.lock();
        self.live_package(&mut desk, id)?;
        let session = desk
            .sessions
            .get_mut(id)
            .ok_or_else(|| ColisError::NoBillingSession(PackageId::new(id)))?;
        Ok(session.enter_actual_weight(input))
    }

    pub fn calculate(&self, id: &str, actual_weight_kg: f64) -> ColisResult<Calculation> {
        let mut desk = self.desk.lock();
        self.live_package(&mut desk, id)?;
        let session = desk
            .sessions
            .get_mut(id)
            .ok_or_else(|| ColisError::NoBillingSession(PackageId::new(id)))?;
        Ok(session.calculate(actual_weight_kg))
    }

    /// Calculate from the weight last entered with `set_actual_weight`
    pub fn calculate_entered(&self, id: &str) -> ColisResult<Calculation> {
        let mut desk = self.desk.lock();
        self.live_package(&mut desk, id)?;
        let session = desk
            .sessions
            .get_mut(id)
            .ok_or_else(|| ColisError::NoBillingSession(PackageId::new(id)))?;
        Ok(session.calculate_entered())
    }

    /// Snapshot the calculated session into an invoice
    pub fn generate_invoice(&self, id: &str) -> ColisResult<InvoiceSnapshot> {
        let mut desk = self.desk.lock();
        let package = self.live_package(&mut desk, id)?;
        let session = desk
            .sessions
            .get(id)
            .ok_or_else(|| ColisError::NoBillingSession(package.id.clone()))?;

        let invoice = generate_invoice(session, &package, self.clock.now()).map_err(|e| {
            info!(id, error = %e, "invoice refused");
            e
        })?;
        desk.invoices.insert(package.id, invoice.clone());
        Ok(invoice)
    }

    pub fn invoice(&self, id: &str) -> Option<InvoiceSnapshot> {
        self.desk.lock().invoices.get(id).cloned()
    }

    /// Hand the generated invoice to an external printing facility
    pub fn print_invoice<P: InvoicePrinter>(&self, id: &str, printer: &mut P) -> ColisResult<()> {
        let invoice = self
            .invoice(id)
            .ok_or_else(|| ColisError::NoInvoice(PackageId::new(id)))?;
        printer.print(&invoice)
    }

    /// Abandon the billing session; returns whether one was open
    pub fn cancel_billing(&self, id: &str) -> bool {
        self.desk.lock().sessions.remove(id).is_some()
    }

    /// Close the invoice together with its billing session
    pub fn close_invoice(&self, id: &str) -> bool {
        let mut desk = self.desk.lock();
        let had_invoice = desk.invoices.remove(id).is_some();
        desk.sessions.remove(id);
        had_invoice
    }

    /// Look the package up again; a vanished package invalidates its session
    fn live_package(&self, desk: &mut BillingDesk, id: &str) -> ColisResult<PackageRecord> {
        match self.package(id) {
            Some(package) => Ok(package),
            None => {
                if desk.sessions.remove(id).is_some() {
                    info!(id, "package evicted, billing session discarded");
                }
                Err(ColisError::PackageNotFound(PackageId::new(id)))
            }
        }
    }
}

//! Invoice snapshots
//!
//! An invoice copies everything it needs at generation time. It never points
//! back into the registry, so later eviction of the package cannot affect it.

use std::io::Write;

use serde::Serialize;

use colis_core::{ColisError, ColisResult, InvoiceId, PackageId, PackageRecord, Timestamp};

use crate::BillingSession;

/// Dimensions captured on the invoice, in centimetres
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct InvoiceDimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Weights captured on the invoice, in kilograms
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct InvoiceWeights {
    pub actual: f64,
    pub volumetric: f64,
    #[serde(rename = "final")]
    pub final_: f64,
}

/// Immutable, printable invoice
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSnapshot {
    pub id: InvoiceId,
    pub package_id: PackageId,
    pub issued_at: Timestamp,
    pub dimensions: InvoiceDimensions,
    pub weights: InvoiceWeights,
    pub rate: f64,
    pub amount: f64,
}

/// Produce an invoice from a calculated session and its package.
///
/// Refuses when no calculation has produced a non-zero amount, when the
/// package is not the session's package, or when its dimensions are no
/// longer complete.
pub fn generate_invoice(
    session: &BillingSession,
    package: &PackageRecord,
    issued_at: Timestamp,
) -> ColisResult<InvoiceSnapshot> {
    if &package.id != session.package_id() {
        return Err(ColisError::NoBillingSession(package.id.clone()));
    }
    if !session.is_calculated() {
        return Err(ColisError::NotCalculated {
            id: package.id.clone(),
        });
    }
    let (length, width, height) =
        package
            .dimensions
            .resolved()
            .ok_or_else(|| ColisError::IncompleteDimensions {
                id: package.id.clone(),
            })?;

    let calc = session.calculation();
    Ok(InvoiceSnapshot {
        id: InvoiceId::issued_at(issued_at),
        package_id: package.id.clone(),
        issued_at,
        dimensions: InvoiceDimensions {
            length,
            width,
            height,
        },
        weights: InvoiceWeights {
            actual: calc.actual_weight_kg,
            volumetric: calc.volumetric_weight_kg,
            final_: calc.final_weight_kg,
        },
        rate: calc.rate_per_kg,
        amount: calc.total_amount,
    })
}

/// External printing facility
pub trait InvoicePrinter {
    fn print(&mut self, invoice: &InvoiceSnapshot) -> ColisResult<()>;
}

/// Prints invoices as pretty JSON into any writer
pub struct JsonInvoicePrinter<W: Write> {
    out: W,
}

impl<W: Write> JsonInvoicePrinter<W> {
    pub fn new(out: W) -> Self {
        JsonInvoicePrinter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> InvoicePrinter for JsonInvoicePrinter<W> {
    fn print(&mut self, invoice: &InvoiceSnapshot) -> ColisResult<()> {
        serde_json::to_writer_pretty(&mut self.out, invoice)
            .map_err(|e| ColisError::PrintFailed(e.to_string()))?;
        self.out
            .write_all(b"\n")
            .map_err(|e| ColisError::PrintFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tariff;
    use colis_core::Dimensions;

    fn package() -> PackageRecord {
        PackageRecord::new(PackageId::new("42"), Timestamp::from_millis(1))
            .with_dimensions(Dimensions::complete(60.0, 40.0, 30.0))
    }

    #[test]
    fn test_invoice_requires_calculation() {
        let pkg = package();
        let session = BillingSession::open(&pkg, Tariff::default()).unwrap();
        let err = generate_invoice(&session, &pkg, Timestamp::from_millis(9)).unwrap_err();
        assert!(matches!(err, ColisError::NotCalculated { .. }));
    }

    #[test]
    fn test_invoice_captures_figures() {
        let pkg = package();
        let mut session = BillingSession::open(&pkg, Tariff::default()).unwrap();
        session.calculate(10.0);

        let invoice = generate_invoice(&session, &pkg, Timestamp::from_millis(1_000)).unwrap();
        assert_eq!(invoice.id.as_str(), "INV-1000");
        assert_eq!(invoice.package_id, pkg.id);
        assert_eq!(invoice.dimensions.length, 60.0);
        assert_eq!(invoice.weights.actual, 10.0);
        assert!((invoice.weights.final_ - 14.4).abs() < 1e-9);
        assert_eq!(invoice.rate, 5.0);
        assert!((invoice.amount - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_invoice_refuses_regressed_package() {
        let pkg = package();
        let mut session = BillingSession::open(&pkg, Tariff::default()).unwrap();
        session.calculate(10.0);

        let regressed = pkg.clone().with_dimensions(Dimensions::new(Some(60.0), None, None));
        let err = generate_invoice(&session, &regressed, Timestamp::from_millis(2)).unwrap_err();
        assert!(matches!(err, ColisError::IncompleteDimensions { .. }));
    }

    #[test]
    fn test_invoice_refuses_foreign_package() {
        let pkg = package();
        let mut session = BillingSession::open(&pkg, Tariff::default()).unwrap();
        session.calculate(10.0);

        let other = PackageRecord::new(PackageId::new("7"), Timestamp::from_millis(1))
            .with_dimensions(Dimensions::complete(1.0, 1.0, 1.0));
        assert!(generate_invoice(&session, &other, Timestamp::from_millis(2)).is_err());
    }

    #[test]
    fn test_json_printer() {
        let pkg = package();
        let mut session = BillingSession::open(&pkg, Tariff::default()).unwrap();
        session.calculate(20.0);
        let invoice = generate_invoice(&session, &pkg, Timestamp::from_millis(77)).unwrap();

        let mut printer = JsonInvoicePrinter::new(Vec::new());
        printer.print(&invoice).unwrap();
        let printed: serde_json::Value =
            serde_json::from_slice(&printer.into_inner()).unwrap();

        assert_eq!(printed["id"], "INV-77");
        assert_eq!(printed["packageId"], "42");
        assert_eq!(printed["weights"]["final"], 20.0);
        assert_eq!(printed["amount"], 100.0);
    }
}

//! Billing sessions
//!
//! A session refers to its package by id only. The package may be evicted
//! from the registry at any time, so callers re-read the package before every
//! use and treat a missing package as an invalid session.

use colis_core::{ColisError, ColisResult, PackageId, PackageRecord};

use crate::{coerce_weight, parse_actual_weight, Tariff};

/// Result of one calculation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calculation {
    pub actual_weight_kg: f64,
    pub volumetric_weight_kg: f64,
    pub final_weight_kg: f64,
    pub rate_per_kg: f64,
    pub total_amount: f64,
}

/// In-progress billing interaction for one completed package
#[derive(Clone, Debug, PartialEq)]
pub struct BillingSession {
    package_id: PackageId,
    tariff: Tariff,
    /// Raw text entered by the user, if any
    actual_weight_input: Option<String>,
    actual_weight_kg: Option<f64>,
    volumetric_weight_kg: f64,
    final_weight_kg: f64,
    total_amount: f64,
}

impl BillingSession {
    /// Open a session. Refuses packages with any missing dimension.
    pub fn open(package: &PackageRecord, tariff: Tariff) -> ColisResult<Self> {
        let volumetric_weight_kg =
            tariff
                .volumetric_weight(&package.dimensions)
                .ok_or_else(|| ColisError::IncompleteDimensions {
                    id: package.id.clone(),
                })?;

        Ok(BillingSession {
            package_id: package.id.clone(),
            tariff,
            actual_weight_input: None,
            actual_weight_kg: None,
            volumetric_weight_kg,
            final_weight_kg: 0.0,
            total_amount: 0.0,
        })
    }

    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    pub fn tariff(&self) -> Tariff {
        self.tariff
    }

    pub fn volumetric_weight_kg(&self) -> f64 {
        self.volumetric_weight_kg
    }

    pub fn actual_weight_kg(&self) -> Option<f64> {
        self.actual_weight_kg
    }

    pub fn actual_weight_input(&self) -> Option<&str> {
        self.actual_weight_input.as_deref()
    }

    /// 0 until `calculate` runs
    pub fn final_weight_kg(&self) -> f64 {
        self.final_weight_kg
    }

    /// 0 until `calculate` runs
    pub fn total_amount(&self) -> f64 {
        self.total_amount
    }

    pub fn is_calculated(&self) -> bool {
        self.total_amount != 0.0
    }

    /// Record the user's free-text weight entry (parsed permissively)
    pub fn enter_actual_weight(&mut self, input: &str) -> f64 {
        let kg = parse_actual_weight(input);
        self.actual_weight_input = Some(input.to_owned());
        self.actual_weight_kg = Some(kg);
        kg
    }

    /// `final = max(actual, volumetric)`, `total = final × rate`.
    /// Negative or non-finite actual weights count as 0.
    pub fn calculate(&mut self, actual_weight_kg: f64) -> Calculation {
        let actual = coerce_weight(actual_weight_kg);
        self.actual_weight_kg = Some(actual);
        self.final_weight_kg = actual.max(self.volumetric_weight_kg);
        self.total_amount = self.final_weight_kg * self.tariff.rate_per_kg;
        self.calculation()
    }

    /// Calculate from the last entered weight (0 if none was entered)
    pub fn calculate_entered(&mut self) -> Calculation {
        self.calculate(self.actual_weight_kg.unwrap_or(0.0))
    }

    pub fn calculation(&self) -> Calculation {
        Calculation {
            actual_weight_kg: self.actual_weight_kg.unwrap_or(0.0),
            volumetric_weight_kg: self.volumetric_weight_kg,
            final_weight_kg: self.final_weight_kg,
            rate_per_kg: self.tariff.rate_per_kg,
            total_amount: self.total_amount,
        }
    }
}

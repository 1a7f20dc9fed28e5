//! Stored-versus-observed totals for one dataset year

use serde::Serialize;

use crate::db::{ImportJobStore, RecordStore};
use crate::models::ImportJob;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub dataset_name: String,
    pub year: i32,
    pub stored_total: f64,
    pub observed_total: f64,
    /// `stored_total - observed_total`
    pub difference: f64,
    /// `difference / observed_total`; absent when nothing was observed
    pub relative_difference: Option<f64>,
    pub row_count: usize,
    pub jobs: Vec<ImportJob>,
}

/// Compare current stored tonnes against an externally observed total
pub async fn reconcile(
    records: &dyn RecordStore,
    jobs: &dyn ImportJobStore,
    dataset_name: &str,
    year: i32,
    observed_total: f64,
) -> emis_common::Result<ReconciliationReport> {
    let totals = records.current_totals(dataset_name, year).await?;
    let jobs = jobs.list_by_dataset(dataset_name).await?;

    let difference = totals.co2e_tonnes - observed_total;
    let relative_difference = (observed_total != 0.0).then(|| difference / observed_total);

    tracing::debug!(
        dataset_name,
        year,
        stored_total = totals.co2e_tonnes,
        observed_total,
        "Reconciled dataset"
    );

    Ok(ReconciliationReport {
        dataset_name: dataset_name.to_string(),
        year,
        stored_total: totals.co2e_tonnes,
        observed_total,
        difference,
        relative_difference,
        row_count: totals.row_count,
        jobs,
    })
}

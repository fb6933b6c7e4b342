//! Nominal production: a smoothed per-home ceiling of daily output plus the
//! same signal `lag_days` earlier as a baseline.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::config::ParamsError;
use crate::db::models::{NominalProductionRecord, ProductionRecord};
use crate::detector::smoothing::RankWeightedSmoother;

#[derive(Debug, Clone)]
pub struct NominalProductionEstimator {
    smoothing_days: usize,
    lag_days: usize,
    smoother: RankWeightedSmoother,
}

impl NominalProductionEstimator {
    pub fn new(smoothing_days: usize, lag_days: usize) -> Result<Self, ParamsError> {
        if smoothing_days < 2 {
            return Err(ParamsError::SmoothingDays(smoothing_days));
        }
        if lag_days < 1 {
            return Err(ParamsError::LagDays(lag_days));
        }
        Ok(NominalProductionEstimator {
            smoothing_days,
            lag_days,
            smoother: RankWeightedSmoother::new()?,
        })
    }

    pub fn smoothing_days(&self) -> usize {
        self.smoothing_days
    }

    pub fn lag_days(&self) -> usize {
        self.lag_days
    }

    /// Days of raw history needed before a watermark to seed the rolling
    /// window and the lag.
    pub fn lookback_days(&self) -> usize {
        self.lag_days + 3 * self.smoothing_days
    }

    /// Minimum number of production rows before a home gets nominal values.
    pub fn min_history_days(&self) -> usize {
        2 * self.smoothing_days
    }

    /// Nominal production for one home's history.
    ///
    /// Missing days count as zero output. Rows whose rolling window or lag
    /// reaches before the first day are dropped, so the result is a gap-free
    /// daily series starting `smoothing_days - 1 + lag_days` days after the
    /// first production day and ending on the last one.
    pub fn compute(&self, history: &[ProductionRecord]) -> Vec<NominalProductionRecord> {
        let (Some(home_id), Some(first), Some(last)) = (
            history.first().map(|r| r.home_id),
            history.iter().map(|r| r.date).min(),
            history.iter().map(|r| r.date).max(),
        ) else {
            return Vec::new();
        };
        if history.len() < self.min_history_days() {
            return Vec::new();
        }
        self.compute_span(home_id, history, first, last)
    }

    /// Nominal production over the calendar span `first..=last`.
    ///
    /// Days in the span without a record read as zero, so a home that stops
    /// reporting keeps getting rows through `last`. Records outside the span
    /// are ignored. No minimum-history check is applied.
    pub fn compute_span(
        &self,
        home_id: i64,
        history: &[ProductionRecord],
        first: NaiveDate,
        last: NaiveDate,
    ) -> Vec<NominalProductionRecord> {
        let daily = fill_daily(history, first, last);
        let values: Vec<f64> = daily.iter().map(|(_, v)| *v).collect();

        let nominal: Vec<Option<f64>> = (0..values.len())
            .map(|i| {
                if i + 1 < self.smoothing_days {
                    None
                } else {
                    self.smoother.smooth(&values[i + 1 - self.smoothing_days..=i])
                }
            })
            .collect();

        let mut rows = Vec::with_capacity(values.len().saturating_sub(self.smoothing_days + self.lag_days));
        for i in self.lag_days..daily.len() {
            let (Some(nominal_prod), Some(baseline_nominal_prod)) = (nominal[i], nominal[i - self.lag_days]) else {
                continue;
            };
            rows.push(NominalProductionRecord {
                home_id,
                date: daily[i].0,
                total_production: daily[i].1,
                nominal_prod,
                baseline_nominal_prod,
            });
        }
        rows
    }
}

/// One value per calendar day of `first..=last`, zero-filled.
fn fill_daily(history: &[ProductionRecord], first: NaiveDate, last: NaiveDate) -> Vec<(NaiveDate, f64)> {
    let by_day: BTreeMap<NaiveDate, f64> = history
        .iter()
        .filter(|r| r.date >= first && r.date <= last)
        .map(|r| (r.date, r.total_production))
        .collect();

    let mut out = Vec::with_capacity((last - first).num_days().max(0) as usize + 1);
    let mut day = first;
    while day <= last {
        out.push((day, by_day.get(&day).copied().unwrap_or(0.0)));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    out
}

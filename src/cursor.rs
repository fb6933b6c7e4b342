//! Incremental watermarks. Every stage resumes from the day after the latest
//! date already present in its own output table.

use chrono::{Local, NaiveDate};
use log::debug;

use crate::store::{Dataset, Watermarked};

#[derive(Debug, Clone, Copy)]
pub struct IncrementalCursor {
    default_start: NaiveDate,
    today: NaiveDate,
}

impl IncrementalCursor {
    pub fn new(default_start: NaiveDate, today: NaiveDate) -> Self {
        IncrementalCursor { default_start, today }
    }

    /// Cursor anchored on the local calendar date.
    pub fn from_local_clock(default_start: NaiveDate) -> Self {
        Self::new(default_start, Local::now().date_naive())
    }

    /// Last complete day. Today is never processed.
    pub fn yesterday(&self) -> NaiveDate {
        self.today.pred_opt().unwrap_or(NaiveDate::MIN)
    }

    pub fn default_start(&self) -> NaiveDate {
        self.default_start
    }

    /// First unprocessed day given the latest processed one.
    ///
    /// An empty target starts at `default_start`. `None` means the target is
    /// already caught up through yesterday.
    pub fn next_start(&self, latest: Option<NaiveDate>) -> Option<NaiveDate> {
        match latest {
            None => Some(self.default_start),
            Some(last) => last.succ_opt().filter(|start| *start <= self.yesterday()),
        }
    }

    pub fn resolve_start<W: Watermarked + ?Sized>(
        &self,
        store: &mut W,
        dataset: Dataset,
    ) -> Result<Option<NaiveDate>, String> {
        let latest = store.max_date(dataset)?;
        let start = self.next_start(latest);
        debug!(
            "Cursor: {} latest={} start={}",
            dataset.table_name(),
            latest.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            start.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
        );
        Ok(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ProductionRecord;
    use crate::store::DetectionStore;
    use crate::store::memory::MemoryStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn cursor() -> IncrementalCursor {
        IncrementalCursor::new(d(2020, 1, 1), d(2024, 5, 10))
    }

    #[test]
    fn empty_target_starts_at_default() {
        assert_eq!(cursor().next_start(None), Some(d(2020, 1, 1)));
    }

    #[test]
    fn resumes_the_day_after_the_latest_row() {
        assert_eq!(cursor().next_start(Some(d(2024, 5, 1))), Some(d(2024, 5, 2)));
        assert_eq!(cursor().next_start(Some(d(2024, 5, 8))), Some(d(2024, 5, 9)));
    }

    #[test]
    fn caught_up_target_yields_nothing() {
        assert_eq!(cursor().yesterday(), d(2024, 5, 9));
        assert_eq!(cursor().next_start(Some(d(2024, 5, 9))), None);
        assert_eq!(cursor().next_start(Some(d(2024, 5, 10))), None);
    }

    #[test]
    fn resolves_against_each_dataset_independently() {
        let mut store = MemoryStore::default();
        store
            .append_production(&[ProductionRecord {
                home_id: 1,
                date: d(2024, 5, 3),
                total_production: 50.0,
            }])
            .unwrap();

        let c = cursor();
        assert_eq!(c.resolve_start(&mut store, Dataset::ProdHistory).unwrap(), Some(d(2024, 5, 4)));
        assert_eq!(
            c.resolve_start(&mut store, Dataset::NominalProduction).unwrap(),
            Some(d(2020, 1, 1))
        );
        assert!(c.resolve_start(&mut store, Dataset::DeliveredDetections).is_err());
    }
}

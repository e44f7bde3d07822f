use std::collections::BTreeMap;

use tracing::debug;

use super::Table;
use crate::capabilities::{StatisticsTable, StorageTable};
use crate::engine::collect_rows;
use crate::session::Session;

#[derive(Clone, Debug, PartialEq)]
pub struct HistogramBucket {
    pub lower: f64,
    pub upper: f64,
    /// Share of the column's non-null numeric values falling in the bucket.
    pub frequency: f64,
}

/// Distribution of one column's numeric values. Values that do not read as
/// numbers are skipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Histogram {
    pub column: String,
    pub count: u64,
    pub null_count: u64,
    pub distinct: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub buckets: Vec<HistogramBucket>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableStatistics {
    pub row_count: u64,
    pub histograms: Vec<Histogram>,
}

impl TableStatistics {
    pub fn histogram(&self, column: &str) -> Option<&Histogram> {
        self.histograms
            .iter()
            .find(|h| h.column.eq_ignore_ascii_case(column))
    }
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    null_count: u64,
    sum: f64,
    min: f64,
    max: f64,
    // keyed by bit pattern since f64 is not Ord
    freqs: BTreeMap<u64, u64>,
}

impl Accumulator {
    fn observe(&mut self, v: f64) {
        if self.count == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.count += 1;
        self.sum += v;
        *self.freqs.entry(v.to_bits()).or_insert(0) += 1;
    }

    fn finish(self, column: String) -> Histogram {
        let mut values: Vec<(f64, u64)> = self
            .freqs
            .into_iter()
            .map(|(bits, n)| (f64::from_bits(bits), n))
            .collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));
        let count = self.count;
        let buckets = values
            .iter()
            .map(|&(v, n)| HistogramBucket {
                lower: v,
                upper: v,
                frequency: n as f64 / count as f64,
            })
            .collect();
        Histogram {
            column,
            count,
            null_count: self.null_count,
            distinct: values.len() as u64,
            min: self.min,
            max: self.max,
            mean: if count == 0 { 0.0 } else { self.sum / count as f64 },
            buckets,
        }
    }
}

impl StatisticsTable for Table {
    /// Rebuilds per-column histograms from a full scan of the session's view.
    fn analyze_table(&self, session: &Session) -> anyhow::Result<()> {
        let schema = StorageTable::schema(self, session);
        let mut accs: Vec<Accumulator> =
            schema.columns.iter().map(|_| Accumulator::default()).collect();
        let mut row_count = 0u64;
        let unfiltered = Table {
            columns: None,
            projection: None,
            filters: Vec::new(),
            lookup: None,
            ..self.clone()
        };
        for partition in unfiltered.scan_partitions(session)? {
            let rows = collect_rows(Box::new(unfiltered.scan_partition(session, &partition)?))?;
            for row in rows {
                row_count += 1;
                for (acc, v) in accs.iter_mut().zip(&row) {
                    if v.is_null() {
                        acc.null_count += 1;
                    } else if let Some(f) = v.as_f64() {
                        acc.observe(f);
                    }
                }
            }
        }
        let histograms = accs
            .into_iter()
            .zip(&schema.columns)
            .map(|(acc, col)| acc.finish(col.name.clone()))
            .collect();
        *self.stats.write() = Some(TableStatistics {
            row_count,
            histograms,
        });
        debug!(table = %self.name(), rows = row_count, "table analyzed");
        Ok(())
    }

    fn statistics(&self) -> Option<TableStatistics> {
        self.stats.read().clone()
    }

    fn data_length(&self, session: &Session) -> u64 {
        let data = self.session_data(session);
        let data = data.read();
        let per_row: u64 = data
            .schema
            .columns
            .iter()
            .map(|c| c.data_type.byte_width())
            .sum();
        per_row * data.row_count() as u64
    }

    fn row_count(&self, session: &Session) -> u64 {
        self.session_data(session).read().row_count() as u64
    }
}

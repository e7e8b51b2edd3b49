use crate::domain::errors::ForecastError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closing prices with strictly increasing dates.
///
/// Dates and closes live in parallel append-only buffers so the last `n`
/// closes are always available as a contiguous slice. Records pushed after
/// [`PriceSeries::seal_actuals`] are treated as synthetic (forecast) points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
    actual_len: usize,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a series of actual observations. Dates must be strictly increasing.
    pub fn from_records<I>(records: I) -> Result<Self, ForecastError>
    where
        I: IntoIterator<Item = PriceRecord>,
    {
        let mut series = Self::new();
        for record in records {
            series.push(record.date, record.close)?;
        }
        series.seal_actuals();
        Ok(series)
    }

    /// Appends a record. Rejects dates that do not move forward.
    pub fn push(&mut self, date: NaiveDate, close: f64) -> Result<(), ForecastError> {
        if let Some(last) = self.last_date() {
            if date <= last {
                return Err(ForecastError::InvalidSeries {
                    reason: format!("date {} does not follow {}", date, last),
                });
            }
        }
        self.dates.push(date);
        self.closes.push(close);
        Ok(())
    }

    /// Marks every record currently held as an actual observation.
    pub fn seal_actuals(&mut self) {
        self.actual_len = self.closes.len();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.dates.reserve(additional);
        self.closes.reserve(additional);
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Number of leading records that are real observations.
    pub fn actual_len(&self) -> usize {
        self.actual_len
    }

    pub fn is_synthetic(&self, index: usize) -> bool {
        index >= self.actual_len
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The last `n` closes, or `None` if fewer are held.
    pub fn tail(&self, n: usize) -> Option<&[f64]> {
        let len = self.closes.len();
        if n > len {
            return None;
        }
        Some(&self.closes[len - n..])
    }

    pub fn last(&self) -> Option<PriceRecord> {
        let i = self.closes.len().checked_sub(1)?;
        Some(PriceRecord {
            date: self.dates[i],
            close: self.closes[i],
        })
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn first(&self) -> Option<PriceRecord> {
        Some(PriceRecord {
            date: *self.dates.first()?,
            close: *self.closes.first()?,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = PriceRecord> + '_ {
        self.dates
            .iter()
            .zip(self.closes.iter())
            .map(|(&date, &close)| PriceRecord { date, close })
    }

    /// Leading slice of the series, keeping only actual observations.
    pub fn head(&self, n: usize) -> PriceSeries {
        let n = n.min(self.len());
        PriceSeries {
            dates: self.dates[..n].to_vec(),
            closes: self.closes[..n].to_vec(),
            actual_len: self.actual_len.min(n),
        }
    }

    /// Replaces non-finite closes with the previous valid close, then fills any
    /// leading gap with the first valid close. Returns the number of filled values.
    pub fn fill_missing(&mut self) -> usize {
        let mut filled = 0;
        let mut last_valid: Option<f64> = None;
        for close in self.closes.iter_mut() {
            if close.is_finite() {
                last_valid = Some(*close);
            } else if let Some(v) = last_valid {
                *close = v;
                filled += 1;
            }
        }

        if let Some(first_valid) = self.closes.iter().copied().find(|c| c.is_finite()) {
            for close in self.closes.iter_mut() {
                if close.is_finite() {
                    break;
                }
                *close = first_valid;
                filled += 1;
            }
        }
        filled
    }
}

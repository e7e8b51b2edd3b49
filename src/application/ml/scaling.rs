use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::PriceSeries;

/// Min-max normalization of closing prices.
///
/// Fit once per ticker and reused for every apply/inverse of that session.
/// Values outside the fitted range extrapolate linearly; nothing is clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    pub fn fit(series: &PriceSeries) -> Result<Self, ForecastError> {
        Self::fit_values(series.closes())
    }

    pub fn fit_values(values: &[f64]) -> Result<Self, ForecastError> {
        if values.is_empty() {
            return Err(ForecastError::EmptySeries);
        }
        if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidSeries {
                reason: format!("non-finite close at index {}", bad),
            });
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let scaler = Self { min, max };
        scaler.range()?;
        Ok(scaler)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    fn range(&self) -> Result<f64, ForecastError> {
        let range = self.max - self.min;
        if range == 0.0 {
            return Err(ForecastError::DegenerateRange { value: self.min });
        }
        Ok(range)
    }

    pub fn apply(&self, value: f64) -> Result<f64, ForecastError> {
        Ok((value - self.min) / self.range()?)
    }

    /// Normalizes `values` into `out`, reusing its allocation.
    pub fn apply_slice(&self, values: &[f64], out: &mut Vec<f64>) -> Result<(), ForecastError> {
        let range = self.range()?;
        out.clear();
        out.extend(values.iter().map(|v| (v - self.min) / range));
        Ok(())
    }

    pub fn apply_series(&self, series: &PriceSeries) -> Result<Vec<f64>, ForecastError> {
        let mut out = Vec::with_capacity(series.len());
        self.apply_slice(series.closes(), &mut out)?;
        Ok(out)
    }

    pub fn inverse(&self, normalized: f64) -> f64 {
        normalized * (self.max - self.min) + self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_rejects_empty_and_flat() {
        assert_eq!(
            MinMaxScaler::fit_values(&[]),
            Err(ForecastError::EmptySeries)
        );
        assert_eq!(
            MinMaxScaler::fit_values(&[42.0, 42.0, 42.0]),
            Err(ForecastError::DegenerateRange { value: 42.0 })
        );
    }

    #[test]
    fn test_fit_rejects_missing_closes() {
        assert!(matches!(
            MinMaxScaler::fit_values(&[f64::NAN, f64::NAN]),
            Err(ForecastError::InvalidSeries { .. })
        ));
        assert!(matches!(
            MinMaxScaler::fit_values(&[10.0, f64::INFINITY, 12.0]),
            Err(ForecastError::InvalidSeries { .. })
        ));
    }

    #[test]
    fn test_maps_range_to_unit_interval() {
        let scaler = MinMaxScaler::fit_values(&[10.0, 30.0, 20.0]).unwrap();
        assert_eq!(scaler.apply(10.0).unwrap(), 0.0);
        assert_eq!(scaler.apply(30.0).unwrap(), 1.0);
        assert_eq!(scaler.apply(20.0).unwrap(), 0.5);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let values = [101.37, 99.2, 150.004, 123.456789, 87.5];
        let scaler = MinMaxScaler::fit_values(&values).unwrap();

        let mut x = scaler.min();
        while x <= scaler.max() {
            let back = scaler.inverse(scaler.apply(x).unwrap());
            assert!((back - x).abs() <= 1e-9 * x.abs().max(1.0), "{} -> {}", x, back);
            x += 0.731;
        }
    }

    #[test]
    fn test_extrapolation_is_not_clamped() {
        let scaler = MinMaxScaler::fit_values(&[10.0, 20.0]).unwrap();
        assert_eq!(scaler.apply(25.0).unwrap(), 1.5);
        assert_eq!(scaler.inverse(-0.5), 5.0);
    }
}

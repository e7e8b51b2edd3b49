use crate::domain::errors::ForecastError;

/// Lookback windows and their next-step targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowedDataset {
    pub windows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Slides a fixed-length window over a normalized series.
#[derive(Debug, Clone, Copy)]
pub struct WindowFeaturizer {
    window_size: usize,
    allow_empty: bool,
}

impl WindowFeaturizer {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            allow_empty: false,
        }
    }

    /// Returns an empty dataset instead of failing when the series is too short.
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn build(&self, series: &[f64]) -> Result<WindowedDataset, ForecastError> {
        let w = self.window_size;
        if w == 0 {
            return Err(ForecastError::ShapeMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if series.len() <= w {
            if self.allow_empty {
                return Ok(WindowedDataset::default());
            }
            return Err(ForecastError::InsufficientData {
                required: w + 1,
                available: series.len(),
            });
        }

        let count = series.len() - w;
        let mut dataset = WindowedDataset {
            windows: Vec::with_capacity(count),
            targets: Vec::with_capacity(count),
        };
        for i in 0..count {
            dataset.windows.push(series[i..i + w].to_vec());
            dataset.targets.push(series[i + w]);
        }
        Ok(dataset)
    }
}

//! Single-layer GRU regressor trained with back-propagation through time.
//!
//! The window is fed one normalized close at a time; the final hidden state
//! goes through a linear read-out to produce the next normalized close.
//!
//! Gate equations, for input `x_t` and previous state `h`:
//! - z = sigmoid(W_z x_t + U_z h + b_z)        (update gate)
//! - r = sigmoid(W_r x_t + U_r h + b_r)        (reset gate)
//! - n = tanh(W_n x_t + U_n (r * h) + b_n)     (candidate)
//! - h' = (1 - z) * n + z * h

use super::predictor::{PricePredictor, check_window, validate_dataset};
use super::windows::WindowedDataset;
use crate::application::forecasting::cancellation::CancellationToken;
use crate::domain::errors::ForecastError;
use ndarray::{Array1, Array2, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct RecurrentParams {
    pub hidden_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Global gradient-norm clip applied per batch.
    pub clip_norm: f64,
}

impl Default for RecurrentParams {
    fn default() -> Self {
        Self {
            hidden_size: 16,
            epochs: 30,
            learning_rate: 0.01,
            batch_size: 16,
            clip_norm: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Gate {
    w: Array1<f64>,
    u: Array2<f64>,
    b: Array1<f64>,
}

impl Gate {
    fn zeros(h: usize) -> Self {
        Self {
            w: Array1::zeros(h),
            u: Array2::zeros((h, h)),
            b: Array1::zeros(h),
        }
    }

    fn random(h: usize, rng: &mut StdRng) -> Self {
        let k = 1.0 / (h as f64).sqrt();
        Self {
            w: Array1::from_shape_fn(h, |_| rng.random_range(-k..k)),
            u: Array2::from_shape_fn((h, h), |_| rng.random_range(-k..k)),
            b: Array1::from_shape_fn(h, |_| rng.random_range(-k..k)),
        }
    }

    fn pre_activation(&self, x: f64, state: &Array1<f64>) -> Array1<f64> {
        &self.w * x + self.u.dot(state) + &self.b
    }

    /// Accumulates gradients for this gate given the gradient at its
    /// pre-activation; returns the gradient flowing into `state`.
    fn accumulate(&self, grad: &mut Gate, d_pre: &Array1<f64>, x: f64, state: &Array1<f64>) -> Array1<f64> {
        grad.w.scaled_add(x, d_pre);
        grad.b += d_pre;
        Zip::from(grad.u.rows_mut())
            .and(d_pre)
            .for_each(|mut row, &d| row.scaled_add(d, state));
        self.u.t().dot(d_pre)
    }

    fn values(&self) -> impl Iterator<Item = &f64> + '_ {
        self.w.iter().chain(self.u.iter()).chain(self.b.iter())
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> + '_ {
        self.w
            .iter_mut()
            .chain(self.u.iter_mut())
            .chain(self.b.iter_mut())
    }
}

#[derive(Debug, Clone)]
struct GruWeights {
    z: Gate,
    r: Gate,
    n: Gate,
    out_w: Array1<f64>,
    out_b: Array1<f64>,
}

struct StepCache {
    x: f64,
    h_prev: Array1<f64>,
    z: Array1<f64>,
    r: Array1<f64>,
    n: Array1<f64>,
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

impl GruWeights {
    fn zeros(h: usize) -> Self {
        Self {
            z: Gate::zeros(h),
            r: Gate::zeros(h),
            n: Gate::zeros(h),
            out_w: Array1::zeros(h),
            out_b: Array1::zeros(1),
        }
    }

    fn random(h: usize, rng: &mut StdRng) -> Self {
        let k = 1.0 / (h as f64).sqrt();
        Self {
            z: Gate::random(h, rng),
            r: Gate::random(h, rng),
            n: Gate::random(h, rng),
            out_w: Array1::from_shape_fn(h, |_| rng.random_range(-k..k)),
            out_b: Array1::zeros(1),
        }
    }

    fn hidden_size(&self) -> usize {
        self.out_w.len()
    }

    fn step(&self, x: f64, h: &Array1<f64>) -> StepCache {
        let z = self.z.pre_activation(x, h).mapv(sigmoid);
        let r = self.r.pre_activation(x, h).mapv(sigmoid);
        let n = self.n.pre_activation(x, &(&r * h)).mapv(f64::tanh);
        StepCache {
            x,
            h_prev: h.clone(),
            z,
            r,
            n,
        }
    }

    fn next_state(cache: &StepCache) -> Array1<f64> {
        cache.z.mapv(|z| 1.0 - z) * &cache.n + &cache.z * &cache.h_prev
    }

    fn read_out(&self, h: &Array1<f64>) -> f64 {
        self.out_w.dot(h) + self.out_b[0]
    }

    fn forward(&self, window: &[f64]) -> f64 {
        let mut h = Array1::zeros(self.hidden_size());
        for &x in window {
            h = Self::next_state(&self.step(x, &h));
        }
        self.read_out(&h)
    }

    /// Forward and backward pass for one sample. Adds gradients of
    /// `0.5 * (y - target)^2` into `grads` and returns the squared error.
    fn backward(&self, window: &[f64], target: f64, grads: &mut GruWeights) -> f64 {
        let mut h = Array1::zeros(self.hidden_size());
        let mut caches = Vec::with_capacity(window.len());
        for &x in window {
            let cache = self.step(x, &h);
            h = Self::next_state(&cache);
            caches.push(cache);
        }

        let err = self.read_out(&h) - target;
        grads.out_w.scaled_add(err, &h);
        grads.out_b[0] += err;

        let mut dh = &self.out_w * err;
        for c in caches.iter().rev() {
            let dn = &dh * &c.z.mapv(|z| 1.0 - z);
            let dz = &dh * &(&c.h_prev - &c.n);
            let mut dh_prev = &dh * &c.z;

            let dn_pre = dn * &c.n.mapv(|n| 1.0 - n * n);
            let rh = &c.r * &c.h_prev;
            let drh = self.n.accumulate(&mut grads.n, &dn_pre, c.x, &rh);
            let dr = &drh * &c.h_prev;
            dh_prev += &(&drh * &c.r);

            let dz_pre = dz * &c.z.mapv(|z| z * (1.0 - z));
            dh_prev += &self.z.accumulate(&mut grads.z, &dz_pre, c.x, &c.h_prev);

            let dr_pre = dr * &c.r.mapv(|r| r * (1.0 - r));
            dh_prev += &self.r.accumulate(&mut grads.r, &dr_pre, c.x, &c.h_prev);

            dh = dh_prev;
        }
        err * err
    }

    fn values(&self) -> impl Iterator<Item = &f64> + '_ {
        self.z
            .values()
            .chain(self.r.values())
            .chain(self.n.values())
            .chain(self.out_w.iter())
            .chain(self.out_b.iter())
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> + '_ {
        self.z
            .values_mut()
            .chain(self.r.values_mut())
            .chain(self.n.values_mut())
            .chain(self.out_w.iter_mut())
            .chain(self.out_b.iter_mut())
    }
}

struct Adam {
    m: GruWeights,
    v: GruWeights,
    t: i32,
    learning_rate: f64,
}

impl Adam {
    fn new(h: usize, learning_rate: f64) -> Self {
        Self {
            m: GruWeights::zeros(h),
            v: GruWeights::zeros(h),
            t: 0,
            learning_rate,
        }
    }

    fn step(&mut self, weights: &mut GruWeights, grads: &GruWeights) {
        self.t += 1;
        let bias1 = 1.0 - BETA1.powi(self.t);
        let bias2 = 1.0 - BETA2.powi(self.t);
        let lr = self.learning_rate;

        for (((p, &g), m), v) in weights
            .values_mut()
            .zip(grads.values())
            .zip(self.m.values_mut())
            .zip(self.v.values_mut())
        {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            *p -= lr * (*m / bias1) / ((*v / bias2).sqrt() + EPSILON);
        }
    }
}

/// Sequential neural regressor over the ordered window.
pub struct RecurrentPredictor {
    params: RecurrentParams,
    seed: Option<u64>,
    weights: Option<GruWeights>,
    window_len: Option<usize>,
    cancel: CancellationToken,
}

impl RecurrentPredictor {
    /// Without a seed, initialization and shuffling differ between runs.
    pub fn new(params: RecurrentParams, seed: Option<u64>) -> Self {
        Self {
            params,
            seed,
            weights: None,
            window_len: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Training stops between epochs once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

impl PricePredictor for RecurrentPredictor {
    fn train(&mut self, dataset: &WindowedDataset) -> Result<(), ForecastError> {
        let width = validate_dataset(dataset)?;
        let hidden = self.params.hidden_size.max(1);
        let batch_size = self.params.batch_size.max(1);

        let mut rng = self.rng();
        let mut weights = GruWeights::random(hidden, &mut rng);
        let mut adam = Adam::new(hidden, self.params.learning_rate);
        let mut order: Vec<usize> = (0..dataset.len()).collect();

        for epoch in 0..self.params.epochs {
            if self.cancel.is_cancelled() {
                return Err(ForecastError::Cancelled);
            }
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(batch_size) {
                let mut grads = GruWeights::zeros(hidden);
                for &i in batch {
                    epoch_loss +=
                        weights.backward(&dataset.windows[i], dataset.targets[i], &mut grads);
                }

                let scale = 1.0 / batch.len() as f64;
                let norm = grads.values().map(|g| g * g).sum::<f64>().sqrt() * scale;
                let clip = if norm > self.params.clip_norm {
                    self.params.clip_norm / norm
                } else {
                    1.0
                };
                grads.values_mut().for_each(|g| *g *= scale * clip);

                adam.step(&mut weights, &grads);
            }

            debug!(
                "RecurrentPredictor: epoch {}/{} mse={:.6}",
                epoch + 1,
                self.params.epochs,
                epoch_loss / dataset.len() as f64
            );
        }

        self.weights = Some(weights);
        self.window_len = Some(width);
        Ok(())
    }

    fn predict(&self, window: &[f64]) -> Result<f64, ForecastError> {
        check_window(self.window_len, window)?;
        let weights = self.weights.as_ref().ok_or(ForecastError::NotTrained)?;
        let prediction = weights.forward(window);
        if !prediction.is_finite() {
            return Err(ForecastError::Model {
                reason: format!("non-finite prediction {}", prediction),
            });
        }
        Ok(prediction)
    }

    fn window_len(&self) -> Option<usize> {
        self.window_len
    }

    fn name(&self) -> &str {
        "GRU Sequence Regressor"
    }

    fn version(&self) -> &str {
        "v1.0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::windows::WindowFeaturizer;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
    }

    fn quick_params() -> RecurrentParams {
        RecurrentParams {
            hidden_size: 8,
            epochs: 200,
            learning_rate: 0.01,
            batch_size: 8,
            clip_norm: 1.0,
        }
    }

    #[test]
    fn test_learns_linear_trend() {
        let series = ramp(50);
        let dataset = WindowFeaturizer::new(5).build(&series).unwrap();
        let mut model = RecurrentPredictor::new(quick_params(), Some(42));
        model.train(&dataset).unwrap();

        let window = &series[20..25];
        let prediction = model.predict(window).unwrap();
        assert!(
            (prediction - series[25]).abs() < 0.1,
            "predicted {} expected {}",
            prediction,
            series[25]
        );
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let series = ramp(30);
        let dataset = WindowFeaturizer::new(4).build(&series).unwrap();
        let params = RecurrentParams {
            epochs: 5,
            ..quick_params()
        };

        let mut a = RecurrentPredictor::new(params.clone(), Some(3));
        let mut b = RecurrentPredictor::new(params, Some(3));
        a.train(&dataset).unwrap();
        b.train(&dataset).unwrap();

        let window = &series[..4];
        assert_eq!(a.predict(window).unwrap(), b.predict(window).unwrap());
    }

    #[test]
    fn test_shape_mismatch_and_untrained() {
        let mut model = RecurrentPredictor::new(quick_params(), Some(1));
        assert_eq!(model.predict(&[0.5; 4]), Err(ForecastError::NotTrained));

        let dataset = WindowFeaturizer::new(4).build(&ramp(12)).unwrap();
        model.params.epochs = 1;
        model.train(&dataset).unwrap();
        assert_eq!(
            model.predict(&[0.5; 6]),
            Err(ForecastError::ShapeMismatch {
                expected: 4,
                actual: 6
            })
        );
    }

    #[test]
    fn test_training_honours_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut model =
            RecurrentPredictor::new(quick_params(), Some(1)).with_cancellation(cancel);
        let dataset = WindowFeaturizer::new(4).build(&ramp(12)).unwrap();

        assert_eq!(model.train(&dataset), Err(ForecastError::Cancelled));
        assert!(model.window_len().is_none());
    }
}

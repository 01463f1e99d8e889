//! Two-layer LSTM regressor on `ndarray`
//!
//! Architecture: LSTM(units.0) → dropout → LSTM(units.1) → dropout →
//! Dense(dense_units, relu) → Dense(1). Trained with mean squared error,
//! full backpropagation through time and Adam. All randomness (weight
//! init, dropout masks, batch order) comes from one seeded `StdRng`, so a
//! fixed seed reproduces the same network.

use super::{NetworkConfig, SequenceBackend, SequenceRegressor};
use crate::error::{ForecastError, Result};
use ndarray::{s, Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;
const GRAD_CLIP: f64 = 1.0;

/// Backend producing [`LstmRegressor`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct LstmBackend;

impl SequenceBackend for LstmBackend {
    fn name(&self) -> &str {
        "ndarray-lstm"
    }

    fn build(&self, config: &NetworkConfig) -> Result<Box<dyn SequenceRegressor>> {
        Ok(Box::new(LstmRegressor::new(config.clone())))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Trainable matrix with Adam moment estimates
#[derive(Debug, Clone)]
struct Param {
    value: Array2<f64>,
    m: Array2<f64>,
    v: Array2<f64>,
}

impl Param {
    fn new(value: Array2<f64>) -> Self {
        let m = Array2::zeros(value.raw_dim());
        let v = Array2::zeros(value.raw_dim());
        Self { value, m, v }
    }

    fn glorot(rows: usize, cols: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (rows + cols) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        Self::new(Array2::from_shape_fn((rows, cols), |_| rng.sample(&dist)))
    }

    fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(Array2::zeros((rows, cols)))
    }

    fn adam_step(&mut self, grad: &Array2<f64>, lr: f64, t: i32) {
        let bias1 = 1.0 - BETA1.powi(t);
        let bias2 = 1.0 - BETA2.powi(t);

        Zip::from(&mut self.value)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(grad)
            .for_each(|w, m, v, &g| {
                let g = g.clamp(-GRAD_CLIP, GRAD_CLIP);
                *m = BETA1 * *m + (1.0 - BETA1) * g;
                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                *w -= lr * (*m / bias1) / ((*v / bias2).sqrt() + EPSILON);
            });
    }
}

/// Values kept from one forward step for backpropagation
#[derive(Debug)]
struct StepCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    tanh_c: Array2<f64>,
}

#[derive(Debug)]
struct LayerGrads {
    w: Array2<f64>,
    u: Array2<f64>,
    b: Array2<f64>,
}

/// One LSTM layer; gate columns are ordered input, forget, cell, output
#[derive(Debug, Clone)]
struct LstmLayer {
    hidden: usize,
    w: Param,
    u: Param,
    b: Param,
}

impl LstmLayer {
    fn new(input: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let w = Param::glorot(input, 4 * hidden, rng);
        let u = Param::glorot(hidden, 4 * hidden, rng);
        let mut b = Param::zeros(1, 4 * hidden);
        // Forget gate starts open
        b.value.slice_mut(s![.., hidden..2 * hidden]).fill(1.0);
        Self { hidden, w, u, b }
    }

    fn forward(&self, inputs: &[Array2<f64>]) -> (Vec<Array2<f64>>, Vec<StepCache>) {
        let hs = self.hidden;
        let batch = inputs.first().map(|x| x.nrows()).unwrap_or(0);
        let mut h: Array2<f64> = Array2::zeros((batch, hs));
        let mut c: Array2<f64> = Array2::zeros((batch, hs));
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut caches = Vec::with_capacity(inputs.len());

        for x in inputs {
            let z = x.dot(&self.w.value) + h.dot(&self.u.value) + &self.b.value;
            let i = z.slice(s![.., 0..hs]).mapv(sigmoid);
            let f = z.slice(s![.., hs..2 * hs]).mapv(sigmoid);
            let g = z.slice(s![.., 2 * hs..3 * hs]).mapv(f64::tanh);
            let o = z.slice(s![.., 3 * hs..]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            outputs.push(h_next.clone());
            caches.push(StepCache {
                x: x.clone(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });
            h = h_next;
            c = c_next;
        }

        (outputs, caches)
    }

    /// Backpropagate through time; returns parameter grads and input grads
    fn backward(&self, caches: &[StepCache], grad_outputs: &[Array2<f64>]) -> (LayerGrads, Vec<Array2<f64>>) {
        let hs = self.hidden;
        let batch = caches.first().map(|c| c.x.nrows()).unwrap_or(0);

        let mut dw: Array2<f64> = Array2::zeros(self.w.value.raw_dim());
        let mut du: Array2<f64> = Array2::zeros(self.u.value.raw_dim());
        let mut db: Array2<f64> = Array2::zeros(self.b.value.raw_dim());
        let mut dh_next: Array2<f64> = Array2::zeros((batch, hs));
        let mut dc_next: Array2<f64> = Array2::zeros((batch, hs));
        let mut dx_seq: Vec<Array2<f64>> = vec![Array2::zeros((batch, self.w.value.nrows())); caches.len()];

        for t in (0..caches.len()).rev() {
            let cache = &caches[t];
            let dh = &grad_outputs[t] + &dh_next;

            let d_o = &dh * &cache.tanh_c;
            let dc = &dh * &cache.o * cache.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;

            let mut dz: Array2<f64> = Array2::zeros((batch, 4 * hs));
            dz.slice_mut(s![.., 0..hs])
                .assign(&(&dc * &cache.g * cache.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., hs..2 * hs])
                .assign(&(&dc * &cache.c_prev * cache.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * hs..3 * hs])
                .assign(&(&dc * &cache.i * cache.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * hs..])
                .assign(&(&d_o * &cache.o.mapv(|v| v * (1.0 - v))));

            dw += &cache.x.t().dot(&dz);
            du += &cache.h_prev.t().dot(&dz);
            db += &dz.sum_axis(Axis(0)).insert_axis(Axis(0));

            dx_seq[t] = dz.dot(&self.w.value.t());
            dh_next = dz.dot(&self.u.value.t());
            dc_next = &dc * &cache.f;
        }

        (LayerGrads { w: dw, u: du, b: db }, dx_seq)
    }

    fn apply(&mut self, grads: &LayerGrads, lr: f64, t: i32) {
        self.w.adam_step(&grads.w, lr, t);
        self.u.adam_step(&grads.u, lr, t);
        self.b.adam_step(&grads.b, lr, t);
    }
}

/// Stacked LSTM next-value regressor
#[derive(Debug, Clone)]
pub struct LstmRegressor {
    config: NetworkConfig,
    lstm1: LstmLayer,
    lstm2: LstmLayer,
    dense1_w: Param,
    dense1_b: Param,
    dense2_w: Param,
    dense2_b: Param,
    rng: StdRng,
    step: i32,
}

impl LstmRegressor {
    pub fn new(config: NetworkConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let (units1, units2) = config.recurrent_units;

        let lstm1 = LstmLayer::new(1, units1, &mut rng);
        let lstm2 = LstmLayer::new(units1, units2, &mut rng);
        let dense1_w = Param::glorot(units2, config.dense_units, &mut rng);
        let dense2_w = Param::glorot(config.dense_units, 1, &mut rng);

        Self {
            dense1_b: Param::zeros(1, config.dense_units),
            dense2_b: Param::zeros(1, 1),
            config,
            lstm1,
            lstm2,
            dense1_w,
            dense2_w,
            rng,
            step: 0,
        }
    }

    /// One `(batch, 1)` matrix per time step
    fn time_major(&self, windows: &[&[f64]]) -> Vec<Array2<f64>> {
        (0..self.config.lookback)
            .map(|t| Array2::from_shape_fn((windows.len(), 1), |(r, _)| windows[r][t]))
            .collect()
    }

    fn dropout_mask(&mut self, rows: usize, cols: usize) -> Array2<f64> {
        let keep = 1.0 - self.config.dropout;
        if keep >= 1.0 {
            return Array2::ones((rows, cols));
        }
        let rng = &mut self.rng;
        Array2::from_shape_fn((rows, cols), |_| {
            if rng.gen::<f64>() < keep {
                1.0 / keep
            } else {
                0.0
            }
        })
    }

    fn infer(&self, inputs: &[Array2<f64>]) -> Array2<f64> {
        let (h1_seq, _) = self.lstm1.forward(inputs);
        let (h2_seq, _) = self.lstm2.forward(&h1_seq);
        let h2_last = &h2_seq[h2_seq.len() - 1];
        let a1 = (h2_last.dot(&self.dense1_w.value) + &self.dense1_b.value).mapv(|v| v.max(0.0));
        a1.dot(&self.dense2_w.value) + &self.dense2_b.value
    }

    fn train_batch(&mut self, inputs: &[Array2<f64>], targets: &Array2<f64>) -> f64 {
        let batch = targets.nrows();
        let units1 = self.config.recurrent_units.0;
        let units2 = self.config.recurrent_units.1;

        // Forward with dropout
        let (h1_seq, cache1) = self.lstm1.forward(inputs);
        let masks1: Vec<Array2<f64>> = (0..h1_seq.len())
            .map(|_| self.dropout_mask(batch, units1))
            .collect();
        let dropped1: Vec<Array2<f64>> = h1_seq.iter().zip(&masks1).map(|(h, m)| h * m).collect();

        let (h2_seq, cache2) = self.lstm2.forward(&dropped1);
        let mask2 = self.dropout_mask(batch, units2);
        let h2_drop = &h2_seq[h2_seq.len() - 1] * &mask2;

        let z1 = h2_drop.dot(&self.dense1_w.value) + &self.dense1_b.value;
        let a1 = z1.mapv(|v| v.max(0.0));
        let pred = a1.dot(&self.dense2_w.value) + &self.dense2_b.value;

        let err = &pred - targets;
        let loss = err.mapv(|e| e * e).mean().unwrap_or(0.0);

        // Backward
        let d_pred = err * (2.0 / batch as f64);
        let g_dense2_w = a1.t().dot(&d_pred);
        let g_dense2_b = d_pred.sum_axis(Axis(0)).insert_axis(Axis(0));

        let d_z1 = d_pred.dot(&self.dense2_w.value.t()) * z1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let g_dense1_w = h2_drop.t().dot(&d_z1);
        let g_dense1_b = d_z1.sum_axis(Axis(0)).insert_axis(Axis(0));

        let mut grad_h2: Vec<Array2<f64>> = h2_seq.iter().map(|h| Array2::zeros(h.raw_dim())).collect();
        let last = grad_h2.len() - 1;
        grad_h2[last] = d_z1.dot(&self.dense1_w.value.t()) * &mask2;

        let (grads2, dx2) = self.lstm2.backward(&cache2, &grad_h2);
        let grad_h1: Vec<Array2<f64>> = dx2.iter().zip(&masks1).map(|(d, m)| d * m).collect();
        let (grads1, _) = self.lstm1.backward(&cache1, &grad_h1);

        self.step += 1;
        let (lr, t) = (self.config.learning_rate, self.step);
        self.lstm1.apply(&grads1, lr, t);
        self.lstm2.apply(&grads2, lr, t);
        self.dense1_w.adam_step(&g_dense1_w, lr, t);
        self.dense1_b.adam_step(&g_dense1_b, lr, t);
        self.dense2_w.adam_step(&g_dense2_w, lr, t);
        self.dense2_b.adam_step(&g_dense2_b, lr, t);

        loss
    }

    fn check_window(&self, window: &[f64]) -> Result<()> {
        if window.len() != self.config.lookback {
            return Err(ForecastError::ValidationError(format!(
                "Window has {} values, network expects {}",
                window.len(),
                self.config.lookback
            )));
        }
        Ok(())
    }
}

impl SequenceRegressor for LstmRegressor {
    fn fit(&mut self, windows: &[Vec<f64>], targets: &[f64]) -> Result<f64> {
        if windows.is_empty() || windows.len() != targets.len() {
            return Err(ForecastError::TrainingError(format!(
                "Expected matching non-empty windows and targets, got {} and {}",
                windows.len(),
                targets.len()
            )));
        }
        for window in windows {
            self.check_window(window)?;
        }

        let n = windows.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut epoch_loss = 0.0;

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut self.rng);
            let mut total = 0.0;

            for chunk in order.chunks(self.config.batch_size.max(1)) {
                let batch_windows: Vec<&[f64]> = chunk.iter().map(|&i| windows[i].as_slice()).collect();
                let inputs = self.time_major(&batch_windows);
                let batch_targets = Array2::from_shape_fn((chunk.len(), 1), |(r, _)| targets[chunk[r]]);
                total += self.train_batch(&inputs, &batch_targets) * chunk.len() as f64;
            }

            epoch_loss = total / n as f64;
            if !epoch_loss.is_finite() {
                return Err(ForecastError::TrainingError(format!(
                    "Loss diverged at epoch {}",
                    epoch + 1
                )));
            }
            tracing::trace!(epoch = epoch + 1, loss = epoch_loss, "lstm epoch");
        }

        Ok(epoch_loss)
    }

    fn predict(&self, window: &[f64]) -> Result<f64> {
        self.check_window(window)?;
        let out = self.infer(&self.time_major(&[window]));
        Ok(out[[0, 0]])
    }

    fn predict_batch(&self, windows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if windows.is_empty() {
            return Ok(Vec::new());
        }
        for window in windows {
            self.check_window(window)?;
        }
        let refs: Vec<&[f64]> = windows.iter().map(|w| w.as_slice()).collect();
        Ok(self.infer(&self.time_major(&refs)).column(0).to_vec())
    }
}

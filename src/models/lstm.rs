//! Long short-term memory network trained by truncated-free BPTT
//!
//! Two stacked LSTM cells feed a small dense head. Training uses minibatch
//! gradient descent with global-norm clipping, inverted dropout on the
//! recurrent outputs, and early stopping on the epoch loss. All randomness
//! flows from one seeded generator, so a fixed seed reproduces the run.

use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn sigmoid(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

fn tanh(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(f64::tanh)
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let a2 = a.view().insert_axis(Axis(1));
    let b2 = b.view().insert_axis(Axis(0));
    a2.dot(&b2)
}

/// One LSTM cell with per-gate weights, gate order i / f / g / o.
#[derive(Debug, Clone)]
struct LstmCell {
    w_ii: Array2<f64>,
    w_hi: Array2<f64>,
    b_i: Array1<f64>,
    w_if: Array2<f64>,
    w_hf: Array2<f64>,
    b_f: Array1<f64>,
    w_ig: Array2<f64>,
    w_hg: Array2<f64>,
    b_g: Array1<f64>,
    w_io: Array2<f64>,
    w_ho: Array2<f64>,
    b_o: Array1<f64>,
    hidden: usize,
}

/// Everything the backward pass needs from one forward step.
#[derive(Debug, Clone)]
struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    tanh_c: Array1<f64>,
    h: Array1<f64>,
}

#[derive(Debug, Clone)]
struct CellGrads {
    dw_ii: Array2<f64>,
    dw_hi: Array2<f64>,
    db_i: Array1<f64>,
    dw_if: Array2<f64>,
    dw_hf: Array2<f64>,
    db_f: Array1<f64>,
    dw_ig: Array2<f64>,
    dw_hg: Array2<f64>,
    db_g: Array1<f64>,
    dw_io: Array2<f64>,
    dw_ho: Array2<f64>,
    db_o: Array1<f64>,
}

impl CellGrads {
    fn zeros(input: usize, hidden: usize) -> Self {
        Self {
            dw_ii: Array2::zeros((hidden, input)),
            dw_hi: Array2::zeros((hidden, hidden)),
            db_i: Array1::zeros(hidden),
            dw_if: Array2::zeros((hidden, input)),
            dw_hf: Array2::zeros((hidden, hidden)),
            db_f: Array1::zeros(hidden),
            dw_ig: Array2::zeros((hidden, input)),
            dw_hg: Array2::zeros((hidden, hidden)),
            db_g: Array1::zeros(hidden),
            dw_io: Array2::zeros((hidden, input)),
            dw_ho: Array2::zeros((hidden, hidden)),
            db_o: Array1::zeros(hidden),
        }
    }

    fn squared_norm(&self) -> f64 {
        let mats = [
            &self.dw_ii, &self.dw_hi, &self.dw_if, &self.dw_hf, &self.dw_ig, &self.dw_hg,
            &self.dw_io, &self.dw_ho,
        ];
        let vecs = [&self.db_i, &self.db_f, &self.db_g, &self.db_o];
        mats.iter().map(|m| m.mapv(|v| v * v).sum()).sum::<f64>()
            + vecs.iter().map(|v| v.mapv(|v| v * v).sum()).sum::<f64>()
    }

    fn scale(&mut self, factor: f64) {
        for m in [
            &mut self.dw_ii, &mut self.dw_hi, &mut self.dw_if, &mut self.dw_hf,
            &mut self.dw_ig, &mut self.dw_hg, &mut self.dw_io, &mut self.dw_ho,
        ] {
            *m *= factor;
        }
        for v in [&mut self.db_i, &mut self.db_f, &mut self.db_g, &mut self.db_o] {
            *v *= factor;
        }
    }
}

impl LstmCell {
    fn new(input: usize, hidden: usize, rng: &mut ChaCha8Rng) -> Self {
        let limit = (1.0 / hidden as f64).sqrt();
        let dist = Uniform::new(-limit, limit);
        let mat = |rows: usize, cols: usize, rng: &mut ChaCha8Rng| {
            Array2::random_using((rows, cols), dist, rng)
        };

        Self {
            w_ii: mat(hidden, input, rng),
            w_hi: mat(hidden, hidden, rng),
            b_i: Array1::zeros(hidden),
            w_if: mat(hidden, input, rng),
            w_hf: mat(hidden, hidden, rng),
            // Open forget gates at the start of training
            b_f: Array1::from_elem(hidden, 1.0),
            w_ig: mat(hidden, input, rng),
            w_hg: mat(hidden, hidden, rng),
            b_g: Array1::zeros(hidden),
            w_io: mat(hidden, input, rng),
            w_ho: mat(hidden, hidden, rng),
            b_o: Array1::zeros(hidden),
            hidden,
        }
    }

    fn input_size(&self) -> usize {
        self.w_ii.ncols()
    }

    /// Run the cell over a whole sequence from zero state, keeping the
    /// per-step caches.
    fn forward(&self, xs: &[Array1<f64>]) -> Vec<StepCache> {
        let mut h = Array1::zeros(self.hidden);
        let mut c = Array1::zeros(self.hidden);
        let mut caches = Vec::with_capacity(xs.len());

        for x in xs {
            let i = sigmoid(&(self.w_ii.dot(x) + self.w_hi.dot(&h) + &self.b_i));
            let f = sigmoid(&(self.w_if.dot(x) + self.w_hf.dot(&h) + &self.b_f));
            let g = tanh(&(self.w_ig.dot(x) + self.w_hg.dot(&h) + &self.b_g));
            let o = sigmoid(&(self.w_io.dot(x) + self.w_ho.dot(&h) + &self.b_o));

            let c_next = &f * &c + &i * &g;
            let tanh_c = tanh(&c_next);
            let h_next = &o * &tanh_c;

            caches.push(StepCache {
                x: x.clone(),
                h_prev: h.clone(),
                c_prev: c.clone(),
                i,
                f,
                g,
                o,
                tanh_c,
                h: h_next.clone(),
            });

            h = h_next;
            c = c_next;
        }

        caches
    }

    /// Backpropagate through the whole sequence. `dh_seq[t]` is the loss
    /// gradient flowing into `h_t` from above; returns gradients on the
    /// inputs alongside accumulated weight gradients.
    fn backward(&self, caches: &[StepCache], dh_seq: &[Array1<f64>], grads: &mut CellGrads) -> Vec<Array1<f64>> {
        let mut dh_next: Array1<f64> = Array1::zeros(self.hidden);
        let mut dc_next: Array1<f64> = Array1::zeros(self.hidden);
        let mut dx_seq = vec![Array1::zeros(self.input_size()); caches.len()];

        for t in (0..caches.len()).rev() {
            let cache = &caches[t];
            let dh = &dh_seq[t] + &dh_next;

            let d_o = &dh * &cache.tanh_c;
            let dc = &dh * &cache.o * cache.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;

            let dz_i = &dc * &cache.g * &cache.i * cache.i.mapv(|v| 1.0 - v);
            let dz_f = &dc * &cache.c_prev * &cache.f * cache.f.mapv(|v| 1.0 - v);
            let dz_g = &dc * &cache.i * cache.g.mapv(|v| 1.0 - v * v);
            let dz_o = &d_o * &cache.o * cache.o.mapv(|v| 1.0 - v);

            grads.dw_ii += &outer(&dz_i, &cache.x);
            grads.dw_hi += &outer(&dz_i, &cache.h_prev);
            grads.db_i += &dz_i;
            grads.dw_if += &outer(&dz_f, &cache.x);
            grads.dw_hf += &outer(&dz_f, &cache.h_prev);
            grads.db_f += &dz_f;
            grads.dw_ig += &outer(&dz_g, &cache.x);
            grads.dw_hg += &outer(&dz_g, &cache.h_prev);
            grads.db_g += &dz_g;
            grads.dw_io += &outer(&dz_o, &cache.x);
            grads.dw_ho += &outer(&dz_o, &cache.h_prev);
            grads.db_o += &dz_o;

            dx_seq[t] = self.w_ii.t().dot(&dz_i)
                + self.w_if.t().dot(&dz_f)
                + self.w_ig.t().dot(&dz_g)
                + self.w_io.t().dot(&dz_o);

            dh_next = self.w_hi.t().dot(&dz_i)
                + self.w_hf.t().dot(&dz_f)
                + self.w_hg.t().dot(&dz_g)
                + self.w_ho.t().dot(&dz_o);
            dc_next = &dc * &cache.f;
        }

        dx_seq
    }

    fn apply(&mut self, grads: &CellGrads, lr: f64) {
        self.w_ii -= &(grads.dw_ii.mapv(|v| v * lr));
        self.w_hi -= &(grads.dw_hi.mapv(|v| v * lr));
        self.b_i -= &(grads.db_i.mapv(|v| v * lr));
        self.w_if -= &(grads.dw_if.mapv(|v| v * lr));
        self.w_hf -= &(grads.dw_hf.mapv(|v| v * lr));
        self.b_f -= &(grads.db_f.mapv(|v| v * lr));
        self.w_ig -= &(grads.dw_ig.mapv(|v| v * lr));
        self.w_hg -= &(grads.dw_hg.mapv(|v| v * lr));
        self.b_g -= &(grads.db_g.mapv(|v| v * lr));
        self.w_io -= &(grads.dw_io.mapv(|v| v * lr));
        self.w_ho -= &(grads.dw_ho.mapv(|v| v * lr));
        self.b_o -= &(grads.db_o.mapv(|v| v * lr));
    }
}

/// Fully connected layer.
#[derive(Debug, Clone)]
struct Dense {
    w: Array2<f64>,
    b: Array1<f64>,
}

#[derive(Debug, Clone)]
struct DenseGrads {
    dw: Array2<f64>,
    db: Array1<f64>,
}

impl DenseGrads {
    fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            dw: Array2::zeros((rows, cols)),
            db: Array1::zeros(rows),
        }
    }

    fn squared_norm(&self) -> f64 {
        self.dw.mapv(|v| v * v).sum() + self.db.mapv(|v| v * v).sum()
    }

    fn scale(&mut self, factor: f64) {
        self.dw *= factor;
        self.db *= factor;
    }
}

impl Dense {
    fn new(input: usize, output: usize, rng: &mut ChaCha8Rng) -> Self {
        let limit = (6.0 / (input + output) as f64).sqrt();
        Self {
            w: Array2::random_using((output, input), Uniform::new(-limit, limit), rng),
            b: Array1::zeros(output),
        }
    }

    fn forward(&self, x: &Array1<f64>) -> Array1<f64> {
        self.w.dot(x) + &self.b
    }

    fn apply(&mut self, grads: &DenseGrads, lr: f64) {
        self.w -= &(grads.dw.mapv(|v| v * lr));
        self.b -= &(grads.db.mapv(|v| v * lr));
    }
}

/// Minibatch training options.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Epochs without epoch-loss improvement before stopping
    pub patience: usize,
    /// Global gradient-norm ceiling
    pub clip_norm: f64,
}

/// Stacked recurrent network: LSTM -> LSTM -> ReLU dense -> linear head.
#[derive(Debug, Clone)]
pub struct LstmNetwork {
    cell1: LstmCell,
    cell2: LstmCell,
    dense1: Dense,
    dense2: Dense,
    dropout: f64,
    hidden: usize,
    dense: usize,
    rng: ChaCha8Rng,
}

struct NetworkGrads {
    cell1: CellGrads,
    cell2: CellGrads,
    dense1: DenseGrads,
    dense2: DenseGrads,
}

impl NetworkGrads {
    fn global_norm(&self) -> f64 {
        (self.cell1.squared_norm()
            + self.cell2.squared_norm()
            + self.dense1.squared_norm()
            + self.dense2.squared_norm())
        .sqrt()
    }

    fn clip(&mut self, max_norm: f64) {
        let norm = self.global_norm();
        if norm > max_norm && norm > 0.0 {
            let factor = max_norm / norm;
            self.cell1.scale(factor);
            self.cell2.scale(factor);
            self.dense1.scale(factor);
            self.dense2.scale(factor);
        }
    }
}

impl LstmNetwork {
    pub fn new(hidden: usize, dense: usize, dropout: f64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cell1 = LstmCell::new(1, hidden, &mut rng);
        let cell2 = LstmCell::new(hidden, hidden, &mut rng);
        let dense1 = Dense::new(hidden, dense, &mut rng);
        let dense2 = Dense::new(dense, 1, &mut rng);

        Self {
            cell1,
            cell2,
            dense1,
            dense2,
            dropout,
            hidden,
            dense,
            rng,
        }
    }

    fn inputs(window: &[f64]) -> Vec<Array1<f64>> {
        window.iter().map(|&v| Array1::from_elem(1, v)).collect()
    }

    /// Inverted-dropout mask: zero with probability `p`, otherwise scaled
    /// by `1 / (1 - p)` so the expected activation is unchanged.
    fn mask(&mut self, len: usize) -> Array1<f64> {
        if self.dropout <= 0.0 {
            return Array1::from_elem(len, 1.0);
        }
        let keep = 1.0 - self.dropout;
        let rng = &mut self.rng;
        Array1::from_iter((0..len).map(|_| {
            if rng.gen::<f64>() < keep {
                1.0 / keep
            } else {
                0.0
            }
        }))
    }

    /// Deterministic forward pass with dropout disabled.
    pub fn predict_one(&self, window: &[f64]) -> f64 {
        let xs = Self::inputs(window);
        let caches1 = self.cell1.forward(&xs);
        let h1: Vec<Array1<f64>> = caches1.iter().map(|c| c.h.clone()).collect();
        let caches2 = self.cell2.forward(&h1);

        let last = match caches2.last() {
            Some(cache) => cache.h.clone(),
            None => Array1::zeros(self.hidden),
        };
        let a = self.dense1.forward(&last).mapv(|v| v.max(0.0));
        self.dense2.forward(&a)[0]
    }

    /// Train on scaled windows and targets. Returns the per-epoch loss
    /// history, truncated where early stopping kicked in.
    pub fn train(&mut self, windows: &[Vec<f64>], targets: &[f64], opts: &TrainOptions) -> Vec<f64> {
        let n = windows.len();
        let mut history = Vec::with_capacity(opts.epochs);
        let mut best_loss = f64::INFINITY;
        let mut stale_epochs = 0usize;

        let mut order: Vec<usize> = (0..n).collect();

        for _epoch in 0..opts.epochs {
            order.shuffle(&mut self.rng);
            let mut epoch_sq_error = 0.0;

            for batch in order.chunks(opts.batch_size) {
                let mut grads = NetworkGrads {
                    cell1: CellGrads::zeros(1, self.hidden),
                    cell2: CellGrads::zeros(self.hidden, self.hidden),
                    dense1: DenseGrads::zeros(self.dense, self.hidden),
                    dense2: DenseGrads::zeros(1, self.dense),
                };

                for &idx in batch {
                    epoch_sq_error +=
                        self.accumulate_sample(&windows[idx], targets[idx], batch.len(), &mut grads);
                }

                grads.clip(opts.clip_norm);
                self.cell1.apply(&grads.cell1, opts.learning_rate);
                self.cell2.apply(&grads.cell2, opts.learning_rate);
                self.dense1.apply(&grads.dense1, opts.learning_rate);
                self.dense2.apply(&grads.dense2, opts.learning_rate);
            }

            let epoch_loss = epoch_sq_error / n as f64;
            history.push(epoch_loss);

            if epoch_loss < best_loss {
                best_loss = epoch_loss;
                stale_epochs = 0;
            } else {
                stale_epochs += 1;
                if stale_epochs >= opts.patience {
                    break;
                }
            }
        }

        history
    }

    /// Forward and backward for one sample, adding its gradient
    /// contribution to `grads`. Returns the squared error.
    fn accumulate_sample(
        &mut self,
        window: &[f64],
        target: f64,
        batch_len: usize,
        grads: &mut NetworkGrads,
    ) -> f64 {
        let steps = window.len();
        let xs = Self::inputs(window);

        // Forward with dropout on both recurrent outputs
        let caches1 = self.cell1.forward(&xs);
        let masks1: Vec<Array1<f64>> = (0..steps).map(|_| self.mask(self.hidden)).collect();
        let h1_dropped: Vec<Array1<f64>> = caches1
            .iter()
            .zip(&masks1)
            .map(|(c, m)| &c.h * m)
            .collect();

        let caches2 = self.cell2.forward(&h1_dropped);
        let mask2 = self.mask(self.hidden);
        let h2_last = &caches2[steps - 1].h * &mask2;

        let z1 = self.dense1.forward(&h2_last);
        let a1 = z1.mapv(|v| v.max(0.0));
        let output = self.dense2.forward(&a1)[0];

        let error = output - target;
        // d(mean squared error)/d(output) over the batch
        let d_out = 2.0 * error / batch_len as f64;

        // Dense head backward
        let d_out_vec = Array1::from_elem(1, d_out);
        grads.dense2.dw += &outer(&d_out_vec, &a1);
        grads.dense2.db += &d_out_vec;
        let da1 = self.dense2.w.t().dot(&d_out_vec);

        let dz1 = &da1 * &z1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        grads.dense1.dw += &outer(&dz1, &h2_last);
        grads.dense1.db += &dz1;
        let dh2_last = self.dense1.w.t().dot(&dz1) * &mask2;

        // Only the final output of the second cell feeds the head
        let mut dh2_seq = vec![Array1::zeros(self.hidden); steps];
        dh2_seq[steps - 1] = dh2_last;
        let dx2 = self.cell2.backward(&caches2, &dh2_seq, &mut grads.cell2);

        let dh1_seq: Vec<Array1<f64>> = dx2.iter().zip(&masks1).map(|(d, m)| d * m).collect();
        self.cell1.backward(&caches1, &dh1_seq, &mut grads.cell1);

        error * error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_options() -> TrainOptions {
        TrainOptions {
            epochs: 40,
            batch_size: 4,
            learning_rate: 0.05,
            patience: 40,
            clip_norm: 5.0,
        }
    }

    fn sine_samples(count: usize, lookback: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let series: Vec<f64> = (0..count + lookback)
            .map(|i| 0.5 + 0.4 * (i as f64 * 0.3).sin())
            .collect();
        let windows: Vec<Vec<f64>> = (0..count).map(|i| series[i..i + lookback].to_vec()).collect();
        let targets: Vec<f64> = (0..count).map(|i| series[i + lookback]).collect();
        (windows, targets)
    }

    #[test]
    fn loss_decreases_on_a_sine_wave() {
        let (windows, targets) = sine_samples(60, 8);
        let mut net = LstmNetwork::new(6, 4, 0.0, 7);

        let history = net.train(&windows, &targets, &tiny_options());
        assert!(history.len() >= 2);
        let first = history[0];
        let last = history[history.len() - 1];
        assert!(last < first, "loss went from {} to {}", first, last);
    }

    #[test]
    fn fixed_seed_reproduces_predictions() {
        let (windows, targets) = sine_samples(30, 6);
        let opts = TrainOptions {
            epochs: 5,
            ..tiny_options()
        };

        let mut a = LstmNetwork::new(4, 3, 0.2, 11);
        let mut b = LstmNetwork::new(4, 3, 0.2, 11);
        a.train(&windows, &targets, &opts);
        b.train(&windows, &targets, &opts);

        assert_eq!(a.predict_one(&windows[0]), b.predict_one(&windows[0]));
    }

    #[test]
    fn early_stopping_truncates_the_history() {
        let (windows, targets) = sine_samples(20, 5);
        let opts = TrainOptions {
            epochs: 200,
            patience: 2,
            ..tiny_options()
        };

        let mut net = LstmNetwork::new(4, 3, 0.0, 3);
        let history = net.train(&windows, &targets, &opts);
        assert!(history.len() <= 200);
    }
}

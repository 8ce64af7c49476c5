use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

// stddev of a unit normal truncated to [-2, 2]
const TRUNCATED_NORMAL_STDDEV: f64 = 0.879_625_661_034_239_8;

/// How a kernel of shape `[fan_in, fan_out]` is filled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Initializer {
    Zeros,
    Uniform(f32, f32),
    /// Uniform in `±sqrt(6 / (fan_in + fan_out))`.
    #[default]
    GlorotUniform,
    /// Normal truncated at two standard deviations, scaled so the resulting
    /// variance is `2 / (fan_in + fan_out)`.
    GlorotNormal,
}

impl Initializer {
    pub fn init(&self, fan_in: usize, fan_out: usize, seed: u64) -> Tensor {
        let shape = vec![fan_in, fan_out];
        let size = fan_in * fan_out;
        let mut rng = Pcg64::seed_from_u64(seed);
        let fan_sum = (fan_in + fan_out).max(1) as f64;

        let data = match self {
            Initializer::Zeros => vec![0.0; size],
            Initializer::Uniform(low, high) => {
                if low >= high {
                    vec![*low; size]
                } else {
                    let uniform = Uniform::new(*low, *high);
                    (0..size).map(|_| uniform.sample(&mut rng)).collect()
                }
            }
            Initializer::GlorotUniform => {
                let limit = (6.0 / fan_sum).sqrt() as f32;
                let uniform = Uniform::new_inclusive(-limit, limit);
                (0..size).map(|_| uniform.sample(&mut rng)).collect()
            }
            Initializer::GlorotNormal => {
                let stddev = (2.0 / fan_sum).sqrt() / TRUNCATED_NORMAL_STDDEV;
                sample_truncated_normal(&mut rng, stddev, size)
            }
        };

        Tensor::new(data, shape)
    }
}

// Rejection sampling; accepts about 95% of draws.
fn sample_truncated_normal(rng: &mut Pcg64, stddev: f64, size: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        let z: f64 = rng.sample(StandardNormal);
        if z.abs() <= 2.0 {
            data.push((z * stddev) as f32);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glorot_uniform_stays_within_limit() {
        let kernel = Initializer::GlorotUniform.init(784, 500, 7);
        let limit = (6.0f32 / 1284.0).sqrt();
        assert_eq!(kernel.shape, vec![784, 500]);
        assert!(kernel.data.iter().all(|w| w.abs() <= limit + 1e-6));
    }

    #[test]
    fn glorot_normal_is_truncated_and_scaled() {
        let kernel = Initializer::GlorotNormal.init(300, 100, 11);
        let stddev = (2.0f64 / 400.0).sqrt() / TRUNCATED_NORMAL_STDDEV;
        let bound = (2.0 * stddev) as f32 + 1e-6;
        assert!(kernel.data.iter().all(|w| w.abs() <= bound));

        let n = kernel.size() as f32;
        let mean = kernel.sum() / n;
        let variance = kernel.data.iter().map(|w| (w - mean).powi(2)).sum::<f32>() / n;
        assert!(mean.abs() < 0.01);
        assert!((variance - 2.0 / 400.0).abs() < 0.001);
    }

    #[test]
    fn same_seed_same_kernel() {
        let a = Initializer::GlorotNormal.init(20, 10, 3);
        let b = Initializer::GlorotNormal.init(20, 10, 3);
        let c = Initializer::GlorotNormal.init(20, 10, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Parallel,
}

/// Dense row-major tensor. Batches are laid out as `[batch, features]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl Tensor {

    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
        let expected_size: usize = shape.iter().product();
        assert_eq!(data.len(), expected_size,
            "Data length {} doesn't match shape {:?} (expected {})",
            data.len(), shape, expected_size);
        Tensor {
            data,
            shape,
        }
    }

    pub fn scalar(scalar: f32) -> Tensor {
        Tensor { data: vec![scalar], shape: vec![1] }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rows(&self) -> usize {
        if self.shape.len() >= 1 { self.shape[0] } else { 1 }
    }

    pub fn cols(&self) -> usize {
        if self.shape.len() >= 2 { self.shape[1] } else { 1 }
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn is_matrix(&self) -> bool {
        self.rank() == 2
    }

    pub fn random(shape: Vec<usize>, seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        let uniform = Uniform::new(0.0, 1.0);
        let size: usize = shape.iter().product();
        let data = (0..size)
            .map(|_| uniform.sample(&mut rng))
            .collect::<Vec<f32>>();

        Tensor::new(data, shape)
    }

    pub fn ones(shape: Vec<usize>) -> Tensor {
        let size: usize = shape.iter().product();
        Tensor::new(vec![1.0; size], shape)
    }

    pub fn zeros(shape: Vec<usize>) -> Tensor {
        let size: usize = shape.iter().product();
        Tensor::new(vec![0.0; size], shape)
    }

    /// Same data under a new shape. The element count must not change.
    pub fn reshape(&self, shape: Vec<usize>) -> Tensor {
        let size: usize = shape.iter().product();
        assert_eq!(self.size(), size,
            "Cannot reshape {:?} into {:?}", self.shape, shape);
        Tensor::new(self.data.clone(), shape)
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let cols = self.cols();
        &self.data[index * cols..(index + 1) * cols]
    }

    /// Gathers the given rows into a new `[indices.len(), cols]` tensor.
    pub fn select_rows(&self, indices: &[usize]) -> Tensor {
        let cols = self.cols();
        let mut data = Vec::with_capacity(indices.len() * cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Tensor::new(data, vec![indices.len(), cols])
    }

    pub fn transpose(&self) -> Tensor {
        assert_eq!(self.rank(), 2, "Transpose only supported for 2D tensors");
        let rows = self.rows();
        let cols = self.cols();
        let mut data = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                data[j * rows + i] = self.data[i * cols + j];
            }
        }
        Tensor::new(data, vec![cols, rows])
    }

    pub fn scale(&self, scalar: f32) -> Tensor {
        self.map(|x| x * scalar)
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f32) -> f32,
    {
        let data = self.data.iter().map(|&x| f(x)).collect();
        Tensor::new(data, self.shape.clone())
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    pub fn square(&self) -> Tensor {
        self.map(|x| x * x)
    }

    // Element wise multiplication
    pub fn hadamard(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.shape, other.shape, "Tensor hadamard: shape mismatch {:?} vs {:?}", self.shape, other.shape);

        let data = self.data.iter().zip(other.data.iter()).map(|(a, b)| a * b).collect();
        Tensor::new(data, self.shape.clone())
    }

    /// Adds a `1 x cols` row to every row of `self`.
    pub fn add_row(&self, row: &Tensor) -> Tensor {
        let cols = self.cols();
        assert_eq!(row.size(), cols, "Row broadcast: expected {} values, got {}", cols, row.size());
        let mut data = self.data.clone();
        if cols > 0 {
            for chunk in data.chunks_mut(cols) {
                for (x, b) in chunk.iter_mut().zip(row.data.iter()) {
                    *x += b;
                }
            }
        }
        Tensor::new(data, self.shape.clone())
    }

    /// Column sums, returned as a `1 x cols` row.
    pub fn sum_rows(&self) -> Tensor {
        let cols = self.cols();
        let mut sums = vec![0.0; cols];
        if cols > 0 {
            for chunk in self.data.chunks(cols) {
                for (s, x) in sums.iter_mut().zip(chunk.iter()) {
                    *s += x;
                }
            }
        }
        Tensor::new(sums, vec![1, cols])
    }

    pub fn mul_seq(&self, matrix: &Tensor) -> Tensor {
        let (r1, c1, c2) = self.mul_dims(matrix);
        let mut result = vec![0.0; r1 * c2];
        if c2 > 0 {
            for (i, out_row) in result.chunks_mut(c2).enumerate() {
                Self::accumulate_row(&self.data[i * c1..(i + 1) * c1], &matrix.data, c2, out_row);
            }
        }
        Tensor::new(result, vec![r1, c2])
    }

    /// Output rows are independent, so they are split across the rayon pool.
    pub fn mul_par(&self, matrix: &Tensor) -> Tensor {
        let (r1, c1, c2) = self.mul_dims(matrix);
        let mut result = vec![0.0; r1 * c2];
        if c2 > 0 {
            result
                .par_chunks_mut(c2)
                .enumerate()
                .for_each(|(i, out_row)| {
                    Self::accumulate_row(&self.data[i * c1..(i + 1) * c1], &matrix.data, c2, out_row);
                });
        }
        Tensor::new(result, vec![r1, c2])
    }

    pub fn mul(&self, matrix: &Tensor, execution_mode: ExecutionMode) -> Tensor {
        match execution_mode {
            ExecutionMode::Sequential => self.mul_seq(matrix),
            ExecutionMode::Parallel => self.mul_par(matrix),
        }
    }

    fn mul_dims(&self, matrix: &Tensor) -> (usize, usize, usize) {
        let r1 = self.rows();
        let c1 = self.cols();
        let r2 = matrix.rows();
        let c2 = matrix.cols();
        assert_eq!(c1, r2, "Matrix dimensions don't match: {}x{} * {}x{}", r1, c1, r2, c2);
        (r1, c1, c2)
    }

    // i-k-j order keeps both inner reads contiguous.
    fn accumulate_row(a_row: &[f32], b: &[f32], c2: usize, out_row: &mut [f32]) {
        for (k, &a) in a_row.iter().enumerate() {
            if a == 0.0 {
                continue;
            }
            let b_row = &b[k * c2..(k + 1) * c2];
            for (out, &x) in out_row.iter_mut().zip(b_row.iter()) {
                *out += a * x;
            }
        }
    }

    pub fn argmax(&self) -> usize {
        assert_eq!(self.cols(), 1, "argmax only works on column vectors (rx1 tensors)");
        Self::argmax_slice(&self.data)
    }

    /// Index of the largest value in each row. Ties go to the first index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        let cols = self.cols();
        if cols == 0 {
            return vec![0; self.rows()];
        }
        self.data.chunks(cols).map(Self::argmax_slice).collect()
    }

    fn argmax_slice(values: &[f32]) -> usize {
        let mut max_idx = 0;
        let mut max_val = f32::NEG_INFINITY;
        for (i, &val) in values.iter().enumerate() {
            if val > max_val {
                max_val = val;
                max_idx = i;
            }
        }
        max_idx
    }

    pub fn relu(&self) -> Tensor {
        self.map(|x| if x > 0.0 { x } else { 0.0 })
    }

    pub fn sigmoid(&self) -> Tensor {
        self.map(|x| 1.0 / (1.0 + (-x).exp()))
    }

    pub fn tanh(&self) -> Tensor {
        self.map(|x| x.tanh())
    }

    /// Softmax over each row, shifted by the row maximum.
    pub fn softmax_rows(&self) -> Tensor {
        let cols = self.cols();
        let mut data = self.data.clone();
        if cols > 0 {
            for row in data.chunks_mut(cols) {
                let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0;
                for x in row.iter_mut() {
                    *x = (*x - max).exp();
                    sum += *x;
                }
                for x in row.iter_mut() {
                    *x /= sum;
                }
            }
        }
        Tensor::new(data, self.shape.clone())
    }

    pub fn approx_eq(&self, other: &Tensor, tolerance: f32) -> bool {
        self.shape == other.shape
            && self.data.iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }

}

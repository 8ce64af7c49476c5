use crate::tensor::Tensor;

impl Tensor {

    pub fn new_2d(data: Vec<f32>, rows: usize, cols: usize) -> Tensor {
        Self::new(data, vec![rows, cols])
    }

    pub fn random_2d(rows: usize, cols: usize, seed: u64) -> Self {
        Self::random(vec![rows, cols], seed)
    }

    pub fn ones_2d(rows: usize, cols: usize) -> Tensor {
        Self::ones(vec![rows, cols])
    }

    pub fn zeros_2d(rows: usize, cols: usize) -> Tensor {
        Self::zeros(vec![rows, cols])
    }

    /// Builds a `rows x cols` tensor from row slices of equal length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Tensor {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            assert_eq!(row.len(), cols, "Rows must all have {} columns", cols);
            data.extend_from_slice(row);
        }
        Self::new(data, vec![rows.len(), cols])
    }

}

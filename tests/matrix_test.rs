use digit_mlp::tensor::{ExecutionMode, Tensor};

// Helper function to compare tensors with floating point tolerance
fn tensors_equal(a: &Tensor, b: &Tensor, tolerance: f32) -> bool {
    a.approx_eq(b, tolerance)
}

// Helper function to create a tensor with known values for testing
fn create_test_tensor(data: Vec<f32>, rows: usize, cols: usize) -> Tensor {
    Tensor::new_2d(data, rows, cols)
}

#[test]
fn test_basic_matrix_multiplication() {
    // Test 2x2 * 2x2 matrix multiplication
    let a = create_test_tensor(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
    let b = create_test_tensor(vec![5.0, 6.0, 7.0, 8.0], 2, 2);

    // Expected result: [[19, 22], [43, 50]]
    let expected = create_test_tensor(vec![19.0, 22.0, 43.0, 50.0], 2, 2);

    let result_seq = a.mul(&b, ExecutionMode::Sequential);
    let result_par = a.mul(&b, ExecutionMode::Parallel);

    assert!(tensors_equal(&result_seq, &expected, f32::EPSILON));
    assert!(tensors_equal(&result_par, &expected, f32::EPSILON));
}

#[test]
fn test_identity_matrix_multiplication() {
    // Test multiplication with identity matrix
    let a = create_test_tensor(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
    let identity = create_test_tensor(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0], 3, 3);

    let result_seq = a.mul_seq(&identity);
    let result_par = a.mul_par(&identity);

    assert!(tensors_equal(&result_seq, &a, f32::EPSILON));
    assert!(tensors_equal(&result_par, &a, f32::EPSILON));
}

#[test]
fn test_rectangular_matrix_multiplication() {
    // Test 2x3 * 3x2 -> 2x2
    let a = create_test_tensor(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
    let b = create_test_tensor(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], 3, 2);

    let expected = create_test_tensor(vec![58.0, 64.0, 139.0, 154.0], 2, 2);
    let result = a.mul(&b, ExecutionMode::Parallel);

    assert_eq!(result.shape, vec![2, 2]);
    assert!(tensors_equal(&result, &expected, 1e-5));
}

#[test]
fn test_row_vector_times_matrix() {
    // A batch of one sample against a 3x2 kernel
    let x = create_test_tensor(vec![1.0, 0.0, -1.0], 1, 3);
    let w = create_test_tensor(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);

    let result = x.mul(&w, ExecutionMode::Sequential);
    let expected = create_test_tensor(vec![-4.0, -4.0], 1, 2);

    assert!(tensors_equal(&result, &expected, 1e-6));
}

#[test]
fn test_sequential_and_parallel_agree_on_large_matrices() {
    // Random batch-sized product, both modes must produce identical values
    let a = Tensor::random_2d(200, 784, 1);
    let b = Tensor::random_2d(784, 50, 2);

    let result_seq = a.mul(&b, ExecutionMode::Sequential);
    let result_par = a.mul(&b, ExecutionMode::Parallel);

    assert_eq!(result_seq.shape, vec![200, 50]);
    assert_eq!(result_seq, result_par);
}

#[test]
fn test_transpose_product_matches_manual_transpose() {
    let a = create_test_tensor(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);
    let g = create_test_tensor(vec![1.0, -1.0, 0.5, 2.0, 0.0, 1.0], 3, 2);

    // a^T * g = [[1*1+3*0.5+5*0, 1*-1+3*2+5*1], [2*1+4*0.5+6*0, 2*-1+4*2+6*1]]
    let expected = create_test_tensor(vec![2.5, 10.0, 4.0, 12.0], 2, 2);
    let result = a.transpose().mul(&g, ExecutionMode::Parallel);

    assert!(tensors_equal(&result, &expected, 1e-6));
}

#[test]
#[should_panic(expected = "Matrix dimensions don't match")]
fn test_mismatched_dimensions_panic() {
    let a = create_test_tensor(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
    let b = create_test_tensor(vec![1.0, 2.0, 3.0], 3, 1);
    a.mul(&b, ExecutionMode::Sequential);
}

#[test]
fn test_empty_batch_multiplication() {
    let a = Tensor::zeros(vec![0, 3]);
    let b = create_test_tensor(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);

    let result = a.mul(&b, ExecutionMode::Parallel);
    assert_eq!(result.shape, vec![0, 2]);
    assert!(result.data.is_empty());
}

use digit_mlp::experiments::PreparedData;
use digit_mlp::helpers::{baseline_error, render_digit};
use digit_mlp::mlp::Evaluation;
use digit_mlp::mnist_data::{ImageSet, MnistDataset};
use digit_mlp::preprocessing::{flatten_images, format_shape, from_categorical, to_categorical};

#[cfg(test)]
mod preprocessing_tests {
    use super::*;

    fn create_test_set() -> ImageSet {
        ImageSet {
            pixels: vec![0, 255, 51, 102, 255, 0, 0, 0],
            labels: vec![3, 1],
            rows: 2,
            cols: 2,
        }
    }

    #[test]
    fn test_flatten_scales_to_unit_interval() {
        let flat = flatten_images(&create_test_set());

        assert_eq!(flat.shape, vec![2, 4]);
        assert_eq!(flat.data[0], 0.0);
        assert_eq!(flat.data[1], 1.0);
        assert!((flat.data[2] - 0.2).abs() < 1e-6);
        assert!((flat.data[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_to_categorical_infers_class_count() {
        let one_hot = to_categorical(&[3, 1], None);

        assert_eq!(one_hot.shape, vec![2, 4]);
        assert_eq!(one_hot.data, vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_to_categorical_explicit_class_count() {
        let labels: Vec<u8> = (0..10).collect();
        let one_hot = to_categorical(&labels[..3], Some(10));

        assert_eq!(one_hot.shape, vec![3, 10]);
        assert_eq!(one_hot.sum(), 3.0);
        assert_eq!(from_categorical(&one_hot), vec![0, 1, 2]);
    }

    #[test]
    fn test_from_categorical_recovers_labels() {
        let labels = vec![5, 0, 4, 1, 9, 2];
        let one_hot = to_categorical(&labels, Some(10));
        let recovered: Vec<u8> = from_categorical(&one_hot).iter().map(|&l| l as u8).collect();

        assert_eq!(recovered, labels);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_to_categorical_rejects_large_label() {
        to_categorical(&[7], Some(5));
    }

    #[test]
    fn test_format_shape() {
        assert_eq!(format_shape(&[60000, 28, 28]), "(60000, 28, 28)");
        assert_eq!(format_shape(&[60000, 784]), "(60000, 784)");
        assert_eq!(format_shape(&[60000]), "(60000,)");
    }

    #[test]
    fn test_baseline_error_line() {
        let evaluation = Evaluation { loss: 0.3, accuracy: 0.9258 };
        assert_eq!(baseline_error(&evaluation), "Baseline Error: 7.42%");

        let perfect = Evaluation { loss: 0.0, accuracy: 1.0 };
        assert_eq!(baseline_error(&perfect), "Baseline Error: 0.00%");
    }

    #[test]
    fn test_render_digit_shades_by_intensity() {
        let set = create_test_set();
        let rendered = render_digit(set.image(0), set.rows, set.cols);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "│  ██│");
        assert_eq!(lines[2], "│░░░░│");
    }

    #[test]
    fn test_prepared_data_shares_class_count_across_splits() {
        // a truncated training split that never reaches the top test label
        let train = ImageSet { pixels: vec![0; 12], labels: vec![5, 0, 4], rows: 2, cols: 2 };
        let test = ImageSet { pixels: vec![255; 8], labels: vec![7, 2], rows: 2, cols: 2 };
        let data = PreparedData::from_dataset(&MnistDataset { train, test });

        assert_eq!(data.train_labels.shape, vec![3, 10]);
        assert_eq!(data.test_labels.shape, vec![2, 10]);
        assert_eq!(data.num_classes(), 10);
        assert_eq!(from_categorical(&data.test_labels), vec![7, 2]);
        assert_eq!(from_categorical(&data.train_labels), vec![5, 0, 4]);
        assert_eq!(data.num_pixels(), 4);
    }
}

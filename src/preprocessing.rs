use crate::mnist_data::ImageSet;
use crate::tensor::Tensor;

/// Flattens every image into a row of `rows * cols` intensities in `[0, 1]`.
pub fn flatten_images(set: &ImageSet) -> Tensor {
    let data = set.pixels.iter().map(|&pixel| pixel as f32 / 255.0).collect();
    Tensor::new(data, vec![set.len(), set.image_size()])
}

/// One-hot encodes `labels`. Without an explicit class count the widest
/// label decides (`max + 1`).
pub fn to_categorical(labels: &[u8], num_classes: Option<usize>) -> Tensor {
    let num_classes = num_classes.unwrap_or_else(|| {
        labels.iter().max().map_or(0, |&max| max as usize + 1)
    });
    let mut data = vec![0.0; labels.len() * num_classes];
    for (row, &label) in labels.iter().enumerate() {
        assert!((label as usize) < num_classes,
            "Label {} out of range for {} classes", label, num_classes);
        data[row * num_classes + label as usize] = 1.0;
    }
    Tensor::new(data, vec![labels.len(), num_classes])
}

/// Inverse of [`to_categorical`].
pub fn from_categorical(one_hot: &Tensor) -> Vec<usize> {
    one_hot.argmax_rows()
}

/// numpy-style shape: `(60000, 28, 28)`, `(60000,)`.
pub fn format_shape(shape: &[usize]) -> String {
    let parts: Vec<String> = shape.iter().map(|dim| dim.to_string()).collect();
    if parts.len() == 1 {
        format!("({},)", parts[0])
    } else {
        format!("({})", parts.join(", "))
    }
}

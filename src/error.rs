use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no {kind} file for split '{split}' found in '{dir}'")]
    MissingDatasetFile {
        dir: PathBuf,
        split: &'static str,
        kind: &'static str,
    },

    #[error("invalid magic number in '{path}': {found} (expected {expected})")]
    InvalidMagic {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("header of '{path}' declares an unaddressable body of {dims:?}")]
    InvalidHeader { path: PathBuf, dims: Vec<usize> },

    #[error("'{path}' is truncated: expected {expected} bytes, found {found}")]
    TruncatedFile {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("number of images ({images}) and labels ({labels}) don't match")]
    CountMismatch { images: usize, labels: usize },

    #[error("shape mismatch in {context}: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("model must be compiled before {0}")]
    NotCompiled(&'static str),

    #[error("{0} needs at least one sample")]
    EmptyData(&'static str),

    #[error("model has no layers")]
    EmptyModel,

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("backward pass without a preceding forward pass")]
    MissingForwardPass,

    #[error("dropout rate must be in [0, 1), got {0}")]
    InvalidDropoutRate(f32),

    #[error("weights file holds {found} dense layers, model has {expected}")]
    LayerCountMismatch { expected: usize, found: usize },

    #[error("corrupted tensor '{0}' in weights file")]
    CorruptTensor(String),

    #[error("failed to (de)serialize '{path}': {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::{Error, Result};

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

/// One split of the dataset, pixels kept exactly as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSet {
    pub pixels: Vec<u8>,
    pub labels: Vec<u8>,
    pub rows: usize,
    pub cols: usize,
}

impl ImageSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn image_size(&self) -> usize {
        self.rows * self.cols
    }

    /// `[n, rows, cols]`
    pub fn shape(&self) -> Vec<usize> {
        vec![self.len(), self.rows, self.cols]
    }

    pub fn image(&self, index: usize) -> &[u8] {
        let size = self.image_size();
        &self.pixels[index * size..(index + 1) * size]
    }

    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.labels.truncate(len);
            self.pixels.truncate(len * self.image_size());
        }
    }
}

/// The fixed train/test split.
#[derive(Debug, Clone, PartialEq)]
pub struct MnistDataset {
    pub train: ImageSet,
    pub test: ImageSet,
}

impl MnistDataset {
    /// Loads `train-*` and `t10k-*` IDX files from `dir`, raw or gzipped.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        log::info!("Loading MNIST from '{}'", dir.display());
        let train = Self::load_split(dir, "train")?;
        let test = Self::load_split(dir, "t10k")?;
        log::info!("Loaded {} training and {} test images", train.len(), test.len());
        Ok(MnistDataset { train, test })
    }

    fn load_split(dir: &Path, split: &'static str) -> Result<ImageSet> {
        let images_path = find_file(dir, split, "images", "idx3")?;
        let labels_path = find_file(dir, split, "labels", "idx1")?;
        load_image_set(&images_path, &labels_path)
    }
}

// Both `train-images-idx3-ubyte` and `train-images.idx3-ubyte` are in circulation.
fn find_file(dir: &Path, split: &'static str, kind: &'static str, idx: &str) -> Result<PathBuf> {
    let stems = [
        format!("{}-{}-{}-ubyte", split, kind, idx),
        format!("{}-{}.{}-ubyte", split, kind, idx),
    ];
    stems.iter()
        .flat_map(|stem| [dir.join(stem), dir.join(format!("{}.gz", stem))])
        .find(|path| path.is_file())
        .ok_or_else(|| Error::MissingDatasetFile {
            dir: dir.to_path_buf(),
            split,
            kind,
        })
}

pub fn load_image_set(images_path: &Path, labels_path: &Path) -> Result<ImageSet> {
    log::debug!("Reading images from '{}'", images_path.display());
    log::debug!("Reading labels from '{}'", labels_path.display());

    let (pixels, count, rows, cols) = load_images(images_path)?;
    let labels = load_labels(labels_path)?;

    if count != labels.len() {
        return Err(Error::CountMismatch { images: count, labels: labels.len() });
    }

    Ok(ImageSet { pixels, labels, rows, cols })
}

fn open(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let reader = BufReader::new(file);
    let is_gzip = path.extension().map_or(false, |ext| ext == "gz");
    Ok(if is_gzip {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    })
}

fn read_u32(reader: &mut dyn Read, path: &Path) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).map_err(|err| Error::io(path, err))?;
    Ok(u32::from_be_bytes(bytes))
}

fn check_magic(reader: &mut dyn Read, path: &Path, expected: u32) -> Result<()> {
    let found = read_u32(reader, path)?;
    if found != expected {
        return Err(Error::InvalidMagic { path: path.to_path_buf(), found, expected });
    }
    Ok(())
}

// The header is untrusted: the body length is checked before use and the
// buffer only grows with bytes actually read.
fn read_body(reader: &mut dyn Read, path: &Path, dims: &[usize]) -> Result<Vec<u8>> {
    let expected = dims.iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| Error::InvalidHeader { path: path.to_path_buf(), dims: dims.to_vec() })?;

    let mut body = Vec::new();
    reader.take(expected as u64)
        .read_to_end(&mut body)
        .map_err(|err| Error::io(path, err))?;
    if body.len() != expected {
        return Err(Error::TruncatedFile {
            path: path.to_path_buf(),
            expected,
            found: body.len(),
        });
    }
    Ok(body)
}

/// Returns `(pixels, count, rows, cols)`.
pub fn load_images(path: &Path) -> Result<(Vec<u8>, usize, usize, usize)> {
    let mut reader = open(path)?;
    check_magic(reader.as_mut(), path, IMAGES_MAGIC)?;

    let count = read_u32(reader.as_mut(), path)? as usize;
    let rows = read_u32(reader.as_mut(), path)? as usize;
    let cols = read_u32(reader.as_mut(), path)? as usize;

    let pixels = read_body(reader.as_mut(), path, &[count, rows, cols])?;

    Ok((pixels, count, rows, cols))
}

pub fn load_labels(path: &Path) -> Result<Vec<u8>> {
    let mut reader = open(path)?;
    check_magic(reader.as_mut(), path, LABELS_MAGIC)?;

    let count = read_u32(reader.as_mut(), path)? as usize;
    let labels = read_body(reader.as_mut(), path, &[count])?;

    Ok(labels)
}

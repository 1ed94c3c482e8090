//! MNIST in the IDX format: download, cache, parse and normalize.
//!
//! The four gzipped IDX files are fetched once from the CVDF mirror and kept
//! decompressed in a cache directory. Later runs read straight from disk.

use crate::prelude::*;
use flate2::read::GzDecoder;
use log::info;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

// CVDF mirror of http://yann.lecun.com/exdb/mnist/
pub const MNIST_URL: &str = "https://storage.googleapis.com/cvdf-datasets/mnist/";
pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

pub const IMAGE_SIDE: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES: usize = 10;
pub const TRAIN_SIZE: usize = 60_000;
pub const TEST_SIZE: usize = 10_000;

/// Whole-request limit for one file; `train-images` is about 9.9 MB gzipped.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// Raw `u8` images as stored in an `idx3-ubyte` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u8>,
}

/// Flattened, `[0, 1]`-scaled images with one label each.
#[derive(Debug, Clone)]
pub struct ImageBatch {
    /// `[n, 784]`
    pub images: Array2<f32>,
    pub labels: Array1<u8>,
}

impl ImageBatch {
    /// Flattens each image row-major and rescales pixels from `[0, 255]`.
    pub fn new(raw: IdxImages, labels: Vec<u8>) -> Result<Self> {
        if raw.count != labels.len() {
            return Err(NNError::DatasetError(format!(
                "{} images but {} labels",
                raw.count,
                labels.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l as usize >= NUM_CLASSES) {
            return Err(NNError::DatasetError(format!("label {} outside 0..=9", bad)));
        }
        let features = raw.rows * raw.cols;
        let mut images = Array2::from_shape_vec((raw.count, features), raw.pixels)?.mapv(f32::from);
        images.to_unity(0.0, 255.0);
        Ok(Self {
            images,
            labels: Array1::from(labels),
        })
    }

    pub fn from_idx_bytes(images: &[u8], labels: &[u8]) -> Result<Self> {
        Self::new(parse_idx_images(images)?, parse_idx_labels(labels)?)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| NNError::DatasetError("truncated IDX header".to_string()))
}

/// Parses an `idx3-ubyte` image file: magic `0x803`, count, rows, cols, then
/// `count * rows * cols` pixels.
pub fn parse_idx_images(bytes: &[u8]) -> Result<IdxImages> {
    let magic = read_u32(bytes, 0)?;
    if magic != IMAGES_MAGIC {
        return Err(NNError::DatasetError(format!(
            "bad image file magic {:#010x}",
            magic
        )));
    }
    let count = read_u32(bytes, 4)? as usize;
    let rows = read_u32(bytes, 8)? as usize;
    let cols = read_u32(bytes, 12)? as usize;
    if rows != IMAGE_SIDE || cols != IMAGE_SIDE {
        return Err(NNError::DatasetError(format!(
            "expected {}x{} images, found {}x{}",
            IMAGE_SIDE, IMAGE_SIDE, rows, cols
        )));
    }
    let body = &bytes[16..];
    let expected = count * rows * cols;
    if body.len() != expected {
        return Err(NNError::DatasetError(format!(
            "image data holds {} bytes, header implies {}",
            body.len(),
            expected
        )));
    }
    Ok(IdxImages {
        count,
        rows,
        cols,
        pixels: body.to_vec(),
    })
}

/// Parses an `idx1-ubyte` label file: magic `0x801`, count, then one byte per
/// label.
pub fn parse_idx_labels(bytes: &[u8]) -> Result<Vec<u8>> {
    let magic = read_u32(bytes, 0)?;
    if magic != LABELS_MAGIC {
        return Err(NNError::DatasetError(format!(
            "bad label file magic {:#010x}",
            magic
        )));
    }
    let count = read_u32(bytes, 4)? as usize;
    let body = &bytes[8..];
    if body.len() != count {
        return Err(NNError::DatasetError(format!(
            "label data holds {} bytes, header implies {}",
            body.len(),
            count
        )));
    }
    Ok(body.to_vec())
}

/// The standard train/test split.
#[derive(Debug, Clone)]
pub struct Mnist {
    pub train: ImageBatch,
    pub test: ImageBatch,
}

impl Mnist {
    /// Downloads whatever is missing from `cache_dir`, then loads it.
    pub fn load(cache_dir: &Path) -> Result<Self> {
        fs::create_dir_all(cache_dir)?;
        let missing: Vec<&str> = [TRAIN_IMAGES, TRAIN_LABELS, TEST_IMAGES, TEST_LABELS]
            .into_iter()
            .filter(|name| !cache_dir.join(name).exists())
            .collect();
        if !missing.is_empty() {
            let client = http_client()?;
            for name in missing {
                fetch(&client, MNIST_URL, name, cache_dir)?;
            }
        }
        Self::from_dir(cache_dir)
    }

    /// Loads the four decompressed IDX files from `dir` without touching the
    /// network.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| -> Result<Vec<u8>> {
            fs::read(dir.join(name)).map_err(|err| {
                NNError::DatasetError(format!("{}: {}", dir.join(name).display(), err))
            })
        };
        let train = ImageBatch::from_idx_bytes(&read(TRAIN_IMAGES)?, &read(TRAIN_LABELS)?)?;
        let test = ImageBatch::from_idx_bytes(&read(TEST_IMAGES)?, &read(TEST_LABELS)?)?;
        Ok(Self { train, test })
    }
}

fn http_client() -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?)
}

/// Fetches `{base_url}{name}.gz` and stores it decompressed as `dest_dir/name`.
fn fetch(client: &reqwest::blocking::Client, base_url: &str, name: &str, dest_dir: &Path) -> Result<PathBuf> {
    let path = dest_dir.join(name);
    let url = format!("{}{}.gz", base_url, name);
    info!("Downloading {}", url);
    let response = client.get(&url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(NNError::DownloadError(format!("HTTP {} for {}", status, url)));
    }
    let compressed = response.bytes()?;

    let mut raw = Vec::new();
    GzDecoder::new(&compressed[..]).read_to_end(&mut raw)?;

    // Write then rename so an interrupted run never leaves a truncated file.
    let partial = dest_dir.join(format!("{}.part", name));
    fs::write(&partial, &raw)?;
    fs::rename(&partial, &path)?;
    Ok(path)
}

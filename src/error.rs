use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum NNError {
    // Model related errors
    InvalidLayerConfiguration(String),
    LayerShapeMismatch(String),
    EmptyModel,

    // Training related errors
    InvalidInputShape(String),
    InvalidOutputShape(String),
    InvalidLabel(String),

    // Compilation errors
    OptimizerNotSet,
    InvalidOptimizer(String),
    LossNotSet,
    InvalidLoss(String),
    InvalidMetric(String),
    InvalidActivation(String),

    // Dataset errors
    DatasetError(String),
    DownloadError(String),

    // File operations
    ModelLoadError(String),
    ExportError(String),

    IoError(std::io::Error),
    SerializationError(Box<bincode::ErrorKind>),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    HttpError(reqwest::Error),
    ShapeError(ndarray::ShapeError),
}

impl fmt::Display for NNError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NNError::InvalidLayerConfiguration(msg) => write!(f, "Invalid layer configuration: {}", msg),
            NNError::LayerShapeMismatch(msg) => write!(f, "Layer shape mismatch: {}", msg),
            NNError::EmptyModel => write!(f, "Model has no layers"),
            NNError::InvalidInputShape(msg) => write!(f, "Invalid input shape: {}", msg),
            NNError::InvalidOutputShape(msg) => write!(f, "Invalid output shape: {}", msg),
            NNError::InvalidLabel(msg) => write!(f, "Invalid label: {}", msg),
            NNError::OptimizerNotSet => write!(f, "Optimizer not set. Call compile() before training"),
            NNError::InvalidOptimizer(msg) => write!(f, "Unknown optimizer: {}", msg),
            NNError::LossNotSet => write!(f, "Loss function not set. Call compile() before training"),
            NNError::InvalidLoss(msg) => write!(f, "Unknown loss function: {}", msg),
            NNError::InvalidMetric(msg) => write!(f, "Unknown metric: {}", msg),
            NNError::InvalidActivation(msg) => write!(f, "Unknown activation function: {}", msg),
            NNError::DatasetError(msg) => write!(f, "Dataset error: {}", msg),
            NNError::DownloadError(msg) => write!(f, "Download failed: {}", msg),
            NNError::ModelLoadError(msg) => write!(f, "Failed to load model: {}", msg),
            NNError::ExportError(msg) => write!(f, "Failed to export model: {}", msg),
            NNError::IoError(err) => write!(f, "I/O error: {}", err),
            NNError::SerializationError(err) => write!(f, "Serialization error: {}", err),
            NNError::JsonError(err) => write!(f, "JSON error: {}", err),
            NNError::CsvError(err) => write!(f, "CSV error: {}", err),
            NNError::HttpError(err) => write!(f, "HTTP error: {}", err),
            NNError::ShapeError(err) => write!(f, "Shape error: {}", err),
        }
    }
}

impl Error for NNError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NNError::IoError(err) => Some(err),
            NNError::SerializationError(err) => Some(err.as_ref()),
            NNError::JsonError(err) => Some(err),
            NNError::CsvError(err) => Some(err),
            NNError::HttpError(err) => Some(err),
            NNError::ShapeError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for NNError {
    fn from(err: std::io::Error) -> NNError {
        NNError::IoError(err)
    }
}

impl From<Box<bincode::ErrorKind>> for NNError {
    fn from(err: Box<bincode::ErrorKind>) -> NNError {
        NNError::SerializationError(err)
    }
}

impl From<serde_json::Error> for NNError {
    fn from(err: serde_json::Error) -> NNError {
        NNError::JsonError(err)
    }
}

impl From<csv::Error> for NNError {
    fn from(err: csv::Error) -> NNError {
        NNError::CsvError(err)
    }
}

impl From<reqwest::Error> for NNError {
    fn from(err: reqwest::Error) -> NNError {
        NNError::HttpError(err)
    }
}

impl From<ndarray::ShapeError> for NNError {
    fn from(err: ndarray::ShapeError) -> NNError {
        NNError::ShapeError(err)
    }
}

pub type Result<T> = std::result::Result<T, NNError>;

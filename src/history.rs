use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EpochLog {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: Option<f32>,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

impl fmt::Display for EpochLog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "loss: {:.4}", self.loss)?;
        if let Some(accuracy) = self.accuracy {
            write!(f, " - accuracy: {:.4}", accuracy)?;
        }
        if let Some(val_loss) = self.val_loss {
            write!(f, " - val_loss: {:.4}", val_loss)?;
        }
        if let Some(val_accuracy) = self.val_accuracy {
            write!(f, " - val_accuracy: {:.4}", val_accuracy)?;
        }
        Ok(())
    }
}

/// Per-epoch metrics collected by `Sequential::fit`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct History {
    pub epochs: Vec<EpochLog>,
}

impl History {
    pub fn push(&mut self, log: EpochLog) {
        self.epochs.push(log);
    }

    pub fn last(&self) -> Option<&EpochLog> {
        self.epochs.last()
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for log in &self.epochs {
            wtr.serialize(log)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)?;
        let epochs = rdr.deserialize().collect::<std::result::Result<Vec<EpochLog>, _>>()?;
        Ok(Self { epochs })
    }
}

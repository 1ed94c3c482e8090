use crate::error::Result;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Glorot-uniform `[rows, cols]` matrix drawn from `rng`:
/// `U(-l, l)` with `l = sqrt(6 / (rows + cols))`.
#[macro_export]
macro_rules! glorot_array {
    ($rng:expr, $rows:expr, $cols:expr) => {{
        use $crate::prelude::*;
        let limit = (6.0f32 / ($rows + $cols) as f32).sqrt();
        Array2::<f32>::random_using(($rows, $cols), Uniform::new_inclusive(-limit, limit), $rng)
    }};
}

/// `<project root>/public/model`, where the project root is the parent of
/// the directory holding the trainer.
pub fn output_dir(script_dir: &Path) -> PathBuf {
    script_dir
        .parent()
        .unwrap_or(script_dir)
        .join("public")
        .join("model")
}

/// Creates `dir` and any missing parents. Succeeds if it already exists.
pub fn prepare_dir(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(fs::canonicalize(dir)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

impl FileEntry {
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:<30}  {:>7.1} KB", self.name, self.size_kb())
    }
}

/// Regular files directly under `dir`, sorted by name.
pub fn list_files(dir: &Path) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_file() {
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
            });
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_sits_beside_the_trainer() {
        let dir = output_dir(Path::new("/work/app/model"));
        assert_eq!(dir, PathBuf::from("/work/app/public/model"));
    }

    #[test]
    fn prepare_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a").join("b");
        let first = prepare_dir(&target).unwrap();
        let second = prepare_dir(&target).unwrap();
        assert_eq!(first, second);
        assert!(target.is_dir());
    }

    #[test]
    fn listing_is_sorted_and_skips_directories() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.bin"), [0u8; 2048]).unwrap();
        fs::write(tmp.path().join("a.json"), b"{}").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();

        let files = list_files(tmp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.json", "b.bin"]);
        assert_eq!(files[1].to_string(), format!("{:<30}  {:>7.1} KB", "b.bin", 2.0));
    }
}

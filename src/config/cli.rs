use crate::core::Storage;
use crate::utils::error::{ReportError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// Upper bound on `_N` suffixes tried when a report name is already taken.
const MAX_NAME_SUFFIX: u32 = 1000;

/// Writes reports into a local directory. Files appear under their final name
/// only once fully written and synced; existing files are never replaced.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn write_atomic(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        let target = self.base_path.join(file_name);
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(ReportError::Write {
                path: target,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a plain file name"),
            });
        }

        fs::create_dir_all(&self.base_path).map_err(|source| ReportError::Write {
            path: self.base_path.clone(),
            source,
        })?;

        let write_err = |source: io::Error| ReportError::Write {
            path: target.clone(),
            source,
        };
        let mut temp: NamedTempFile = Builder::new()
            .prefix(".deal-report-")
            .suffix(".tmp")
            .tempfile_in(&self.base_path)
            .map_err(write_err)?;
        temp.write_all(data).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;

        for attempt in 0..=MAX_NAME_SUFFIX {
            let candidate = if attempt == 0 {
                target.clone()
            } else {
                self.base_path.join(suffixed(file_name, attempt))
            };

            match temp.persist_noclobber(&candidate) {
                Ok(_) => {
                    if attempt > 0 {
                        tracing::warn!(
                            "{} already exists, report saved as {}",
                            target.display(),
                            candidate.display()
                        );
                    }
                    return Ok(candidate);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => temp = e.file,
                Err(e) => {
                    return Err(ReportError::Write {
                        path: candidate,
                        source: e.error,
                    })
                }
            }
        }

        Err(ReportError::Write {
            path: target,
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("no free name after {} attempts", MAX_NAME_SUFFIX),
            ),
        })
    }
}

/// `report.xlsx` -> `report_3.xlsx`
fn suffixed(file_name: &str, n: u32) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", file_name, n),
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.write_atomic(file_name, data)?;
        tracing::debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(path)
    }
}

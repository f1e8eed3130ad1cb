use crate::models::{ImageInput, ImageMediaType, UploadCandidate};
use thiserror::Error;

/// Default ceiling for a single upload (10 MiB)
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of views accepted per analysis
pub const DEFAULT_MAX_FILES: usize = 3;

/// Reasons an upload set is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("No image file provided")]
    NoFiles,

    #[error("Too many files: {got} received, at most {max} images are allowed")]
    TooManyFiles { got: usize, max: usize },

    #[error("Invalid file type for {file} ({media_type}). Only JPEG, PNG, WebP, and GIF are allowed.")]
    UnsupportedType { file: String, media_type: String },

    #[error("File {file} is {size} bytes, which exceeds the {} limit", describe_limit(.limit))]
    TooLarge { file: String, size: u64, limit: u64 },
}

const MIB: u64 = 1024 * 1024;

/// Whole mebibytes read as "10MB"; anything else is spelled out in bytes.
fn describe_limit(limit: &u64) -> String {
    if *limit >= MIB && limit % MIB == 0 {
        format!("{}MB", limit / MIB)
    } else {
        format!("{}-byte", limit)
    }
}

/// Limits applied to every request
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_files: usize,
    pub max_file_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn new(max_files: usize, max_file_bytes: u64) -> Self {
        Self {
            max_files,
            max_file_bytes,
        }
    }

    /// Check a single candidate against the type allow-list and size ceiling.
    ///
    /// `position` is the 0-based index of the part and is only used to
    /// label unnamed files.
    pub fn check(&self, candidate: &UploadCandidate, position: usize) -> Result<ImageMediaType, UploadError> {
        let media_type = ImageMediaType::from_mime(&candidate.media_type).ok_or_else(|| {
            UploadError::UnsupportedType {
                file: candidate.label(position),
                media_type: candidate.media_type.clone(),
            }
        })?;

        if candidate.size > self.max_file_bytes {
            return Err(UploadError::TooLarge {
                file: candidate.label(position),
                size: candidate.size,
                limit: self.max_file_bytes,
            });
        }

        Ok(media_type)
    }

    /// Validate a whole upload set.
    ///
    /// Fails on the first violation in upload order; nothing is filtered
    /// silently. On success the accepted images keep their original order.
    pub fn validate(&self, candidates: Vec<UploadCandidate>) -> Result<Vec<ImageInput>, UploadError> {
        if candidates.is_empty() {
            return Err(UploadError::NoFiles);
        }

        if candidates.len() > self.max_files {
            return Err(UploadError::TooManyFiles {
                got: candidates.len(),
                max: self.max_files,
            });
        }

        let mut accepted = Vec::with_capacity(candidates.len());
        for (position, candidate) in candidates.into_iter().enumerate() {
            let media_type = self.check(&candidate, position)?;
            accepted.push(ImageInput {
                bytes: candidate.bytes,
                media_type,
            });
        }

        tracing::debug!("Accepted {} upload(s)", accepted.len());

        Ok(accepted)
    }
}

// Core pipeline exports
pub mod decoder;
pub mod prompt;
pub mod upload;

pub use decoder::{decode, strip_code_fences, DecodeError};
pub use prompt::{EncodedImage, ModelRequest, SYSTEM_INSTRUCTION};
pub use upload::{UploadError, UploadPolicy, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_BYTES};

/// One file part received on the upload endpoint, before validation
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    /// Client-supplied file name, if the part carried one
    pub file_name: Option<String>,
    /// Declared media type essence, e.g. `image/png`
    pub media_type: String,
    /// Total size of the part as received, which may exceed `bytes.len()`
    /// when the body was cut off at the size ceiling
    pub size: u64,
    pub bytes: Vec<u8>,
}

impl UploadCandidate {
    /// Human-readable label for error messages: the file name, or the
    /// 1-based position of the part when it has none.
    pub fn label(&self, position: usize) -> String {
        match self.file_name.as_deref() {
            Some(name) if !name.is_empty() => format!("'{}'", name),
            _ => format!("file #{}", position + 1),
        }
    }
}

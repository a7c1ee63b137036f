use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfStitchError {
    #[error("Failed to parse input PDF: {0}")]
    MalformedInput(String),

    #[error("Invalid table of contents: {0}")]
    InvalidOutline(String),

    #[error("Object id {0} crosses the reserved id range")]
    TooManyObjects(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

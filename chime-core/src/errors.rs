use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChimeError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid course form: {0}")]
    InvalidForm(String),

    #[error("File {0} is empty")]
    EmptyFile(String),

    #[error("Error uploading chunk {chunk_index} of {total_chunks} for {file_name}: {source}")]
    ChunkTransport {
        file_name: String,
        chunk_index: u64,
        total_chunks: u64,
        #[source]
        source: Box<ChimeError>,
    },

    #[error("Server did not confirm assembly of {file_name} after {total_chunks} chunk(s)")]
    AssemblyIncomplete { file_name: String, total_chunks: u64 },

    #[error("Unexpected response ({status}): {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Course creation rejected ({status}): {body}")]
    SubmissionRejected { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, ChimeError>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("there is no content to decode")]
    NoContent,

    #[error("cannot decode object: {0}")]
    Deserialize(#[from] serde_json::Error),
}

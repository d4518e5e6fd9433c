use thiserror::Error;

use crate::data::text_blob::Base64Error;
use crate::models::c2g::DecodeError;
use crate::models::writer::EncodeError;

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Failed to decode c2g mesh: {0}")]
    Decode(#[from] DecodeError),
    #[error("Failed to encode c2g mesh: {0}")]
    Encode(#[from] EncodeError),
    #[error("Failed to decode base64 text: {0}")]
    Base64(#[from] Base64Error),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

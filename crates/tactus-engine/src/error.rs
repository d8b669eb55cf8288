//! Engine error types

use tactus_audio::AudioError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),
}

pub type EngineResult<T> = Result<T, EngineError>;

//! Client for the remote generation service.
//!
//! This crate provides:
//! - The `VideoBackend` contract the worker pools depend on
//! - A reqwest implementation for the Gemini API (Veo video models and
//!   Gemini text models)

pub mod backend;
pub mod error;
pub mod gemini;

pub use backend::{OperationStatus, VideoBackend, VideoOperation, VideoReference, VideoRequest};
pub use error::{ClientError, ClientResult};
pub use gemini::{
    GeminiClient, GeminiConfig, API_KEY_HEADER, DESCRIBE_IMAGE_INSTRUCTION, REPHRASE_TEMPLATE,
};

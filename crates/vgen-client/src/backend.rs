//! Generation backend contract.
//!
//! The worker pools only talk to the remote service through
//! [`VideoBackend`], so tests can drive them with a scripted backend.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use vgen_models::ImageData;

use crate::error::ClientResult;

/// Input of one video generation.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub image: Option<ImageData>,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>, image: Option<ImageData>) -> Self {
        Self {
            prompt: prompt.into(),
            image,
        }
    }
}

/// Handle of a long-running remote generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOperation {
    pub name: String,
}

/// Reference to a generated video held by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoReference {
    pub uri: String,
}

/// Snapshot of a long-running operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationStatus {
    pub done: bool,
    pub videos: Vec<VideoReference>,
    /// Error reported by the service for a finished operation
    pub error: Option<String>,
    /// Safety filter reasons, when outputs were withheld
    pub filtered_reasons: Vec<String>,
}

impl OperationStatus {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn finished(videos: Vec<VideoReference>) -> Self {
        Self {
            done: true,
            videos,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            done: true,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Remote video and text generation service.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Start a video generation.
    async fn submit_video_generation(
        &self,
        request: &VideoRequest,
        credential: &str,
    ) -> ClientResult<VideoOperation>;

    /// Check the state of a started generation.
    async fn poll_video_operation(
        &self,
        operation: &VideoOperation,
        credential: &str,
    ) -> ClientResult<OperationStatus>;

    /// Download a generated video.
    async fn fetch_video_bytes(
        &self,
        video: &VideoReference,
        credential: &str,
    ) -> ClientResult<Bytes>;

    /// Write a motion-focused video prompt describing an image.
    async fn describe_image_for_video(
        &self,
        image: &ImageData,
        credential: &str,
    ) -> ClientResult<String>;

    /// Improve an existing video prompt.
    async fn rephrase_prompt(&self, prompt: &str, credential: &str) -> ClientResult<String>;
}

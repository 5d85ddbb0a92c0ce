//! Scripted backend for pool tests.
//!
//! Behaviour is keyed on the prompt text:
//! - "fail" fails the submit with a server error after `FAILURE_LATENCY`
//! - "quota" fails the submit with a 429 after `FAILURE_LATENCY`
//! - "blocked" finishes with the output withheld by safety filters
//! - anything else succeeds after `polls_until_done` polls

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use vgen_client::{
    ClientError, ClientResult, OperationStatus, VideoBackend, VideoOperation, VideoReference,
    VideoRequest,
};
use vgen_models::ImageData;
use vgen_worker::{GenerationSummary, Studio, WorkerConfig, WorkerResult};

/// Time a rejected submit takes. Keeps the paused clock moving if a run
/// ever resubmits failures in a loop.
pub const FAILURE_LATENCY: Duration = Duration::from_secs(1);

/// Upper bound for one generation run on the paused clock.
pub const RUN_LIMIT: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub input: String,
    pub credential: String,
}

#[derive(Debug, Default)]
struct FakeState {
    submissions: Vec<Call>,
    text_calls: Vec<Call>,
    operations: HashMap<String, (usize, String)>,
    next_op: usize,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    submit_delay: Duration,
    text_delay: Duration,
    polls_until_done: usize,
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            polls_until_done: 1,
            ..Default::default()
        }
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn with_text_delay(mut self, delay: Duration) -> Self {
        self.text_delay = delay;
        self
    }

    pub fn with_polls(mut self, polls: usize) -> Self {
        self.polls_until_done = polls;
        self
    }

    pub fn submissions(&self) -> Vec<Call> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn text_calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().text_calls.clone()
    }

    /// Highest number of submits that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record_text_call(&self, input: &str, credential: &str) {
        self.state.lock().unwrap().text_calls.push(Call {
            input: input.to_string(),
            credential: credential.to_string(),
        });
    }
}

#[async_trait]
impl VideoBackend for FakeBackend {
    async fn submit_video_generation(
        &self,
        request: &VideoRequest,
        credential: &str,
    ) -> ClientResult<VideoOperation> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.state.lock().unwrap().submissions.push(Call {
            input: request.prompt.clone(),
            credential: credential.to_string(),
        });

        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let rejected = request.prompt.contains("quota") || request.prompt.contains("fail");
        if rejected {
            tokio::time::sleep(FAILURE_LATENCY).await;
        }
        if request.prompt.contains("quota") {
            return Err(ClientError::api(429, "RESOURCE_EXHAUSTED: quota exceeded"));
        }
        if request.prompt.contains("fail") {
            return Err(ClientError::api(500, "internal error"));
        }

        let mut state = self.state.lock().unwrap();
        state.next_op += 1;
        let name = format!("operations/op-{}", state.next_op);
        state
            .operations
            .insert(name.clone(), (self.polls_until_done, request.prompt.clone()));
        Ok(VideoOperation { name })
    }

    async fn poll_video_operation(
        &self,
        operation: &VideoOperation,
        _credential: &str,
    ) -> ClientResult<OperationStatus> {
        let mut state = self.state.lock().unwrap();
        let Some((remaining, prompt)) = state.operations.get_mut(&operation.name) else {
            return Err(ClientError::operation_failed("unknown operation"));
        };

        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return Ok(OperationStatus::pending());
        }
        if prompt.contains("blocked") {
            return Ok(OperationStatus {
                done: true,
                filtered_reasons: vec!["unsafe content".to_string()],
                ..Default::default()
            });
        }
        Ok(OperationStatus::finished(vec![VideoReference {
            uri: format!("video://{}", prompt),
        }]))
    }

    async fn fetch_video_bytes(&self, video: &VideoReference, _credential: &str) -> ClientResult<Bytes> {
        Ok(Bytes::from(video.uri.clone().into_bytes()))
    }

    async fn describe_image_for_video(&self, image: &ImageData, credential: &str) -> ClientResult<String> {
        let name = image.file_name().unwrap_or("image").to_string();
        self.record_text_call(&name, credential);
        if !self.text_delay.is_zero() {
            tokio::time::sleep(self.text_delay).await;
        }
        Ok(format!("  A slow pan across {}  ", name))
    }

    async fn rephrase_prompt(&self, prompt: &str, credential: &str) -> ClientResult<String> {
        self.record_text_call(prompt, credential);
        if !self.text_delay.is_zero() {
            tokio::time::sleep(self.text_delay).await;
        }
        if prompt.contains("fail") {
            return Err(ClientError::api(403, "PERMISSION_DENIED"));
        }
        Ok(format!("Cinematic: {}", prompt))
    }
}

pub fn keys(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("key-{}", i)).collect()
}

pub fn image(name: &str) -> ImageData {
    ImageData::from_file(vec![0x89u8, 0x50, 0x4e, 0x47], name).unwrap()
}

pub fn test_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_secs(10),
        poll_timeout: Duration::from_secs(20 * 60),
        ..Default::default()
    }
}

pub fn studio(backend: Arc<FakeBackend>, key_count: usize) -> Arc<Studio> {
    studio_with_config(backend, key_count, test_config())
}

pub fn studio_with_config(backend: Arc<FakeBackend>, key_count: usize, config: WorkerConfig) -> Arc<Studio> {
    Arc::new(Studio::new(config, backend, keys(key_count)))
}

/// Run the generation pool, failing the test if it does not finish.
pub async fn generate_bounded(studio: &Studio) -> WorkerResult<GenerationSummary> {
    tokio::time::timeout(RUN_LIMIT, studio.generate_all())
        .await
        .expect("generation run did not finish")
}

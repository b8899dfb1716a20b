//! Batch inference over a remote vision model.
//!
//! The client flattens a batch into a worklist of absolute paths, then runs
//! each path through normalize → encode → remote call → JSON extraction on a
//! bounded pool of tokio tasks. Every path yields exactly one result, in
//! worklist order, whatever happens to its neighbours.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::{BatchConfig, Config, ImageConfig, TransmitMode};
use crate::error::{InferenceError, ItemResult, Result};
use crate::imaging::{ImageInput, ImageNormalizer};
use crate::llm::{retry, ChatCompletionsProvider, VisionProvider, VisionRequest};
use crate::types::{InferenceMode, InferenceRequestItem, InferenceResult};

/// Execution settings for a batch.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// Maximum concurrent remote calls
    pub parallel: usize,
    /// Per-call deadline in milliseconds
    pub timeout_ms: u64,
    /// Maximum retries per image
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
    /// Which bytes are sent to the model
    pub transmit: TransmitMode,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default(), &ImageConfig::default())
    }
}

impl InferenceOptions {
    pub fn from_config(batch: &BatchConfig, image: &ImageConfig) -> Self {
        Self {
            parallel: batch.parallel.max(1),
            timeout_ms: batch.timeout_ms,
            retry_attempts: batch.retry_attempts,
            retry_delay_ms: batch.retry_delay_ms,
            transmit: image.transmit,
        }
    }
}

/// Client that turns document images plus an instruction into JSON results.
pub struct InferenceClient {
    provider: Arc<dyn VisionProvider>,
    normalizer: ImageNormalizer,
    options: InferenceOptions,
}

impl InferenceClient {
    /// Create a client for an OpenAI-compatible endpoint with default settings.
    ///
    /// No network activity happens here.
    pub fn new(endpoint_url: &str, api_key: &str) -> Self {
        let options = InferenceOptions::default();
        let provider = ChatCompletionsProvider::new(endpoint_url, api_key)
            .with_timeout(Duration::from_millis(options.timeout_ms));
        tracing::info!("Inference client initialized with API URL: {endpoint_url}");
        Self::with_provider(Box::new(provider), ImageNormalizer::default(), options)
    }

    /// Create a client from the full configuration.
    pub fn from_config(config: &Config) -> Self {
        let provider = ChatCompletionsProvider::from_config(
            &config.endpoint,
            Duration::from_millis(config.batch.timeout_ms),
        );
        tracing::info!(
            "Inference client initialized with API URL: {}",
            provider.endpoint()
        );
        Self::with_provider(
            Box::new(provider),
            ImageNormalizer::from_config(&config.image),
            InferenceOptions::from_config(&config.batch, &config.image),
        )
    }

    pub fn with_provider(
        provider: Box<dyn VisionProvider>,
        normalizer: ImageNormalizer,
        options: InferenceOptions,
    ) -> Self {
        Self {
            provider: Arc::from(provider),
            normalizer,
            options,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn options(&self) -> &InferenceOptions {
        &self.options
    }

    /// Run a batch and return one result per file path, in input order.
    ///
    /// Every image is sent with the instruction of `items[0]`. Per-image
    /// failures, including malformed paths, become [`InferenceResult::Error`]
    /// entries, so the returned list always has one entry per path.
    pub async fn inference(
        &self,
        items: &[InferenceRequestItem],
        mode: InferenceMode,
    ) -> Result<Vec<InferenceResult>> {
        if mode == InferenceMode::Static {
            tracing::debug!("Static mode: returning canned result");
            return Ok(vec![InferenceResult::canned()]);
        }

        let worklist = build_worklist(items);
        let Some(first) = items.first() else {
            return Ok(Vec::new());
        };
        if items.iter().any(|i| i.text_input != first.text_input) {
            tracing::warn!(
                "Batch items carry different instructions; all {} images use the first one",
                worklist.len()
            );
        }
        let instruction: Arc<str> = Arc::from(first.text_input.as_str());

        let semaphore = Arc::new(Semaphore::new(self.options.parallel));
        let mut handles = Vec::with_capacity(worklist.len());

        for path in worklist {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                tracing::warn!("Inference semaphore closed unexpectedly, stopping batch");
                break;
            };

            let provider = self.provider.clone();
            let normalizer = self.normalizer;
            let options = self.options.clone();
            let instruction = instruction.clone();

            handles.push(tokio::spawn(async move {
                let result =
                    infer_single(&provider, normalizer, &options, &path, &instruction).await;
                drop(permit);
                result
            }));
        }

        let results = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    tracing::error!("Inference task panicked: {e}");
                    InferenceResult::Error(format!("inference task panicked: {e}"))
                })
            })
            .collect();

        Ok(results)
    }
}

/// Flatten all items' file paths into absolute paths, preserving order.
///
/// `~` is expanded; relative paths resolve against the current directory.
/// A path that cannot be made absolute (such as `""`) is kept as given and
/// fails later as an unreadable image for that entry alone.
pub fn build_worklist(items: &[InferenceRequestItem]) -> Vec<PathBuf> {
    items
        .iter()
        .flat_map(|i| i.file_paths.iter())
        .map(|path| {
            let expanded = shellexpand::tilde(path);
            std::path::absolute(&*expanded).unwrap_or_else(|e| {
                tracing::debug!("Keeping unresolvable path {path:?} as given: {e}");
                PathBuf::from(&*expanded)
            })
        })
        .collect()
}

/// Process one worklist entry; never fails.
async fn infer_single(
    provider: &Arc<dyn VisionProvider>,
    normalizer: ImageNormalizer,
    options: &InferenceOptions,
    path: &Path,
    instruction: &str,
) -> InferenceResult {
    match request_with_retry(provider, normalizer, options, path, instruction).await {
        Ok(text) => {
            let result = InferenceResult::from_model_output(&text);
            tracing::info!("Inference completed successfully for: {}", path.display());
            result
        }
        Err(e @ InferenceError::ImageLoad { .. }) => {
            tracing::error!("{e}");
            InferenceResult::Error(e.to_string())
        }
        Err(e) => {
            let message = format!("{} API error for {}: {e}", provider.name(), path.display());
            tracing::error!("{message}");
            InferenceResult::Error(message)
        }
    }
}

async fn request_with_retry(
    provider: &Arc<dyn VisionProvider>,
    normalizer: ImageNormalizer,
    options: &InferenceOptions,
    path: &Path,
    instruction: &str,
) -> ItemResult<String> {
    // Resizing runs in both transmit modes so an undecodable file fails here
    let normalized = normalizer.resize_blocking(path.to_path_buf()).await?;
    let image = match options.transmit {
        TransmitMode::Original => ImageInput::from_file(path).await?,
        TransmitMode::Resized => ImageInput::from_image(&normalized.image, path)?,
    };
    drop(normalized);

    let request = VisionRequest {
        image,
        instruction: instruction.to_string(),
    };

    let mut last_error = None;
    for attempt in 0..=options.retry_attempts {
        if attempt > 0 {
            let delay = retry::jittered_backoff(attempt - 1, options.retry_delay_ms);
            tracing::debug!(
                "Retry {attempt}/{} for {} after {delay:?}",
                options.retry_attempts,
                path.display()
            );
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(
            Duration::from_millis(options.timeout_ms),
            provider.generate(&request),
        )
        .await
        {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) => {
                let retryable = retry::is_retryable(&e);
                last_error = Some(e);
                if !retryable {
                    break;
                }
            }
            Err(_) => {
                last_error = Some(InferenceError::Timeout {
                    timeout_ms: options.timeout_ms,
                });
            }
        }
    }

    Err(last_error.unwrap_or(InferenceError::Timeout {
        timeout_ms: options.timeout_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use image::{DynamicImage, GenericImageView};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    type ResponseFn = dyn Fn(u32, &VisionRequest) -> ItemResult<String> + Send + Sync;

    /// A configurable mock provider for testing batch behavior.
    ///
    /// The response factory sees the call index and the request, so tests can
    /// fail specific images regardless of scheduling order.
    struct MockProvider {
        response_fn: Box<ResponseFn>,
        call_count: Arc<AtomicU32>,
        instructions: Arc<Mutex<Vec<String>>>,
        media_types: Arc<Mutex<Vec<String>>>,
        delay: Option<Duration>,
    }

    impl MockProvider {
        fn new<F>(response_fn: F) -> Self
        where
            F: Fn(u32, &VisionRequest) -> ItemResult<String> + Send + Sync + 'static,
        {
            Self {
                response_fn: Box::new(response_fn),
                call_count: Arc::new(AtomicU32::new(0)),
                instructions: Arc::new(Mutex::new(Vec::new())),
                media_types: Arc::new(Mutex::new(Vec::new())),
                delay: None,
            }
        }

        fn success(text: &str) -> Self {
            let text = text.to_string();
            Self::new(move |_, _| Ok(text.clone()))
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn call_count_handle(&self) -> Arc<AtomicU32> {
            self.call_count.clone()
        }
    }

    #[async_trait]
    impl VisionProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate(&self, request: &VisionRequest) -> ItemResult<String> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.instructions
                .lock()
                .unwrap()
                .push(request.instruction.clone());
            self.media_types
                .lock()
                .unwrap()
                .push(request.image.media_type.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.response_fn)(idx, request)
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(60)
        }
    }

    fn fast_options() -> InferenceOptions {
        InferenceOptions {
            parallel: 4,
            timeout_ms: 5000,
            retry_attempts: 0,
            retry_delay_ms: 10,
            transmit: TransmitMode::Original,
        }
    }

    fn client(provider: MockProvider, options: InferenceOptions) -> InferenceClient {
        InferenceClient::with_provider(Box::new(provider), ImageNormalizer::default(), options)
    }

    /// Write a PNG of the given size and return its path as a string.
    fn fixture(dir: &Path, name: &str, width: u32, height: u32) -> String {
        let path = dir.join(name);
        DynamicImage::new_rgb8(width, height).save(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn base64_of(path: &str) -> String {
        BASE64.encode(std::fs::read(path).unwrap())
    }

    #[tokio::test]
    async fn test_static_mode_makes_no_calls() {
        let provider = MockProvider::success("unused");
        let calls = provider.call_count_handle();
        let client = client(provider, fast_options());

        let results = client.inference(&[], InferenceMode::Static).await.unwrap();
        assert_eq!(results, vec![InferenceResult::canned()]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let client = client(MockProvider::success("unused"), fast_options());
        let results = client.inference(&[], InferenceMode::Live).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_single_image_success() {
        let dir = tempfile::tempdir().unwrap();
        let page = fixture(dir.path(), "page.png", 64, 48);
        let provider = MockProvider::success("```json\n{'total': 12}\n```");
        let client = client(provider, fast_options());

        let results = client
            .inference(&[InferenceRequestItem::new([page], "extract")], InferenceMode::Live)
            .await
            .unwrap();
        assert_eq!(results, vec![InferenceResult::Success(json!({"total": 12}))]);
    }

    #[tokio::test]
    async fn test_unparsable_output_returns_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let page = fixture(dir.path(), "page.png", 32, 32);
        let client = client(MockProvider::success("I could not read this."), fast_options());

        let results = client
            .inference(&[InferenceRequestItem::new([page], "extract")], InferenceMode::Live)
            .await
            .unwrap();
        assert_eq!(
            results,
            vec![InferenceResult::Unparsed("I could not read this.".to_string())]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_isolated_and_order_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            fixture(dir.path(), "a.png", 10, 10),
            fixture(dir.path(), "b.png", 20, 20),
            fixture(dir.path(), "c.png", 30, 30),
        ];
        let failing = base64_of(&paths[1]);
        let encoded: Vec<String> = paths.iter().map(|p| base64_of(p)).collect();

        let provider = MockProvider::new(move |_, request| {
            if request.image.data == failing {
                return Err(InferenceError::RemoteRequest {
                    message: "HTTP 500 Internal Server Error: boom".to_string(),
                    status_code: Some(500),
                });
            }
            let idx = encoded.iter().position(|d| *d == request.image.data).unwrap();
            Ok(format!("{{\"index\": {idx}}}"))
        })
        .with_delay(Duration::from_millis(20));
        let client = client(provider, fast_options());

        let items = vec![
            InferenceRequestItem::new([paths[0].clone(), paths[1].clone()], "extract"),
            InferenceRequestItem::new([paths[2].clone()], "extract"),
        ];
        let results = client.inference(&items, InferenceMode::Live).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], InferenceResult::Success(json!({"index": 0})));
        assert_eq!(results[2], InferenceResult::Success(json!({"index": 2})));
        let message = results[1].error_message().unwrap();
        assert!(message.starts_with("mock API error for "), "Got: {message}");
        assert!(message.contains("b.png"));
        assert!(message.contains("boom"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_order_preserved_when_later_items_finish_first() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<String> = (0..5)
            .map(|i| fixture(dir.path(), &format!("p{i}.png"), 8 + i, 8))
            .collect();
        let encoded: Vec<String> = paths.iter().map(|p| base64_of(p)).collect();

        let provider = MockProvider::new(move |_, request| {
            let idx = encoded.iter().position(|d| *d == request.image.data).unwrap();
            // Earlier images are slower, so completion order is reversed
            std::thread::sleep(Duration::from_millis(10 * (5 - idx as u64)));
            Ok(format!("{{\"index\": {idx}}}"))
        });
        let client = client(provider, fast_options());

        let results = client
            .inference(&[InferenceRequestItem::new(paths, "extract")], InferenceMode::Live)
            .await
            .unwrap();
        let indices: Vec<_> = results
            .iter()
            .map(|r| match r {
                InferenceResult::Success(v) => v["index"].as_u64().unwrap(),
                other => panic!("Expected success, got {other:?}"),
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_missing_file_yields_error_entry() {
        let provider = MockProvider::success("should not reach");
        let calls = provider.call_count_handle();
        let client = client(provider, fast_options());

        let results = client
            .inference(
                &[InferenceRequestItem::new(["/no/such/file.png"], "extract")],
                InferenceMode::Live,
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let message = results[0].error_message().unwrap();
        assert!(message.contains("/no/such/file.png"), "Got: {message}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_path_fails_only_its_own_entry() {
        let provider = MockProvider::success("should not reach");
        let calls = provider.call_count_handle();
        let client = client(provider, fast_options());

        let items = [InferenceRequestItem::new(
            ["/no/such/a.png", "", "/no/such/c.png"],
            "extract",
        )];
        let results = client.inference(&items, InferenceMode::Live).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(InferenceResult::is_error));
        assert!(results[0].error_message().unwrap().contains("a.png"));
        assert!(results[1].error_message().unwrap().contains("Failed to load image"));
        assert!(results[2].error_message().unwrap().contains("c.png"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_build_worklist_keeps_empty_path_entry() {
        let items = vec![InferenceRequestItem::new(["/data/a.png", "", "/data/c.png"], "x")];
        let worklist = build_worklist(&items);
        assert_eq!(worklist.len(), 3);
        assert_eq!(worklist[1], PathBuf::from(""));
        assert_eq!(worklist[2], PathBuf::from("/data/c.png"));
    }

    #[tokio::test]
    async fn test_first_instruction_shared_by_all_images() {
        let dir = tempfile::tempdir().unwrap();
        let a = fixture(dir.path(), "a.png", 10, 10);
        let b = fixture(dir.path(), "b.png", 12, 12);
        let provider = MockProvider::success("{}");
        let instructions = provider.instructions.clone();
        let client = client(provider, fast_options());

        let items = vec![
            InferenceRequestItem::new([a], "extract the totals"),
            InferenceRequestItem::new([b], "extract the address"),
        ];
        client.inference(&items, InferenceMode::Live).await.unwrap();

        let seen = instructions.lock().unwrap().clone();
        assert_eq!(seen, vec!["extract the totals", "extract the totals"]);
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_entry() {
        let dir = tempfile::tempdir().unwrap();
        let page = fixture(dir.path(), "slow.png", 16, 16);
        let provider = MockProvider::success("{}").with_delay(Duration::from_secs(5));
        let options = InferenceOptions {
            timeout_ms: 50,
            ..fast_options()
        };
        let client = client(provider, options);

        let results = client
            .inference(&[InferenceRequestItem::new([page], "extract")], InferenceMode::Live)
            .await
            .unwrap();
        let message = results[0].error_message().unwrap();
        assert!(message.contains("Timeout"), "Got: {message}");
    }

    #[tokio::test]
    async fn test_retry_recovers_from_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let page = fixture(dir.path(), "page.png", 16, 16);
        let provider = MockProvider::new(|idx, _| {
            if idx == 0 {
                Err(InferenceError::RemoteRequest {
                    message: "HTTP 429: slow down".to_string(),
                    status_code: Some(429),
                })
            } else {
                Ok("{\"ok\": true}".to_string())
            }
        });
        let calls = provider.call_count_handle();
        let options = InferenceOptions {
            retry_attempts: 2,
            ..fast_options()
        };
        let client = client(provider, options);

        let results = client
            .inference(&[InferenceRequestItem::new([page], "extract")], InferenceMode::Live)
            .await
            .unwrap();
        assert_eq!(results, vec![InferenceResult::Success(json!({"ok": true}))]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let page = fixture(dir.path(), "page.png", 16, 16);
        let provider = MockProvider::new(|_, _| {
            Err(InferenceError::RemoteRequest {
                message: "HTTP 401: unauthorized".to_string(),
                status_code: Some(401),
            })
        });
        let calls = provider.call_count_handle();
        let options = InferenceOptions {
            retry_attempts: 3,
            ..fast_options()
        };
        let client = client(provider, options);

        let results = client
            .inference(&[InferenceRequestItem::new([page], "extract")], InferenceMode::Live)
            .await
            .unwrap();
        assert!(results[0].is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resized_transmit_sends_bounded_png() {
        let dir = tempfile::tempdir().unwrap();
        let page = fixture(dir.path(), "wide.png", 400, 100);
        let sent = Arc::new(Mutex::new(None));
        let sent_clone = sent.clone();
        let provider = MockProvider::new(move |_, request| {
            *sent_clone.lock().unwrap() = Some(request.image.clone());
            Ok("{}".to_string())
        });
        let options = InferenceOptions {
            transmit: TransmitMode::Resized,
            ..fast_options()
        };
        let client =
            InferenceClient::with_provider(Box::new(provider), ImageNormalizer::new(200, 200), options);

        client
            .inference(&[InferenceRequestItem::new([page], "extract")], InferenceMode::Live)
            .await
            .unwrap();

        let sent_image = sent.lock().unwrap().clone().unwrap();
        assert_eq!(sent_image.media_type, "image/png");
        let decoded = image::load_from_memory(&BASE64.decode(&sent_image.data).unwrap()).unwrap();
        assert_eq!(decoded.dimensions(), (200, 50));
    }

    #[tokio::test]
    async fn test_original_transmit_sends_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let page = fixture(dir.path(), "big.png", 400, 100);
        let expected = base64_of(&page);
        let provider = MockProvider::new(move |_, request| {
            assert_eq!(request.image.data, expected);
            Ok("{}".to_string())
        });
        let media_types = provider.media_types.clone();
        let client =
            InferenceClient::with_provider(Box::new(provider), ImageNormalizer::new(200, 200), fast_options());

        let results = client
            .inference(&[InferenceRequestItem::new([page], "extract")], InferenceMode::Live)
            .await
            .unwrap();
        assert!(results[0].is_success());
        assert_eq!(media_types.lock().unwrap().as_slice(), ["image/png"]);
    }

    #[test]
    fn test_build_worklist_flattens_in_order() {
        let items = vec![
            InferenceRequestItem::new(["/data/a.png", "/data/b.png"], "x"),
            InferenceRequestItem::new(Vec::<String>::new(), "y"),
            InferenceRequestItem::new(["/data/c.png"], "z"),
        ];
        let worklist = build_worklist(&items);
        assert_eq!(
            worklist,
            vec![
                PathBuf::from("/data/a.png"),
                PathBuf::from("/data/b.png"),
                PathBuf::from("/data/c.png"),
            ]
        );
    }

    #[test]
    fn test_build_worklist_resolves_relative_paths() {
        let items = vec![InferenceRequestItem::new(["scans/page1.jpg"], "x")];
        let worklist = build_worklist(&items);
        assert!(worklist[0].is_absolute());
        assert!(worklist[0].ends_with("scans/page1.jpg"));
    }

    #[test]
    fn test_new_client_defaults() {
        let client = InferenceClient::new("http://localhost:1/v1/chat/completions", "k");
        assert_eq!(client.provider_name(), "qwen");
        assert_eq!(client.options().parallel, 4);
        assert_eq!(client.options().transmit, TransmitMode::Original);
    }
}

//! Client behaviour against a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use llm::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, OpenRouterClient, OpenRouterConfig,
    TransportError,
};
use pipeline::{
    ChatMessage, CompletionProvider, CompletionRequest, ErrorKind, GenerationError,
    ResponseFormat, ResponseValidator,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

enum Reply {
    Respond(Result<HttpResponse, TransportError>),
    Hang,
}

#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::default(),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> HttpRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Respond(result)) => result,
            Some(Reply::Hang) => std::future::pending().await,
            None => panic!("transport called more often than scripted"),
        }
    }
}

/// Collects formatted log output from the current thread's subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn ok(body: Value) -> Reply {
    Reply::Respond(Ok(HttpResponse {
        status: 200,
        retry_after: None,
        body: body.to_string(),
    }))
}

fn status(code: u16, body: &str) -> Reply {
    Reply::Respond(Ok(HttpResponse {
        status: code,
        retry_after: None,
        body: body.to_owned(),
    }))
}

fn completion(content: &str) -> Reply {
    ok(json!({
        "model": "test/model",
        "choices": [{ "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30 },
    }))
}

fn client(transport: Arc<ScriptedTransport>) -> OpenRouterClient {
    let config = OpenRouterConfig::new("sk-secret", "https://kidsquest.test", "KidsQuest")
        .with_base_url("https://llm.test/api/v1")
        .with_timeout(Duration::from_secs(5));
    OpenRouterClient::with_transport(config, transport).unwrap()
}

fn json_request(max_retries: u32) -> CompletionRequest {
    CompletionRequest::new(vec![ChatMessage::system("be nice"), ChatMessage::user("go")])
        .with_response_format(ResponseFormat::JsonObject)
        .with_max_retries(max_retries)
}

struct RejectAll;

#[async_trait]
impl ResponseValidator for RejectAll {
    async fn validate(&self, _data: &Value) -> Result<bool, GenerationError> {
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn sends_identity_headers_and_body() {
    let transport = ScriptedTransport::new([completion("{\"ok\": true}")]);
    let response = client(transport.clone()).complete(json_request(0)).await.unwrap();

    assert_eq!(response.data, json!({ "ok": true }));
    assert_eq!(response.metadata.usage.total_tokens.as_u64(), 30);

    let sent = transport.request(0);
    assert_eq!(sent.method, HttpMethod::Post);
    assert_eq!(sent.url, "https://llm.test/api/v1/chat/completions");
    let header = |name: &str| {
        sent.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(header("Authorization").as_deref(), Some("Bearer sk-secret"));
    assert_eq!(header("HTTP-Referer").as_deref(), Some("https://kidsquest.test"));
    assert_eq!(header("X-Title").as_deref(), Some("KidsQuest"));
    assert_eq!(header("Content-Type").as_deref(), Some("application/json"));

    let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["model"], llm::DEFAULT_MODEL);
    assert_eq!(body["response_format"]["type"], "json_object");
}

#[tokio::test(start_paused = true)]
async fn persistent_server_errors_consume_every_attempt() {
    let transport = ScriptedTransport::new((0..3).map(|_| status(503, "unavailable")));
    let started = tokio::time::Instant::now();

    let err = client(transport.clone()).complete(json_request(2)).await.unwrap_err();

    assert!(matches!(err, GenerationError::Api { status: 503, .. }));
    assert_eq!(transport.calls(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(1000 + 2000));
}

#[tokio::test(start_paused = true)]
async fn rejected_api_key_is_not_retried() {
    let transport = ScriptedTransport::new([status(401, r#"{"error":"bad key"}"#)]);

    let err = client(transport.clone()).complete(json_request(3)).await.unwrap_err();

    assert!(matches!(err, GenerationError::Api { status: 401, .. }));
    assert_eq!(err.to_string(), "API error (401): Invalid API key");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn bad_request_is_a_validation_error() {
    let transport = ScriptedTransport::new([status(400, r#"{"error":"bad schema"}"#)]);
    let err = client(transport.clone()).complete(json_request(3)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn unparseable_content_is_retried_then_recovers() {
    let transport = ScriptedTransport::new([
        completion("Sorry, here is prose."),
        completion("```json\n{\"title\": \"Hop\"}\n```"),
    ]);

    let response = client(transport.clone()).complete(json_request(2)).await.unwrap();

    assert_eq!(response.data["title"], "Hop");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn non_json_content_exhausts_into_parsing_error() {
    let transport = ScriptedTransport::new([completion("nope")]);
    let err = client(transport).complete(json_request(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
}

#[tokio::test(start_paused = true)]
async fn hanging_transport_times_out_per_attempt() {
    let transport = ScriptedTransport::new([Reply::Hang, Reply::Hang]);
    let started = tokio::time::Instant::now();

    let err = client(transport.clone()).complete(json_request(1)).await.unwrap_err();

    assert!(matches!(err, GenerationError::Timeout { after } if after == Duration::from_secs(5)));
    assert_eq!(transport.calls(), 2);
    assert_eq!(started.elapsed(), Duration::from_millis(5000 + 1000 + 5000));
}

#[tokio::test(start_paused = true)]
async fn network_failure_is_api_status_zero() {
    let transport = ScriptedTransport::new([Reply::Respond(Err(TransportError::Network(
        "connection refused".into(),
    )))]);
    let err = client(transport).complete(json_request(0)).await.unwrap_err();
    assert!(matches!(err, GenerationError::Api { status: 0, .. }));
}

#[tokio::test(start_paused = true)]
async fn provider_rate_limit_carries_retry_after() {
    let transport = ScriptedTransport::new([Reply::Respond(Ok(HttpResponse {
        status: 429,
        retry_after: Some("30".into()),
        body: String::new(),
    }))]);
    let err = client(transport).complete(json_request(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.retry_after_seconds(), Some(30));
}

#[tokio::test(start_paused = true)]
async fn validator_rejection_is_terminal_and_carries_data() {
    let transport = ScriptedTransport::new([completion("{\"title\": \"x\"}")]);
    let request = json_request(2).with_validator(Arc::new(RejectAll));

    let err = client(transport.clone()).complete(request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.details().unwrap()["data"]["title"], "x");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_never_reach_the_transport() {
    let transport = ScriptedTransport::new([]);
    let err = client(transport.clone())
        .complete(CompletionRequest::new(vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn list_models_reads_wrapped_listing() {
    let transport = ScriptedTransport::new([ok(json!({
        "data": [{ "id": "meta-llama/llama-4-maverick:free", "name": "Maverick" }]
    }))]);

    let models = client(transport.clone()).list_models().await.unwrap();

    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name.as_deref(), Some("Maverick"));
    let sent = transport.request(0);
    assert_eq!(sent.method, HttpMethod::Get);
    assert!(sent.url.ends_with("/models"));
    assert!(sent.body.is_none());
}

#[test]
fn construction_rejects_short_timeout() {
    let config = OpenRouterConfig::new("k", "r", "t").with_timeout(Duration::from_millis(10));
    let err = OpenRouterClient::with_transport(config, ScriptedTransport::new([])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test(start_paused = true)]
async fn list_models_failures_are_logged_with_their_kind() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let transport = ScriptedTransport::new([
        Reply::Respond(Err(TransportError::Network("connection reset".into()))),
        ok(json!({ "models": [] })),
        Reply::Hang,
    ]);
    let client = client(transport);

    let mut kinds = Vec::new();
    for _ in 0..3 {
        kinds.push(client.list_models().await.unwrap_err().kind());
    }
    assert_eq!(kinds, vec![ErrorKind::Api, ErrorKind::Parsing, ErrorKind::Timeout]);

    let failures: Vec<String> = logs
        .lines()
        .into_iter()
        .filter(|line| line.contains("provider request failed"))
        .collect();
    assert_eq!(failures.len(), 3);
    assert!(failures[0].contains("kind=\"api\"") || failures[0].contains("kind=api"));
    assert!(failures[1].contains("parsing"));
    assert!(failures[2].contains("timeout"));
    assert!(failures.iter().all(|line| line.contains("ERROR") && !line.contains("sk-secret")));
}

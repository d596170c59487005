use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use little_owl::{
    AthenaClient, BufferSink, ClientOptions, Credentials, OwlConfig, OwlError, QueryHandle,
    QueryRunner, QueryService, ServiceError, WaitOptions,
};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: JsonValue,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body,
            delay: Duration::from_millis(0),
        }
    }

    fn ok(body: JsonValue) -> Self {
        Self::json(StatusCode::OK, body)
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct RecordedRequest {
    target: String,
    body: JsonValue,
    authorization: String,
    security_token: Option<String>,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    hits: Arc<AtomicUsize>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn athena_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .requests
        .lock()
        .expect("request log mutex must not be poisoned")
        .push(RecordedRequest {
            target: header_value(&headers, "x-amz-target").unwrap_or_default(),
            body: serde_json::from_str(&body).unwrap_or(JsonValue::Null),
            authorization: header_value(&headers, "authorization").unwrap_or_default(),
            security_token: header_value(&headers, "x-amz-security-token"),
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, Json(response.body))
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn config(&self) -> OwlConfig {
        OwlConfig::new(Credentials::new("AKIDTEST", "test-secret"))
            .with_endpoint(format!("{}/", self.base_url))
            .with_output_location("s3://test-results/")
    }

    fn client(&self) -> AthenaClient {
        AthenaClient::new(&self.config()).expect("client must build")
    }

    fn runner(&self) -> QueryRunner<AthenaClient> {
        QueryRunner::new(self.client(), "s3://test-results/").with_wait_options(WaitOptions {
            poll_interval: Duration::from_millis(1),
            ..WaitOptions::default()
        })
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("request log mutex must not be poisoned")
            .clone()
    }

    fn targets(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.target).collect()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        requests: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .route("/", post(athena_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        requests: state.requests,
        task,
    }
}

fn started(id: &str) -> MockResponse {
    MockResponse::ok(json!({ "QueryExecutionId": id }))
}

fn status(state: &str, reason: Option<&str>) -> MockResponse {
    MockResponse::ok(json!({
        "QueryExecution": {
            "QueryExecutionId": "q-1",
            "Status": { "State": state, "StateChangeReason": reason }
        }
    }))
}

fn results(rows: &[&[&str]], next_token: Option<&str>) -> MockResponse {
    let rows: Vec<JsonValue> = rows
        .iter()
        .map(|row| {
            let data: Vec<JsonValue> = row
                .iter()
                .map(|cell| json!({ "VarCharValue": cell }))
                .collect();
            json!({ "Data": data })
        })
        .collect();
    MockResponse::ok(json!({
        "ResultSet": {
            "Rows": rows,
            "ResultSetMetadata": { "ColumnInfo": [] }
        },
        "NextToken": next_token
    }))
}

fn cells(row: &[&str]) -> Vec<String> {
    row.iter().map(|cell| (*cell).to_owned()).collect()
}

#[tokio::test]
async fn run_query_submits_waits_and_pages() {
    let server = spawn_server(vec![
        started("q-1"),
        status("QUEUED", None),
        status("RUNNING", None),
        status("SUCCEEDED", None),
        results(&[&["species", "wingspan_cm"], &["barn owl", "95"]], Some("t-1")),
        results(&[&["snowy owl", "150"]], None),
    ])
    .await;

    let rows = server
        .runner()
        .run_query("SELECT species, wingspan_cm FROM owls")
        .await
        .expect("query must succeed");

    assert_eq!(
        rows,
        vec![
            cells(&["species", "wingspan_cm"]),
            cells(&["barn owl", "95"]),
            cells(&["snowy owl", "150"]),
        ]
    );
    assert_eq!(
        server.targets(),
        vec![
            "AmazonAthena.StartQueryExecution",
            "AmazonAthena.GetQueryExecution",
            "AmazonAthena.GetQueryExecution",
            "AmazonAthena.GetQueryExecution",
            "AmazonAthena.GetQueryResults",
            "AmazonAthena.GetQueryResults",
        ]
    );

    let requests = server.requests();
    assert_eq!(
        requests[0].body,
        json!({
            "QueryString": "SELECT species, wingspan_cm FROM owls",
            "ResultConfiguration": { "OutputLocation": "s3://test-results/" }
        })
    );
    assert_eq!(requests[1].body, json!({ "QueryExecutionId": "q-1" }));
    assert_eq!(
        requests[4].body,
        json!({ "QueryExecutionId": "q-1", "MaxResults": 1000 })
    );
    assert_eq!(
        requests[5].body,
        json!({ "QueryExecutionId": "q-1", "MaxResults": 1000, "NextToken": "t-1" })
    );
}

#[tokio::test]
async fn requests_are_signed() {
    let server = spawn_server(vec![status("RUNNING", None)]).await;
    let mut config = server.config().with_region("eu-west-1");
    config.credentials = config.credentials.with_session_token("session-abc");
    let client = AthenaClient::new(&config).expect("client must build");

    client
        .get_execution_status(&QueryHandle::new("q-1"))
        .await
        .expect("status must succeed");

    let request = &server.requests()[0];
    assert!(request
        .authorization
        .starts_with("AWS4-HMAC-SHA256 Credential=AKIDTEST/"));
    assert!(request
        .authorization
        .contains("/eu-west-1/athena/aws4_request, SignedHeaders="));
    assert!(request.authorization.contains("x-amz-security-token"));
    assert_eq!(request.security_token.as_deref(), Some("session-abc"));
}

#[tokio::test]
async fn failed_query_surfaces_reason_and_skips_results() {
    let server = spawn_server(vec![
        started("q-1"),
        status("RUNNING", None),
        status("FAILED", Some("SYNTAX_ERROR: line 1:8: Column 'beak' cannot be resolved")),
    ])
    .await;

    let err = server
        .runner()
        .run_query("SELECT beak FROM owls")
        .await
        .expect_err("query must fail");

    match err {
        OwlError::QueryFailed { reason, .. } => {
            assert_eq!(reason, "SYNTAX_ERROR: line 1:8: Column 'beak' cannot be resolved")
        }
        other => panic!("expected query failure, got {other:?}"),
    }
    assert_eq!(server.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn submission_rejection_is_decoded() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::BAD_REQUEST,
        json!({
            "__type": "com.amazonaws.athena#InvalidRequestException",
            "Message": "line 1:1: mismatched input 'SELEC'"
        }),
    )])
    .await;

    let err = server
        .runner()
        .run_query("SELEC 1")
        .await
        .expect_err("submission must fail");

    match err {
        OwlError::Submission(ServiceError::Api { status, code, message }) => {
            assert_eq!(status, 400);
            assert_eq!(code, "InvalidRequestException");
            assert_eq!(message, "line 1:1: mismatched input 'SELEC'");
        }
        other => panic!("expected submission error, got {other:?}"),
    }
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn page_failure_keeps_earlier_rows() {
    let server = spawn_server(vec![
        started("q-1"),
        status("SUCCEEDED", None),
        results(&[&["n"], &["1"], &["2"]], Some("t-1")),
        MockResponse::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "__type": "InternalServerException", "message": "boom" }),
        ),
        results(&[&["3"]], None),
    ])
    .await;
    let mut sink = BufferSink::new();

    let err = server
        .runner()
        .stream_query("SELECT n FROM numbers", &mut sink)
        .await
        .expect_err("second page must fail");

    assert!(matches!(err, OwlError::PageFetch { page: 2, .. }));
    assert_eq!(sink.header(), Some(&cells(&["n"])));
    assert_eq!(sink.rows(), &[cells(&["1"]), cells(&["2"])]);
    assert_eq!(server.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn retries_transient_status_when_enabled() {
    let server = spawn_server(vec![
        MockResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "message": "slow down" }),
        ),
        status("SUCCEEDED", None),
    ])
    .await;
    let client = server.client().with_options(ClientOptions {
        timeout_ms: 1_000,
        max_retries: 1,
        retry_backoff_ms: 1,
    });

    let status = client
        .get_execution_status(&QueryHandle::new("q-1"))
        .await
        .expect("status must succeed after retry");

    assert!(status.state.is_terminal());
    assert_eq!(server.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn status_failure_without_retry_aborts_polling() {
    let server = spawn_server(vec![
        started("q-1"),
        status("RUNNING", None),
        MockResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "message": "slow down" }),
        ),
        status("SUCCEEDED", None),
    ])
    .await;

    let err = server
        .runner()
        .run_query("SELECT 1")
        .await
        .expect_err("polling must fail");

    assert!(matches!(
        err,
        OwlError::Polling(ServiceError::Http { status: 503, .. })
    ));
    assert_eq!(server.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn request_timeout_surfaces_transport_error() {
    let server = spawn_server(vec![status("RUNNING", None).with_delay(Duration::from_millis(150))])
        .await;
    let client = server.client().with_options(ClientOptions {
        timeout_ms: 20,
        max_retries: 0,
        retry_backoff_ms: 1,
    });

    let err = client
        .get_execution_status(&QueryHandle::new("q-1"))
        .await
        .expect_err("request must timeout");

    match err {
        ServiceError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected transport timeout error, got {other:?}"),
    }
}

#[tokio::test]
async fn deadline_bounds_an_in_flight_status_check() {
    let server = spawn_server(vec![
        started("q-1"),
        status("RUNNING", None).with_delay(Duration::from_millis(500)),
    ])
    .await;
    let runner = server.runner().with_wait_options(WaitOptions {
        poll_interval: Duration::from_millis(1),
        deadline: Some(Duration::from_millis(100)),
        ..WaitOptions::default()
    });
    let begun = std::time::Instant::now();

    let err = runner
        .run_query("SELECT 1")
        .await
        .expect_err("wait must give up");

    assert!(matches!(err, OwlError::WaitLimitExceeded { polls: 0, .. }));
    assert!(begun.elapsed() < Duration::from_millis(450));
}

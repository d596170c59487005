use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::sleep;

use crate::{
    decode::{decode_handle, decode_page, decode_service_error, decode_status},
    signing::{self, SigningRequest},
    wire::{self, GetQueryResultsRequest, QueryExecutionIdRequest, StartQueryExecutionRequest},
    ClientOptions, Credentials, Cursor, ExecutionStatus, OwlConfig, OwlError, PageData,
    QueryHandle, QueryRequest, QueryService, Result, ServiceError,
};

const SERVICE: &str = "athena";
const TARGET_PREFIX: &str = "AmazonAthena";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Upper bound Athena accepts for `MaxResults`.
pub const MAX_RESULTS_LIMIT: i32 = 1000;

/// HTTP client for the Amazon Athena query API.
#[derive(Clone)]
pub struct AthenaClient {
    http: reqwest::Client,
    endpoint: Url,
    region: String,
    credentials: Credentials,
    options: ClientOptions,
}

impl fmt::Debug for AthenaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AthenaClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .field("credentials", &self.credentials)
            .field("options", &self.options)
            .finish()
    }
}

impl AthenaClient {
    /// Creates a client for the endpoint and credentials in `config`.
    pub fn new(config: &OwlConfig) -> Result<Self> {
        let raw = config.endpoint_url();
        let endpoint = Url::parse(&raw)
            .map_err(|err| OwlError::Config(format!("invalid endpoint '{raw}': {err}")))?;
        if endpoint.host_str().is_none() {
            return Err(OwlError::Config(format!("endpoint '{raw}' has no host")));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            region: config.region.clone(),
            credentials: config.credentials.clone(),
            options: ClientOptions::default(),
        })
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<B, T>(&self, operation: &str, payload: &B) -> std::result::Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload).map_err(|err| {
            ServiceError::Decode(format!("cannot encode {operation} request: {err}"))
        })?;
        let target = format!("{TARGET_PREFIX}.{operation}");

        let mut attempt = 0usize;
        loop {
            // Signed per attempt: the signature covers the request timestamp.
            let signed = signing::sign(
                &SigningRequest {
                    method: "POST",
                    url: &self.endpoint,
                    headers: &[
                        ("content-type", CONTENT_TYPE),
                        ("x-amz-target", target.as_str()),
                    ],
                    body: &body,
                    region: &self.region,
                    service: SERVICE,
                },
                &self.credentials,
                chrono::Utc::now(),
            )?;

            let mut request = self
                .http
                .post(self.endpoint.clone())
                .header(header::CONTENT_TYPE, CONTENT_TYPE)
                .header("x-amz-target", &target)
                .timeout(Duration::from_millis(self.options.timeout_ms))
                .body(body.clone());
            for (name, value) in signed {
                request = request.header(name, value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(ServiceError::Transport)?;

                    if !status.is_success() {
                        if self.should_retry_status(status) && attempt < self.options.max_retries {
                            self.wait_before_retry(operation, attempt).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(decode_service_error(status.as_u16(), text));
                    }

                    return serde_json::from_str::<T>(&text).map_err(|err| {
                        ServiceError::Decode(format!(
                            "invalid {operation} response JSON: {err}; body: {text}"
                        ))
                    });
                }
                Err(err) => {
                    if self.should_retry_transport(&err) && attempt < self.options.max_retries {
                        self.wait_before_retry(operation, attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ServiceError::Transport(err));
                }
            }
        }
    }

    fn should_retry_status(&self, status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    }

    fn should_retry_transport(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
    }

    /// Exponential backoff before the next attempt.
    async fn wait_before_retry(&self, operation: &str, attempt: usize) {
        let exp = attempt.min(16) as u32;
        let multiplier = 1u64 << exp;
        let delay_ms = self.options.retry_backoff_ms.saturating_mul(multiplier);

        #[cfg(feature = "tracing")]
        tracing::debug!("retrying {} after {} ms", operation, delay_ms);
        #[cfg(not(feature = "tracing"))]
        let _ = operation;

        sleep(Duration::from_millis(delay_ms)).await;
    }
}

#[async_trait]
impl QueryService for AthenaClient {
    async fn start_execution(
        &self,
        request: &QueryRequest,
    ) -> std::result::Result<QueryHandle, ServiceError> {
        let payload = StartQueryExecutionRequest {
            query_string: &request.sql,
            result_configuration: wire::ResultConfiguration {
                output_location: &request.output_location,
            },
        };
        let response: wire::StartQueryExecutionResponse =
            self.call("StartQueryExecution", &payload).await?;
        decode_handle(response)
    }

    async fn get_execution_status(
        &self,
        handle: &QueryHandle,
    ) -> std::result::Result<ExecutionStatus, ServiceError> {
        let payload = QueryExecutionIdRequest {
            query_execution_id: handle.as_str(),
        };
        let response: wire::GetQueryExecutionResponse =
            self.call("GetQueryExecution", &payload).await?;
        decode_status(response)
    }

    async fn get_result_page(
        &self,
        handle: &QueryHandle,
        max_rows: i32,
        cursor: Option<&Cursor>,
    ) -> std::result::Result<PageData, ServiceError> {
        let payload = GetQueryResultsRequest {
            query_execution_id: handle.as_str(),
            max_results: max_rows.clamp(1, MAX_RESULTS_LIMIT),
            next_token: cursor.map(Cursor::as_str),
        };
        let response: wire::GetQueryResultsResponse =
            self.call("GetQueryResults", &payload).await?;
        Ok(decode_page(response))
    }

    async fn stop_execution(&self, handle: &QueryHandle) -> std::result::Result<(), ServiceError> {
        let payload = QueryExecutionIdRequest {
            query_execution_id: handle.as_str(),
        };
        let _: wire::StopQueryExecutionResponse =
            self.call("StopQueryExecution", &payload).await?;
        Ok(())
    }
}

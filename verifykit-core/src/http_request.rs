use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::defaults::VerifyKitConfig;
use crate::error::{ApiErrorCode, VerifyKitError};
use crate::transport::{ApiRequest, AuthScope, RequestSecurity, Transport};

/// [`Transport`] over HTTPS. Sets sensible defaults such as timeouts, user-agent &
/// ensuring HTTPS, wraps bodies into the service envelope, delegates signing and
/// encryption to a [`RequestSecurity`] and retries idempotent reads on transient
/// failures.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    security: Arc<dyn RequestSecurity>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Initializes a new `HttpTransport` instance.
    ///
    /// # Errors
    /// Returns [`VerifyKitError::InvalidInput`] when the base URL is not HTTPS.
    pub fn new(
        config: &VerifyKitConfig,
        security: Arc<dyn RequestSecurity>,
    ) -> Result<Self, VerifyKitError> {
        if !config.base_url.starts_with("https://") {
            return Err(VerifyKitError::InvalidInput {
                attribute: "baseUrl".to_string(),
                reason: "only https endpoints are supported".to_string(),
            });
        }
        Ok(Self::with_base_url_unchecked(
            &config.base_url,
            config.request_timeout(),
            config.max_retries,
            security,
        ))
    }

    fn with_base_url_unchecked(
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
        security: Arc<dyn RequestSecurity>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries,
            security,
        }
    }

    /// Creates a request builder with defaults, envelope, encryption and signature applied.
    fn build(&self, request: &ApiRequest) -> Result<RequestBuilder, VerifyKitError> {
        let endpoint = request.endpoint;
        let url = format!("{}{}", self.base_url, endpoint.path());
        let payload = serde_json::to_vec(&json!({ "requestObject": request.body }))?;
        let envelope = self.security.encrypt(payload, endpoint.scope())?;

        let mut builder = self
            .client
            .post(&url)
            .timeout(request.timeout.unwrap_or(self.timeout))
            .header(
                "User-Agent",
                format!("verifykit-core/{}", env!("CARGO_PKG_VERSION")),
            );
        if let Some(language) = &request.accept_language {
            builder = builder.header("Accept-Language", language);
        }
        if endpoint.scope() == AuthScope::Activation {
            let signature = self
                .security
                .sign(endpoint.path().to_string(), envelope.body.clone())?;
            for header in signature {
                builder = builder.header(header.name, header.value);
            }
        }
        for header in envelope.headers {
            builder = builder.header(header.name, header.value);
        }
        Ok(builder.body(envelope.body))
    }

    /// Sends the request, with retries for transient failures when `retry` is set.
    async fn handle(
        &self,
        request_builder: RequestBuilder,
        retry: bool,
    ) -> Result<Response, RequestHandleError> {
        if !retry || self.max_retries == 0 {
            return execute_request_builder(request_builder).await;
        }
        let Some(template) = request_builder.try_clone() else {
            return execute_request_builder(request_builder).await;
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                RequestHandleError::permanent(
                    "request cannot be retried because it is not cloneable".to_string(),
                )
            })?;
            execute_request_builder(request_builder).await
        })
        .retry(backoff)
        .when(RequestHandleError::is_retryable)
        .await
    }

    async fn decode(
        &self,
        response: Response,
        scope: AuthScope,
    ) -> Result<Value, VerifyKitError> {
        let status = response.status();
        let url = response.url().path().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| VerifyKitError::Offline(format!("{url}: {e}")))?;

        if !status.is_success() {
            return Err(error_from_body(status, &bytes));
        }

        let plain = self.security.decrypt(bytes.to_vec(), scope)?;
        let envelope: ResponseEnvelope = serde_json::from_slice(&plain).map_err(|e| {
            VerifyKitError::InvalidResponse(format!("{url}: undecodable envelope: {e}"))
        })?;
        if envelope.status.eq_ignore_ascii_case("OK") {
            Ok(envelope.response_object.unwrap_or(Value::Null))
        } else {
            Err(error_from_body(status, &plain))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> Result<Value, VerifyKitError> {
        let builder = self.build(&request)?;
        let response = self
            .handle(builder, request.endpoint.is_idempotent())
            .await
            .map_err(VerifyKitError::from)?;
        self.decode(response, request.endpoint.scope()).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope {
    status: String,
    response_object: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(rename = "responseObject")]
    error: ErrorObject,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

/// Classifies a failed response by its status code and error envelope.
fn error_from_body(status: StatusCode, body: &[u8]) -> VerifyKitError {
    let http_status = Some(status.as_u16());
    let parsed = serde_json::from_slice::<ErrorEnvelope>(body).ok();
    let auth_status = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;

    match parsed {
        Some(ErrorEnvelope { error }) => {
            let code = ApiErrorCode::from_str(&error.code)
                .unwrap_or_else(|_| ApiErrorCode::Other(error.code.clone()));
            let message = error.message.unwrap_or_default();
            if auth_status && code == ApiErrorCode::PowerauthAuthFail {
                return VerifyKitError::AuthFailure(message);
            }
            VerifyKitError::Server {
                code,
                message,
                http_status,
            }
        }
        None if auth_status => {
            VerifyKitError::AuthFailure(format!("request rejected with status {status}"))
        }
        None => VerifyKitError::Server {
            code: ApiErrorCode::ErrorGeneric,
            message: String::from_utf8_lossy(body).into_owned(),
            http_status,
        },
    }
}

#[derive(Debug)]
enum RequestFailure {
    Offline(String),
    Status(StatusCode, Vec<u8>),
    Permanent(String),
}

#[derive(Debug)]
struct RequestHandleError {
    failure: RequestFailure,
    retryable: bool,
}

impl RequestHandleError {
    const fn retryable(failure: RequestFailure) -> Self {
        Self {
            failure,
            retryable: true,
        }
    }

    const fn permanent(error: String) -> Self {
        Self {
            failure: RequestFailure::Permanent(error),
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<RequestHandleError> for VerifyKitError {
    fn from(value: RequestHandleError) -> Self {
        match value.failure {
            RequestFailure::Offline(error) => Self::Offline(error),
            RequestFailure::Status(status, body) => error_from_body(status, &body),
            RequestFailure::Permanent(error) => Self::InvalidResponse(error),
        }
    }
}

async fn execute_request_builder(
    request_builder: RequestBuilder,
) -> Result<Response, RequestHandleError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        RequestHandleError::permanent(format!("request build failed: {err}"))
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = resp.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                return Err(RequestHandleError::retryable(RequestFailure::Status(
                    status, body,
                )));
            }
            Ok(resp)
        }
        Err(err) => {
            if err.is_timeout() || err.is_connect() || err.is_request() {
                return Err(RequestHandleError::retryable(RequestFailure::Offline(
                    format!("{url}: {err}"),
                )));
            }

            Err(RequestHandleError::permanent(format!(
                "request to {url} failed: {err}"
            )))
        }
    }
}

#[cfg(test)]
impl HttpTransport {
    /// Create a transport with a custom base URL (for testing).
    fn with_base_url(base_url: &str, max_retries: u32) -> Self {
        Self::with_base_url_unchecked(
            base_url,
            Duration::from_secs(5),
            max_retries,
            Arc::new(crate::transport::PlaintextSecurity),
        )
    }
}

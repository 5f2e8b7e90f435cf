use std::sync::Arc;
use std::time::Duration;

use backstop_core::{BackoffConfig, BackoffSchedule, execute_with_retry};
use backstop_net::{Header, Limits, ParseStatus, Response, ResponseParser, encode_request};
use http::header::USER_AGENT;
use http::{HeaderValue, Uri};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::RequestError;
use crate::request::Request;

pub const USER_AGENT_VALUE: &str = concat!("backstop/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    /// Upper bound for a single attempt, not for the whole retry loop.
    pub timeout_ms: u64,
    pub backoff: BackoffConfig,
    pub max_response_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/".to_string(),
            timeout_ms: 30 * 1000,
            backoff: BackoffConfig {
                base_delay_ms: 2000,
                exponent: 1.5,
            },
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Plain-HTTP client that rides out `429 Too Many Requests` with exponential
/// backoff.
#[derive(Debug, Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    uri: Uri,
    schedule: BackoffSchedule,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, RequestError> {
        let uri = config
            .url
            .parse::<Uri>()
            .map_err(|err| RequestError::InvalidUri(format!("{}: {err}", config.url)))?;
        check_target(&uri)?;
        let schedule = BackoffSchedule::from_config(&config.backoff);
        Ok(Self {
            config: Arc::new(config),
            uri,
            schedule,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn schedule(&self) -> BackoffSchedule {
        self.schedule
    }

    /// GETs the configured URL, retrying while throttled, and returns the body.
    pub async fn get(&self) -> Result<String, RequestError> {
        let request = Request::builder(self.uri.clone())
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .build();
        let response = self.request(request).await?;
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }

    /// Sends `request`, retrying for as long as the server answers 429.
    ///
    /// There is no retry limit; see [`Client::request_with`] to supply a bounded
    /// predicate.
    pub async fn request(&self, request: Request) -> Result<Response, RequestError> {
        self.request_with(request, RequestError::is_throttled).await
    }

    pub async fn request_with<P>(
        &self,
        request: Request,
        should_retry: P,
    ) -> Result<Response, RequestError>
    where
        P: FnMut(&RequestError) -> bool,
    {
        execute_with_retry(
            || self.send(request.clone()),
            should_retry,
            self.schedule.delay_fn(),
        )
        .await
    }

    /// A single attempt. Any non-2xx answer comes back as [`RequestError::Status`].
    pub async fn send(&self, request: Request) -> Result<Response, RequestError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = tokio::time::timeout(timeout, self.execute(&request))
            .await
            .map_err(|_| RequestError::Timeout(timeout))??;

        let status = response.status();
        tracing::debug!(
            method = %request.method,
            uri = %request.uri,
            status,
            "attempt finished"
        );
        if (200..300).contains(&status) {
            return Ok(response);
        }

        Err(RequestError::Status {
            status,
            retry_after_secs: response
                .header("retry-after")
                .and_then(|value| value.trim().parse::<u64>().ok()),
            body: String::from_utf8_lossy(&response.body).into_owned(),
        })
    }

    async fn execute(&self, request: &Request) -> Result<Response, RequestError> {
        let (host, port) = check_target(&request.uri)?;
        let authority = request
            .uri
            .authority()
            .map(|authority| authority.as_str().to_string())
            .unwrap_or_else(|| host.clone());

        let mut headers: Vec<Header> = request
            .headers
            .iter()
            .map(|(name, value)| {
                Header::new(
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        headers.push(Header::new("Connection", "close"));

        let mut stream = TcpStream::connect((host.as_str(), port)).await?;
        let bytes = encode_request(
            request.method.as_str(),
            request.target(),
            &authority,
            &headers,
            &request.body,
        );
        stream.write_all(&bytes).await?;

        let mut parser = ResponseParser::with_limits(Limits {
            max_body_bytes: self.config.max_response_bytes,
            ..Limits::default()
        });
        let mut buffer = vec![0u8; 8192];
        loop {
            let n = stream.read(&mut buffer).await?;
            let status = if n == 0 {
                parser.finish()
            } else {
                parser.push(&buffer[..n])
            };
            match status {
                ParseStatus::Complete { message } => return Ok(message),
                ParseStatus::Error { error } => return Err(error.into()),
                ParseStatus::NeedMore => continue,
            }
        }
    }
}

fn check_target(uri: &Uri) -> Result<(String, u16), RequestError> {
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(RequestError::UnsupportedScheme(other.to_string())),
        None => return Err(RequestError::InvalidUri(format!("{uri}: missing scheme"))),
    }
    let host = uri
        .host()
        .ok_or_else(|| RequestError::InvalidUri(format!("{uri}: missing host")))?;
    Ok((host.to_string(), uri.port_u16().unwrap_or(80)))
}

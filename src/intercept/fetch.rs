use tracing::debug;

use crate::Result;
use crate::capture::InFlight;
use crate::capture::parse::{headers_from_map, normalize_request_body, parse_body_bytes};
use crate::http::{FetchRequest, FetchResponse};
use crate::intercept::{FetchIssuer, RecordSink};
use crate::sanitize::SanitizeOptions;

/// 包装一次性请求发起者，每次调用结束后发出一条记录
///
/// 响应和错误都原样返回给调用方。
pub struct InterceptedFetch<F, S> {
    inner: F,
    sink: S,
    options: SanitizeOptions,
}

impl<F, S> InterceptedFetch<F, S>
where
    F: FetchIssuer,
    S: RecordSink,
{
    pub fn new(inner: F, sink: S) -> Self {
        Self::with_options(inner, sink, SanitizeOptions::default())
    }

    pub fn with_options(inner: F, sink: S, options: SanitizeOptions) -> Self {
        Self {
            inner,
            sink,
            options,
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F, S> FetchIssuer for InterceptedFetch<F, S>
where
    F: FetchIssuer,
    S: RecordSink,
{
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let mut in_flight = InFlight::open(request.method_or_default(), &request.url);
        for (name, value) in &request.headers {
            in_flight.set_request_header(name, value);
        }
        in_flight.set_request_body(normalize_request_body(request.body.as_ref(), &self.options));
        debug!(method = in_flight.method(), url = in_flight.url(), "Fetch intercepted");

        match self.inner.fetch(request).await {
            Ok(response) => {
                let record = in_flight.complete(
                    response.status.code(),
                    headers_from_map(&response.headers),
                    response
                        .body
                        .as_deref()
                        .map(parse_body_bytes)
                        .unwrap_or(serde_json::Value::Null),
                );
                self.sink.emit(record);
                Ok(response)
            }
            Err(e) => {
                self.sink.emit(in_flight.fail(&e));
                Err(e)
            }
        }
    }
}

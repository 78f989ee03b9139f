//! 被检测的页面上下文
//!
//! 页面加载时根据目标域名决定是否安装拦截器，安装结果在页面生命周期内不变。
//! 页面发出的所有调用都经过 [`Page::fetch`] 或 [`Page::request`]。

use std::future::Future;

use tracing::{debug, info};

use crate::Result;
use crate::config::Config;
use crate::http::{FetchRequest, FetchResponse, HttpFetcher, HttpRequest};
use crate::intercept::{
    EventKind, FetchIssuer, InterceptedFetch, InterceptedRequest, Listener, ProgressiveRequest,
    RecordSink,
};
use crate::sanitize::{SanitizeOptions, Value};

pub struct Page<S> {
    url: String,
    client: reqwest::Client,
    hooks: Option<Hooks<S>>,
}

struct Hooks<S> {
    fetch: InterceptedFetch<HttpFetcher, S>,
    sink: S,
    options: SanitizeOptions,
}

impl<S> Page<S>
where
    S: RecordSink + Clone + 'static,
{
    /// 加载页面；页面主机名匹配目标域名时安装拦截器
    pub fn load(url: &str, config: &Config, sink: S) -> Self {
        Self::load_with_client(url, config, sink, reqwest::Client::new())
    }

    pub fn load_with_client(
        url: &str,
        config: &Config,
        sink: S,
        client: reqwest::Client,
    ) -> Self {
        let hooks = if config.is_target_domain(url) {
            info!(page = url, "API listener installed");
            Some(Hooks {
                fetch: InterceptedFetch::with_options(
                    HttpFetcher::with_client(client.clone()),
                    sink.clone(),
                    config.sanitize,
                ),
                sink,
                options: config.sanitize,
            })
        } else {
            debug!(
                page = url,
                target = %config.target_domain,
                "Page is not on the target domain, listener not installed"
            );
            None
        };
        Self {
            url: url.to_string(),
            client,
            hooks,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_instrumented(&self) -> bool {
        self.hooks.is_some()
    }

    /// 一次性请求，行为与未拦截时一致
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        match &self.hooks {
            Some(hooks) => hooks.fetch.fetch(request).await,
            None => HttpFetcher::with_client(self.client.clone()).fetch(request).await,
        }
    }

    /// 新建一个事件式请求
    pub fn request(&self) -> PageRequest<S> {
        let inner = HttpRequest::with_client(self.client.clone());
        match &self.hooks {
            Some(hooks) => PageRequest::Instrumented(InterceptedRequest::with_options(
                inner,
                hooks.sink.clone(),
                hooks.options,
            )),
            None => PageRequest::Plain(inner),
        }
    }
}

/// 页面上的事件式请求：安装了拦截器时被包装，否则为原始实现
pub enum PageRequest<S> {
    Plain(HttpRequest),
    Instrumented(InterceptedRequest<HttpRequest, S>),
}

impl<S> ProgressiveRequest for PageRequest<S>
where
    S: RecordSink + Clone + 'static,
{
    fn open(&mut self, method: &str, url: &str) -> Result<()> {
        match self {
            PageRequest::Plain(r) => r.open(method, url),
            PageRequest::Instrumented(r) => r.open(method, url),
        }
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()> {
        match self {
            PageRequest::Plain(r) => r.set_request_header(name, value),
            PageRequest::Instrumented(r) => r.set_request_header(name, value),
        }
    }

    fn add_event_listener(&mut self, kind: EventKind, listener: Listener) {
        match self {
            PageRequest::Plain(r) => r.add_event_listener(kind, listener),
            PageRequest::Instrumented(r) => r.add_event_listener(kind, listener),
        }
    }

    fn send(&mut self, body: Option<Value>) -> Result<()> {
        match self {
            PageRequest::Plain(r) => r.send(body),
            PageRequest::Instrumented(r) => r.send(body),
        }
    }

    fn status(&self) -> u16 {
        self.http().status()
    }

    fn response_text(&self) -> Option<String> {
        self.http().response_text()
    }

    fn all_response_headers(&self) -> String {
        self.http().all_response_headers()
    }

    fn completed(&self) -> impl Future<Output = ()> + Send {
        self.http().completed()
    }
}

impl<S> PageRequest<S>
where
    S: RecordSink + Clone + 'static,
{
    fn http(&self) -> &HttpRequest {
        match self {
            PageRequest::Plain(r) => r,
            PageRequest::Instrumented(r) => r.inner(),
        }
    }
}

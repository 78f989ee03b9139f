use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use inquire::Select;
use tracing::{info, warn};

use api_hacker::ConfigLoader;
use api_hacker::http::FetchRequest;
use api_hacker::inspector::Inspector;
use api_hacker::intercept::{ProgressiveRequest, RecordSink};
use api_hacker::page::Page;
use api_hacker::relay::{Broker, Relay, SenderInfo};
use api_hacker::sanitize::Value;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// 页面所在的标签页编号，只用于日志
const PAGE_TAB: u32 = 1;

/// 等待检查器收到一条记录的最长时间
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 要从页面发起的请求地址
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// 使用事件式请求 (XHR) 而不是 fetch
    #[arg(long)]
    pub xhr: bool,

    /// HTTP 方法
    #[arg(short = 'X', long = "method")]
    pub method: Option<String>,

    /// 请求头，格式 "Name: value"，可重复
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// 请求体
    #[arg(short = 'd', long = "data")]
    pub data: Option<String>,

    /// 页面地址，默认取第一个请求地址
    #[arg(long)]
    pub page: Option<String>,

    /// 检查器过滤条件
    #[arg(long)]
    pub filter: Option<String>,

    /// 显示第 n 条可见记录的详情 (从 1 开始)
    #[arg(long)]
    pub select: Option<usize>,

    /// 交互式选择要查看的记录
    #[arg(short, long)]
    pub interactive: bool,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 关闭颜色输出
    #[arg(long)]
    pub no_color: bool,
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("invalid header '{}', expected 'Name: value'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid header '{}', empty name", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl Cli {
    fn page_url(&self) -> &str {
        self.page.as_deref().unwrap_or(&self.urls[0])
    }

    fn fetch_request(&self, url: &str) -> FetchRequest {
        let mut request = FetchRequest::new(url);
        if let Some(method) = &self.method {
            request = request.with_method(method);
        }
        for (name, value) in &self.headers {
            request = request.with_header(name, value);
        }
        if let Some(data) = &self.data {
            request = request.with_text(data);
        }
        request
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::load(cli.config.as_deref())?;
    info!(
        target_domain = %config.target_domain,
        max_requests = config.max_requests,
        "Config loaded"
    );

    let broker = Broker::new().spawn();
    let mut inspector = Inspector::new(config.max_requests);
    inspector.mount(&broker).await?;

    let relay = Relay::new(broker.clone(), SenderInfo::tab(PAGE_TAB));
    if let Err(e) = relay.announce_ready().await {
        warn!("Error sending content script ready message: {}", e);
    }

    let page = Page::load(cli.page_url(), &config, relay);
    if !page.is_instrumented() {
        warn!(
            page = page.url(),
            target = %config.target_domain,
            "Page is not on the target domain, nothing will be captured"
        );
    }

    for url in &cli.urls {
        if cli.xhr {
            issue_xhr(&page, &cli, url).await?;
        } else {
            match page.fetch(cli.fetch_request(url)).await {
                Ok(response) => {
                    info!(url = url.as_str(), status = %response.status, "Fetch finished")
                }
                Err(e) => warn!(url = url.as_str(), "Fetch failed: {}", e),
            }
        }
    }

    if page.is_instrumented() {
        collect(&mut inspector, cli.urls.len()).await?;
    }

    if let Some(filter) = &cli.filter {
        inspector.set_filter(filter);
    }
    choose_selection(&mut inspector, &cli)?;

    println!("{}", inspector.render(!cli.no_color));
    inspector.unmount();
    Ok(())
}

async fn issue_xhr<S>(page: &Page<S>, cli: &Cli, url: &str) -> Result<()>
where
    S: RecordSink + Clone + 'static,
{
    let mut request = page.request();
    let method = cli.method.as_deref().unwrap_or("GET");
    request.open(method, url)?;
    for (name, value) in &cli.headers {
        request.set_request_header(name, value)?;
    }
    request.send(cli.data.as_deref().map(Value::string))?;
    request.completed().await;

    let status = request.status();
    if status == 0 {
        warn!(url, "Request failed");
    } else {
        info!(url, status, "Request finished");
    }
    Ok(())
}

/// 等到检查器收到预期数量的更新消息，或者超时
///
/// 按投递次数计数：日志容量小于请求数时记录条数不会达到 `expected`。
async fn collect(inspector: &mut Inspector, expected: usize) -> Result<()> {
    let mut delivered = 0;
    while delivered < expected {
        match tokio::time::timeout(DELIVERY_TIMEOUT, inspector.next_delivery()).await {
            Ok(Ok(true)) => delivered += 1,
            Ok(Ok(false)) => break,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(delivered, expected, "Timed out waiting for captured requests");
                break;
            }
        }
    }
    Ok(())
}

fn choose_selection(inspector: &mut Inspector, cli: &Cli) -> Result<()> {
    let visible: Vec<(String, String)> = inspector
        .visible()
        .iter()
        .map(|r| {
            let display = format!(
                "[{}] {} {} ({}ms)",
                r.response_status, r.method, r.url, r.duration
            );
            (r.id.clone(), display)
        })
        .collect();

    let id = if cli.interactive {
        if visible.is_empty() {
            return Ok(());
        }
        let options: Vec<String> = visible.iter().map(|(_, d)| d.clone()).collect();
        let choice = Select::new("Select a request to inspect:", options)
            .with_page_size(15)
            .with_help_message("Enter to select, type to filter")
            .raw_prompt()
            .map_err(|e| anyhow!("Interaction canceled or failed: {}", e))?;
        visible[choice.index].0.clone()
    } else if let Some(n) = cli.select {
        visible
            .get(n.wrapping_sub(1))
            .map(|(id, _)| id.clone())
            .with_context(|| format!("no visible request #{} ({} shown)", n, visible.len()))?
    } else {
        return Ok(());
    };

    inspector.select(&id);
    Ok(())
}

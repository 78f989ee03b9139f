use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiHackerError {
    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("HTTP 请求失败: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL 解析错误: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("消息通道已关闭: {0}")]
    ChannelClosed(String),

    #[error("无效的状态: {0}")]
    InvalidState(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ApiHackerError {
    fn from(err: anyhow::Error) -> Self {
        ApiHackerError::Other(err.to_string())
    }
}

impl From<toml::de::Error> for ApiHackerError {
    fn from(err: toml::de::Error) -> Self {
        ApiHackerError::ConfigError(err.to_string())
    }
}

/// Result type for api-hacker crate
pub type Result<T> = std::result::Result<T, ApiHackerError>;

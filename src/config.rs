use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::sanitize::SanitizeOptions;

/// 未配置目标域名时使用的占位值，不会匹配任何真实主机
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// 日志默认容量
pub const DEFAULT_MAX_REQUESTS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 需要拦截的页面主机名（精确匹配，区分大小写，忽略协议和端口）
    pub target_domain: String,

    /// 检查器日志容量，超出时丢弃最旧的记录
    pub max_requests: usize,

    pub sanitize: SanitizeOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_domain: UNKNOWN_DOMAIN.to_string(),
            max_requests: DEFAULT_MAX_REQUESTS,
            sanitize: SanitizeOptions::default(),
        }
    }
}

impl Config {
    /// 页面 URL 的主机名是否等于目标域名；无法解析的 URL 视为不匹配
    pub fn is_target_domain(&self, url: &str) -> bool {
        match url::Url::parse(url) {
            Ok(parsed) => parsed.host_str() == Some(self.target_domain.as_str()),
            Err(_) => false,
        }
    }
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    pub const CONFIG_FILE: &'static str = "api-hacker.toml";

    /// 覆盖目标域名的环境变量
    pub const ENV_TARGET_DOMAIN: &'static str = "API_HACKER_TARGET_DOMAIN";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// 加载配置
    ///
    /// 顺序：显式路径 → 查找到的配置文件 → 默认值，最后应用环境变量覆盖。
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => Self::find_and_load().unwrap_or_default(),
        };
        Ok(Self::apply_env(config, |key| std::env::var(key).ok()))
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/api-hacker/
    pub fn find_and_load() -> Option<Config> {
        let path = Self::find_in_ancestors(&std::env::current_dir().ok()?)
            .or_else(Self::user_config_path)?;
        debug!(path = %path.display(), "Loading config file");
        Self::load_from_path(&path).ok()
    }

    /// 从 `start` 开始向上查找配置文件
    pub fn find_in_ancestors(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn user_config_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let config_path = home
            .join(".config")
            .join("api-hacker")
            .join(Self::CONFIG_FILE);
        config_path.exists().then_some(config_path)
    }

    /// 应用环境变量覆盖，`lookup` 便于测试时注入
    pub fn apply_env<F>(mut config: Config, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domain) = lookup(Self::ENV_TARGET_DOMAIN)
            && !domain.trim().is_empty()
        {
            config.target_domain = domain.trim().to_string();
        }
        config
    }
}

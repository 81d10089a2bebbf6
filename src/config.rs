use crate::error::{Result, ScannerError};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_PER_PAGE: u32 = 96;
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 25;
pub const DEFAULT_MAX_FETCH_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// 扫描循环的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub poll_interval: Duration,
    /// 首轮之后每轮最多推送的数量
    pub max_notifications: usize,
    pub max_fetch_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub seen_capacity: Option<usize>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_notifications: DEFAULT_MAX_NOTIFICATIONS,
            max_fetch_retries: DEFAULT_MAX_FETCH_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            retry_max_delay: Duration::from_secs(60),
            seen_capacity: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub search_text: String,
    pub domain: String,
    pub base_url: String,
    pub per_page: u32,
    pub discord_webhook: Option<String>,
    pub telegram: Option<TelegramConfig>,
    pub telegram_api_url: String,
    pub http_timeout: Duration,
    pub scan: ScanSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置，空字符串视为未设置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let search_text = get("SEARCH_TERM")
            .or_else(|| get("HAKUSANA"))
            .unwrap_or_default();

        let domain = get("VINTED_DOMAIN").ok_or_else(|| {
            ScannerError::ConfigError("VINTED_DOMAIN 未设置（例如 fi、fr、de）".to_string())
        })?;
        let domain = domain.trim_start_matches('.').to_lowercase();
        let base_url =
            get("VINTED_BASE_URL").unwrap_or_else(|| format!("https://www.vinted.{}", domain));

        let discord_webhook = get("DISCORD_WEBHOOK");
        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            (None, None) => None,
            _ => {
                return Err(ScannerError::ConfigError(
                    "TELEGRAM_BOT_TOKEN 和 TELEGRAM_CHAT_ID 必须同时设置".to_string(),
                ))
            }
        };

        if discord_webhook.is_none() && telegram.is_none() {
            return Err(ScannerError::ConfigError(
                "未配置通知方式，请设置 DISCORD_WEBHOOK \
                 或 TELEGRAM_BOT_TOKEN 与 TELEGRAM_CHAT_ID（或两者）"
                    .to_string(),
            ));
        }

        let per_page: u32 = parse_or(&get, "PER_PAGE", DEFAULT_PER_PAGE)?;
        if per_page == 0 {
            return Err(ScannerError::ConfigError("PER_PAGE 必须大于 0".to_string()));
        }

        let scan = ScanSettings {
            poll_interval: Duration::from_secs(parse_or(
                &get,
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            max_notifications: parse_or(&get, "MAX_NOTIFICATIONS", DEFAULT_MAX_NOTIFICATIONS)?,
            max_fetch_retries: parse_or(&get, "MAX_FETCH_RETRIES", DEFAULT_MAX_FETCH_RETRIES)?,
            retry_base_delay: Duration::from_millis(parse_or(
                &get,
                "RETRY_BASE_DELAY_MS",
                DEFAULT_RETRY_BASE_DELAY_MS,
            )?),
            seen_capacity: get("SEEN_CAPACITY")
                .map(|v| parse_value::<usize>("SEEN_CAPACITY", &v))
                .transpose()?,
            ..ScanSettings::default()
        };

        if scan.poll_interval.is_zero() {
            return Err(ScannerError::ConfigError("POLL_INTERVAL_SECS 必须大于 0".to_string()));
        }
        if scan.max_notifications == 0 {
            return Err(ScannerError::ConfigError("MAX_NOTIFICATIONS 必须大于 0".to_string()));
        }
        // 容量至少两页，仍在第一页的商品不会被淘汰
        let min_capacity = 2 * per_page as usize;
        if let Some(capacity) = scan.seen_capacity {
            if capacity < min_capacity {
                return Err(ScannerError::ConfigError(format!(
                    "SEEN_CAPACITY 不能小于 {}（PER_PAGE 的两倍）: {}",
                    min_capacity, capacity
                )));
            }
        }

        Ok(Self {
            search_text,
            domain,
            base_url,
            per_page,
            discord_webhook,
            telegram,
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            http_timeout: Duration::from_secs(parse_or(
                &get,
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            scan,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| ScannerError::ConfigError(format!("{} 的值无效: {}", key, value)))
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

use crate::error::{Result, ScannerError};
use crate::types::{CatalogResponse, Listing};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

/// 会话令牌所在的 cookie
pub const TOKEN_COOKIE: &str = "access_token_web";
const CATALOG_PATH: &str = "/api/v2/catalog/items";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

pub struct VintedClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl VintedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 请求首页，从 cookie jar 中取出 `access_token_web`
    pub async fn acquire_token(&self) -> Result<String> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            ScannerError::ConfigError(format!("无效的地址 {}: {}", self.base_url, e))
        })?;

        // 每次获取令牌都使用新的 cookie jar
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()?;

        debug!("请求首页获取令牌: {}", url);
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ScannerError::TokenUnavailable(e.to_string()))?;
        debug!("首页响应: HTTP {}", response.status());

        let token = jar
            .cookies(&url)
            .and_then(|header| header.to_str().ok().map(str::to_owned))
            .and_then(|header| extract_cookie(&header, TOKEN_COOKIE));

        match token {
            Some(token) => {
                info!("已获取会话令牌");
                Ok(token)
            }
            None => Err(ScannerError::TokenUnavailable(format!(
                "响应中没有 cookie `{}`",
                TOKEN_COOKIE
            ))),
        }
    }

    /// 获取第一页最新发布的商品
    pub async fn get_listings(
        &self,
        search_text: &str,
        per_page: u32,
        token: &str,
    ) -> Result<Vec<Listing>> {
        let url = format!("{}{}", self.base_url, CATALOG_PATH);

        debug!("请求商品列表: {} search_text={:?}", url, search_text);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("page", "1".to_string()),
                ("per_page", per_page.to_string()),
                ("search_text", search_text.to_string()),
                ("order", "newest_first".to_string()),
            ])
            .header(ACCEPT, "application/json")
            .header(COOKIE, format!("{}={}", TOKEN_COOKIE, token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("会话令牌被拒绝 [{}]", status);
            return Err(ScannerError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("API 请求失败 [{}]: {}", status, text);
            return Err(ScannerError::InvalidResponse(format!("HTTP {}: {}", status, text)));
        }

        let body = response.text().await?;
        let listings = parse_listings(&body)?;

        debug!("成功获取 {} 个商品", listings.len());
        Ok(listings)
    }
}

/// 解析商品列表响应，未知字段忽略
pub fn parse_listings(body: &str) -> Result<Vec<Listing>> {
    let response: CatalogResponse = serde_json::from_str(body)?;
    Ok(response.into_listings())
}

/// 从 `a=1; b=2` 形式的 Cookie 头中取值
pub fn extract_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// 扫描器依赖的数据源
#[async_trait]
pub trait ListingSource: Send {
    /// 拉取一页最新的商品，按接口返回顺序
    async fn fetch_listings(&mut self) -> Result<Vec<Listing>>;

    /// 重新获取会话令牌
    async fn refresh_session(&mut self) -> Result<()>;
}

/// 持有令牌的 Vinted 搜索
pub struct VintedSource {
    client: VintedClient,
    search_text: String,
    per_page: u32,
    token: String,
}

impl VintedSource {
    /// 获取令牌后创建数据源，令牌获取失败时返回错误
    pub async fn connect(
        client: VintedClient,
        search_text: impl Into<String>,
        per_page: u32,
    ) -> Result<Self> {
        let token = client.acquire_token().await?;
        Ok(Self {
            client,
            search_text: search_text.into(),
            per_page,
            token,
        })
    }
}

#[async_trait]
impl ListingSource for VintedSource {
    async fn fetch_listings(&mut self) -> Result<Vec<Listing>> {
        self.client
            .get_listings(&self.search_text, self.per_page, &self.token)
            .await
    }

    async fn refresh_session(&mut self) -> Result<()> {
        info!("重新获取会话令牌...");
        self.token = self.client.acquire_token().await?;
        Ok(())
    }
}

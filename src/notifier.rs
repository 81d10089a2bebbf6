use crate::config::Config;
use crate::error::{Result, ScannerError};
use crate::types::Listing;
use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;

/// 主色缺失或无法解析时的嵌入颜色
pub const DEFAULT_EMBED_COLOR: u32 = 2895667;
const MAX_EMBED_COLOR: u32 = 0xFFFFFF;
const TICKS: &str = "```";

/// 通知目标：接收一个商品并投递格式化后的消息
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, listing: &Listing) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// 把商品推送到所有已配置的通知目标，单个目标失败不影响其他目标
pub struct NotificationDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl NotificationDispatcher {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    /// 根据配置创建 Discord / Telegram 通知目标
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        let mut sinks: Vec<Box<dyn NotificationSink>> = Vec::new();

        if let Some(webhook) = &config.discord_webhook {
            sinks.push(Box::new(DiscordWebhookSink::new(client.clone(), webhook.clone())));
        }
        if let Some(telegram) = &config.telegram {
            sinks.push(Box::new(TelegramSink::new(
                client,
                &config.telegram_api_url,
                &telegram.bot_token,
                telegram.chat_id.clone(),
            )));
        }

        Ok(Self::new(sinks))
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// 并发投递，全部完成后返回
    pub async fn notify(&self, listing: &Listing) -> DispatchReport {
        let results = join_all(self.sinks.iter().map(|sink| async move {
            (sink.name(), sink.send(listing).await)
        }))
        .await;

        let mut report = DispatchReport::default();
        for (name, result) in results {
            match result {
                Ok(()) => {
                    debug!("[{}] 已推送: {}", name, listing.url);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!("[{}] 推送失败 {}: {}", name, listing.url, e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// 主色十六进制字符串转为嵌入颜色
pub fn embed_color(dominant_color: Option<&str>) -> u32 {
    dominant_color
        .map(|c| c.trim().trim_start_matches('#'))
        .filter(|c| !c.is_empty())
        .and_then(|c| u32::from_str_radix(c, 16).ok())
        .filter(|c| *c <= MAX_EMBED_COLOR)
        .unwrap_or(DEFAULT_EMBED_COLOR)
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscordPayload {
    pub content: Option<String>,
    pub embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub url: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

fn code_field(name: &str, value: &str) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: format!("{}{}{}", TICKS, value, TICKS),
        inline: true,
    }
}

pub fn discord_payload(listing: &Listing) -> DiscordPayload {
    let mut fields = vec![code_field("Price", &listing.total_price.to_string())];
    for (name, value) in [
        ("Brand", &listing.brand),
        ("Size", &listing.size),
        ("Condition", &listing.condition),
    ] {
        if !value.is_empty() {
            fields.push(code_field(name, value));
        }
    }

    DiscordPayload {
        content: None,
        embeds: vec![DiscordEmbed {
            title: listing.title.clone(),
            url: listing.url.clone(),
            color: embed_color(listing.dominant_color.as_deref()),
            fields,
            image: listing.image_url.clone().map(|url| EmbedImage { url }),
        }],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: String,
}

/// 转义 Telegram Markdown 中的 `_` `*` `` ` `` `[`
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn telegram_message(listing: &Listing) -> String {
    let mut text = format!(
        "{}\nPrice: {}\n{}",
        escape_markdown(&listing.title),
        escape_markdown(&listing.price.to_string()),
        escape_markdown(&listing.url)
    );
    if let Some(image) = &listing.image_url {
        text.push_str(&format!("\n[Photo]({})", image));
    }
    text
}

async fn post_json<T: Serialize + ?Sized>(client: &Client, url: &str, body: &T) -> Result<()> {
    let response = client.post(url).json(body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ScannerError::InvalidResponse(format!("HTTP {}: {}", status, text)));
    }
    Ok(())
}

pub struct DiscordWebhookSink {
    client: Client,
    webhook_url: String,
}

impl DiscordWebhookSink {
    pub fn new(client: Client, webhook_url: String) -> Self {
        Self { client, webhook_url }
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, listing: &Listing) -> Result<()> {
        post_json(&self.client, &self.webhook_url, &discord_payload(listing)).await
    }
}

pub struct TelegramSink {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(client: Client, api_url: &str, bot_token: &str, chat_id: String) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), bot_token),
            chat_id,
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, listing: &Listing) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: self.chat_id.clone(),
            text: telegram_message(listing),
            parse_mode: "Markdown".to_string(),
        };
        post_json(&self.client, &self.endpoint, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Price;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn listing() -> Listing {
        Listing {
            price: Price { amount: "25.0".into(), currency: "EUR".into() },
            total_price: Price { amount: "27.45".into(), currency: "EUR".into() },
            image_url: Some("https://images.vinted.net/t/1.jpeg".into()),
            dominant_color: Some("#31ABC2".into()),
            brand: "Levi's".into(),
            size: "W32".into(),
            condition: "Very good".into(),
            ..Listing::new("Levi's 501", "https://www.vinted.fi/items/1")
        }
    }

    #[test]
    fn dominant_color_becomes_embed_color() {
        assert_eq!(embed_color(Some("#31ABC2")), 0x31ABC2);
        assert_eq!(embed_color(Some("#31ABC2")), 3243202);
        assert_eq!(embed_color(Some("31abc2")), 0x31ABC2);
    }

    #[test]
    fn bad_dominant_color_uses_default() {
        assert_eq!(embed_color(None), DEFAULT_EMBED_COLOR);
        assert_eq!(embed_color(Some("")), DEFAULT_EMBED_COLOR);
        assert_eq!(embed_color(Some("#")), DEFAULT_EMBED_COLOR);
        assert_eq!(embed_color(Some("#zzzzzz")), DEFAULT_EMBED_COLOR);
        assert_eq!(embed_color(Some("#FFFFFFFF")), DEFAULT_EMBED_COLOR);
    }

    #[test]
    fn discord_payload_shape() {
        let value = serde_json::to_value(discord_payload(&listing())).unwrap();

        assert!(value["content"].is_null());
        let embed = &value["embeds"][0];
        assert_eq!(embed["title"], "Levi's 501");
        assert_eq!(embed["url"], "https://www.vinted.fi/items/1");
        assert_eq!(embed["color"], 3243202);
        assert_eq!(embed["image"]["url"], "https://images.vinted.net/t/1.jpeg");

        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0]["name"], "Price");
        assert_eq!(fields[0]["value"], "```27.45 EUR```");
        assert_eq!(fields[3]["value"], "```Very good```");
        assert!(fields.iter().all(|f| f["inline"] == true));
    }

    #[test]
    fn discord_payload_without_image_or_brand() {
        let mut item = listing();
        item.image_url = None;
        item.brand.clear();
        item.dominant_color = Some("not a color".into());

        let value = serde_json::to_value(discord_payload(&item)).unwrap();
        let embed = &value["embeds"][0];
        assert!(embed.get("image").is_none());
        assert_eq!(embed["fields"].as_array().unwrap().len(), 3);
        assert_eq!(embed["color"], DEFAULT_EMBED_COLOR);
    }

    #[test]
    fn telegram_text_template() {
        assert_eq!(
            telegram_message(&listing()),
            "Levi's 501\nPrice: 25.0 EUR\nhttps://www.vinted.fi/items/1\n\
             [Photo](https://images.vinted.net/t/1.jpeg)"
        );

        let mut item = listing();
        item.image_url = None;
        assert!(!telegram_message(&item).contains("[Photo]"));
    }

    #[test]
    fn telegram_text_escapes_markdown() {
        let mut item = listing();
        item.title = "Nike_Air *rare* [size 42".into();
        item.url = "https://www.vinted.fi/items/1-nike_air".into();

        let text = telegram_message(&item);

        assert!(text.starts_with("Nike\\_Air \\*rare\\* \\[size 42\n"));
        assert!(text.contains("\nhttps://www.vinted.fi/items/1-nike\\_air\n"));
        // 图片链接本身保持原样
        assert!(text.ends_with("[Photo](https://images.vinted.net/t/1.jpeg)"));
    }

    #[test]
    fn plain_text_is_not_escaped() {
        assert_eq!(escape_markdown("Levi's 501 W32"), "Levi's 501 W32");
        assert_eq!(escape_markdown("a_b"), "a\\_b");
    }

    #[test]
    fn telegram_endpoint_embeds_token() {
        let api_url = "https://api.telegram.org/";
        let sink = TelegramSink::new(Client::new(), api_url, "123:abc", "42".into());
        assert_eq!(sink.endpoint, "https://api.telegram.org/bot123:abc/sendMessage");
    }

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _listing: &Listing) -> Result<()> {
            Err(ScannerError::InvalidResponse("HTTP 500".into()))
        }
    }

    struct RecordingSink(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, listing: &Listing) -> Result<()> {
            self.0.lock().unwrap().push(listing.url.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = NotificationDispatcher::new(vec![
            Box::new(FailingSink),
            Box::new(RecordingSink(received.clone())),
        ]);

        let report = dispatcher.notify(&listing()).await;

        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(*received.lock().unwrap(), vec!["https://www.vinted.fi/items/1"]);
    }

    #[tokio::test]
    async fn unreachable_webhook_is_an_error() {
        let client = Client::builder().timeout(Duration::from_secs(2)).build().unwrap();
        let sink = DiscordWebhookSink::new(client, "http://127.0.0.1:9/webhook".into());
        tokio_test::assert_err!(sink.send(&listing()).await);
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: String,
    pub currency: String,
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// 一条搜索结果。`id` 是去重键，取自规范链接 `url`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: Price,
    /// 含服务费的总价，用于展示
    pub total_price: Price,
    pub url: String,
    pub image_url: Option<String>,
    pub dominant_color: Option<String>,
    pub brand: String,
    pub size: String,
    pub condition: String,
}

impl Listing {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            title: title.into(),
            url,
            ..Default::default()
        }
    }
}

/// `/api/v2/catalog/items` 的响应体，只解析用到的字段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItem {
    pub title: Option<String>,
    pub price: Option<CatalogPrice>,
    pub url: Option<String>,
    pub photo: Option<CatalogPhoto>,
    pub brand_title: Option<String>,
    pub size_title: Option<String>,
    pub status: Option<String>,
    pub total_item_price: Option<CatalogPrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPrice {
    pub amount: Option<String>,
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPhoto {
    pub url: Option<String>,
    pub dominant_color: Option<String>,
}

impl From<CatalogPrice> for Price {
    fn from(p: CatalogPrice) -> Self {
        Price {
            amount: p.amount.unwrap_or_default(),
            currency: p.currency_code.unwrap_or_default(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CatalogItem {
    /// 没有 url 的条目无法去重，直接丢弃
    pub fn into_listing(self) -> Option<Listing> {
        let url = non_empty(self.url)?;
        let price: Price = self.price.map(Price::from).unwrap_or_default();
        let total_price = self
            .total_item_price
            .map(Price::from)
            .unwrap_or_else(|| price.clone());
        let (image_url, dominant_color) = match self.photo {
            Some(photo) => (non_empty(photo.url), non_empty(photo.dominant_color)),
            None => (None, None),
        };

        Some(Listing {
            id: url.clone(),
            title: self.title.unwrap_or_default(),
            price,
            total_price,
            url,
            image_url,
            dominant_color,
            brand: self.brand_title.unwrap_or_default(),
            size: self.size_title.unwrap_or_default(),
            condition: self.status.unwrap_or_default(),
        })
    }
}

impl CatalogResponse {
    pub fn into_listings(self) -> Vec<Listing> {
        self.items
            .into_iter()
            .filter_map(CatalogItem::into_listing)
            .collect()
    }
}

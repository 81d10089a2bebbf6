use std::time::Duration;
use vinted_scanner::VintedClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    env_logger::init();
    dotenv::dotenv().ok();

    let domain = std::env::var("VINTED_DOMAIN").unwrap_or_else(|_| "fi".to_string());
    let search_text = std::env::var("SEARCH_TERM").unwrap_or_default();

    println!("获取 vinted.{} 最新商品...\n", domain);

    let base_url = format!("https://www.vinted.{}", domain);
    let client = VintedClient::new(base_url, Duration::from_secs(30))?;
    let token = client.acquire_token().await?;

    // 只取前 20 个
    let listings = client.get_listings(&search_text, 20, &token).await?;

    println!("找到 {} 个商品:\n", listings.len());

    for (i, listing) in listings.iter().enumerate() {
        println!("{}. {}", i + 1, listing.title);
        println!("   价格: {} (含服务费 {})", listing.price, listing.total_price);
        if !listing.brand.is_empty() {
            println!("   品牌: {}", listing.brand);
        }
        println!("   {}", listing.url);
        println!();
    }

    Ok(())
}

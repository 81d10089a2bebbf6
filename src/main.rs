use anyhow::Result;
use log::{error, info};
use vinted_scanner::{Config, ListingScanner, NotificationDispatcher, VintedClient, VintedSource};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载环境变量
    dotenv::dotenv().ok();

    // 初始化日志，默认 info
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    if config.search_text.is_empty() {
        info!("启动 Vinted 扫描器 ({})...", config.base_url);
    } else {
        info!(
            "启动 Vinted 扫描器 ({})，搜索词 `{}`...",
            config.base_url, config.search_text
        );
    }

    let dispatcher = NotificationDispatcher::from_config(&config)?;
    let client = VintedClient::new(&config.base_url, config.http_timeout)?;

    // 没有令牌不能开始扫描
    let source = match VintedSource::connect(client, &config.search_text, config.per_page).await {
        Ok(source) => source,
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    let mut scanner = ListingScanner::new(source, dispatcher, config.scan.clone());

    tokio::select! {
        result = scanner.start_scanning() => {
            if let Err(e) = result {
                error!("扫描器错误: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到退出信号，扫描器关闭");
        }
    }

    Ok(())
}

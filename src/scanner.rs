use crate::api::ListingSource;
use crate::config::ScanSettings;
use crate::error::{Result, ScannerError};
use crate::notifier::NotificationDispatcher;
use crate::storage::SeenListings;
use crate::types::Listing;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::time::Duration;

/// 一轮扫描的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new_listings: usize,
    pub notified: usize,
    /// 超出单轮上限、只记录不推送的新商品
    pub suppressed: usize,
    pub failed_deliveries: usize,
    /// 首轮只记录已有商品，不推送
    pub seeded: bool,
}

pub struct ListingScanner<S: ListingSource> {
    source: S,
    dispatcher: NotificationDispatcher,
    seen: SeenListings,
    settings: ScanSettings,
    first_run: bool,
}

impl<S: ListingSource> ListingScanner<S> {
    pub fn new(source: S, dispatcher: NotificationDispatcher, settings: ScanSettings) -> Self {
        Self {
            source,
            dispatcher,
            seen: SeenListings::with_capacity(settings.seen_capacity),
            settings,
            first_run: true,
        }
    }

    pub fn seen(&self) -> &SeenListings {
        &self.seen
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    /// 开始循环扫描，每轮结束后等待 `poll_interval`
    pub async fn start_scanning(&mut self) -> Result<()> {
        info!(
            "开始扫描，扫描间隔: {:?}，通知目标: {:?}",
            self.settings.poll_interval,
            self.dispatcher.sink_names()
        );

        loop {
            match self.scan_once().await {
                Ok(report) if report.seeded => {
                    info!("首轮扫描完成，已记录 {} 个现有商品", self.seen.len());
                }
                Ok(report) => {
                    if report.notified > 0 {
                        info!("发现 {} 个新商品", report.notified);
                    } else {
                        debug!("本轮扫描未发现新商品");
                    }
                    if report.suppressed > 0 {
                        warn!("超出单轮上限，{} 个新商品未推送", report.suppressed);
                    }
                }
                Err(e) => {
                    error!("扫描错误: {}", e);
                }
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// 执行一轮扫描：拉取、比对、推送
    pub async fn scan_once(&mut self) -> Result<CycleReport> {
        let listings = self.fetch_with_retry().await?;
        let seeding = self.first_run;

        let mut report = CycleReport {
            fetched: listings.len(),
            seeded: seeding,
            ..Default::default()
        };

        // 先比对整页，避免本轮写入时的淘汰影响判断
        let mut batch: HashSet<&str> = HashSet::new();
        let fresh: Vec<&Listing> = listings
            .iter()
            .filter(|l| self.seen.is_new(&l.id) && batch.insert(l.id.as_str()))
            .collect();
        report.new_listings = fresh.len();

        if !seeding {
            for listing in &fresh {
                if report.notified < self.settings.max_notifications {
                    print_listing_info(listing);
                    let dispatch = self.dispatcher.notify(listing).await;
                    report.notified += 1;
                    report.failed_deliveries += dispatch.failed;
                } else {
                    report.suppressed += 1;
                }
            }
        }

        // 推送成功与否都记为已见；倒序写入，使最旧的商品最先被淘汰
        for listing in fresh.iter().rev() {
            self.seen.mark_seen(&listing.id);
        }

        self.first_run = false;
        Ok(report)
    }

    async fn fetch_with_retry(&mut self) -> Result<Vec<Listing>> {
        let mut attempt: u32 = 0;

        loop {
            let err = match self.source.fetch_listings().await {
                Ok(listings) => return Ok(listings),
                Err(e) => e,
            };

            if attempt >= self.settings.max_fetch_retries {
                return Err(ScannerError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            let delay = backoff_delay(
                attempt,
                self.settings.retry_base_delay,
                self.settings.retry_max_delay,
            );
            attempt += 1;

            if err.is_unauthorized() {
                warn!("{}，重新获取令牌", err);
                match self.source.refresh_session().await {
                    Ok(()) => continue,
                    Err(e) => warn!("重新获取令牌失败: {}", e),
                }
            } else {
                warn!("获取商品失败，{:?} 后第 {} 次重试: {}", delay, attempt, err);
            }

            tokio::time::sleep(delay).await;
        }
    }
}

/// 指数退避：base * 2^attempt，不超过 max
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

fn print_listing_info(listing: &Listing) {
    info!("新商品: {}", listing.title);
    info!("  - 价格: {}", listing.price);
    info!("  - 链接: {}", listing.url);
}

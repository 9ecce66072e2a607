// Third party imports
use anyhow::Context;
use tracing::{error, info, warn};

// Internal imports
use walletdash::Dashboard;
use walletdash_common::logger::init_logging;
use walletdash_common::utils::format_timestamp_ms;
use walletdash_common::DashConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tải cấu hình trước để biết thư mục log
    let (config, config_error) = match DashConfig::from_env() {
        Ok(cfg) => (cfg, None),
        Err(e) => (DashConfig::new(), Some(e)),
    };

    let _log_guard = init_logging("info", config.log_dir.as_deref());
    if let Some(e) = config_error {
        warn!("Không thể tải cấu hình từ biến môi trường, dùng cấu hình mặc định: {}", e);
    }

    info!("Khởi động wallet dashboard...");

    let dashboard = Dashboard::from_config(&config)
        .await
        .context("không thể khởi tạo dashboard")?;

    let session = dashboard.session();
    if !session.is_connected().await {
        session.connect().await;
    } else {
        // Session khôi phục chưa kiểm tra mạng
        session.check_network().await;
    }

    dashboard.start().await;
    dashboard.refresh_all(true).await;

    let view = dashboard.view().await;
    match view.session.address.as_deref() {
        Some(address) => info!("Tài khoản: {}", address),
        None => warn!("Chưa kết nối ví"),
    }
    if !view.network_correct {
        error!("Ví đang ở sai mạng, cần chuyển sang chain {}", session.expected_chain_id());
    }

    for asset in &view.assets.assets {
        info!(
            "{}: {} (${:.2}, {:+.2}% 24h)",
            asset.symbol, asset.amount, asset.usd_value, asset.change_24h_percent
        );
    }
    info!("Tổng tài sản: ${:.2}", view.assets.total_usd());
    if let Some(e) = &view.assets.error {
        warn!("Lỗi tài sản: {}", e);
    }

    for tx in &view.transactions {
        info!(
            "[{}] {} {} block {} từ {} tới {}",
            format_timestamp_ms(tx.timestamp),
            tx.kind,
            tx.id,
            tx.block_number,
            tx.creator_address,
            tx.counterparty_address.as_deref().unwrap_or("-"),
        );
    }
    info!("{} giao dịch gần đây", view.transactions.len());

    dashboard.shutdown().await;
    info!("Wallet dashboard đã tắt");
    Ok(())
}

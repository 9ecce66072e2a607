// Standard library imports
use std::path::Path;

// Third party imports
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Tên file log khi ghi ra thư mục
pub const LOG_FILE_NAME: &str = "walletdash.log";

/// Bộ lọc log: ưu tiên RUST_LOG, nếu không có thì dùng mặc định
pub fn build_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Khởi tạo tracing subscriber
///
/// Luôn ghi ra stderr; nếu có `log_dir` thì ghi thêm vào file xoay vòng theo ngày.
/// Guard trả về phải được giữ đến khi chương trình kết thúc để flush log.
pub fn init_logging(default_directive: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_ansi(true);

    match log_dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let result = tracing_subscriber::registry()
                .with(build_filter(default_directive))
                .with(stderr_layer)
                .with(
                    fmt::Layer::new()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .try_init();

            if result.is_err() {
                tracing::debug!("Tracing subscriber đã được khởi tạo trước đó");
            }
            Some(guard)
        }
        None => {
            let result = tracing_subscriber::registry()
                .with(build_filter(default_directive))
                .with(stderr_layer)
                .try_init();

            if result.is_err() {
                tracing::debug!("Tracing subscriber đã được khởi tạo trước đó");
            }
            None
        }
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        assert!(init_logging("debug", None).is_none());
        assert!(init_logging("info", None).is_none());
    }

    #[test]
    fn test_init_logging_with_dir_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_logging("info", Some(dir.path()));
        assert!(guard.is_some());
    }
}

// Third party imports
use thiserror::Error;

/// Lỗi chung của dashboard
#[derive(Debug, Error)]
pub enum DashError {
    /// Đầu vào không hợp lệ (ví dụ: địa chỉ rỗng)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Lỗi mạng hoặc phản hồi không đọc được từ node / price feed
    #[error("Network error: {0}")]
    Network(String),
    /// Lỗi cấu hình, không thể khôi phục
    #[error("Config error: {0}")]
    Config(String),
    /// Lỗi bộ nhớ bền vững
    #[error("Storage error: {0}")]
    Storage(String),
    /// Lỗi serialize / deserialize
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Lỗi từ wallet provider
    #[error("Provider error: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for DashError {
    fn from(err: reqwest::Error) -> Self {
        DashError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> Self {
        DashError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DashError {
    fn from(err: std::io::Error) -> Self {
        DashError::Storage(err.to_string())
    }
}

impl DashError {
    /// Lỗi có thể được che bằng dữ liệu cache hay không
    pub fn is_network(&self) -> bool {
        matches!(self, DashError::Network(_))
    }
}

/// Kiểu kết quả chung
pub type DashResult<T> = Result<T, DashError>;

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    /// Test DashError
    #[test]
    fn test_dash_error_display() {
        let error = DashError::InvalidInput("address is empty".to_string());
        assert_eq!(error.to_string(), "Invalid input: address is empty");
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let error: DashError = err.into();
        assert!(matches!(error, DashError::Serialization(_)));
        assert!(!error.is_network());
    }
}

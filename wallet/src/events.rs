use serde::{Deserialize, Serialize};

/// Sự kiện do provider đẩy tới
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    /// Danh sách tài khoản thay đổi (rỗng nghĩa là đã ngắt kết nối)
    AccountsChanged(Vec<String>),
    /// Chain id mới, dạng hex
    ChainChanged(String),
}

/// Thay đổi trạng thái của session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Địa chỉ đang hoạt động đổi (None khi ngắt kết nối)
    AccountChanged(Option<String>),
    /// Kết quả kiểm tra mạng, true nếu đúng mạng
    NetworkChanged(bool),
}

/// Thông báo cần hiển thị cho người dùng
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// Không có wallet provider
    ProviderMissing,
    /// Ví đang ở sai mạng
    WrongNetwork { expected: String, actual: String },
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::ProviderMissing => "Wallet provider is not installed!".to_string(),
            Notice::WrongNetwork { expected, actual } => format!(
                "Incorrect network! Expected chain {} but the wallet is on {}.",
                expected, actual
            ),
        }
    }
}

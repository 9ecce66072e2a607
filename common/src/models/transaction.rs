// Standard library imports
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

// Third party imports
use serde::{Deserialize, Serialize};

/// Trạng thái giao dịch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Đã nằm trong block
    Validated,
    /// Đang chờ
    Pending,
    /// Không hợp lệ
    Invalid,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Validated => write!(f, "Validated"),
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Invalid => write!(f, "Invalid"),
        }
    }
}

/// Loại giao dịch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Có địa chỉ nhận
    Transfer,
    /// Không có địa chỉ nhận (tạo hợp đồng)
    Contract,
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Transfer => write!(f, "Transfer"),
            TransactionKind::Contract => write!(f, "Contract"),
        }
    }
}

/// Giao dịch liên quan tới một địa chỉ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Hash giao dịch, cũng là định danh
    pub id: String,
    pub kind: TransactionKind,
    /// Thời gian của block (ms epoch)
    pub timestamp: i64,
    pub status: TransactionStatus,
    pub block_number: u64,
    /// Bên còn lại so với địa chỉ đang xem
    pub counterparty_address: Option<String>,
    /// Người gửi
    pub creator_address: String,
    #[serde(default)]
    pub endorsements: Vec<String>,
}

impl Transaction {
    /// Thứ tự hiển thị: mới nhất trước
    pub fn newest_first(a: &Transaction, b: &Transaction) -> Ordering {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.block_number.cmp(&a.block_number))
            .then_with(|| b.id.cmp(&a.id))
    }
}

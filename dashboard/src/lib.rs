//! View-state của wallet dashboard: tài sản, giao dịch và context object.

pub mod assets;
pub mod dashboard;
pub mod transactions;

// Re-export các component chính
pub use assets::{AssetState, AssetStore};
pub use dashboard::{Dashboard, DashboardView};
pub use transactions::TransactionStore;

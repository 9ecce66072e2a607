//! Session ví: kết nối provider, theo dõi tài khoản và kiểm tra mạng.

// Module exports
pub mod events;
pub mod provider;
pub mod session;

// Re-export các component chính
pub use events::{Notice, ProviderEvent, SessionEvent};
pub use provider::{NodeProvider, WalletProvider, PROVIDER_EVENT_CAPACITY};
pub use session::{NetworkStatus, SessionState, SessionStatus, WalletSession};

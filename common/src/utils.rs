// External imports
use ethers::types::U256;
use ethers::utils::format_units;

// Third party imports
use chrono::{Local, TimeZone, Utc};

// Internal imports
use crate::error::{DashError, DashResult};

/// Lấy thời gian hiện tại (milliseconds)
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Chuẩn hóa địa chỉ để so sánh không phân biệt hoa thường
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// So sánh hai địa chỉ không phân biệt hoa thường
pub fn same_address(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Số nguyên sang dạng quantity hex của JSON-RPC
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Đọc quantity hex ("0x1a") thành u64
pub fn parse_hex_u64(value: &str) -> DashResult<u64> {
    let digits = strip_hex_prefix(value)?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| DashError::Network(format!("invalid hex quantity '{}': {}", value, e)))
}

/// Đọc số dư wei dạng hex và đổi sang đơn vị ether
pub fn wei_hex_to_ether(value: &str) -> DashResult<f64> {
    let digits = strip_hex_prefix(value)?;
    let wei = U256::from_str_radix(digits, 16)
        .map_err(|e| DashError::Network(format!("invalid hex balance '{}': {}", value, e)))?;
    let ether = format_units(wei, "ether")
        .map_err(|e| DashError::Network(format!("cannot convert balance: {}", e)))?;
    ether
        .parse::<f64>()
        .map_err(|e| DashError::Network(format!("cannot parse balance '{}': {}", ether, e)))
}

/// Hiển thị timestamp (ms) theo giờ địa phương
pub fn format_timestamp_ms(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}

fn strip_hex_prefix(value: &str) -> DashResult<&str> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| DashError::Network(format!("expected 0x-prefixed hex, got '{}'", value)))?;
    if digits.is_empty() {
        return Err(DashError::Network(format!("empty hex quantity '{}'", value)));
    }
    Ok(digits)
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    /// Test current_timestamp_ms
    #[test]
    fn test_current_timestamp_ms() {
        assert!(current_timestamp_ms() > 1_600_000_000_000);
    }

    #[test]
    fn test_address_helpers() {
        assert_eq!(normalize_address("  0xAbC "), "0xabc");
        assert!(same_address("0xAAA", "0xaaa"));
        assert!(!same_address("0xaaa", "0xaab"));
    }

    #[test]
    fn test_hex_quantities() {
        assert_eq!(to_hex_quantity(100), "0x64");
        assert_eq!(parse_hex_u64("0x64").unwrap(), 100);
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert!(parse_hex_u64("64").is_err());
        assert!(parse_hex_u64("0x").is_err());
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn test_wei_hex_to_ether() {
        // 1.5 ether
        assert_eq!(wei_hex_to_ether("0x14d1120d7b160000").unwrap(), 1.5);
        assert_eq!(wei_hex_to_ether("0x0").unwrap(), 0.0);
        assert!(wei_hex_to_ether("nope").is_err());
    }

    #[test]
    fn test_format_timestamp_ms() {
        let text = format_timestamp_ms(1_700_000_000_000);
        assert_eq!(text.len(), "2023-11-14 22:13:20".len());
    }
}

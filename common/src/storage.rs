// Standard library imports
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// Third party imports
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

// Internal imports
use crate::error::{DashError, DashResult};

/// Khóa lưu cache giao dịch theo địa chỉ
pub const TRANSACTIONS_KEY: &str = "cachedTransactionsByAddress";
/// Khóa lưu địa chỉ ví kết nối gần nhất
pub const LAST_ADDRESS_KEY: &str = "lastConnectedAddress";
/// Khóa lưu snapshot tài sản theo địa chỉ
pub const ASSETS_KEY: &str = "cachedTokensByAddress";

/// Bộ nhớ key-value bền vững
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Lấy giá trị thô
    async fn get(&self, key: &str) -> DashResult<Option<String>>;

    /// Ghi đè giá trị
    async fn set(&self, key: &str, value: &str) -> DashResult<()>;

    /// Xóa giá trị, không lỗi nếu khóa không tồn tại
    async fn remove(&self, key: &str) -> DashResult<()>;
}

/// Đọc một giá trị JSON.
///
/// Khóa không tồn tại, lỗi đọc hoặc nội dung hỏng đều trả về `None`:
/// dữ liệu hỏng trong bộ nhớ không bao giờ là lỗi nghiêm trọng.
pub async fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Không thể đọc khóa {} từ storage: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Dữ liệu của khóa {} bị hỏng, bỏ qua: {}", key, e);
            None
        }
    }
}

/// Ghi một giá trị dưới dạng JSON
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> DashResult<()> {
    let json = serde_json::to_string(value)?;
    store.set(key, &json).await
}

/// Lưu mỗi khóa thành một file JSON trong thư mục
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn new(dir: impl AsRef<Path>) -> DashResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|e| {
            DashError::Storage(format!("Failed to create storage directory {:?}: {}", dir, e))
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> DashResult<PathBuf> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(DashError::InvalidInput(format!("invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> DashResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> DashResult<()> {
        let path = self.path_for(key)?;
        // Ghi ra file tạm rồi rename để không bao giờ để lại file ghi dở
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        debug!("Đã ghi {} bytes vào {:?}", value.len(), path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> DashResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Bộ nhớ trong RAM, dùng cho test và chế độ không lưu
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> DashResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DashResult<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> DashResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_file_store_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested")).await.unwrap();

        assert_eq!(store.get(LAST_ADDRESS_KEY).await.unwrap(), None);

        store.set(LAST_ADDRESS_KEY, "\"0xabc\"").await.unwrap();
        assert_eq!(
            store.get(LAST_ADDRESS_KEY).await.unwrap().as_deref(),
            Some("\"0xabc\"")
        );

        store.remove(LAST_ADDRESS_KEY).await.unwrap();
        assert_eq!(store.get(LAST_ADDRESS_KEY).await.unwrap(), None);
        // Xóa lần hai không lỗi
        store.remove(LAST_ADDRESS_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        assert!(matches!(
            store.get("../escape").await,
            Err(DashError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_load_json_treats_malformed_as_absent() {
        let store = MemoryStore::new();
        store.set(TRANSACTIONS_KEY, "{not json").await.unwrap();

        let loaded: Option<BTreeMap<String, u32>> = load_json(&store, TRANSACTIONS_KEY).await;
        assert!(loaded.is_none());

        // JSON hợp lệ nhưng sai kiểu cũng bị bỏ qua
        store.set(TRANSACTIONS_KEY, "[1, 2, 3]").await.unwrap();
        let loaded: Option<BTreeMap<String, u32>> = load_json(&store, TRANSACTIONS_KEY).await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_json() {
        let store = MemoryStore::new();
        let mut value = BTreeMap::new();
        value.insert("0xabc".to_string(), 3u32);

        save_json(&store, ASSETS_KEY, &value).await.unwrap();
        let loaded: Option<BTreeMap<String, u32>> = load_json(&store, ASSETS_KEY).await;
        assert_eq!(loaded, Some(value));
    }
}

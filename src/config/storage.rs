use crate::core::Storage;
use crate::utils::error::Result;
use std::path::Path;

/// 本地檔案系統存儲
///
/// 讀取以工作目錄為準（資料路徑照使用者輸入），寫入則放在 `base_path` 底下
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_directories_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("reports");
        let storage = LocalStorage::new(base.to_str().unwrap().to_string());

        storage.write_file("run/card.md", b"# Results").await.unwrap();

        let written = base.join("run/card.md");
        assert!(written.exists());
        let data = storage.read_file(written.to_str().unwrap()).await.unwrap();
        assert_eq!(data, b"# Results");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let storage = LocalStorage::new("unused".to_string());
        let err = storage.read_file("/definitely/not/here.csv").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::FlowError::IoError(_)));
    }
}

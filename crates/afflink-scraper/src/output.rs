//! Debug copy of the last successful result.

use std::path::Path;

use crate::error::ScraperError;
use crate::types::OutputRecord;

/// Writes `records` as pretty JSON to `path`, creating parent directories.
///
/// # Errors
///
/// [`ScraperError::Output`] on any filesystem failure. Callers log it and
/// carry on; nothing reads this file back.
pub async fn write_latest(path: &Path, records: &[OutputRecord]) -> Result<(), ScraperError> {
    let fail = |source: std::io::Error| ScraperError::Output {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let body = serde_json::to_vec_pretty(records).map_err(|e| fail(e.into()))?;
    tokio::fs::write(path, body).await.map_err(fail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_pretty_array_under_new_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/outputs/latest.json");
        let records = vec![OutputRecord {
            product_name: "Sabuk Kulit".into(),
            shop_name: "Toko A".into(),
            price: 50_000,
            sold_count: 12,
            affiliate_url: None,
            image_url: Some("https://img/x.jpg".into()),
        }];
        write_latest(&path, &records).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n"));
        let back: Vec<OutputRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, records);
    }

    #[tokio::test]
    async fn unwritable_path_is_an_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = write_latest(&blocker.join("latest.json"), &[]).await.unwrap_err();
        assert!(matches!(err, ScraperError::Output { .. }));
    }
}

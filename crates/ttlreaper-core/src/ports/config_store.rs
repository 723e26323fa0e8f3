//! ConfigStore port - 設定レコード（key/value ドキュメント）の取得

use async_trait::async_trait;

use super::object_store::StoreError;
use crate::domain::ConfigRecord;

/// ConfigStore は名前付きの設定レコードを読む
///
/// レコードが存在しない場合は `Ok(None)` を返します。
/// `Err` は取得そのものが失敗した場合のみです。
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigRecord>, StoreError>;
}

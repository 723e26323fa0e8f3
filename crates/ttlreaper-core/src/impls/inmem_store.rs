//! InMemoryObjectStore - 開発・テスト用のオブジェクトストア
//!
//! # 学習ポイント
//! - tokio::sync::Mutex による状態の排他制御（ロック跨ぎの I/O はしない）
//! - 型ごとのバケットで挿入順（= ストアの返却順）を保持
//! - 障害注入（list 失敗・delete 失敗）でサイクルの分離性を検証

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{InstanceRef, ManagedInstance, TypeDescriptor};
use crate::ports::{ListFilter, ObjectStore, StoreError};

#[derive(Default)]
struct InMemoryStoreState {
    /// 型ごとのインスタンス（挿入順）
    buckets: HashMap<TypeDescriptor, Vec<ManagedInstance>>,

    /// Types whose `list` fails with `Unavailable(reason)`.
    list_failures: HashMap<TypeDescriptor, String>,

    /// Instances whose `delete` fails with `Rejected(reason)`.
    delete_failures: HashMap<(TypeDescriptor, InstanceRef), String>,

    /// Successful deletes, in call order.
    deleted: Vec<(TypeDescriptor, InstanceRef)>,

    /// Every `list` call with its filter, in call order.
    list_calls: Vec<(TypeDescriptor, ListFilter)>,
}

/// InMemoryObjectStore は開発用のオブジェクトストア
///
/// # 実装詳細
/// - 登録されていない型の `list` はスキーマ不明として `Unavailable` を返す
/// - `ListFilter` はストア側で適用される
/// - 存在しないインスタンスの `delete` は `NotFound`
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<InMemoryStoreState>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from pre-populated buckets without touching the lock.
    pub fn seeded(buckets: impl IntoIterator<Item = (TypeDescriptor, Vec<ManagedInstance>)>) -> Self {
        let mut state = InMemoryStoreState::default();
        for (descriptor, instances) in buckets {
            state.buckets.entry(descriptor).or_default().extend(instances);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Makes `descriptor` a known type, even with no instances.
    pub async fn register_type(&self, descriptor: TypeDescriptor) {
        let mut state = self.state.lock().await;
        state.buckets.entry(descriptor).or_default();
    }

    /// Inserts (or replaces, keeping position) an instance.
    pub async fn insert(&self, descriptor: TypeDescriptor, instance: ManagedInstance) {
        let mut state = self.state.lock().await;
        let bucket = state.buckets.entry(descriptor).or_default();
        match bucket.iter_mut().find(|i| i.id == instance.id) {
            Some(existing) => *existing = instance,
            None => bucket.push(instance),
        }
    }

    pub async fn get(
        &self,
        descriptor: &TypeDescriptor,
        instance: &InstanceRef,
    ) -> Option<ManagedInstance> {
        let state = self.state.lock().await;
        state
            .buckets
            .get(descriptor)
            .and_then(|bucket| bucket.iter().find(|i| &i.id == instance).cloned())
    }

    pub async fn contains(&self, descriptor: &TypeDescriptor, instance: &InstanceRef) -> bool {
        self.get(descriptor, instance).await.is_some()
    }

    /// Makes every `list` of `descriptor` fail until cleared.
    pub async fn fail_list(&self, descriptor: TypeDescriptor, reason: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.list_failures.insert(descriptor, reason.into());
    }

    /// Makes every `delete` of `instance` fail until cleared.
    pub async fn fail_delete(
        &self,
        descriptor: TypeDescriptor,
        instance: InstanceRef,
        reason: impl Into<String>,
    ) {
        let mut state = self.state.lock().await;
        state
            .delete_failures
            .insert((descriptor, instance), reason.into());
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.list_failures.clear();
        state.delete_failures.clear();
    }

    /// Successful deletes in call order.
    pub async fn deleted(&self) -> Vec<(TypeDescriptor, InstanceRef)> {
        let state = self.state.lock().await;
        state.deleted.clone()
    }

    pub async fn list_calls(&self) -> Vec<(TypeDescriptor, ListFilter)> {
        let state = self.state.lock().await;
        state.list_calls.clone()
    }

    /// Current contents, sorted by type for stable output.
    pub async fn buckets(&self) -> Vec<(TypeDescriptor, Vec<ManagedInstance>)> {
        let state = self.state.lock().await;
        let mut buckets: Vec<_> = state
            .buckets
            .iter()
            .map(|(d, items)| (d.clone(), items.clone()))
            .collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));
        buckets
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(
        &self,
        descriptor: &TypeDescriptor,
        filter: &ListFilter,
    ) -> Result<Vec<ManagedInstance>, StoreError> {
        let mut state = self.state.lock().await;
        state.list_calls.push((descriptor.clone(), filter.clone()));

        if let Some(reason) = state.list_failures.get(descriptor) {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        let bucket = state.buckets.get(descriptor).ok_or_else(|| {
            StoreError::Unavailable(format!("no matches for kind {descriptor}"))
        })?;

        Ok(bucket.iter().filter(|i| filter.matches(i)).cloned().collect())
    }

    async fn delete(
        &self,
        descriptor: &TypeDescriptor,
        instance: &InstanceRef,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        let key = (descriptor.clone(), instance.clone());
        if let Some(reason) = state.delete_failures.get(&key) {
            return Err(StoreError::Rejected(reason.clone()));
        }

        let bucket = state
            .buckets
            .get_mut(descriptor)
            .ok_or_else(|| StoreError::NotFound {
                instance: instance.clone(),
            })?;
        let position = bucket
            .iter()
            .position(|i| &i.id == instance)
            .ok_or_else(|| StoreError::NotFound {
                instance: instance.clone(),
            })?;
        bucket.remove(position);
        state.deleted.push(key);
        Ok(())
    }
}

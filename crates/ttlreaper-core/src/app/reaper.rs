//! Reaper - 1 サイクル分の期限切れ回収
//!
//! # フロー
//! 1. ConfigSource で設定レコードを読み込む（失敗したらサイクル中断）
//! 2. 宣言順に型ごとにスキャン（失敗した型だけスキップ）
//! 3. インスタンスごとに期限を判定
//! 4. 期限切れを削除（失敗はインスタンス単位で記録）
//!
//! 型レベルとインスタンスレベルの 2 段階で失敗を分離します。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::config_source::ConfigSource;
use super::scanner::TypeScanner;
use crate::domain::{
    CycleId, CycleReport, CycleState, EventReason, EventSubject, ExpiryDecision, ExpiryEvaluator,
    ExpiryOutcome, InstanceRef, ReaperConfig, ReaperError, ReaperEvent, TypeDescriptor,
    TypeReport,
};
use crate::impls::TracingEventSink;
use crate::ports::{
    Clock, ConfigStore, EventSink, IdGenerator, ObjectStore, StoreError, SystemClock,
    UlidGenerator,
};
use crate::settings::ReaperSettings;

pub struct Reaper {
    settings: ReaperSettings,
    config_source: ConfigSource,
    scanner: TypeScanner,
    evaluator: ExpiryEvaluator,
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    events: Arc<dyn EventSink>,
}

impl Reaper {
    /// Wires the reaper with the system clock and tracing-backed events.
    pub fn new(
        settings: ReaperSettings,
        config_store: Arc<dyn ConfigStore>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            config_source: ConfigSource::new(config_store, settings.namespace.clone()),
            scanner: TypeScanner::new(Arc::clone(&object_store), settings.ttl_label.clone()),
            evaluator: ExpiryEvaluator::new(settings.ttl_label.clone()),
            store: object_store,
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            events: Arc::new(TracingEventSink),
            settings,
        }
    }

    /// Replaces the clock used for expiry decisions and ID timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn settings(&self) -> &ReaperSettings {
        &self.settings
    }

    /// Delay until the next trigger, or `None` when the cycle was cancelled.
    ///
    /// After an aborted cycle the configured interval is unknown, so the fixed
    /// `config_retry_backoff` is used instead.
    pub fn next_delay(&self, result: &Result<CycleReport, ReaperError>) -> Option<Duration> {
        match result {
            Ok(report) if report.is_done() => Some(report.next_delay),
            Ok(_) => None,
            Err(ReaperError::Cancelled) => None,
            Err(_) => Some(self.settings.config_retry_backoff),
        }
    }

    /// Runs one full cycle.
    ///
    /// - `Err` means the cycle aborted on configuration (or was cancelled
    ///   before configuration loaded).
    /// - `Ok` carries per-type and per-instance failures; its state is `Done`,
    ///   or `Cancelled` if `cancel` fired mid-cycle. Deletes already issued
    ///   before cancellation are not rolled back.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, ReaperError> {
        let cycle_id = self.ids.generate_cycle_id();
        let span = tracing::info_span!(
            "reap_cycle",
            cycle_id = %cycle_id,
            config = %self.settings.configuration_name,
        );
        self.run_cycle_inner(cycle_id, cancel).instrument(span).await
    }

    async fn run_cycle_inner(
        &self,
        cycle_id: CycleId,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, ReaperError> {
        let started_at = self.clock.now();
        tracing::info!(
            state = ?CycleState::LoadingConfig,
            namespace = %self.settings.namespace,
            "Reconciling"
        );

        let config = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReaperError::Cancelled),
            loaded = self.load_config() => loaded?,
        };

        let mut report = CycleReport {
            cycle_id,
            state: CycleState::Done,
            started_at,
            finished_at: started_at,
            next_delay: config.poll_interval,
            dry_run: self.settings.dry_run,
            types: Vec::with_capacity(config.watched_types.len()),
        };

        if config.is_empty() {
            tracing::info!("type list is empty, skipping scan");
        }

        for descriptor in &config.watched_types {
            if cancel.is_cancelled() {
                report.state = CycleState::Cancelled;
                break;
            }
            let (type_report, cancelled) = self.reap_type(descriptor, cancel).await;
            report.types.push(type_report);
            if cancelled {
                report.state = CycleState::Cancelled;
                break;
            }
        }

        report.finished_at = self.clock.now();
        let counts = report.counts();
        match report.state {
            CycleState::Cancelled => tracing::warn!(
                deleted = counts.deleted,
                "cycle cancelled; issued deletes are not rolled back"
            ),
            _ => tracing::info!(
                state = ?report.state,
                types = counts.types,
                scanned = counts.scanned,
                deleted = counts.deleted,
                unparseable = counts.unparseable,
                delete_failures = counts.delete_failures,
                type_failures = counts.type_failures,
                requeue_after = ?report.next_delay,
                "cycle complete"
            ),
        }
        Ok(report)
    }

    async fn load_config(&self) -> Result<ReaperConfig, ReaperError> {
        let name = &self.settings.configuration_name;
        let subject = EventSubject::ConfigRecord {
            namespace: self.config_source.namespace().to_string(),
            name: name.clone(),
        };

        match self.config_source.load(name).await {
            Ok(config) => {
                tracing::info!(
                    requeue_after = ?config.poll_interval,
                    types = config.watched_types.len(),
                    "configuration loaded"
                );
                self.emit(
                    EventReason::ValidConfig,
                    subject,
                    "Processing GVKs from configMap",
                );
                Ok(config)
            }
            Err(e) => {
                tracing::error!(
                    state = ?CycleState::Aborted,
                    error = %e,
                    retry_after = ?self.settings.config_retry_backoff,
                    "failed to load configuration"
                );
                if matches!(e, ReaperError::ConfigMalformed { .. }) {
                    self.emit(EventReason::InvalidConfig, subject, e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Scans, evaluates and deletes for one type. The flag reports cancellation.
    async fn reap_type(
        &self,
        descriptor: &TypeDescriptor,
        cancel: &CancellationToken,
    ) -> (TypeReport, bool) {
        tracing::debug!(state = ?CycleState::Scanning, gvk = %descriptor);
        let scanned = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (TypeReport::new(descriptor.clone()), true),
            scanned = self.scanner.scan(descriptor) => scanned,
        };

        let instances = match scanned {
            Ok(instances) => instances,
            Err(e) => {
                tracing::error!(gvk = %descriptor, error = %e, "failed to list resources");
                return (TypeReport::failed(descriptor.clone(), e), false);
            }
        };

        let mut report = TypeReport::new(descriptor.clone());
        report.scanned = instances.len();
        if instances.is_empty() {
            tracing::info!(gvk = %descriptor, "no resources found, skipping");
            return (report, false);
        }
        tracing::info!(gvk = %descriptor, count = instances.len(), "resources found");

        tracing::debug!(state = ?CycleState::Evaluating, gvk = %descriptor);
        let decisions: Vec<ExpiryDecision> = instances
            .iter()
            .map(|instance| self.evaluator.decide(instance, self.clock.now()))
            .collect();

        tracing::debug!(state = ?CycleState::Deleting, gvk = %descriptor);
        for ExpiryDecision { instance, outcome } in decisions {
            if cancel.is_cancelled() {
                return (report, true);
            }
            match outcome {
                ExpiryOutcome::NotExpired { expires_at } => {
                    report.not_expired += 1;
                    tracing::debug!(
                        gvk = %descriptor,
                        resource = %instance,
                        expires_at = ?expires_at,
                        "not expired"
                    );
                }
                ExpiryOutcome::Unparseable { reason } => {
                    tracing::warn!(
                        gvk = %descriptor,
                        resource = %instance,
                        error = %reason,
                        "invalid TTL value"
                    );
                    let subject = instance_subject(descriptor, &instance);
                    let error = ReaperError::InstanceUnparseable { instance, reason };
                    self.emit(EventReason::InvalidTtl, subject, error.to_string());
                    report.instance_errors.push(error);
                }
                ExpiryOutcome::Expired { expired_at } => {
                    if self.settings.dry_run {
                        tracing::info!(
                            gvk = %descriptor,
                            resource = %instance,
                            expired_at = %expired_at,
                            "dry run: would delete expired resource"
                        );
                        report.deleted.push(instance);
                        continue;
                    }

                    tracing::info!(
                        gvk = %descriptor,
                        resource = %instance,
                        expired_at = %expired_at,
                        "deleting expired resource"
                    );
                    let deleted = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return (report, true),
                        deleted = self.store.delete(descriptor, &instance) => deleted,
                    };
                    self.record_delete(descriptor, instance, deleted, &mut report);
                }
            }
        }

        (report, false)
    }

    fn record_delete(
        &self,
        descriptor: &TypeDescriptor,
        instance: InstanceRef,
        deleted: Result<(), StoreError>,
        report: &mut TypeReport,
    ) {
        let subject = instance_subject(descriptor, &instance);
        match deleted {
            Ok(()) => {
                self.emit(
                    EventReason::ReapedOnTtl,
                    subject,
                    format!("Deleted {} {} after TTL expired", descriptor.kind, instance),
                );
                report.deleted.push(instance);
            }
            // 既に存在しない = 目的は達成済み
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!(gvk = %descriptor, resource = %instance, "resource already gone");
                report.deleted.push(instance);
            }
            Err(e) => {
                tracing::error!(
                    gvk = %descriptor,
                    resource = %instance,
                    error = %e,
                    "failed to delete resource"
                );
                let error = ReaperError::DeleteFailed {
                    descriptor: descriptor.clone(),
                    instance,
                    reason: e.to_string(),
                };
                self.emit(EventReason::ReapFailed, subject, error.to_string());
                report.instance_errors.push(error);
            }
        }
    }

    fn emit(&self, reason: EventReason, subject: EventSubject, message: impl Into<String>) {
        self.events.record(ReaperEvent::new(
            self.ids.generate_event_id(),
            reason,
            subject,
            message,
            self.clock.now(),
        ));
    }
}

fn instance_subject(descriptor: &TypeDescriptor, instance: &InstanceRef) -> EventSubject {
    EventSubject::Instance {
        descriptor: descriptor.clone(),
        instance: instance.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CHECK_INTERVAL_KEY, ConfigRecord, GVK_LIST_KEY, ManagedInstance,
    };
    use crate::impls::{InMemoryConfigStore, InMemoryObjectStore, RecordingEventSink};
    use crate::ports::{FixedClock, ListFilter, ManualClock};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    const NS: &str = "ttlreaper-system";
    const CONFIG: &str = "ttlreaper-config";
    const LABEL: &str = "kubettlreaper.samir.io/ttl";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn secret_type() -> TypeDescriptor {
        TypeDescriptor::new("", "v1", "Secret")
    }

    fn binding_type() -> TypeDescriptor {
        TypeDescriptor::new("rbac.authorization.k8s.io", "v1", "RoleBinding")
    }

    fn marked(name: &str, ttl: &str) -> ManagedInstance {
        ManagedInstance::new("ops", name, t0()).with_label(LABEL, ttl)
    }

    fn config(gvks: &str) -> ConfigRecord {
        ConfigRecord::new(NS, CONFIG)
            .with_entry(CHECK_INTERVAL_KEY, "5s")
            .with_entry(GVK_LIST_KEY, gvks)
    }

    const SECRETS: &str = "- {group: '', version: v1, kind: Secret}";
    const BINDINGS_THEN_SECRETS: &str = "- {group: rbac.authorization.k8s.io, version: v1, kind: RoleBinding}\n- {group: '', version: v1, kind: Secret}";

    struct Harness {
        configs: InMemoryConfigStore,
        objects: InMemoryObjectStore,
        events: RecordingEventSink,
        clock: Arc<ManualClock>,
        reaper: Reaper,
    }

    fn harness(settings: ReaperSettings) -> Harness {
        let configs = InMemoryConfigStore::new();
        let objects = InMemoryObjectStore::new();
        let events = RecordingEventSink::new();
        let clock = Arc::new(ManualClock::new(t0()));
        let reaper = Reaper::new(settings, Arc::new(configs.clone()), Arc::new(objects.clone()))
            .with_clock(clock.clone())
            .with_event_sink(Arc::new(events.clone()));
        Harness {
            configs,
            objects,
            events,
            clock,
            reaper,
        }
    }

    fn default_harness() -> Harness {
        harness(ReaperSettings::new(NS).with_configuration_name(CONFIG))
    }

    #[tokio::test]
    async fn secret_is_kept_before_ttl_and_deleted_after() {
        let h = default_harness();
        h.configs.put(config(SECRETS)).await;
        h.objects.insert(secret_type(), marked("temp-creds", "10s")).await;
        let id = InstanceRef::new("ops", "temp-creds");

        h.clock.set(t0() + TimeDelta::seconds(9));
        let report = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(report.is_done());
        assert_eq!(report.next_delay, Duration::from_secs(5));
        assert_eq!(report.types[0].not_expired, 1);
        assert!(h.objects.contains(&secret_type(), &id).await);

        h.clock.set(t0() + TimeDelta::seconds(11));
        let report = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.types[0].deleted, vec![id.clone()]);
        assert!(!h.objects.contains(&secret_type(), &id).await);
        assert_eq!(h.events.with_reason(EventReason::ReapedOnTtl).len(), 1);
    }

    #[tokio::test]
    async fn empty_type_list_is_done_with_configured_interval() {
        let h = default_harness();
        h.configs
            .put(ConfigRecord::new(NS, CONFIG).with_entry(CHECK_INTERVAL_KEY, "30s"))
            .await;

        let result = h.reaper.run_cycle(&CancellationToken::new()).await;
        let report = result.as_ref().unwrap();
        assert!(report.is_done());
        assert!(report.types.is_empty());
        assert_eq!(h.reaper.next_delay(&result), Some(Duration::from_secs(30)));
        assert!(h.objects.deleted().await.is_empty());
        assert!(h.objects.list_calls().await.is_empty());
    }

    #[tokio::test]
    async fn missing_config_aborts_with_backoff() {
        let h = harness(
            ReaperSettings::new(NS)
                .with_configuration_name(CONFIG)
                .with_config_retry_backoff(Duration::from_secs(7)),
        );

        let result = h.reaper.run_cycle(&CancellationToken::new()).await;
        assert_eq!(
            result,
            Err(ReaperError::ConfigNotFound {
                namespace: NS.into(),
                name: CONFIG.into()
            })
        );
        assert_eq!(h.reaper.next_delay(&result), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn malformed_config_aborts_and_records_event() {
        let h = default_harness();
        h.configs
            .put(ConfigRecord::new(NS, CONFIG).with_entry(CHECK_INTERVAL_KEY, "often"))
            .await;

        let err = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ReaperError::ConfigMalformed { .. }));
        assert_eq!(h.events.with_reason(EventReason::InvalidConfig).len(), 1);
        assert!(h.events.with_reason(EventReason::ValidConfig).is_empty());
    }

    #[tokio::test]
    async fn valid_config_records_event() {
        let h = default_harness();
        h.configs.put(config(SECRETS)).await;
        h.objects.register_type(secret_type()).await;

        h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        let events = h.events.with_reason(EventReason::ValidConfig);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "Processing GVKs from configMap");
    }

    #[tokio::test]
    async fn failing_type_does_not_block_other_types() {
        let h = default_harness();
        h.configs.put(config(BINDINGS_THEN_SECRETS)).await;
        h.objects.insert(binding_type(), marked("master-chief", "1s")).await;
        h.objects.insert(secret_type(), marked("master-chief", "1s")).await;
        h.objects.fail_list(binding_type(), "connection refused").await;
        h.clock.set(t0() + TimeDelta::minutes(1));

        let report = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(report.is_done());
        assert_eq!(report.types.len(), 2);
        assert!(matches!(
            report.types[0].error,
            Some(ReaperError::StoreUnavailable { .. })
        ));
        assert_eq!(
            h.objects.deleted().await,
            vec![(secret_type(), InstanceRef::new("ops", "master-chief"))]
        );
        assert_eq!(report.type_errors().count(), 1);
        assert_eq!(report.next_delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn failed_delete_does_not_stop_the_rest() {
        let h = default_harness();
        h.configs.put(config(SECRETS)).await;
        for name in ["a", "b", "c"] {
            h.objects.insert(secret_type(), marked(name, "1s")).await;
        }
        h.objects
            .fail_delete(secret_type(), InstanceRef::new("ops", "b"), "forbidden")
            .await;
        h.clock.set(t0() + TimeDelta::minutes(1));

        let report = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        let secrets = &report.types[0];
        assert_eq!(
            secrets.deleted,
            vec![InstanceRef::new("ops", "a"), InstanceRef::new("ops", "c")]
        );
        assert_eq!(
            secrets.instance_errors,
            vec![ReaperError::DeleteFailed {
                descriptor: secret_type(),
                instance: InstanceRef::new("ops", "b"),
                reason: "rejected: forbidden".into(),
            }]
        );
        assert_eq!(h.events.with_reason(EventReason::ReapedOnTtl).len(), 2);
        assert_eq!(h.events.with_reason(EventReason::ReapFailed).len(), 1);
        assert!(report.is_done());
    }

    #[tokio::test]
    async fn unparseable_ttl_is_reported_and_never_deleted() {
        let h = default_harness();
        h.configs.put(config(SECRETS)).await;
        h.objects.insert(secret_type(), marked("bad", "forever")).await;
        h.objects.insert(secret_type(), marked("good", "1s")).await;
        h.clock.set(t0() + TimeDelta::days(365));

        let report = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(h.objects.contains(&secret_type(), &InstanceRef::new("ops", "bad")).await);
        assert_eq!(report.types[0].deleted, vec![InstanceRef::new("ops", "good")]);
        assert!(matches!(
            report.types[0].instance_errors[..],
            [ReaperError::InstanceUnparseable { .. }]
        ));
        assert_eq!(h.events.with_reason(EventReason::InvalidTtl).len(), 1);
        assert_eq!(report.counts().unparseable, 1);
    }

    #[tokio::test]
    async fn boundary_instant_is_not_deleted() {
        let h = default_harness();
        h.configs.put(config(SECRETS)).await;
        h.objects.insert(secret_type(), marked("edge", "10s")).await;

        h.clock.set(t0() + TimeDelta::seconds(10));
        h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(h.objects.deleted().await.is_empty());

        h.clock
            .set(t0() + TimeDelta::seconds(10) + TimeDelta::nanoseconds(1));
        h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(h.objects.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn dry_run_reports_without_deleting() {
        let h = harness(
            ReaperSettings::new(NS)
                .with_configuration_name(CONFIG)
                .with_dry_run(true),
        );
        h.configs.put(config(SECRETS)).await;
        h.objects.insert(secret_type(), marked("a", "1s")).await;
        h.clock.set(t0() + TimeDelta::minutes(1));

        let report = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.types[0].deleted, vec![InstanceRef::new("ops", "a")]);
        assert!(h.objects.deleted().await.is_empty());
        assert!(h.objects.contains(&secret_type(), &InstanceRef::new("ops", "a")).await);
    }

    #[tokio::test]
    async fn custom_ttl_label_is_used_for_scan_and_expiry() {
        let h = harness(
            ReaperSettings::new(NS)
                .with_configuration_name(CONFIG)
                .with_ttl_label("example.com/ttl"),
        );
        h.configs.put(config(SECRETS)).await;
        h.objects
            .insert(
                secret_type(),
                ManagedInstance::new("ops", "custom", t0()).with_label("example.com/ttl", "1s"),
            )
            .await;
        h.objects.insert(secret_type(), marked("default-label", "1s")).await;
        h.clock.set(t0() + TimeDelta::minutes(1));

        let report = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.types[0].scanned, 1);
        assert_eq!(report.types[0].deleted, vec![InstanceRef::new("ops", "custom")]);
    }

    #[tokio::test]
    async fn types_are_processed_in_declared_order() {
        let h = default_harness();
        h.configs.put(config(BINDINGS_THEN_SECRETS)).await;
        h.objects.insert(secret_type(), marked("s", "1s")).await;
        h.objects.insert(binding_type(), marked("b", "1s")).await;
        h.clock.set(t0() + TimeDelta::minutes(1));

        h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        let order: Vec<_> = h.objects.deleted().await.into_iter().map(|(d, _)| d).collect();
        assert_eq!(order, vec![binding_type(), secret_type()]);
    }

    #[tokio::test]
    async fn cancelled_before_start_is_cancelled_error() {
        let h = default_harness();
        h.configs.put(config(SECRETS)).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = h.reaper.run_cycle(&cancel).await;
        assert_eq!(result, Err(ReaperError::Cancelled));
        assert_eq!(h.reaper.next_delay(&result), None);
    }

    /// Cancels the token on the first delete, after performing it.
    struct CancellingStore {
        inner: InMemoryObjectStore,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl ObjectStore for CancellingStore {
        async fn list(
            &self,
            descriptor: &TypeDescriptor,
            filter: &ListFilter,
        ) -> Result<Vec<ManagedInstance>, StoreError> {
            self.inner.list(descriptor, filter).await
        }

        async fn delete(
            &self,
            descriptor: &TypeDescriptor,
            instance: &InstanceRef,
        ) -> Result<(), StoreError> {
            let result = self.inner.delete(descriptor, instance).await;
            self.cancel.cancel();
            result
        }
    }

    #[tokio::test]
    async fn cancellation_mid_cycle_keeps_issued_deletes() {
        let configs = InMemoryConfigStore::new();
        configs.put(config(BINDINGS_THEN_SECRETS)).await;
        let objects = InMemoryObjectStore::new();
        objects.insert(binding_type(), marked("b1", "1s")).await;
        objects.insert(binding_type(), marked("b2", "1s")).await;
        objects.insert(secret_type(), marked("s1", "1s")).await;

        let cancel = CancellationToken::new();
        let store = CancellingStore {
            inner: objects.clone(),
            cancel: cancel.clone(),
        };
        let reaper = Reaper::new(
            ReaperSettings::new(NS).with_configuration_name(CONFIG),
            Arc::new(configs),
            Arc::new(store),
        )
        .with_clock(Arc::new(FixedClock::new(t0() + TimeDelta::minutes(1))))
        .with_event_sink(Arc::new(RecordingEventSink::new()));

        let result = reaper.run_cycle(&cancel).await;
        let report = result.as_ref().unwrap();
        assert_eq!(report.state, CycleState::Cancelled);
        assert_eq!(reaper.next_delay(&result), None);
        // b1 was deleted before cancellation, nothing after it
        assert_eq!(
            objects.deleted().await,
            vec![(binding_type(), InstanceRef::new("ops", "b1"))]
        );
        assert!(objects.contains(&secret_type(), &InstanceRef::new("ops", "s1")).await);
    }

    /// Cancels the token once the listing has been returned.
    struct CancelOnListStore {
        inner: InMemoryObjectStore,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl ObjectStore for CancelOnListStore {
        async fn list(
            &self,
            descriptor: &TypeDescriptor,
            filter: &ListFilter,
        ) -> Result<Vec<ManagedInstance>, StoreError> {
            let listed = self.inner.list(descriptor, filter).await;
            self.cancel.cancel();
            listed
        }

        async fn delete(
            &self,
            descriptor: &TypeDescriptor,
            instance: &InstanceRef,
        ) -> Result<(), StoreError> {
            self.inner.delete(descriptor, instance).await
        }
    }

    #[rstest::rstest]
    #[case(false)]
    #[case(true)]
    #[tokio::test]
    async fn cancellation_after_scan_stops_before_first_instance(#[case] dry_run: bool) {
        let configs = InMemoryConfigStore::new();
        configs.put(config(SECRETS)).await;
        let objects = InMemoryObjectStore::new();
        objects.insert(secret_type(), marked("a", "1s")).await;
        objects.insert(secret_type(), marked("b", "1s")).await;

        let cancel = CancellationToken::new();
        let store = CancelOnListStore {
            inner: objects.clone(),
            cancel: cancel.clone(),
        };
        let reaper = Reaper::new(
            ReaperSettings::new(NS)
                .with_configuration_name(CONFIG)
                .with_dry_run(dry_run),
            Arc::new(configs),
            Arc::new(store),
        )
        .with_clock(Arc::new(FixedClock::new(t0() + TimeDelta::minutes(1))))
        .with_event_sink(Arc::new(RecordingEventSink::new()));

        let report = reaper.run_cycle(&cancel).await.unwrap();
        assert_eq!(report.state, CycleState::Cancelled);
        assert_eq!(report.types[0].scanned, 2);
        assert!(report.types[0].deleted.is_empty());
        assert!(objects.deleted().await.is_empty());
    }

    #[tokio::test]
    async fn already_deleted_instance_counts_as_reaped() {
        struct GoneStore(InMemoryObjectStore);

        #[async_trait]
        impl ObjectStore for GoneStore {
            async fn list(
                &self,
                descriptor: &TypeDescriptor,
                filter: &ListFilter,
            ) -> Result<Vec<ManagedInstance>, StoreError> {
                self.0.list(descriptor, filter).await
            }

            async fn delete(
                &self,
                _descriptor: &TypeDescriptor,
                instance: &InstanceRef,
            ) -> Result<(), StoreError> {
                Err(StoreError::NotFound {
                    instance: instance.clone(),
                })
            }
        }

        let configs = InMemoryConfigStore::new();
        configs.put(config(SECRETS)).await;
        let objects = InMemoryObjectStore::new();
        objects.insert(secret_type(), marked("a", "1s")).await;

        let reaper = Reaper::new(
            ReaperSettings::new(NS).with_configuration_name(CONFIG),
            Arc::new(configs),
            Arc::new(GoneStore(objects)),
        )
        .with_clock(Arc::new(FixedClock::new(t0() + TimeDelta::minutes(1))))
        .with_event_sink(Arc::new(RecordingEventSink::new()));

        let report = reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.types[0].deleted, vec![InstanceRef::new("ops", "a")]);
        assert!(report.types[0].instance_errors.is_empty());
    }

    #[tokio::test]
    async fn config_is_reloaded_every_cycle() {
        let h = default_harness();
        h.configs
            .put(ConfigRecord::new(NS, CONFIG).with_entry(CHECK_INTERVAL_KEY, "5s"))
            .await;
        h.objects.insert(secret_type(), marked("a", "1s")).await;
        h.clock.set(t0() + TimeDelta::minutes(1));

        let first = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(first.types.is_empty());

        h.configs
            .put(config(SECRETS).with_entry(CHECK_INTERVAL_KEY, "1m"))
            .await;
        let second = h.reaper.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(second.next_delay, Duration::from_secs(60));
        assert_eq!(second.counts().deleted, 1);
    }
}

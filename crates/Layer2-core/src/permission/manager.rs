//! File permission manager
//!
//! 영속 권한 persist / revoke / activate / deactivate / check.
//!
//! 모든 연산은 두 단계로 실패할 수 있다:
//! - 즉시 (`Err` 반환): 기기 미지원, 빈 배열, 최대 개수 초과, 빈 URI
//! - 지연 (future 결과): 경로 검증 실패, 미영속 정책 등 `OperationNotPermitted`
//!
//! 지연 작업은 `spawn_blocking`에서 실행되어 호출 스레드가 디스크 I/O로 막히지 않는다.

use super::entitlement::Entitlement;
use crate::uri::{FileUri, UriResolver};
use fileshare_foundation::{
    acl, AppIdentity, BatchOutcome, Error, GrantKey, GrantStore, PathPolicy,
    PersistedGrant, Platform, PolicyErrorCode, PolicyErrorResult, PolicyInfo, PolicyType, Result,
    ShareConfig, TemporaryGrants, MAX_POLICY_COUNT,
};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Deferred half of a manager operation
pub type PendingResult<T> = BoxFuture<'static, Result<T>>;

/// Persistent permission manager for one calling app
#[derive(Clone)]
pub struct FilePermissionManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<GrantStore>,
    resolver: UriResolver,
    entitlement: Entitlement,
    platform: Platform,
    caller: AppIdentity,
    temporary: Arc<TemporaryGrants>,
    max_policies: usize,
}

impl FilePermissionManager {
    pub fn new(
        store: Arc<GrantStore>,
        resolver: UriResolver,
        platform: Platform,
        caller: AppIdentity,
    ) -> Self {
        let entitlement = Entitlement::new(&resolver);
        Self {
            inner: Arc::new(Inner {
                store,
                resolver,
                entitlement,
                platform,
                caller,
                temporary: Arc::new(TemporaryGrants::new()),
                max_policies: MAX_POLICY_COUNT,
            }),
        }
    }

    /// Build from config: resolver, device capability, caller identity and limits
    pub fn from_config(
        config: &ShareConfig,
        store: Arc<GrantStore>,
        temporary: Arc<TemporaryGrants>,
    ) -> Self {
        let resolver = UriResolver::from_config(config);
        let entitlement = Entitlement::from_config(&resolver, config);
        Self {
            inner: Arc::new(Inner {
                store,
                resolver,
                entitlement,
                platform: config.platform(),
                caller: config.identity(),
                temporary,
                max_policies: config.max_policies(),
            }),
        }
    }

    // ========================================================================
    // Builder (생성 직후에만 사용)
    // ========================================================================

    pub fn with_temporary_grants(self, temporary: Arc<TemporaryGrants>) -> Self {
        self.rebuild(|inner| inner.temporary = temporary)
    }

    pub fn with_max_policies(self, max_policies: usize) -> Self {
        self.rebuild(|inner| inner.max_policies = max_policies)
    }

    pub fn with_entitlement(self, entitlement: Entitlement) -> Self {
        self.rebuild(|inner| inner.entitlement = entitlement)
    }

    fn rebuild(self, apply: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => shared.duplicate(),
        };
        apply(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn caller(&self) -> &AppIdentity {
        &self.inner.caller
    }

    pub fn resolver(&self) -> &UriResolver {
        &self.inner.resolver
    }

    pub fn temporary_grants(&self) -> &Arc<TemporaryGrants> {
        &self.inner.temporary
    }

    // ========================================================================
    // Persistent permission operations
    // ========================================================================

    /// Persist every policy as an active grant, or none of them
    pub fn persist_permission(&self, policies: Vec<PolicyInfo>) -> Result<PendingResult<()>> {
        self.check_policies(&policies)?;
        Ok(self.defer(move |inner| inner.persist(&policies)))
    }

    /// Delete every policy's grant; all of them must be persisted
    pub fn revoke_permission(&self, policies: Vec<PolicyInfo>) -> Result<PendingResult<()>> {
        self.check_policies(&policies)?;
        Ok(self.defer(move |inner| inner.revoke(&policies)))
    }

    pub fn activate_permission(&self, policies: Vec<PolicyInfo>) -> Result<PendingResult<()>> {
        self.check_policies(&policies)?;
        Ok(self.defer(move |inner| inner.set_active(&policies, true)))
    }

    pub fn deactivate_permission(&self, policies: Vec<PolicyInfo>) -> Result<PendingResult<()>> {
        self.check_policies(&policies)?;
        Ok(self.defer(move |inner| inner.set_active(&policies, false)))
    }

    /// `true` per policy iff an active grant exists
    pub fn check_persistent_permission(
        &self,
        policies: Vec<PolicyInfo>,
    ) -> Result<PendingResult<Vec<bool>>> {
        self.check_policies(&policies)?;
        Ok(self.defer(move |inner| inner.check(&policies)))
    }

    /// Issue temporary, persist-allowed grants from the caller to `target_app`
    pub fn grant_permission(
        &self,
        target_app: &str,
        policies: Vec<PolicyInfo>,
    ) -> Result<PendingResult<()>> {
        self.check_policies(&policies)?;
        if target_app.is_empty() {
            return Err(Error::ParameterError("Target app id is empty".to_string()));
        }
        if !self.inner.caller.holds(acl::SET_SANDBOX_POLICY) {
            return Err(Error::PermissionDenied(format!(
                "{} does not hold {}",
                self.inner.caller.app_id,
                acl::SET_SANDBOX_POLICY
            )));
        }

        let target_app = target_app.to_string();
        Ok(self.defer(move |inner| inner.grant(&target_app, &policies)))
    }

    /// Check already-resolved paths of `app_id` against temporary or persistent grants
    ///
    /// Querying another app requires `CHECK_SANDBOX_POLICY`.
    pub fn check_path_permission(
        &self,
        app_id: &str,
        policies: Vec<PathPolicy>,
        policy_type: PolicyType,
    ) -> Result<PendingResult<Vec<bool>>> {
        self.check_capability()?;
        self.check_batch_size(policies.len())?;
        if app_id.is_empty() {
            return Err(Error::ParameterError("App id is empty".to_string()));
        }
        if policies.iter().any(|p| p.path.as_os_str().is_empty()) {
            return Err(Error::ParameterError("Path is empty".to_string()));
        }
        let caller = &self.inner.caller;
        if app_id != caller.app_id && !caller.holds(acl::CHECK_SANDBOX_POLICY) {
            return Err(Error::PermissionDenied(format!(
                "{} does not hold {} to check {}",
                caller.app_id,
                acl::CHECK_SANDBOX_POLICY,
                app_id
            )));
        }

        let app_id = app_id.to_string();
        Ok(self.defer(move |inner| match policy_type {
            PolicyType::Temporary => Ok(inner.temporary.check(&app_id, &policies)),
            PolicyType::Persistent => {
                let keys: Vec<GrantKey> = policies
                    .iter()
                    .map(|p| GrantKey::new(&p.path, p.mode))
                    .collect();
                inner.store.check_batch(&app_id, &keys)
            }
        }))
    }

    /// Every persisted grant of the caller
    pub fn list_grants(&self) -> Result<PendingResult<Vec<PersistedGrant>>> {
        self.check_capability()?;
        Ok(self.defer(|inner| inner.store.list(&inner.caller.app_id)))
    }

    // ========================================================================
    // Synchronous preconditions
    // ========================================================================

    fn check_capability(&self) -> Result<()> {
        if !self.inner.platform.supports_persistent_permission() {
            return Err(Error::UnsupportedDevice);
        }
        Ok(())
    }

    fn check_batch_size(&self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(Error::ParameterError("Policy list is empty".to_string()));
        }
        if len > self.inner.max_policies {
            return Err(Error::ParameterError(format!(
                "Too many policies: {} (max {})",
                len, self.inner.max_policies
            )));
        }
        Ok(())
    }

    fn check_policies(&self, policies: &[PolicyInfo]) -> Result<()> {
        self.check_capability()?;
        self.check_batch_size(policies.len())?;
        if policies.iter().any(|p| p.uri.is_empty()) {
            return Err(Error::ParameterError("URI is empty".to_string()));
        }
        Ok(())
    }

    fn defer<T, F>(&self, work: F) -> PendingResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || work(&inner))
                .await
                .map_err(|e| Error::Internal(format!("Permission task failed: {}", e)))?
        })
    }
}

// ============================================================================
// Deferred work
// ============================================================================

impl Inner {
    fn duplicate(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            resolver: self.resolver.clone(),
            entitlement: self.entitlement.clone(),
            platform: self.platform,
            caller: self.caller.clone(),
            temporary: Arc::clone(&self.temporary),
            max_policies: self.max_policies,
        }
    }

    fn app_id(&self) -> &str {
        &self.caller.app_id
    }

    /// Parse, reject any `networkid` URI, resolve, and require the path to exist (media excepted)
    fn verify(&self, policy: &PolicyInfo) -> std::result::Result<PathBuf, PolicyErrorCode> {
        let uri = FileUri::parse(&policy.uri).map_err(|_| PolicyErrorCode::InvalidPath)?;
        if uri.has_network_param() {
            return Err(PolicyErrorCode::InvalidPath);
        }

        let path = self.resolver.resolve_uri(&uri);
        if !uri.is_media() && !path.exists() {
            debug!(uri = %uri, path = %path.display(), "path does not exist");
            return Err(PolicyErrorCode::InvalidPath);
        }
        Ok(path)
    }

    /// Verify every policy; any failure rejects the whole batch
    fn verify_all(
        &self,
        operation: &str,
        policies: &[PolicyInfo],
        entitled: bool,
    ) -> Result<Vec<GrantKey>> {
        let mut keys = Vec::with_capacity(policies.len());
        let mut failures = Vec::new();

        for policy in policies {
            let result = self.verify(policy).and_then(|path| {
                if entitled
                    && !self.entitlement.is_entitled(
                        &self.caller,
                        &path,
                        policy.operation_mode,
                        &self.temporary,
                    )
                {
                    return Err(PolicyErrorCode::PersistenceForbidden);
                }
                Ok(path)
            });

            match result {
                Ok(path) => keys.push(GrantKey::new(&path, policy.operation_mode)),
                Err(code) => failures.push(PolicyErrorResult::new(policy.uri.clone(), code)),
            }
        }

        if !failures.is_empty() {
            warn!(
                app = %self.app_id(),
                operation,
                total = policies.len(),
                rejected = failures.len(),
                "permission batch rejected"
            );
            return Err(Error::not_permitted(
                format!("{} failed for {} of {} policies", operation, failures.len(), policies.len()),
                failures,
            ));
        }

        Ok(keys)
    }

    fn persist(&self, policies: &[PolicyInfo]) -> Result<()> {
        let keys = self.verify_all("persist", policies, true)?;
        self.store.persist_batch(self.app_id(), self.app_id(), &keys)?;
        info!(app = %self.app_id(), count = keys.len(), "persisted permissions");
        Ok(())
    }

    fn revoke(&self, policies: &[PolicyInfo]) -> Result<()> {
        let keys = self.verify_all("revoke", policies, false)?;
        let outcome = self.store.revoke_batch(self.app_id(), &keys)?;
        self.finish("revoke", policies, outcome)
    }

    fn set_active(&self, policies: &[PolicyInfo], active: bool) -> Result<()> {
        let operation = if active { "activate" } else { "deactivate" };
        let keys = self.verify_all(operation, policies, false)?;
        let outcome = self.store.set_active_batch(self.app_id(), &keys, active)?;
        self.finish(operation, policies, outcome)
    }

    fn finish(&self, operation: &str, policies: &[PolicyInfo], outcome: BatchOutcome) -> Result<()> {
        match outcome {
            BatchOutcome::Applied(count) => {
                info!(app = %self.app_id(), operation, count, "permission batch applied");
                Ok(())
            }
            BatchOutcome::Missing(indices) => {
                warn!(
                    app = %self.app_id(),
                    operation,
                    missing = indices.len(),
                    "policies are not persisted"
                );
                let results = indices
                    .into_iter()
                    .filter_map(|i| policies.get(i))
                    .map(|p| {
                        PolicyErrorResult::new(p.uri.clone(), PolicyErrorCode::PermissionNotPersisted)
                    })
                    .collect();
                Err(Error::not_permitted(
                    format!("{} failed: policy is not persisted", operation),
                    results,
                ))
            }
        }
    }

    fn check(&self, policies: &[PolicyInfo]) -> Result<Vec<bool>> {
        let resolved: Vec<Option<GrantKey>> = policies
            .iter()
            .map(|policy| {
                FileUri::parse(&policy.uri)
                    .ok()
                    .filter(|uri| !uri.has_network_param())
                    .map(|uri| {
                        GrantKey::new(self.resolver.resolve_uri(&uri), policy.operation_mode)
                    })
            })
            .collect();

        if resolved.iter().all(Option::is_none) {
            let results = policies
                .iter()
                .map(|p| PolicyErrorResult::new(p.uri.clone(), PolicyErrorCode::InvalidPath))
                .collect();
            return Err(Error::not_permitted("No policy could be resolved", results));
        }

        let keys: Vec<GrantKey> = resolved.iter().flatten().cloned().collect();
        let mut found = self.store.check_batch(self.app_id(), &keys)?.into_iter();

        Ok(resolved
            .iter()
            .map(|key| match key {
                Some(_) => found.next().unwrap_or(false),
                None => false,
            })
            .collect())
    }

    fn grant(&self, target_app: &str, policies: &[PolicyInfo]) -> Result<()> {
        let view = self.resolver.for_app(target_app);
        let mut grants = Vec::with_capacity(policies.len());
        let mut failures = Vec::new();

        for policy in policies {
            match FileUri::parse(&policy.uri) {
                Ok(uri) if !uri.has_network_param() => {
                    grants.push(PathPolicy::new(view.resolve_uri(&uri), policy.operation_mode))
                }
                _ => failures.push(PolicyErrorResult::new(
                    policy.uri.clone(),
                    PolicyErrorCode::InvalidPath,
                )),
            }
        }

        if !failures.is_empty() {
            warn!(app = %self.app_id(), target = %target_app, rejected = failures.len(), "grant rejected");
            return Err(Error::not_permitted("grant failed", failures));
        }

        self.temporary.grant(target_app, &grants);
        info!(app = %self.app_id(), target = %target_app, count = grants.len(), "granted temporary permissions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileshare_foundation::{DeviceClass, OperationMode};
    use tempfile::TempDir;

    const APP: &str = "com.example.reader";

    struct Fixture {
        _dir: TempDir,
        manager: FilePermissionManager,
        file_uri: String,
    }

    fn fixture(device: DeviceClass) -> Fixture {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let base = dir.path().join("base");
        std::fs::create_dir_all(&base).expect("mkdir");
        let file = base.join("a.txt");
        std::fs::write(&file, "hello").expect("write");

        let store = Arc::new(GrantStore::in_memory().expect("Failed to create store"));
        let platform = Platform::new(device);
        let resolver = UriResolver::new(APP, dir.path(), &platform);
        let manager = FilePermissionManager::new(store, resolver, platform, AppIdentity::new(APP));

        Fixture {
            file_uri: format!("file://{}{}", APP, file.display()),
            _dir: dir,
            manager,
        }
    }

    #[test]
    fn test_unsupported_device_precedes_parameter_error() {
        let f = fixture(DeviceClass::Wearable);
        assert!(matches!(
            f.manager.persist_permission(vec![]),
            Err(Error::UnsupportedDevice)
        ));
    }

    #[test]
    fn test_parameter_errors_are_immediate() {
        let f = fixture(DeviceClass::Phone);
        assert!(matches!(
            f.manager.check_persistent_permission(vec![]),
            Err(Error::ParameterError(_))
        ));
        assert!(matches!(
            f.manager.revoke_permission(vec![PolicyInfo::read("")]),
            Err(Error::ParameterError(_))
        ));

        let limited = f.manager.clone().with_max_policies(1);
        assert!(matches!(
            limited.persist_permission(vec![
                PolicyInfo::read(f.file_uri.clone()),
                PolicyInfo::write(f.file_uri.clone()),
            ]),
            Err(Error::ParameterError(_))
        ));
    }

    #[test]
    fn test_empty_batch_rejected_by_every_operation() {
        let f = fixture(DeviceClass::Phone);
        let m = &f.manager;
        let results = [
            ("persist", m.persist_permission(vec![]).map(|_| ())),
            ("revoke", m.revoke_permission(vec![]).map(|_| ())),
            ("activate", m.activate_permission(vec![]).map(|_| ())),
            ("deactivate", m.deactivate_permission(vec![]).map(|_| ())),
            ("check", m.check_persistent_permission(vec![]).map(|_| ())),
            ("grant", m.grant_permission("com.example.other", vec![]).map(|_| ())),
        ];
        for (operation, result) in results {
            assert!(
                matches!(result, Err(Error::ParameterError(_))),
                "{} accepted an empty batch",
                operation
            );
        }
        assert!(matches!(
            m.check_path_permission(APP, vec![], PolicyType::Persistent),
            Err(Error::ParameterError(_))
        ));
    }

    #[test]
    fn test_cross_app_path_check_requires_permission() {
        let f = fixture(DeviceClass::Phone);
        let policies = vec![PathPolicy::new("/data/storage/el2/base/a.txt", OperationMode::Read)];

        assert!(matches!(
            f.manager.check_path_permission(
                "com.example.other",
                policies.clone(),
                PolicyType::Persistent
            ),
            Err(Error::PermissionDenied(_))
        ));
        assert!(f
            .manager
            .check_path_permission(APP, policies.clone(), PolicyType::Persistent)
            .is_ok());

        let auditor = FilePermissionManager::new(
            Arc::new(GrantStore::in_memory().expect("Failed to create store")),
            f.manager.resolver().clone(),
            Platform::new(DeviceClass::Phone),
            AppIdentity::new("com.example.auditor").with_permission(acl::CHECK_SANDBOX_POLICY),
        );
        assert!(auditor
            .check_path_permission("com.example.other", policies, PolicyType::Temporary)
            .is_ok());
    }

    #[test]
    fn test_grant_requires_sandbox_policy() {
        let f = fixture(DeviceClass::Phone);
        assert!(matches!(
            f.manager
                .grant_permission("com.example.other", vec![PolicyInfo::read(f.file_uri.clone())]),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_persist_then_check() {
        let f = fixture(DeviceClass::Phone);
        let read = PolicyInfo::read(f.file_uri.clone());
        let write = PolicyInfo::write(f.file_uri.clone());

        f.manager
            .persist_permission(vec![read.clone()])
            .expect("precheck")
            .await
            .expect("Failed to persist");

        let checked = f
            .manager
            .check_persistent_permission(vec![read, write])
            .expect("precheck")
            .await
            .expect("Failed to check");
        assert_eq!(checked, vec![true, false]);
    }

    #[tokio::test]
    async fn test_revoke_missing_reports_not_persisted() {
        let f = fixture(DeviceClass::Phone);
        let err = f
            .manager
            .revoke_permission(vec![PolicyInfo::read(f.file_uri.clone())])
            .expect("precheck")
            .await
            .expect_err("revoke of unpersisted grant must fail");

        assert_eq!(err.code(), fileshare_foundation::error_codes::OPERATION_NOT_PERMITTED);
        assert_eq!(err.policy_results().len(), 1);
        assert_eq!(
            err.policy_results()[0].code,
            PolicyErrorCode::PermissionNotPersisted
        );
    }

    #[tokio::test]
    async fn test_check_unresolvable_entries() {
        let f = fixture(DeviceClass::Phone);
        f.manager
            .persist_permission(vec![PolicyInfo::read(f.file_uri.clone())])
            .expect("precheck")
            .await
            .expect("Failed to persist");

        let checked = f
            .manager
            .check_persistent_permission(vec![
                PolicyInfo::read("not-a-uri"),
                PolicyInfo::read(f.file_uri.clone()),
            ])
            .expect("precheck")
            .await
            .expect("Failed to check");
        assert_eq!(checked, vec![false, true]);

        let err = f
            .manager
            .check_persistent_permission(vec![PolicyInfo::read("not-a-uri")])
            .expect("precheck")
            .await
            .expect_err("all-unresolvable batch must fail");
        assert!(matches!(err, Error::OperationNotPermitted { .. }));
    }

    #[tokio::test]
    async fn test_network_uris_are_not_local() {
        let f = fixture(DeviceClass::Phone);
        let remote = PolicyInfo::read(format!("{}?networkid=device01", f.file_uri));
        let empty_id = PolicyInfo::read(format!("{}?networkid=", f.file_uri));

        let err = f
            .manager
            .check_persistent_permission(vec![remote.clone(), empty_id.clone()])
            .expect("precheck")
            .await
            .expect_err("remote-only check must fail");
        assert_eq!(err.policy_results().len(), 2);
        assert!(err
            .policy_results()
            .iter()
            .all(|r| r.code == PolicyErrorCode::InvalidPath));

        let err = f
            .manager
            .persist_permission(vec![empty_id])
            .expect("precheck")
            .await
            .expect_err("empty networkid must not pass as local");
        assert_eq!(err.policy_results()[0].code, PolicyErrorCode::InvalidPath);

        let local = PolicyInfo::read(f.file_uri.clone());
        f.manager
            .persist_permission(vec![local.clone()])
            .expect("precheck")
            .await
            .expect("Failed to persist");
        let checked = f
            .manager
            .check_persistent_permission(vec![remote, local])
            .expect("precheck")
            .await
            .expect("Failed to check");
        assert_eq!(checked, vec![false, true]);
    }
}

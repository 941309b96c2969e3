//! Read-only audit export

use gate_core::{
    AccessLogEntry, AccessLogFilter, AdminAuditEvent, GateError, Page, Result, SubjectId,
};
use tracing::debug;

use crate::admin::require_admin;
use crate::context::GateContext;

/// Page size when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Largest page served
pub const MAX_PAGE_SIZE: usize = 500;

/// Access log and admin audit queries
#[derive(Debug, Clone)]
pub struct AccessHistory {
    ctx: GateContext,
}

impl AccessHistory {
    pub fn new(ctx: GateContext) -> Self {
        Self { ctx }
    }

    /// Entries matching the filter, oldest first
    pub async fn query(&self, mut filter: AccessLogFilter) -> Result<Page<AccessLogEntry>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from >= to {
                return Err(GateError::invalid("date range is empty: `from` must precede `to`"));
            }
        }
        filter.limit = clamp_limit(filter.limit);
        let page = self.ctx.access_log.query(&filter).await?;
        debug!(total = page.total, returned = page.items.len(), "access history query");
        Ok(page)
    }

    /// Administrative audit trail; admin-only
    pub async fn admin_audit(
        &self,
        actor: &SubjectId,
        offset: usize,
        limit: usize,
    ) -> Result<Page<AdminAuditEvent>> {
        require_admin(&self.ctx, actor).await?;
        self.ctx.admin_audit.list(offset, clamp_limit(limit)).await
    }
}

fn clamp_limit(limit: usize) -> usize {
    match limit {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AccessRequest, EnginePolicy, ValidationEngine};
    use gate_core::Timestamp;
    use crate::test_support::Harness;
    use gate_testkit::fixtures::{device, facility_id, subject_id};

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(0), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(10), 10);
        assert_eq!(clamp_limit(10_000), MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn filters_by_facility() {
        let h = Harness::new().await;
        let engine = ValidationEngine::new(h.ctx.clone(), EnginePolicy::default());
        for facility in ["LIB", "LAB", "LIB"] {
            engine
                .validate(AccessRequest {
                    qr_payload: "garbage".into(),
                    facility_id: facility_id(facility),
                    device: device("door-1"),
                })
                .await;
        }
        let history = AccessHistory::new(h.ctx.clone());
        let page = history
            .query(AccessLogFilter {
                facility_id: Some(facility_id("LIB")),
                ..AccessLogFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let h = Harness::new().await;
        let err = AccessHistory::new(h.ctx.clone())
            .query(AccessLogFilter {
                from: Some(Timestamp::from_secs(10)),
                to: Some(Timestamp::from_secs(5)),
                ..AccessLogFilter::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Invalid { .. }));
    }

    #[tokio::test]
    async fn admin_audit_requires_admin() {
        let h = Harness::new().await;
        let history = AccessHistory::new(h.ctx.clone());
        assert!(history.admin_audit(&subject_id("s-1"), 0, 10).await.is_err());
        assert_eq!(history.admin_audit(&subject_id("admin-1"), 0, 10).await.unwrap().total, 0);
    }
}

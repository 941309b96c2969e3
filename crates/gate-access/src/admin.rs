//! Helpers shared by administrative operations

use gate_core::effects::{Notification, SubjectProfile};
use gate_core::{AdminAction, AdminAuditEvent, GateError, Result, SubjectId};
use tracing::warn;

use crate::context::GateContext;

/// Resolve `actor` and require the admin role
pub(crate) async fn require_admin(ctx: &GateContext, actor: &SubjectId) -> Result<SubjectProfile> {
    match ctx.identity.lookup_subject(actor).await? {
        Some(profile) if profile.is_admin() => Ok(profile),
        Some(_) => Err(GateError::permission_denied(format!(
            "{actor} is not an administrator"
        ))),
        None => Err(GateError::permission_denied(format!("unknown actor {actor}"))),
    }
}

/// Allow `actor` to act on `subject`'s credential: themselves, or an admin
pub(crate) async fn require_self_or_admin(
    ctx: &GateContext,
    actor: &SubjectId,
    subject: &SubjectId,
) -> Result<()> {
    if actor == subject {
        return Ok(());
    }
    require_admin(ctx, actor).await.map(|_| ())
}

/// Append an administrative audit event
pub(crate) async fn record_audit(
    ctx: &GateContext,
    actor: &SubjectId,
    action: AdminAction,
    targets: Vec<String>,
    reason: Option<String>,
) -> Result<AdminAuditEvent> {
    let event = AdminAuditEvent {
        id: ctx.next_entry_id().await,
        actor: actor.clone(),
        action,
        targets,
        reason,
        at: ctx.now().await?,
    };
    ctx.admin_audit.record(event.clone()).await?;
    Ok(event)
}

/// Deliver a notification; failures are logged and swallowed
pub(crate) async fn notify_best_effort(ctx: &GateContext, notification: Notification) {
    if let Err(error) = ctx.notifier.notify(notification).await {
        warn!(%error, "notification delivery failed");
    }
}

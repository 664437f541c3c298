//! Principal checks shared by every service.

use stockroom_core::access::{Action, Principal, Subject, can_access};
use stockroom_core::error::{StockroomError, StockroomResult};
use stockroom_core::models::resource::ResourceWithGrants;
use stockroom_core::models::role::Role;
use stockroom_core::repository::GroupRepository;

/// Blocked or role-less principals may do nothing.
pub(crate) fn require_active(principal: &Principal) -> StockroomResult<()> {
    if principal.blocked {
        return Err(StockroomError::forbidden("account is blocked"));
    }
    if principal.role.is_none() {
        return Err(StockroomError::forbidden("account has no role"));
    }
    Ok(())
}

pub(crate) fn require_role(principal: &Principal, roles: &[Role]) -> StockroomResult<()> {
    require_active(principal)?;
    if !principal.has_any_role(roles) {
        return Err(StockroomError::forbidden(format!(
            "requires role {}",
            roles
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(" or ")
        )));
    }
    Ok(())
}

pub(crate) fn require_admin(principal: &Principal) -> StockroomResult<()> {
    require_role(principal, &[Role::Admin])
}

/// Load the principal's group memberships for a decision.
pub(crate) async fn subject_for<G: GroupRepository>(
    groups: &G,
    principal: &Principal,
) -> StockroomResult<Subject> {
    let memberships = groups.get_user_groups(principal.id).await?;
    Ok(Subject::new(
        principal.clone(),
        memberships.into_iter().map(|g| g.id),
    ))
}

/// Turn a negative decision into `Forbidden`.
pub(crate) fn authorize(
    subject: &Subject,
    target: &ResourceWithGrants,
    action: Action,
) -> StockroomResult<()> {
    if can_access(subject, target, action) {
        Ok(())
    } else {
        Err(StockroomError::forbidden(format!(
            "{action} denied on {} {}",
            target.resource.kind,
            target.id()
        )))
    }
}

//! The per-request tenant context the Isolation Middleware attaches to every
//! protected request. Every repository call in `atrium-storage`
//! takes a [`TenantPredicate`] by value instead of reading it from ambient
//! request-local state, so a repository method's signature alone shows
//! which rows it can touch.

use crate::ids::{ProjectId, UserId};

/// The `(user_id, project_id)` scoping predicate every tenant-owned row read
/// or write must satisfy. `project_id` is `None` for operations scoped only
/// to the user (e.g. listing projects); adapters that need a project predicate
/// narrow it with [`TenantPredicate::with_project`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TenantPredicate {
    pub user_id: UserId,
    pub project_id: Option<ProjectId>,
}

impl TenantPredicate {
    pub fn user_only(user_id: UserId) -> Self {
        Self {
            user_id,
            project_id: None,
        }
    }

    pub fn with_project(self, project_id: ProjectId) -> Self {
        Self {
            user_id: self.user_id,
            project_id: Some(project_id),
        }
    }

    /// `true` if `other_user`/`other_project` (read from a candidate row) is
    /// within this predicate's scope. Adapters use this as a defense-in-depth
    /// check after a query returns a row; the primary enforcement is always
    /// the SQL `WHERE` clause itself.
    pub fn allows(&self, other_user: UserId, other_project: Option<ProjectId>) -> bool {
        if self.user_id != other_user {
            return false;
        }
        match (self.project_id, other_project) {
            (Some(want), Some(got)) => want == got,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Immutable per-request context attached by the Isolation Middleware.
/// `user_prefix` namespaces derived resources (e.g. the vector-store
/// collection name `user{uid}_project{pid}_{name}_context`).
#[derive(Clone, Debug)]
pub struct TenantContext {
    pub user_id: UserId,
    pub user_prefix: String,
    pub predicate: TenantPredicate,
}

impl TenantContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            user_prefix: format!("user{user_id}"),
            predicate: TenantPredicate::user_only(user_id),
        }
    }

    pub fn scoped_to_project(&self, project_id: ProjectId) -> Self {
        Self {
            user_id: self.user_id,
            user_prefix: self.user_prefix.clone(),
            predicate: self.predicate.with_project(project_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_rejects_foreign_user() {
        let u1 = UserId::new();
        let u2 = UserId::new();
        let pred = TenantPredicate::user_only(u1);
        assert!(!pred.allows(u2, None));
    }

    #[test]
    fn predicate_scoped_to_project_rejects_unscoped_row() {
        let u1 = UserId::new();
        let p1 = ProjectId::new();
        let pred = TenantPredicate::user_only(u1).with_project(p1);
        assert!(!pred.allows(u1, None));
        assert!(pred.allows(u1, Some(p1)));
        let p2 = ProjectId::new();
        assert!(!pred.allows(u1, Some(p2)));
    }

    #[test]
    fn context_derives_stable_user_prefix() {
        let u1 = UserId::new();
        let ctx = TenantContext::new(u1);
        assert_eq!(ctx.user_prefix, format!("user{u1}"));
    }
}

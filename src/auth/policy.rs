//! Per-action role requirements.

use std::collections::HashMap;

use crate::db::models::Role;

/// Protected actions whose allowed roles are configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AdminArea,
    ArticleWrite,
    ArticleDelete,
    CategoryWrite,
    CategoryDelete,
    CommentModerate,
    CommentDelete,
    UserManage,
    Settings,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::AdminArea,
        Action::ArticleWrite,
        Action::ArticleDelete,
        Action::CategoryWrite,
        Action::CategoryDelete,
        Action::CommentModerate,
        Action::CommentDelete,
        Action::UserManage,
        Action::Settings,
    ];

    /// Environment key that overrides this action's roles.
    pub fn env_key(&self) -> &'static str {
        match self {
            Action::AdminArea => "ROLE_POLICY_ADMIN_AREA",
            Action::ArticleWrite => "ROLE_POLICY_ARTICLE_WRITE",
            Action::ArticleDelete => "ROLE_POLICY_ARTICLE_DELETE",
            Action::CategoryWrite => "ROLE_POLICY_CATEGORY_WRITE",
            Action::CategoryDelete => "ROLE_POLICY_CATEGORY_DELETE",
            Action::CommentModerate => "ROLE_POLICY_COMMENT_MODERATE",
            Action::CommentDelete => "ROLE_POLICY_COMMENT_DELETE",
            Action::UserManage => "ROLE_POLICY_USER_MANAGE",
            Action::Settings => "ROLE_POLICY_SETTINGS",
        }
    }

    fn default_roles(&self) -> RoleSet {
        use Role::*;
        match self {
            Action::AdminArea => RoleSet::of(&[Admin, Editor]),
            Action::ArticleWrite => RoleSet::of(&[Admin, Editor, Writer]),
            Action::ArticleDelete => RoleSet::of(&[Admin, Editor]),
            Action::CategoryWrite => RoleSet::of(&[Admin, Editor]),
            Action::CategoryDelete => RoleSet::of(&[Admin]),
            Action::CommentModerate => RoleSet::of(&[Admin, Editor, Moderator]),
            Action::CommentDelete => RoleSet::of(&[Admin, Editor]),
            Action::UserManage => RoleSet::of(&[Admin, Editor]),
            Action::Settings => RoleSet::of(&[Admin]),
        }
    }
}

/// Roles allowed to perform something. Empty means any authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    pub fn any() -> Self {
        Self(Vec::new())
    }

    pub fn of(roles: &[Role]) -> Self {
        let mut set = Self(Vec::with_capacity(roles.len()));
        for role in roles {
            if !set.0.contains(role) {
                set.0.push(*role);
            }
        }
        set
    }

    /// Parses a comma list such as `admin, editor`. Unknown names are
    /// skipped; `None` when nothing valid remains.
    pub fn parse(list: &str) -> Option<Self> {
        let roles: Vec<Role> = list
            .split(',')
            .filter_map(|name| match name.parse::<Role>() {
                Ok(role) => Some(role),
                Err(err) => {
                    tracing::warn!("Ignoring unknown role in policy: {}", err);
                    None
                }
            })
            .collect();
        (!roles.is_empty()).then(|| Self::of(&roles))
    }

    pub fn allows(&self, role: Role) -> bool {
        self.0.is_empty() || self.0.contains(&role)
    }

    pub fn roles(&self) -> &[Role] {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct RolePolicy {
    rules: HashMap<Action, RoleSet>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            rules: Action::ALL
                .iter()
                .map(|action| (*action, action.default_roles()))
                .collect(),
        }
    }
}

impl RolePolicy {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let mut policy = Self::default();
        for action in Action::ALL {
            if let Some(set) = lookup(action.env_key()).and_then(|list| RoleSet::parse(&list)) {
                tracing::info!(action = ?action, roles = ?set.roles(), "Role policy override");
                policy.rules.insert(action, set);
            }
        }
        policy
    }

    pub fn roles(&self, action: Action) -> RoleSet {
        self.rules
            .get(&action)
            .cloned()
            .unwrap_or_else(|| action.default_roles())
    }

    pub fn allows(&self, action: Action, role: Role) -> bool {
        self.roles(action).allows(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_keeps_delete_asymmetry() {
        let policy = RolePolicy::default();
        assert!(policy.allows(Action::CommentDelete, Role::Editor));
        assert!(!policy.allows(Action::CategoryDelete, Role::Editor));
        assert!(policy.allows(Action::CategoryDelete, Role::Admin));
        assert!(policy.allows(Action::ArticleWrite, Role::Writer));
        assert!(!policy.allows(Action::ArticleDelete, Role::Writer));
        assert!(!policy.allows(Action::AdminArea, Role::Moderator));
    }

    #[test]
    fn test_override_replaces_default() {
        let policy = RolePolicy::from_lookup(&|key: &str| {
            (key == "ROLE_POLICY_CATEGORY_DELETE").then(|| "admin, editor".to_string())
        });
        assert!(policy.allows(Action::CategoryDelete, Role::Editor));
        assert!(!policy.allows(Action::CategoryDelete, Role::Writer));
    }

    #[test]
    fn test_invalid_override_keeps_default() {
        let policy = RolePolicy::from_lookup(&|key: &str| {
            (key == "ROLE_POLICY_SETTINGS").then(|| "superuser".to_string())
        });
        assert_eq!(policy.roles(Action::Settings), RoleSet::of(&[Role::Admin]));
    }

    #[test]
    fn test_empty_set_allows_any_role() {
        let any = RoleSet::any();
        for role in Role::ALL {
            assert!(any.allows(role));
        }
    }
}

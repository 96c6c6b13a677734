/// Role to permission table
///
/// Every route checks one permission string such as `projects:write`. The
/// table is static: changing what a role may do is a code change, while
/// changing who holds a role is a row update in `memberships`.
///
/// # Example
///
/// ```
/// use agencyhub_shared::auth::permissions::{role_has_permission, Permission};
/// use agencyhub_shared::models::membership::MemberRole;
///
/// assert!(role_has_permission(MemberRole::Finance, Permission::InvoicesWrite));
/// assert!(!role_has_permission(MemberRole::Client, Permission::TasksWrite));
/// ```

use serde::{Serialize, Serializer};

use crate::models::membership::MemberRole;

/// A capability checked by the API before touching a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ProjectsRead,
    ProjectsWrite,
    TasksRead,
    TasksWrite,
    TimeTrack,
    ClientsRead,
    ClientsWrite,
    InvoicesRead,
    InvoicesWrite,
    QuotationsRead,
    QuotationsWrite,
    UsersRead,
    UsersManage,
    OrganizationManage,
    AnalyticsRead,
}

use Permission::*;

impl Permission {
    pub const ALL: [Permission; 15] = [
        ProjectsRead,
        ProjectsWrite,
        TasksRead,
        TasksWrite,
        TimeTrack,
        ClientsRead,
        ClientsWrite,
        InvoicesRead,
        InvoicesWrite,
        QuotationsRead,
        QuotationsWrite,
        UsersRead,
        UsersManage,
        OrganizationManage,
        AnalyticsRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectsRead => "projects:read",
            ProjectsWrite => "projects:write",
            TasksRead => "tasks:read",
            TasksWrite => "tasks:write",
            TimeTrack => "time:track",
            ClientsRead => "clients:read",
            ClientsWrite => "clients:write",
            InvoicesRead => "invoices:read",
            InvoicesWrite => "invoices:write",
            QuotationsRead => "quotations:read",
            QuotationsWrite => "quotations:write",
            UsersRead => "users:read",
            UsersManage => "users:manage",
            OrganizationManage => "organization:manage",
            AnalyticsRead => "analytics:read",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

const PROJECT_MANAGER: &[Permission] = &[
    ProjectsRead,
    ProjectsWrite,
    TasksRead,
    TasksWrite,
    TimeTrack,
    ClientsRead,
    ClientsWrite,
    InvoicesRead,
    QuotationsRead,
    QuotationsWrite,
    UsersRead,
    AnalyticsRead,
];

const TEAM_LEAD: &[Permission] = &[
    ProjectsRead,
    TasksRead,
    TasksWrite,
    TimeTrack,
    ClientsRead,
    UsersRead,
    AnalyticsRead,
];

const MEMBER: &[Permission] = &[ProjectsRead, TasksRead, TasksWrite, TimeTrack, ClientsRead, UsersRead];

const FINANCE: &[Permission] = &[
    ProjectsRead,
    ClientsRead,
    ClientsWrite,
    InvoicesRead,
    InvoicesWrite,
    QuotationsRead,
    QuotationsWrite,
    UsersRead,
    AnalyticsRead,
];

const CLIENT: &[Permission] = &[ProjectsRead, TasksRead, InvoicesRead, QuotationsRead];

/// Capabilities granted to `role`
pub fn permissions_for(role: MemberRole) -> &'static [Permission] {
    match role {
        MemberRole::Owner | MemberRole::Admin => &Permission::ALL,
        MemberRole::ProjectManager => PROJECT_MANAGER,
        MemberRole::TeamLead => TEAM_LEAD,
        MemberRole::Member => MEMBER,
        MemberRole::Finance => FINANCE,
        MemberRole::Client => CLIENT,
    }
}

pub fn role_has_permission(role: MemberRole, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

/// One row of `GET /api/roles`
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub role: MemberRole,
    pub label: &'static str,
    pub permissions: &'static [Permission],
}

/// The whole table, in display order
pub fn role_definitions() -> Vec<RoleDefinition> {
    MemberRole::ALL
        .into_iter()
        .map(|role| RoleDefinition {
            role,
            label: role.label(),
            permissions: permissions_for(role),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_and_admin_have_everything() {
        for permission in Permission::ALL {
            assert!(role_has_permission(MemberRole::Owner, permission));
            assert!(role_has_permission(MemberRole::Admin, permission));
        }
    }

    #[test]
    fn test_client_role_is_read_only() {
        for permission in permissions_for(MemberRole::Client) {
            assert!(permission.as_str().ends_with(":read"), "{permission}");
        }
        assert!(!role_has_permission(MemberRole::Client, TimeTrack));
    }

    #[test]
    fn test_only_admins_manage_users_and_organization() {
        for role in MemberRole::ALL {
            let is_admin = matches!(role, MemberRole::Owner | MemberRole::Admin);
            assert_eq!(role_has_permission(role, UsersManage), is_admin, "{role}");
            assert_eq!(role_has_permission(role, OrganizationManage), is_admin, "{role}");
        }
    }

    #[test]
    fn test_finance_handles_money_but_not_delivery() {
        assert!(role_has_permission(MemberRole::Finance, InvoicesWrite));
        assert!(role_has_permission(MemberRole::Finance, QuotationsWrite));
        assert!(!role_has_permission(MemberRole::Finance, TasksWrite));
        assert!(!role_has_permission(MemberRole::Finance, ProjectsWrite));
    }

    #[test]
    fn test_delivery_roles_track_time() {
        for role in [MemberRole::ProjectManager, MemberRole::TeamLead, MemberRole::Member] {
            assert!(role_has_permission(role, TimeTrack), "{role}");
            assert!(role_has_permission(role, TasksWrite), "{role}");
            assert!(!role_has_permission(role, InvoicesWrite), "{role}");
        }
    }

    #[test]
    fn test_permission_strings_parse_back() {
        for permission in Permission::ALL {
            assert_eq!(Permission::parse(permission.as_str()), Some(permission));
        }
        assert_eq!(Permission::parse("billing:write"), None);
    }

    #[test]
    fn test_role_definitions_serialize_as_strings() {
        let json = serde_json::to_value(role_definitions()).unwrap();
        let client = &json[6];
        assert_eq!(client["role"], "client");
        assert_eq!(client["label"], "Client");
        assert_eq!(client["permissions"][0], "projects:read");
    }
}

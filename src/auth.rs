use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    UniversityAdmin,
    LaboratoryAdmin,
    OrganizationAdmin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "university" | "university_admin" | "onboarding" => Some(Role::UniversityAdmin),
            "laboratory" | "lab" | "laboratory_admin" => Some(Role::LaboratoryAdmin),
            "organization" | "organization_admin" => Some(Role::OrganizationAdmin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::UniversityAdmin => "university_admin",
            Role::LaboratoryAdmin => "laboratory_admin",
            Role::OrganizationAdmin => "organization_admin",
        }
    }

    pub fn allows(self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::UniversityAdmin => matches!(capability, ViewAnalytics | ManageMembers | Export),
            Role::LaboratoryAdmin => matches!(capability, ViewAnalytics | EditShifts),
            Role::OrganizationAdmin => matches!(capability, ManageMembers),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ViewAnalytics,
    ManageMembers,
    EditShifts,
    Export,
}

impl Capability {
    fn as_str(self) -> &'static str {
        match self {
            Capability::ViewAnalytics => "view analytics",
            Capability::ManageMembers => "manage members",
            Capability::EditShifts => "edit shifts",
            Capability::Export => "export member lists",
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionAction {
    CredentialsRejected,
}

#[derive(Debug, Clone)]
pub struct Session {
    role: Role,
    token: Option<String>,
}

impl Session {
    pub fn new(role: Role, token: Option<String>) -> Self {
        Self { role, token }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn reduce(&mut self, action: SessionAction) {
        match action {
            SessionAction::CredentialsRejected => {
                tracing::warn!(role = self.role.as_str(), "credentials rejected, clearing token");
                self.token = None;
            }
        }
    }

    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            Err(Error::Forbidden {
                role: self.role.as_str().to_string(),
                capability: capability.as_str().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laboratory_admin_edits_shifts_only() {
        let session = Session::new(Role::LaboratoryAdmin, None);
        assert!(session.require(Capability::EditShifts).is_ok());
        let err = session.require(Capability::Export).unwrap_err();
        assert_eq!(
            err.to_string(),
            "role laboratory_admin may not export member lists"
        );
    }

    #[test]
    fn rejected_credentials_sign_out() {
        let mut session = Session::new(Role::UniversityAdmin, Some("token".to_string()));
        session.reduce(SessionAction::CredentialsRejected);
        assert!(!session.is_signed_in());
        assert_eq!(session.token(), None);
        assert_eq!(session.role(), Role::UniversityAdmin);
    }

    #[test]
    fn parses_role_aliases() {
        assert_eq!(Role::parse("lab"), Some(Role::LaboratoryAdmin));
        assert_eq!(Role::parse("University-Admin"), Some(Role::UniversityAdmin));
        assert_eq!(Role::parse("root"), None);
    }
}

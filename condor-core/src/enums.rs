//! Enum types for Condor identity records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ROLES
// ============================================================================

/// Coarse global role flag carried by the remote identity principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalRole {
    /// Platform-wide administrator, exempt from tenant scoping.
    Admin,
    #[default]
    User,
}

impl GlobalRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, GlobalRole::Admin)
    }
}

/// Resolved user type of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Global administrator across every tenant.
    AdminMaster,
    /// Building administrator.
    Administrador,
    /// Board administrator.
    Sindico,
    /// Porter at the front desk.
    Porteiro,
    /// Custodian.
    Zelador,
    /// Resident.
    Morador,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::AdminMaster => "admin_master",
            UserType::Administrador => "administrador",
            UserType::Sindico => "sindico",
            UserType::Porteiro => "porteiro",
            UserType::Zelador => "zelador",
            UserType::Morador => "morador",
        }
    }

    /// True for user types allowed to change tenant-level settings.
    pub fn is_administrative(&self) -> bool {
        matches!(
            self,
            UserType::AdminMaster | UserType::Administrador | UserType::Sindico
        )
    }

    /// Permission profile for this user type. `AdminMaster` has no profile:
    /// it is never gated by the per-tenant registry.
    pub fn profile(&self) -> Option<Profile> {
        match self {
            UserType::AdminMaster => None,
            UserType::Administrador => Some(Profile::Administrador),
            UserType::Sindico => Some(Profile::Sindico),
            UserType::Porteiro => Some(Profile::Porteiro),
            UserType::Zelador => Some(Profile::Zelador),
            UserType::Morador => Some(Profile::Morador),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin_master" => Ok(UserType::AdminMaster),
            "administrador" => Ok(UserType::Administrador),
            "sindico" => Ok(UserType::Sindico),
            "porteiro" => Ok(UserType::Porteiro),
            "zelador" => Ok(UserType::Zelador),
            "morador" => Ok(UserType::Morador),
            other => Err(ParseEnumError::new("user type", other)),
        }
    }
}

/// Role category used as the key of the permission registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Morador,
    Porteiro,
    Administrador,
    Zelador,
    Sindico,
}

impl Profile {
    pub const ALL: [Profile; 5] = [
        Profile::Morador,
        Profile::Porteiro,
        Profile::Administrador,
        Profile::Zelador,
        Profile::Sindico,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Morador => "morador",
            Profile::Porteiro => "porteiro",
            Profile::Administrador => "administrador",
            Profile::Zelador => "zelador",
            Profile::Sindico => "sindico",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("profile", s))
    }
}

// ============================================================================
// MEMBERSHIP STATUS
// ============================================================================

/// Approval status of a membership record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    #[default]
    #[serde(alias = "ativo")]
    Aprovado,
    Pendente,
    Inativo,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Aprovado => "aprovado",
            MembershipStatus::Pendente => "pendente",
            MembershipStatus::Inativo => "inativo",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

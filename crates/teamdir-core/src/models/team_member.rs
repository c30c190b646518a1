use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a directory entry. Admin members may delete other members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    #[default]
    Regular,
    Admin,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Regular => "regular",
            MemberRole::Admin => "admin",
        }
    }

    /// Short explanation shown next to the role choice
    pub fn description(&self) -> &'static str {
        match self {
            MemberRole::Regular => "Can't delete members",
            MemberRole::Admin => "Can delete members",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Ok(MemberRole::Regular),
            "admin" => Ok(MemberRole::Admin),
            other => Err(format!("unknown role '{}', expected regular or admin", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    #[serde(default)]
    pub role: MemberRole,
}

impl TeamMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }

    /// Editable fields, for building an update
    pub fn to_draft(&self) -> NewTeamMember {
        NewTeamMember {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Body of a create or update request: a team member without its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewTeamMember {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    #[serde(default)]
    pub role: MemberRole,
}

impl NewTeamMember {
    pub fn into_member(self, id: i64) -> TeamMember {
        TeamMember {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            email: self.email,
            role: self.role,
        }
    }
}

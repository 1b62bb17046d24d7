use std::fmt;

use serde::{Deserialize, Serialize};

/// Portal roles. Only the approving roles ever appear in a route; the rest
/// exist so an identity context can name them and be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Hod,
    Dean,
    Vc,
    President,
    Hr,
    Employee,
    Oric,
    Finance,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Hod,
        Role::Dean,
        Role::Vc,
        Role::President,
        Role::Hr,
        Role::Employee,
        Role::Oric,
        Role::Finance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hod => "hod",
            Self::Dean => "dean",
            Self::Vc => "vc",
            Self::President => "president",
            Self::Hr => "hr",
            Self::Employee => "employee",
            Self::Oric => "oric",
            Self::Finance => "finance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hod" => Some(Self::Hod),
            "dean" => Some(Self::Dean),
            "vc" => Some(Self::Vc),
            "president" => Some(Self::President),
            "hr" => Some(Self::Hr),
            "employee" => Some(Self::Employee),
            "oric" => Some(Self::Oric),
            "finance" => Some(Self::Finance),
            _ => None,
        }
    }

    pub fn is_approver(&self) -> bool {
        matches!(self, Self::Hod | Self::Dean | Self::Vc | Self::President | Self::Hr)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the requester sits in the org chart. Standard leave goes to the
/// requester's direct manager, which depends on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffLevel {
    Department,
    Faculty,
}

impl StaffLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Faculty => "faculty",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "department" => Some(Self::Department),
            "faculty" => Some(Self::Faculty),
            _ => None,
        }
    }

    pub fn direct_manager(&self) -> Role {
        match self {
            Self::Department => Role::Hod,
            Self::Faculty => Role::Dean,
        }
    }
}

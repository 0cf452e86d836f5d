//! Permission default values.

use crate::PermissionError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Value a permission takes when nothing overrides or implies it.
///
/// `Op` and `NotOp` depend on the operator status of the querying subject.
///
/// # Example
///
/// ```
/// use permit_auth::PermissionDefault;
///
/// let default: PermissionDefault = "!op".parse().expect("alias parses");
/// assert_eq!(default, PermissionDefault::NotOp);
/// assert!(default.evaluate(false));
/// assert!(!default.evaluate(true));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PermissionDefault {
    /// Granted to every subject.
    True,
    /// Granted to no subject.
    #[default]
    False,
    /// Granted to operators only.
    Op,
    /// Granted to non-operators only.
    NotOp,
}

impl PermissionDefault {
    /// Resolves the default for a subject with the given operator status.
    #[must_use]
    pub fn evaluate(self, is_op: bool) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Op => is_op,
            Self::NotOp => !is_op,
        }
    }

    /// Returns the canonical text form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Op => "op",
            Self::NotOp => "not_op",
        }
    }
}

impl From<bool> for PermissionDefault {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl FromStr for PermissionDefault {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" => Ok(Self::True),
            "false" => Ok(Self::False),
            "op" | "isop" | "operator" | "isoperator" | "admin" | "isadmin" => Ok(Self::Op),
            "!op" | "notop" | "not_op" | "!operator" | "notoperator" | "!admin" | "notadmin" => {
                Ok(Self::NotOp)
            }
            _ => Err(PermissionError::InvalidDefault {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PermissionDefault {
    type Error = PermissionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionDefault> for String {
    fn from(value: PermissionDefault) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for PermissionDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

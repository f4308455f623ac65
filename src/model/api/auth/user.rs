use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::model::{common::Standing, db::Voter, mongodb::Id};

/// A kind of user the auth service issues tokens for.
pub trait User {
    /// The rights carried by tokens for this user type.
    const RIGHTS: Rights;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Rights {
    Voter,
    Admin,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;
}

/// An election administrator. Admin accounts live entirely in the admin
/// service; the ledger only sees their tokens.
#[derive(Debug)]
pub struct Admin;

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;
}

/// The authenticated voter making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentVoter {
    pub id: Id,
    pub standing: Standing,
}

impl CurrentVoter {
    pub fn is_active(&self) -> bool {
        self.standing == Standing::Active
    }
}

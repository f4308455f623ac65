use serde::{Deserialize, Serialize};

use crate::model::{common::Standing, mongodb::Id};

/// A voter account, as maintained by the auth service.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(default)]
    pub name: String,
    pub standing: Standing,
    /// Elections this voter has voted in. Derived from the votes collection
    /// and only a convenience: the votes themselves are authoritative.
    #[serde(default)]
    pub voted_elections: Vec<Id>,
}

impl Voter {
    pub fn new(name: impl Into<String>, standing: Standing) -> Self {
        Self {
            id: Id::new(),
            name: name.into(),
            standing,
            voted_elections: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.standing == Standing::Active
    }
}

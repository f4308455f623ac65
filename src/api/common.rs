use mongodb::bson::oid;

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

/// An ID taken from the request path, kept as a `Result` so that a malformed
/// one is reported as a bad request instead of an unmatched route.
pub type PathId = std::result::Result<Id, oid::Error>;

pub fn path_id(id: PathId) -> Result<Id> {
    id.map_err(|e| Error::BadRequest(format!("Malformed ID: {e}")))
}

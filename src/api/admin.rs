use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::ledger::reconcile;
use crate::model::api::{
    auth::{Admin, AuthToken},
    reconcile::ReconcileReport,
};
use crate::store::Store;

use super::common::{path_id, PathId};

pub fn routes() -> Vec<Route> {
    routes![reconcile_election]
}

/// Rebuild an election's counters from its vote records.
#[post("/admin/elections/<election_id>/reconcile")]
async fn reconcile_election(
    _token: AuthToken<Admin>,
    election_id: PathId,
    store: &State<Store>,
) -> Result<Json<ReconcileReport>> {
    let election_id = path_id(election_id)?;

    // Recount and repair.
    let report = reconcile(store.inner().as_ref(), election_id).await?;
    Ok(Json(report))
}

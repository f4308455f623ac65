use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::ledger::{get_results, get_tally, Consistency};
use crate::model::{
    api::{election::ElectionSummary, results::ElectionResults, tally::TallyEntry},
    db::Election,
};
use crate::store::Store;

use super::common::{path_id, PathId};

pub fn routes() -> Vec<Route> {
    routes![tally, results, active_elections, upcoming_elections]
}

#[get("/elections/<election_id>/tally?<fresh>")]
async fn tally(
    election_id: PathId,
    fresh: Option<bool>,
    store: &State<Store>,
) -> Result<Json<Vec<TallyEntry>>> {
    let election_id = path_id(election_id)?;

    // Read the cached counters unless fresh counts were asked for.
    let consistency = match fresh {
        Some(true) => Consistency::Strong,
        _ => Consistency::Cached,
    };
    let tally = get_tally(store.inner().as_ref(), election_id, consistency).await?;
    Ok(Json(tally))
}

#[get("/elections/<election_id>/results")]
async fn results(election_id: PathId, store: &State<Store>) -> Result<Json<ElectionResults>> {
    let election_id = path_id(election_id)?;
    let results = get_results(store.inner().as_ref(), election_id).await?;
    Ok(Json(results))
}

/// Published elections whose voting window is open right now.
#[get("/elections/active")]
async fn active_elections(store: &State<Store>) -> Result<Json<Vec<ElectionSummary>>> {
    let now = Utc::now();
    published_where(store, |e| e.window_contains(now)).await
}

/// Published elections that have not opened yet.
#[get("/elections/upcoming")]
async fn upcoming_elections(store: &State<Store>) -> Result<Json<Vec<ElectionSummary>>> {
    let now = Utc::now();
    published_where(store, |e| e.start_time > now).await
}

async fn published_where(
    store: &Store,
    filter: impl Fn(&Election) -> bool,
) -> Result<Json<Vec<ElectionSummary>>> {
    let now = Utc::now();
    // Get the matching elections, earliest first.
    let mut elections: Vec<_> = store
        .published_elections()
        .await?
        .into_iter()
        .filter(|e| filter(e))
        .collect();
    elections.sort_by_key(|e| e.start_time);
    Ok(Json(
        elections
            .into_iter()
            .map(|e| ElectionSummary::at(e, now))
            .collect(),
    ))
}

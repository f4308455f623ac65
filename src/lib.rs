#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

use config::{ConfigFairing, DatabaseFairing};
use ledger::ReconcileSchedulerFairing;
use logging::LoggerFairing;
use store::Store;

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod scheduled_task;
pub mod store;

pub use config::Config;

/// The production server: configuration from `Rocket.toml` and the
/// environment, backed by MongoDB.
pub fn build() -> Rocket<Build> {
    let rocket = rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing);
    with_ledger(rocket)
}

/// A server backed by the given store instead of MongoDB.
pub fn rocket_for_store(store: Store) -> Rocket<Build> {
    rocket_for_figment_and_store(rocket::Config::figment(), store)
}

fn rocket_for_figment_and_store(figment: Figment, store: Store) -> Rocket<Build> {
    let rocket = rocket::custom(figment)
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store);
    with_ledger(rocket)
}

/// Mount the ledger routes and schedule reconciliations.
/// Expects a [`Store`] and [`Config`] to be placed in managed state first.
fn with_ledger(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(ReconcileSchedulerFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

#[cfg(test)]
pub(crate) const TEST_JWT_SECRET: &str = "campus-vote-test-secret";

/// A local client for a server backed by `store`.
#[cfg(test)]
pub(crate) async fn test_client(
    store: &store::MemoryStore,
) -> rocket::local::asynchronous::Client {
    let figment = rocket::Config::figment().merge(("jwt_secret", TEST_JWT_SECRET));
    let store: Store = std::sync::Arc::new(store.clone());
    rocket::local::asynchronous::Client::tracked(rocket_for_figment_and_store(figment, store))
        .await
        .unwrap()
}

/// An `Authorization` header carrying a fresh token for user `id`.
#[cfg(test)]
pub(crate) fn bearer<U: model::api::auth::User>(
    id: model::mongodb::Id,
) -> rocket::http::Header<'static> {
    let jwt = model::api::auth::AuthToken::<U>::new(id)
        .encode(TEST_JWT_SECRET.as_bytes(), chrono::Duration::minutes(10))
        .unwrap();
    rocket::http::Header::new("Authorization", format!("Bearer {jwt}"))
}

/// A MongoDB-backed store on a fresh, uniquely named database, or `None`
/// if no `test_db_uri` is configured. The caller drops the database.
#[cfg(test)]
pub(crate) async fn test_mongo() -> Option<(store::MongoStore, mongodb::Database)> {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("test_db_uri")
        .ok()?;
    let client = mongodb::Client::with_uri_str(&db_uri).await.unwrap();
    let db = client.database(&format!("campus_vote_test_{}", model::mongodb::Id::new()));
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    Some((store::MongoStore::new(client, &db), db))
}

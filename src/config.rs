use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::ensure_indexes_exist;
use crate::store::{MongoStore, Store};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_reconcile_retry_secs")]
    reconcile_retry_secs: u32,
    #[serde(default = "default_reconcile_rescan_secs")]
    reconcile_rescan_secs: u32,
    // secrets
    jwt_secret: String,
}

fn default_reconcile_retry_secs() -> u32 {
    300
}

fn default_reconcile_rescan_secs() -> u32 {
    60
}

impl Config {
    /// Secret key shared with the auth service, used to verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Delay before a failed scheduled reconciliation is retried.
    pub fn reconcile_retry(&self) -> Duration {
        Duration::seconds(self.reconcile_retry_secs.into())
    }

    /// Interval between scans for newly published or rescheduled elections.
    pub fn reconcile_rescan(&self) -> Duration {
        Duration::seconds(self.reconcile_rescan_secs.into())
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the config.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    db_name: Option<String>,
    // secrets
    db_uri: String,
}

const DEFAULT_DB_NAME: &str = "campus_vote";

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the indexes the ledger relies on, and places a [`MongoStore`]
/// into managed state as the [`Store`].
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the database config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");

        // Connect.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db_name = config.db_name.as_deref().unwrap_or(DEFAULT_DB_NAME);
        let db = client.database(db_name);

        // Admission depends on the unique vote index.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online, using `{db_name}`!");

        // Manage the store.
        let store: Store = Arc::new(MongoStore::new(client, &db));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn reconcile_timings_have_defaults() {
        let figment = Figment::new().merge(Serialized::default("jwt_secret", "secret"));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.reconcile_retry(), Duration::seconds(300));
        assert_eq!(config.reconcile_rescan(), Duration::seconds(60));
        assert_eq!(config.jwt_secret(), b"secret");
    }

    #[test]
    fn rescan_interval_is_configurable() {
        let figment = Figment::new()
            .merge(Serialized::default("jwt_secret", "secret"))
            .merge(Serialized::default("reconcile_rescan_secs", 5));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.reconcile_rescan(), Duration::seconds(5));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let figment = Figment::new().merge(Serialized::default("reconcile_retry_secs", 10));
        assert!(figment.extract::<Config>().is_err());
    }
}

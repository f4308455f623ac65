use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{db::Voter, mongodb::Id};
use crate::store::Store;

use super::user::{CurrentVoter, Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
///
/// Tokens are issued by the auth service and signed with the shared
/// `jwt_secret`; this service only verifies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the user with the given ID.
    pub fn new(id: Id) -> Self {
        Self {
            id,
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Sign this token into a JWT valid for `ttl`.
    pub fn encode(self, secret: &[u8], ttl: Duration) -> Result<String, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + ttl,
        };
        let jwt = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )?;
        Ok(jwt)
    }

    /// Verify and decode a JWT.
    pub fn decode(jwt: &str, secret: &[u8]) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            jwt,
            &DecodingKey::from_secret(secret),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// JWT claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Find the raw JWT on a request: a bearer token takes precedence over the cookie.
fn raw_token<'r>(req: &'r Request<'_>) -> Option<&'r str> {
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix("Bearer "))
        .or_else(|| req.cookies().get(AUTH_TOKEN_COOKIE).map(|c| c.value()))
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the request and verify that it has the
    /// correct rights for this user type.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await {
            Outcome::Success(config) => config,
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Status(Status::InternalServerError, "Config not loaded".to_string()),
                ))
            }
        };

        let jwt = match raw_token(req) {
            Some(jwt) => jwt,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("No authentication token".to_string()),
                ))
            }
        };

        let token: Self = match Self::decode(jwt, config.jwt_secret()) {
            Ok(token) => token,
            Err(e) => return Outcome::Failure((Status::Unauthorized, e)),
        };

        if !token.permits(U::RIGHTS) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::Forbidden(format!("Token does not carry {} rights", U::RIGHTS)),
            ));
        }

        Outcome::Success(token)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentVoter {
    type Error = Error;

    /// Resolve the caller's voter token into their identity and standing.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken<Voter>>().await);
        let store = match req.guard::<&State<Store>>().await {
            Outcome::Success(store) => store,
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Status(Status::InternalServerError, "Store not loaded".to_string()),
                ))
            }
        };
        match store.voter(token.id).await {
            Ok(Some(voter)) => Outcome::Success(CurrentVoter {
                id: voter.id,
                standing: voter.standing,
            }),
            Ok(None) => Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized(format!("No voter with ID {}", token.id)),
            )),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::api::auth::user::Admin;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn tokens_round_trip() {
        let id = Id::new();
        let jwt = AuthToken::<Voter>::new(id)
            .encode(SECRET, Duration::minutes(5))
            .unwrap();
        let token = AuthToken::<Voter>::decode(&jwt, SECRET).unwrap();
        assert_eq!(token.id, id);
        assert!(token.permits(Rights::Voter));
        assert!(!token.permits(Rights::Admin));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let jwt = AuthToken::<Admin>::new(Id::new())
            .encode(SECRET, Duration::minutes(5))
            .unwrap();
        assert!(AuthToken::<Admin>::decode(&jwt, b"other-secret").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let jwt = AuthToken::<Voter>::new(Id::new())
            .encode(SECRET, Duration::minutes(-10))
            .unwrap();
        assert!(AuthToken::<Voter>::decode(&jwt, SECRET).is_err());
    }
}

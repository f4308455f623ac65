use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod admin;
mod common;
mod results;
mod voter;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(results::routes());
    routes.extend(voter::routes());
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![json_catcher]
}

/// Render failures that never reached a handler, such as rejected request
/// guards or unmatched routes, in the same JSON shape as handler errors.
#[catch(default)]
fn json_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let error = match status.code {
        400 | 422 => "bad_request",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not_found",
        code if code >= 500 => "internal_error",
        _ => "request_failed",
    };
    let body = ErrorBody {
        error,
        message: status.reason_lossy().to_string(),
    };
    (status, Json(body))
}

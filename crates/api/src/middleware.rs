use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use procureflow_auth::{Principal, Role};
use procureflow_core::UserId;

use crate::context::PrincipalContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Establish the caller from trusted upstream headers.
///
/// A missing or malformed `X-User-Id` is rejected with 401; name and roles
/// are optional.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let principal = principal_from_headers(req.headers())?;

    req.extensions_mut().insert(PrincipalContext::new(principal));

    Ok(next.run(req).await)
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, StatusCode> {
    let user_id: UserId = header_str(headers, USER_ID_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .parse()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let name = header_str(headers, USER_NAME_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| user_id.to_string());

    let mut roles: Vec<Role> = Vec::new();
    for role in header_str(headers, USER_ROLES_HEADER)
        .unwrap_or_default()
        .split(',')
        .filter_map(Role::parse)
    {
        if !roles.contains(&role) {
            roles.push(role);
        }
    }

    Ok(Principal::new(user_id, name, roles))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

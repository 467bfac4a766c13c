//! Stand-in identity provider: a fixed user list and a request extractor that
//! trusts the client-supplied username. Nothing here verifies credentials.

use crate::access::Requester;
use axum::extract::FromRequestParts;
use http::request::Parts;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::convert::Infallible;
use utoipa::ToSchema;

pub const USER_QUERY_PARAM: &str = "user";
pub const USER_COOKIE: &str = "user";
pub const USER_HEADER: &str = "x-user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: String,
}

impl User {
    fn new(id: &str, username: &str, name: &str, role: &str) -> Self {
        Self { id: id.into(), username: username.into(), name: name.into(), role: role.into() }
    }

    pub fn requester(&self) -> Requester {
        Requester::new(self.id.clone(), self.role.clone())
    }
}

/// The first user is the fallback identity.
pub struct UserDirectory {
    users: Vec<User>,
}

impl UserDirectory {
    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn fallback(&self) -> &User {
        &self.users[0]
    }

    pub fn find(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn resolve(&self, username: Option<&str>) -> &User {
        username.and_then(|u| self.find(u)).unwrap_or_else(|| self.fallback())
    }
}

pub static USERS: Lazy<UserDirectory> = Lazy::new(|| UserDirectory {
    users: vec![
        User::new("u1", "alice", "Alice Admin", "Admin"),
        User::new("u2", "mike", "Mike Manager", "Manager"),
        User::new("u3", "victor", "Victor Viewer", "Viewer"),
    ],
});

/// Username claimed by the request: query parameter, then cookie, then header.
pub fn claimed_username(parts: &Parts) -> Option<String> {
    let from_query = parts.uri.query().and_then(|q| {
        serde_urlencoded::from_str::<Vec<(String, String)>>(q)
            .ok()?
            .into_iter()
            .find(|(k, _)| k == USER_QUERY_PARAM)
            .map(|(_, v)| v)
    });
    let from_cookie = || {
        parts
            .headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == USER_COOKIE)
            .map(|(_, v)| v.to_string())
    };
    let from_header = || parts.headers.get(USER_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string);
    from_query.filter(|u| !u.is_empty()).or_else(from_cookie).or_else(from_header)
}

/// Extracts the acting user; never rejects.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn requester(&self) -> Requester {
        self.0.requester()
    }

    pub fn username(&self) -> &str {
        &self.0.username
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claimed = claimed_username(parts);
        Ok(CurrentUser(USERS.resolve(claimed.as_deref()).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    #[test]
    fn query_wins_over_cookie_and_header() {
        let p = parts(
            Request::get("/api/products?user=victor")
                .header("cookie", "user=mike")
                .header(USER_HEADER, "alice")
                .body(())
                .unwrap(),
        );
        assert_eq!(claimed_username(&p).as_deref(), Some("victor"));
    }

    #[test]
    fn cookie_then_header() {
        let p = parts(Request::get("/").header("cookie", "theme=dark; user=mike").header(USER_HEADER, "victor").body(()).unwrap());
        assert_eq!(claimed_username(&p).as_deref(), Some("mike"));

        let p = parts(Request::get("/").header(USER_HEADER, "victor").body(()).unwrap());
        assert_eq!(claimed_username(&p).as_deref(), Some("victor"));
    }

    #[test]
    fn unknown_users_fall_back_to_first() {
        assert_eq!(USERS.resolve(Some("mallory")).username, "alice");
        assert_eq!(USERS.resolve(None).role, "Admin");
        assert_eq!(USERS.resolve(Some("victor")).requester(), Requester::new("u3", "Viewer"));
    }

    #[tokio::test]
    async fn extractor_resolves_from_request() {
        let mut p = parts(Request::get("/?user=mike").body(()).unwrap());
        let CurrentUser(user) = CurrentUser::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(user.id, "u2");
    }
}

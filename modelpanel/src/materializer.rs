//! Turns registered models into live routes.
//!
//! The live router sits behind a lock and only ever grows: a registration
//! merges the model's routes into a fresh router and swaps it in. Requests
//! dispatch through a snapshot, so a request already in flight never sees a
//! half-mounted model.

use crate::handlers::{api, html, ModelContext};
use crate::model::ModelDefinition;
use crate::registry::RegistrationListener;
use crate::store::RecordStore;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use http::Method;
use std::fmt;
use std::sync::{Arc, RwLock};
use tower::ServiceExt;
use tracing::{debug, info};

pub const METHOD_OVERRIDE_PARAM: &str = "_method";

#[derive(Clone, Default)]
pub struct MountedRoutes {
    router: Arc<RwLock<Router>>,
}

impl MountedRoutes {
    pub fn mount(&self, routes: Router) {
        let mut guard = self.router.write().unwrap_or_else(|e| e.into_inner());
        let current = std::mem::take(&mut *guard);
        *guard = current.merge(routes);
    }

    pub fn snapshot(&self) -> Router {
        self.router.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// One materialized endpoint, kept for logging.
pub struct Endpoint {
    pub method: Method,
    pub path: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<7}{}", self.method.as_str(), self.path)
    }
}

pub fn endpoints(model: &ModelDefinition) -> Vec<Endpoint> {
    let t = &model.table_name;
    [
        (Method::GET, format!("/listings/{t}")),
        (Method::POST, format!("/listings/{t}")),
        (Method::GET, format!("/listings/{t}/new")),
        (Method::GET, format!("/listings/{t}/{{id}}")),
        (Method::PUT, format!("/listings/{t}/{{id}}")),
        (Method::DELETE, format!("/listings/{t}/{{id}}")),
        (Method::GET, format!("/listings/{t}/{{id}}/edit")),
        (Method::GET, format!("/api/{t}")),
        (Method::POST, format!("/api/{t}")),
        (Method::GET, format!("/api/{t}/{{id}}")),
        (Method::PUT, format!("/api/{t}/{{id}}")),
        (Method::DELETE, format!("/api/{t}/{{id}}")),
    ]
    .into_iter()
    .map(|(method, path)| Endpoint { method, path })
    .collect()
}

/// Registration listener that mounts the HTML and JSON routes of each model.
pub struct RouteMaterializer {
    store: Arc<dyn RecordStore>,
    mounted: MountedRoutes,
}

impl RouteMaterializer {
    pub fn new(store: Arc<dyn RecordStore>, mounted: MountedRoutes) -> Self {
        Self { store, mounted }
    }

    pub fn model_routes(model: Arc<ModelDefinition>, store: Arc<dyn RecordStore>) -> Router {
        let t = model.table_name.clone();
        Router::new()
            .route(&format!("/listings/{t}"), get(html::list).post(html::create))
            .route(&format!("/listings/{t}/new"), get(html::new_form))
            .route(&format!("/listings/{t}/{{id}}"), get(html::show).put(html::update).delete(html::delete))
            .route(&format!("/listings/{t}/{{id}}/edit"), get(html::edit_form))
            .route(&format!("/api/{t}"), get(api::index).post(api::create))
            .route(&format!("/api/{t}/{{id}}"), get(api::show).put(api::update).delete(api::delete))
            .with_state(ModelContext::new(model, store))
    }
}

impl RegistrationListener for RouteMaterializer {
    fn on_registered(&self, model: &Arc<ModelDefinition>) {
        self.mounted.mount(Self::model_routes(Arc::clone(model), Arc::clone(&self.store)));
        for endpoint in endpoints(model) {
            debug!("{}", endpoint);
        }
        info!("Mounted routes for {} under /listings/{} and /api/{}", model.name, model.table_name, model.table_name);
    }
}

/// HTML forms can only POST; `?_method=PUT|PATCH|DELETE` names the real verb.
pub fn override_method(req: &mut Request) {
    if req.method() != Method::POST {
        return;
    }
    let requested = req.uri().query().and_then(|q| {
        serde_urlencoded::from_str::<Vec<(String, String)>>(q)
            .ok()?
            .into_iter()
            .find(|(k, _)| k == METHOD_OVERRIDE_PARAM)
            .map(|(_, v)| v.to_ascii_uppercase())
    });
    let method = match requested.as_deref() {
        Some("PUT") => Method::PUT,
        Some("PATCH") => Method::PATCH,
        Some("DELETE") => Method::DELETE,
        _ => return,
    };
    *req.method_mut() = method;
}

/// Fallback of the outer router: forwards to the mounted model routes.
pub async fn dispatch(State(mounted): State<MountedRoutes>, mut req: Request) -> Response {
    override_method(&mut req);
    match mounted.snapshot().oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn post(uri: &str) -> Request {
        Request::builder().method(Method::POST).uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn override_applies_to_post_only() {
        let mut req = post("/listings/products/1?_method=delete&user=alice");
        override_method(&mut req);
        assert_eq!(req.method(), Method::DELETE);

        let mut req = Request::builder().method(Method::GET).uri("/x?_method=PUT").body(Body::empty()).unwrap();
        override_method(&mut req);
        assert_eq!(req.method(), Method::GET);

        let mut req = post("/x?_method=TRACE");
        override_method(&mut req);
        assert_eq!(req.method(), Method::POST);
    }

    #[test]
    fn endpoints_cover_both_surfaces() {
        let model = ModelDefinition::new("Product", vec![]);
        let listed: Vec<String> = endpoints(&model).iter().map(|e| e.to_string()).collect();
        assert_eq!(listed.len(), 12);
        assert!(listed.contains(&"DELETE /api/products/{id}".to_string()));
        assert!(listed.contains(&"GET    /listings/products/{id}/edit".to_string()));
    }
}

//! Small router for registering and matching request handlers.
//!
//! Supports:
//! - Exact path matching (e.g. "/api/documents")
//! - Prefix path matching (e.g. "/uploads/")
//! - Method filtering (GET/POST/DELETE)
//! - A fallback handler for requests no route claims
//!
//! `OPTIONS` requests never reach a handler; they are answered with an
//! empty 200 so browsers get the CORS headers for their preflight.
//!
//! Handlers are boxed closures capturing any required state. The router is
//! built once at startup and shared between workers through an `Arc`.

use crate::error::AppError;
use crate::http::{Request, Response};
use crate::response::empty_response;
use log::{debug, trace};

/// Type alias for a request handler closure.
pub type Handler = Box<dyn Fn(&Request) -> Result<Response, AppError> + Send + Sync + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum MatchKind {
    Exact,
    Prefix,
}

struct RouteEntry {
    method: String,
    path: String,
    kind: MatchKind,
    handler: Handler,
}

#[derive(Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
    fallback: Option<Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: None,
        }
    }

    /// Register an exact path match for the given HTTP method.
    pub fn register_exact<M, P>(&mut self, method: M, path: P, handler: Handler)
    where
        M: Into<String>,
        P: Into<String>,
    {
        self.routes.push(RouteEntry {
            method: method.into().to_uppercase(),
            path: path.into(),
            kind: MatchKind::Exact,
            handler,
        });
    }

    /// Register a prefix path match for the given HTTP method.
    pub fn register_prefix<M, P>(&mut self, method: M, prefix: P, handler: Handler)
    where
        M: Into<String>,
        P: Into<String>,
    {
        self.routes.push(RouteEntry {
            method: method.into().to_uppercase(),
            path: prefix.into(),
            kind: MatchKind::Prefix,
            handler,
        });
    }

    /// Handler invoked when no registered route matches.
    pub fn set_fallback(&mut self, handler: Handler) {
        self.fallback = Some(handler);
    }

    /// Resolve a request to a response.
    ///
    /// Unmatched requests go to the fallback, or fail with 404 when none is set.
    pub fn route(&self, request: &Request) -> Result<Response, AppError> {
        debug!("Routing request: {} {}", request.method, request.path);
        trace!("Available routes: {}", self.routes.len());

        let method = request.method.to_uppercase();
        if method == "OPTIONS" {
            trace!("Answering CORS preflight for {}", request.path);
            return Ok(empty_response(200));
        }

        // Match against the path without query string so "/api/documents?x=y" works
        let path_only = request.path_only();
        for entry in &self.routes {
            if entry.method != method {
                continue;
            }
            let is_match = match entry.kind {
                MatchKind::Exact => path_only == entry.path,
                MatchKind::Prefix => path_only.starts_with(&entry.path),
            };
            if is_match {
                debug!(
                    "Route matched: {} {} ({:?})",
                    entry.method, entry.path, entry.kind
                );
                return (entry.handler)(request);
            }
        }

        match &self.fallback {
            Some(fallback) => {
                debug!("No route matched, using fallback for: {} {}", method, path_only);
                fallback(request)
            }
            None => {
                debug!("No route matched for: {} {}", request.method, request.path);
                Err(AppError::not_found("Not found"))
            }
        }
    }
}

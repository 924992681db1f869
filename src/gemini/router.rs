//! Maps an incoming request path to a handler using an ordered list of regex
//! patterns with capture groups. Dispatch picks the first full match; flags
//! are a configuration set applied by the caller around the handler
//! invocation, not an inheritance hierarchy: `requiresAuth` gates on `Status
//! 61`, `userMenu` asks the caller to append a standard footer after a
//! successful response, and `throttle:<key>` documents which edit-throttle
//! class a mutating route belongs to (the handler itself checks the actor's
//! last-edit timestamp, since the throttle key determines which column to
//! compare against).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;

use crate::app_error::AppError;
use crate::gemini::request::Request;
use crate::gemini::writer::Writer;
use crate::server::{Conn, Handler};

#[derive(Clone, Debug, Default)]
pub struct RouteFlags {
    pub requires_auth: bool,
    pub user_menu: bool,
    pub throttle: Option<&'static str>,
}

impl RouteFlags {
    pub fn none() -> Self {
        RouteFlags::default()
    }

    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn user_menu(mut self) -> Self {
        self.user_menu = true;
        self
    }

    pub fn throttle(mut self, key: &'static str) -> Self {
        self.throttle = Some(key);
        self
    }
}

pub type HandlerFn = for<'a> fn(
    &'a Arc<Handler>,
    &'a mut Writer<Conn>,
    &'a Request,
    Vec<String>,
) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

struct Route {
    pattern: Regex,
    flags: RouteFlags,
    handler: HandlerFn,
    name: &'static str,
}

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Router { routes: Vec::new() }
    }

    /// `pattern` is anchored automatically (`^pattern$`); panics at startup
    /// on an invalid pattern rather than tolerating a broken route table at
    /// runtime.
    pub fn route(mut self, name: &'static str, pattern: &str, flags: RouteFlags, handler: HandlerFn) -> Self {
        let anchored = format!("^{pattern}$");
        let re = Regex::new(&anchored)
            .unwrap_or_else(|e| panic!("route {name} has an invalid pattern {pattern}: {e}"));
        self.routes.push(Route {
            pattern: re,
            flags,
            handler,
            name,
        });
        self
    }

    pub fn dispatch(&self, path: &str) -> Option<(&'static str, &RouteFlags, HandlerFn, Vec<String>)> {
        for route in &self.routes {
            if let Some(caps) = route.pattern.captures(path) {
                let groups = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Some((route.name, &route.flags, route.handler, groups));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<'a>(
        _h: &'a Arc<Handler>,
        _w: &'a mut Writer<Conn>,
        _r: &'a Request,
        _caps: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn dispatch_picks_first_full_match() {
        let router = Router::new()
            .route("a", r"/users", RouteFlags::none(), noop)
            .route(
                "b",
                r"/users/outbox/(.+)",
                RouteFlags::none().requires_auth(),
                noop,
            );

        assert!(router.dispatch("/users").is_some());
        let (name, flags, _h, caps) = router.dispatch("/users/outbox/srv/user/alice").unwrap();
        assert_eq!(name, "b");
        assert!(flags.requires_auth);
        assert_eq!(caps, vec!["srv/user/alice".to_string()]);
    }

    #[test]
    fn dispatch_requires_a_full_match_not_a_prefix() {
        let router = Router::new().route("a", r"/users", RouteFlags::none(), noop);
        assert!(router.dispatch("/users/outbox/srv/user/alice").is_none());
    }

    #[test]
    fn unmatched_path_returns_none() {
        let router = Router::new().route("a", r"/users", RouteFlags::none(), noop);
        assert!(router.dispatch("/nope").is_none());
    }
}

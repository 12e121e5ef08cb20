use std::sync::PoisonError;
use std::sync::RwLock;

use tracing::debug;

/// The navigable surfaces of the application, from the router's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Signup,
    Dashboard,
}

impl Route {
    /// Login/signup surfaces, off-limits while authenticated.
    pub fn is_auth_surface(self) -> bool {
        matches!(self, Route::Login | Route::Signup)
    }

    /// Surfaces that require an authenticated session.
    pub fn is_protected(self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

/// Seam between session logic and whatever renders the current view.
///
/// `navigate` is a pure in-process route change: implementations must not
/// perform network calls, so the transport's 401 handling cannot loop.
pub trait Navigator: Send + Sync {
    fn current(&self) -> Route;
    fn navigate(&self, route: Route);
}

/// Navigator that just tracks the current route. Used by headless consumers
/// (the CLI, tests) that have no real view layer.
pub struct InMemoryNavigator {
    current: RwLock<Route>,
}

impl InMemoryNavigator {
    pub fn new(initial: Route) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }
}

impl Navigator for InMemoryNavigator {
    fn current(&self) -> Route {
        *self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn navigate(&self, route: Route) {
        debug!(?route, "navigating");
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = route;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_classification() {
        assert!(Route::Login.is_auth_surface());
        assert!(Route::Signup.is_auth_surface());
        assert!(!Route::Dashboard.is_auth_surface());
        assert!(Route::Dashboard.is_protected());
        assert!(!Route::Landing.is_protected());
    }

    #[test]
    fn in_memory_navigator_tracks_current_route() {
        let nav = InMemoryNavigator::new(Route::Landing);
        assert_eq!(nav.current(), Route::Landing);
        nav.navigate(Route::Dashboard);
        assert_eq!(nav.current(), Route::Dashboard);
    }
}

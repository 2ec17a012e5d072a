//! Navigable screens and the login guard in front of the protected ones.

use std::fmt;

use crate::auth::AuthSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Signup,
    ConfirmEmail,
    Chat,
    Quiz,
    Progress,
    TopicsToReview,
    NotFound,
}

impl Route {
    pub const ALL: [Route; 9] = [
        Route::Home,
        Route::Login,
        Route::Signup,
        Route::ConfirmEmail,
        Route::Chat,
        Route::Quiz,
        Route::Progress,
        Route::TopicsToReview,
        Route::NotFound,
    ];

    /// Map a path to its screen. Query strings, fragments and a trailing
    /// slash are ignored; anything unknown is `NotFound`.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        match path {
            "" => Route::Home,
            "/login" => Route::Login,
            "/signup" => Route::Signup,
            "/auth/confirm" => Route::ConfirmEmail,
            "/chat" => Route::Chat,
            "/mcq-quiz" => Route::Quiz,
            "/progress" => Route::Progress,
            "/topics-to-review" => Route::TopicsToReview,
            _ => Route::NotFound,
        }
    }

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::ConfirmEmail => "/auth/confirm",
            Route::Chat => "/chat",
            Route::Quiz => "/mcq-quiz",
            Route::Progress => "/progress",
            Route::TopicsToReview => "/topics-to-review",
            Route::NotFound => "/404",
        }
    }

    #[must_use]
    pub fn is_protected(self) -> bool {
        matches!(
            self,
            Route::Chat | Route::Quiz | Route::Progress | Route::TopicsToReview
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted(Route),
    Redirect(Route),
}

impl Access {
    /// The screen that ends up shown.
    #[must_use]
    pub fn route(self) -> Route {
        match self {
            Access::Granted(route) | Access::Redirect(route) => route,
        }
    }
}

/// Send visitors without a session to the login screen.
#[must_use]
pub fn resolve(route: Route, session: Option<&AuthSession>) -> Access {
    if route.is_protected() && session.is_none() {
        Access::Redirect(Route::Login)
    } else {
        Access::Granted(route)
    }
}

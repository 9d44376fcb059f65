//! Request extractors for the caller identity and display preferences.

use axum::extract::FromRequestParts;
use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::{StatusCode, request::Parts};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::application::error::HttpError;
use crate::application::viewer::Viewer;
use crate::domain::preferences::{PreferenceSources, Preferences};

use super::AppState;

/// Header carrying the authenticated user id, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

pub const LOCALE_COOKIE: &str = "NEXT_LOCALE";
pub const THEME_COOKIE: &str = "theme";
pub const CONSENT_COOKIE: &str = "cookieConsent";

/// Client hint carrying the platform colour scheme.
pub const COLOR_SCHEME_HINT: &str = "sec-ch-prefers-color-scheme";

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        const SOURCE: &str = "infra::http::extract::Viewer";

        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Viewer::anonymous());
        };

        let user_id = value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| {
                HttpError::new(
                    SOURCE,
                    StatusCode::BAD_REQUEST,
                    "Invalid user identity",
                    format!("`{USER_ID_HEADER}` is not a valid UUID"),
                )
            })?;

        Ok(Viewer::signed_in(user_id))
    }
}

impl FromRequestParts<AppState> for Preferences {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let accept_language = parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());

        let sources = PreferenceSources {
            locale_cookie: jar.get(LOCALE_COOKIE).map(|cookie| cookie.value()),
            theme_cookie: jar.get(THEME_COOKIE).map(|cookie| cookie.value()),
            consent_cookie: jar.get(CONSENT_COOKIE).map(|cookie| cookie.value()),
            accept_language,
        };

        Ok(Preferences::resolve(sources, state.default_locale))
    }
}

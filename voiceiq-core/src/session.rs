//! Session reconciliation.
//!
//! A user can be known through the primary session, through a persisted
//! [`IdentityAssertion`], or both. Everything displaying "the current user"
//! goes through [`reconcile`], so both sources collapse into one [`Session`].

use crate::{
    assertion::IdentityAssertion,
    store::{
        load_assertion, load_primary_session, KeyValueStore, IDENTITY_SLOT, PRIMARY_SESSION_SLOT,
    },
};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Name shown when nobody is signed in
pub const GUEST_NAME: &str = "Guest";

/// Entry point for signing in
pub const LOGIN_ROUTE: &str = "/login";

/// Where users land after signing in
pub const HOME_ROUTE: &str = "/";

/// Paths that are never guarded
const PUBLIC_PREFIXES: [&str; 4] = ["/api", "/_next/static", "/_next/image", "/favicon.ico"];

/// The session of the primary sign-in mechanism
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySession {
    /// Subject identifier
    pub id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Avatar image
    pub image: Option<String>,
}

/// The unified view of the current user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Display name, if known
    pub name: Option<String>,
    /// Email address, if known
    pub email: Option<String>,
    /// Avatar image
    pub avatar_source: Option<String>,
    /// Whether an identity assertion backs this session
    pub verified_externally: bool,
    /// Whether any sign-in mechanism backs this session
    pub authenticated: bool,
}

impl Session {
    /// The name to greet the user with
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(GUEST_NAME)
    }

    /// Avatar fallback: first two characters of the name, or `??`
    pub fn initials(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => {
                name.chars().take(2).collect::<String>().to_uppercase()
            }
            _ => "??".to_string(),
        }
    }
}

/// Merge the primary session and the identity assertion.
///
/// Primary session fields win where both are present. The external
/// verification badge only depends on the assertion being there.
pub fn reconcile(
    primary: Option<&PrimarySession>,
    assertion: Option<&IdentityAssertion>,
) -> Session {
    Session {
        name: primary
            .and_then(|session| session.name.clone())
            .or_else(|| assertion.map(|assertion| assertion.name.clone())),
        email: primary
            .and_then(|session| session.email.clone())
            .or_else(|| assertion.map(|assertion| assertion.email.clone())),
        avatar_source: primary
            .and_then(|session| session.image.clone())
            .or_else(|| assertion.map(IdentityAssertion::flag_image_url)),
        verified_externally: assertion.is_some(),
        authenticated: primary.is_some() || assertion.is_some(),
    }
}

/// Read both sources from the store and reconcile them
pub fn current_session(store: &impl KeyValueStore) -> Result<Session> {
    let primary = load_primary_session(store)?;
    let assertion = load_assertion(store)?;

    tracing::debug!(
        has_primary = primary.is_some(),
        has_assertion = assertion.is_some(),
        "Reconciling session"
    );

    Ok(reconcile(primary.as_ref(), assertion.as_ref()))
}

/// Forget the user: clear the assertion and end the primary session.
///
/// Returns the route to navigate to afterwards.
pub fn logout(store: &impl KeyValueStore) -> Result<&'static str> {
    store.remove(IDENTITY_SLOT)?;
    store.remove(PRIMARY_SESSION_SLOT)?;
    tracing::info!("Cleared identity assertion and primary session");
    Ok(LOGIN_ROUTE)
}

/// Outcome of guarding a navigation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    /// Show the requested path
    Proceed,
    /// Go somewhere else instead
    Redirect(&'static str),
}

/// Decide where a navigation to `path` should land.
///
/// Signed-out users only get to see the login pages, signed-in
/// users get sent home from them.
pub fn guard_route(path: &str, session: &Session) -> RouteDecision {
    if PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return RouteDecision::Proceed;
    }

    let is_login_page = path.starts_with(LOGIN_ROUTE);

    match (session.authenticated, is_login_page) {
        (false, false) => RouteDecision::Redirect(LOGIN_ROUTE),
        (true, true) => RouteDecision::Redirect(HOME_ROUTE),
        _ => RouteDecision::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{save_assertion, save_slot, MemoryStore};
    use testresult::TestResult;

    fn assertion() -> IdentityAssertion {
        IdentityAssertion {
            name: "Amelie".to_string(),
            email: "amelie@example.test".to_string(),
            claimant: "Identity confirmed. Country Code: FR".to_string(),
        }
    }

    fn primary() -> PrimarySession {
        PrimarySession {
            id: Some("1234".to_string()),
            name: Some("Amélie Poulain".to_string()),
            email: Some("amelie@primary.test".to_string()),
            image: Some("https://images.example.test/amelie.png".to_string()),
        }
    }

    #[test]
    fn test_guest() {
        let session = reconcile(None, None);
        assert_eq!(session.display_name(), "Guest");
        assert_eq!(session.initials(), "??");
        assert!(!session.authenticated);
        assert!(!session.verified_externally);
        assert_eq!(session.avatar_source, None);
    }

    #[test]
    fn test_assertion_only() {
        let session = reconcile(None, Some(&assertion()));
        assert_eq!(session.display_name(), "Amelie");
        assert_eq!(session.email.as_deref(), Some("amelie@example.test"));
        assert_eq!(
            session.avatar_source.as_deref(),
            Some("https://flagcdn.com/w80/fr.png")
        );
        assert_eq!(session.initials(), "AM");
        assert!(session.authenticated);
        assert!(session.verified_externally);
    }

    #[test]
    fn test_primary_wins_but_badge_stays() {
        let session = reconcile(Some(&primary()), Some(&assertion()));
        assert_eq!(session.display_name(), "Amélie Poulain");
        assert_eq!(session.email.as_deref(), Some("amelie@primary.test"));
        assert_eq!(
            session.avatar_source.as_deref(),
            Some("https://images.example.test/amelie.png")
        );
        assert!(session.verified_externally);
    }

    #[test]
    fn test_assertion_fills_missing_primary_fields() {
        let partial = PrimarySession {
            id: Some("1234".to_string()),
            name: Some("Amélie Poulain".to_string()),
            ..Default::default()
        };
        let session = reconcile(Some(&partial), Some(&assertion()));
        assert_eq!(session.display_name(), "Amélie Poulain");
        assert_eq!(session.email.as_deref(), Some("amelie@example.test"));
        assert_eq!(
            session.avatar_source.as_deref(),
            Some("https://flagcdn.com/w80/fr.png")
        );
    }

    #[test]
    fn test_primary_only() {
        let session = reconcile(Some(&primary()), None);
        assert!(session.authenticated);
        assert!(!session.verified_externally);
    }

    #[test_log::test]
    fn test_current_session_and_logout() -> TestResult {
        let store = MemoryStore::new();
        save_assertion(&store, &assertion())?;
        save_slot(&store, PRIMARY_SESSION_SLOT, &primary())?;

        let session = current_session(&store)?;
        assert_eq!(session.display_name(), "Amélie Poulain");
        assert!(session.verified_externally);

        assert_eq!(logout(&store)?, LOGIN_ROUTE);
        assert_eq!(current_session(&store)?, reconcile(None, None));

        // logging out twice is harmless
        assert_eq!(logout(&store)?, LOGIN_ROUTE);

        Ok(())
    }

    #[test]
    fn test_guard_route() {
        let guest = reconcile(None, None);
        let user = reconcile(None, Some(&assertion()));

        assert_eq!(guard_route("/", &guest), RouteDecision::Redirect("/login"));
        assert_eq!(
            guard_route("/reports/42", &guest),
            RouteDecision::Redirect("/login")
        );
        assert_eq!(guard_route("/login", &guest), RouteDecision::Proceed);

        assert_eq!(guard_route("/", &user), RouteDecision::Proceed);
        assert_eq!(guard_route("/upload", &user), RouteDecision::Proceed);
        assert_eq!(guard_route("/login", &user), RouteDecision::Redirect("/"));

        assert_eq!(guard_route("/api/reports", &guest), RouteDecision::Proceed);
        assert_eq!(guard_route("/favicon.ico", &guest), RouteDecision::Proceed);
    }
}

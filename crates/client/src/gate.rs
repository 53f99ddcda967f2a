//! Admission control for role-restricted screens.
//!
//! A screen declares an [`AccessPolicy`]; the gate evaluates it against the
//! current session and either allows rendering, redirects, or blocks. The
//! gate never throws and never writes session or cart state - denial always
//! resolves into a navigation decision, so role-restricted routes are
//! invisible rather than error-visible.

use tracing::debug;

use tradehub_core::Role;

use crate::session::{Session, SessionHandle};

/// Destination of the sign-in flow.
pub const SIGN_IN_PATH: &str = "/auth/login";

/// Query parameter carrying the original destination through sign-in.
pub const RETURN_TO_PARAM: &str = "return_to";

/// Declarative access requirement attached to a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Roles admitted to the screen. Empty means any authenticated role.
    pub allowed_roles: Vec<Role>,
    /// Whether an anonymous session is redirected to sign-in (carrying the
    /// original destination) or silently blocked from rendering.
    pub redirect_unauthenticated: bool,
}

impl AccessPolicy {
    /// Any authenticated role; anonymous sessions are sent to sign-in.
    #[must_use]
    pub const fn any_authenticated() -> Self {
        Self {
            allowed_roles: Vec::new(),
            redirect_unauthenticated: true,
        }
    }

    /// Only the given roles; anonymous sessions are sent to sign-in.
    #[must_use]
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed_roles: roles.into_iter().collect(),
            redirect_unauthenticated: true,
        }
    }

    /// Block anonymous sessions silently instead of redirecting.
    #[must_use]
    pub fn without_sign_in_redirect(mut self) -> Self {
        self.redirect_unauthenticated = false;
        self
    }

    fn allows(&self, role: Role) -> bool {
        self.allowed_roles.is_empty() || self.allowed_roles.contains(&role)
    }
}

/// Result of evaluating a policy against a session.
///
/// Terminal per navigation; re-evaluated on every session change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Render the protected content.
    Allowed,
    /// Navigate away instead of rendering.
    Redirect(String),
    /// Render nothing and perform no redirect.
    Blocked,
}

/// Abstract navigation capability.
///
/// The client shell provides the real implementation; tests record calls.
pub trait Navigator: Send + Sync {
    /// The current path, including any query string.
    fn current_path(&self) -> String;
    /// Navigate to the given path.
    fn redirect_to(&self, path: &str);
}

/// Evaluates an [`AccessPolicy`] against session snapshots.
#[derive(Debug, Clone)]
pub struct AccessGate {
    policy: AccessPolicy,
}

impl AccessGate {
    /// Create a gate for the given policy.
    #[must_use]
    pub const fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    /// Evaluate the policy against a session snapshot.
    ///
    /// Pure: no side effects, no session writes. `current_path` is carried
    /// into the sign-in redirect as the return target, percent-encoded so
    /// it round-trips exactly, query string included.
    #[must_use]
    pub fn evaluate(&self, session: &Session, current_path: &str) -> AccessDecision {
        let Some(user) = &session.user else {
            if self.policy.redirect_unauthenticated {
                return AccessDecision::Redirect(sign_in_redirect(current_path));
            }
            return AccessDecision::Blocked;
        };

        if self.policy.allows(user.role) {
            return AccessDecision::Allowed;
        }

        // Wrong role: send the session to its own canonical home. Those
        // destinations are unguarded, so this can never loop.
        debug!(role = %user.role, path = %current_path, "role denied, redirecting home");
        AccessDecision::Redirect(user.role.canonical_home().to_owned())
    }

    /// Evaluate and perform the redirect side effect if denied.
    pub fn enforce(&self, session: &Session, navigator: &dyn Navigator) -> AccessDecision {
        let decision = self.evaluate(session, &navigator.current_path());
        if let AccessDecision::Redirect(path) = &decision {
            navigator.redirect_to(path);
        }
        decision
    }

    /// Enforce now and on every session transition while mounted.
    ///
    /// Returns the first non-allowed decision after performing its
    /// redirect - an identity disappearing under a mounted screen redirects
    /// immediately rather than leaving stale protected content visible.
    /// Returns `Allowed` if the session handle is dropped while still
    /// admitted.
    pub async fn watch(&self, session: &SessionHandle, navigator: &dyn Navigator) -> AccessDecision {
        let mut rx = session.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            let decision = self.enforce(&snapshot, navigator);
            if decision != AccessDecision::Allowed {
                return decision;
            }
            if rx.changed().await.is_err() {
                return AccessDecision::Allowed;
            }
        }
    }
}

/// Build the sign-in redirect carrying the original destination.
fn sign_in_redirect(return_to: &str) -> String {
    format!(
        "{SIGN_IN_PATH}?{RETURN_TO_PARAM}={}",
        urlencoding::encode(return_to)
    )
}

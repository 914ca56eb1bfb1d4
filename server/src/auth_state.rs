use crate::store::Writable;
use crate::subscription::Subscription;

/// The signed-in user as seen by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl User {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }
}

pub type AuthListener = Box<dyn Fn(Option<User>) + Send + Sync>;

/// Client-side view of the identity provider
pub trait AuthState: Send + Sync {
    /// The user the provider currently has cached, if any
    fn current_user(&self) -> Option<User>;

    /// Register for identity changes. The listener is called with the current user
    /// on registration and again on every sign-in or sign-out.
    fn on_auth_state_changed(&self, listener: AuthListener) -> Subscription;
}

/// Auth state kept in memory and driven by its owner
#[derive(Clone)]
pub struct LocalAuth {
    user: Writable<Option<User>>,
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuth {
    pub fn new() -> Self {
        Self {
            user: Writable::new(None),
        }
    }

    pub fn sign_in(&self, user: User) {
        self.user.set(Some(user));
    }

    pub fn sign_out(&self) {
        self.user.set(None);
    }
}

impl AuthState for LocalAuth {
    fn current_user(&self) -> Option<User> {
        self.user.get()
    }

    fn on_auth_state_changed(&self, listener: AuthListener) -> Subscription {
        self.user.subscribe(move |user| listener(user.clone()))
    }
}

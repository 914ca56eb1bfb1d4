//! Binds the signed-in user to their realtime profile document.
//!
//! [`UserData`] follows a [`UserStore`] and keeps exactly one subscription open
//! against `/users/{uid}` while an identity is known:
//!
//! - `NoIdentity`: nothing open, value is `None`
//! - `Opening`: identity known, subscription being established
//! - `Subscribed`: identity known, snapshots flowing
//!
//! Every identity change bumps a generation counter. Snapshot callbacks carry the
//! generation they were opened under and are discarded once it is no longer current,
//! so an in-flight snapshot from a previous user can never overwrite the new one.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::auth_state::{AuthState, User};
use crate::documents::{decode_snapshot, DocumentFeed, DocumentPath};
use crate::profile::UserProfile;
use crate::store::{Readable, Setter};
use crate::subscription::Subscription;

/// Store of the current user
#[derive(Clone)]
pub struct UserStore {
    auth: Option<Arc<dyn AuthState>>,
    store: Readable<Option<User>>,
}

impl UserStore {
    /// Follow `auth` while the store has listeners.
    ///
    /// Without an auth collaborator the store stays signed out for good.
    pub fn new(auth: Option<Arc<dyn AuthState>>) -> Self {
        let Some(auth) = auth else {
            warn!("Auth is not initialized, user store will stay signed out");
            return Self {
                auth: None,
                store: Readable::constant(None),
            };
        };

        let initial = auth.current_user();
        let upstream = auth.clone();
        let store = Readable::new(initial, move |set: Setter<Option<User>>| {
            upstream.on_auth_state_changed(Box::new(move |user| set.set(user)))
        });

        Self {
            auth: Some(auth),
            store,
        }
    }

    /// The current user. Asks the auth collaborator directly while nobody is
    /// following the store.
    pub fn get(&self) -> Option<User> {
        match &self.auth {
            Some(auth) if self.store.listener_count() == 0 => auth.current_user(),
            _ => self.store.get(),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&Option<User>) + Send + Sync + 'static) -> Subscription {
        self.store.subscribe(listener)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingStatus {
    NoIdentity,
    Opening(DocumentPath),
    Subscribed(DocumentPath),
}

enum Phase {
    NoIdentity,
    Opening {
        uid: String,
        path: DocumentPath,
    },
    Subscribed {
        uid: String,
        path: DocumentPath,
        _subscription: Subscription,
    },
}

impl Phase {
    fn uid(&self) -> Option<&str> {
        match self {
            Phase::NoIdentity => None,
            Phase::Opening { uid, .. } | Phase::Subscribed { uid, .. } => Some(uid),
        }
    }
}

struct Binding {
    generation: u64,
    phase: Phase,
}

/// The signed-in user's profile document, kept live
#[derive(Clone)]
pub struct UserData {
    store: Readable<Option<UserProfile>>,
    binding: Arc<Mutex<Binding>>,
}

impl UserData {
    pub fn new(users: &UserStore, feed: Arc<dyn DocumentFeed>) -> Self {
        let binding = Arc::new(Mutex::new(Binding {
            generation: 0,
            phase: Phase::NoIdentity,
        }));

        let users = users.clone();
        let state = binding.clone();
        let store = Readable::new(None, move |set: Setter<Option<UserProfile>>| {
            let identity_state = state.clone();
            let feed = feed.clone();
            let identity = users.subscribe(move |user| {
                apply_identity(&identity_state, &feed, &set, user.as_ref());
            });

            let state = state.clone();
            Subscription::new(move || {
                drop(identity);
                let released = {
                    let mut binding = state.lock();
                    binding.generation += 1;
                    std::mem::replace(&mut binding.phase, Phase::NoIdentity)
                };
                drop(released);
                debug!("Last profile listener left, bindings released");
            })
        });

        Self { store, binding }
    }

    pub fn get(&self) -> Option<UserProfile> {
        self.store.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&Option<UserProfile>) + Send + Sync + 'static,
    ) -> Subscription {
        self.store.subscribe(listener)
    }

    pub fn status(&self) -> BindingStatus {
        match &self.binding.lock().phase {
            Phase::NoIdentity => BindingStatus::NoIdentity,
            Phase::Opening { path, .. } => BindingStatus::Opening(path.clone()),
            Phase::Subscribed { path, .. } => BindingStatus::Subscribed(path.clone()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.binding.lock().generation
    }
}

fn is_current(binding: &Mutex<Binding>, generation: u64) -> bool {
    binding.lock().generation == generation
}

fn apply_identity(
    binding: &Arc<Mutex<Binding>>,
    feed: &Arc<dyn DocumentFeed>,
    set: &Setter<Option<UserProfile>>,
    user: Option<&User>,
) {
    let (generation, released) = {
        let mut state = binding.lock();
        if let (Some(user), Some(current)) = (user, state.phase.uid()) {
            if user.uid == current {
                return;
            }
        }

        state.generation += 1;
        let next = match user {
            Some(user) => Phase::Opening {
                uid: user.uid.clone(),
                path: DocumentPath::for_user(&user.uid),
            },
            None => Phase::NoIdentity,
        };
        (state.generation, std::mem::replace(&mut state.phase, next))
    };

    // The old subscription is closed before the next one opens
    drop(released);

    // Nothing of the previous user's document outlives their identity
    set.set_if(None, |current| {
        current.is_some() && is_current(binding, generation)
    });

    let Some(user) = user else {
        debug!(generation, "Identity cleared");
        return;
    };

    let path = DocumentPath::for_user(&user.uid);
    let guard = Arc::downgrade(binding);
    let snapshot_set = set.clone();
    let snapshot_path = path.clone();
    let subscription = feed.subscribe(
        &path,
        Box::new(move |snapshot| {
            let profile = decode_snapshot::<UserProfile>(&snapshot_path, snapshot);
            let applied = snapshot_set.set_if(profile, |_| {
                guard
                    .upgrade()
                    .is_some_and(|binding| is_current(&binding, generation))
            });

            if !applied {
                debug!(path = %snapshot_path, generation, "Dropped snapshot from superseded subscription");
            }
        }),
    );

    let mut state = binding.lock();
    if state.generation == generation {
        info!(%path, generation, "Subscribed to profile document");
        state.phase = Phase::Subscribed {
            uid: user.uid.clone(),
            path,
            _subscription: subscription,
        };
    } else {
        // Superseded while opening
        drop(state);
        drop(subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_state::LocalAuth;
    use crate::documents::MemoryDocumentStore;
    use serde_json::json;

    #[test]
    fn test_user_store_without_auth_stays_signed_out() {
        let users = UserStore::new(None);
        let _sub = users.subscribe(|_| {});

        assert_eq!(users.get(), None);
    }

    #[test]
    fn test_user_store_starts_from_cached_user() {
        let auth = LocalAuth::new();
        auth.sign_in(User::new("cached"));

        let users = UserStore::new(Some(Arc::new(auth)));

        assert_eq!(users.get().map(|u| u.uid), Some("cached".to_owned()));
    }

    #[test]
    fn test_idle_user_store_reads_current_auth() {
        let auth = LocalAuth::new();
        let users = UserStore::new(Some(Arc::new(auth.clone())));

        auth.sign_in(User::new("later"));
        assert_eq!(users.get().map(|u| u.uid), Some("later".to_owned()));

        let sub = users.subscribe(|_| {});
        auth.sign_out();
        assert_eq!(users.get(), None);

        drop(sub);
        auth.sign_in(User::new("again"));
        assert_eq!(users.get().map(|u| u.uid), Some("again".to_owned()));
    }

    #[test]
    fn test_same_uid_does_not_resubscribe() {
        let auth = LocalAuth::new();
        let memory = MemoryDocumentStore::new();
        let users = UserStore::new(Some(Arc::new(auth.clone())));
        let data = UserData::new(&users, Arc::new(memory.clone()));
        let _sub = data.subscribe(|_| {});

        auth.sign_in(User::new("u1"));
        let generation = data.generation();

        let mut refreshed = User::new("u1");
        refreshed.email = Some("u1@example.com".to_owned());
        auth.sign_in(refreshed);

        assert_eq!(data.generation(), generation);
        assert_eq!(memory.active_subscriptions(), 1);
    }

    #[test]
    fn test_document_deleted_yields_none() {
        let auth = LocalAuth::new();
        let memory = MemoryDocumentStore::new();
        let path = DocumentPath::for_user("u1");
        memory.set_document(&path, &json!({ "username": "one" })).unwrap();

        let users = UserStore::new(Some(Arc::new(auth.clone())));
        let data = UserData::new(&users, Arc::new(memory.clone()));
        let _sub = data.subscribe(|_| {});
        auth.sign_in(User::new("u1"));
        assert!(data.get().is_some());

        memory.delete_document(&path);

        assert_eq!(data.get(), None);
        assert_eq!(data.status(), BindingStatus::Subscribed(path));
    }
}

use crate::error::BindingError;
use crate::host::HighlightHost;
use bus::{QueryStore, Subscription};
use core_types::{MatchState, QueryKey, TargetId};
use html::NodeKey;
use normalize::HighlightOptions;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Source,
    Target,
}

/// Lifecycle of a controller. Sources only move between `Unbound` and
/// `Bound`; targets reach `Idle` or `Matched` after their first pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Unbound,
    Bound,
    Idle,
    Matched,
}

struct TargetAttachment {
    id: TargetId,
    subscription: Subscription,
}

enum RoleBinding {
    Source {
        options: HighlightOptions,
        attached: bool,
    },
    Target {
        host: HighlightHost,
        root: NodeKey,
        attached: Option<TargetAttachment>,
    },
}

/// Binds one UI element to a [`QueryStore`] channel.
///
/// The owning component forwards its lifecycle hooks: `attach` when it is
/// mounted, `set_key`/`set_options` on property changes, `detach` when it is
/// removed. Dropping a controller does not detach it.
pub struct SyncBindingController {
    store: QueryStore,
    key: QueryKey,
    binding: RoleBinding,
}

impl SyncBindingController {
    /// A controller that publishes query text to `key`.
    pub fn source(store: QueryStore, key: impl Into<QueryKey>, options: HighlightOptions) -> Self {
        Self {
            store,
            key: key.into(),
            binding: RoleBinding::Source {
                options,
                attached: false,
            },
        }
    }

    /// A controller that highlights `root` whenever `key` changes.
    pub fn target(
        store: QueryStore,
        key: impl Into<QueryKey>,
        host: HighlightHost,
        root: NodeKey,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            binding: RoleBinding::Target {
                host,
                root,
                attached: None,
            },
        }
    }

    pub fn role(&self) -> Role {
        match self.binding {
            RoleBinding::Source { .. } => Role::Source,
            RoleBinding::Target { .. } => Role::Target,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_attached(&self) -> bool {
        match &self.binding {
            RoleBinding::Source { attached, .. } => *attached,
            RoleBinding::Target { attached, .. } => attached.is_some(),
        }
    }

    pub fn target_id(&self) -> Option<TargetId> {
        match &self.binding {
            RoleBinding::Target {
                attached: Some(attachment),
                ..
            } => Some(attachment.id),
            _ => None,
        }
    }

    pub fn phase(&self) -> Phase {
        match &self.binding {
            RoleBinding::Source { attached: true, .. } => Phase::Bound,
            RoleBinding::Source { attached: false, .. } => Phase::Unbound,
            RoleBinding::Target { attached: None, .. } => Phase::Unbound,
            RoleBinding::Target {
                host,
                attached: Some(attachment),
                ..
            } => {
                if !host.is_evaluated(attachment.id) {
                    return Phase::Bound;
                }
                match host.match_state(attachment.id) {
                    Some(state) if state.has_any_match() => Phase::Matched,
                    Some(_) => Phase::Idle,
                    None => Phase::Bound,
                }
            }
        }
    }

    /// Current state of an attached target.
    pub fn match_state(&self) -> Option<MatchState> {
        match &self.binding {
            RoleBinding::Target {
                host,
                attached: Some(attachment),
                ..
            } => host.match_state(attachment.id),
            _ => None,
        }
    }

    /// Binds to the store. A target registers with the host, subscribes to its
    /// key and immediately renders the key's current value, if any.
    /// Attaching twice is a no-op.
    pub fn attach(&mut self) -> Result<(), BindingError> {
        match &mut self.binding {
            RoleBinding::Source { attached, .. } => {
                *attached = true;
                Ok(())
            }
            RoleBinding::Target {
                host,
                root,
                attached,
            } => {
                if attached.is_some() {
                    return Ok(());
                }
                let id = host.register_target(*root)?;
                let subscription = self.store.subscribe_query(self.key.clone(), {
                    let host = host.clone();
                    let engine = self.store.normalizer().clone();
                    move |value: &str, options: &HighlightOptions| {
                        if let Err(err) = host.run_pass(id, value, options, &engine) {
                            log::warn!(target: "binding", "pass for {id:?} failed: {err}");
                        }
                    }
                });
                *attached = Some(TargetAttachment { id, subscription });
                log::debug!(target: "binding", "{id:?} bound to '{}'", self.key);

                if let Some(value) = self.store.get_query(self.key.as_str()) {
                    let options = self
                        .store
                        .get_query_options(self.key.as_str())
                        .unwrap_or_default();
                    if let Err(err) = host.run_pass(id, &value, &options, self.store.normalizer()) {
                        log::warn!(target: "binding", "replay for {id:?} failed: {err}");
                    }
                }
                Ok(())
            }
        }
    }

    /// Unbinds from the store. A target resets its highlighting, removes its
    /// state attributes and hands its child targets to its parent.
    pub fn detach(&mut self) -> Result<(), BindingError> {
        match &mut self.binding {
            RoleBinding::Source { attached, .. } => {
                *attached = false;
                Ok(())
            }
            RoleBinding::Target { host, attached, .. } => {
                let Some(attachment) = attached.as_ref() else {
                    return Ok(());
                };
                // Stays bound while the host refuses.
                host.unregister_target(attachment.id)?;
                if let Some(attachment) = attached.take() {
                    attachment.subscription.unsubscribe();
                }
                Ok(())
            }
        }
    }

    /// Switches to another channel, re-binding if attached.
    pub fn set_key(&mut self, key: impl Into<QueryKey>) -> Result<(), BindingError> {
        let key = key.into();
        if key == self.key {
            return Ok(());
        }
        let rebind = matches!(
            self.binding,
            RoleBinding::Target {
                attached: Some(_),
                ..
            }
        );
        if rebind {
            self.detach()?;
        }
        self.key = key;
        if rebind {
            self.attach()?;
        }
        Ok(())
    }

    /// Options published with every subsequent `update_query`.
    pub fn set_options(&mut self, options: HighlightOptions) -> Result<(), BindingError> {
        match &mut self.binding {
            RoleBinding::Source { options: bound, .. } => {
                *bound = options;
                Ok(())
            }
            RoleBinding::Target { .. } => Err(BindingError::WrongRole {
                expected: Role::Source,
                operation: "set_options",
            }),
        }
    }

    /// Publishes `value` with the bound options.
    pub fn update_query(&self, value: &str) -> Result<(), BindingError> {
        match &self.binding {
            RoleBinding::Source {
                attached: false, ..
            } => Err(BindingError::NotAttached),
            RoleBinding::Source { options, .. } => {
                self.store
                    .set_query(self.key.clone(), value, Some(options.clone()));
                Ok(())
            }
            RoleBinding::Target { .. } => Err(BindingError::WrongRole {
                expected: Role::Source,
                operation: "update_query",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (QueryStore, HighlightHost, NodeKey) {
        let host =
            HighlightHost::from_html("<div id=t><p highlightable>I like apple pie</p></div>")
                .unwrap();
        let root = host.element_by_id("t").unwrap();
        (QueryStore::new(), host, root)
    }

    #[test]
    fn target_walks_through_its_phases() {
        let (store, host, root) = fixture();
        let mut target = SyncBindingController::target(store.clone(), "k", host, root);
        assert_eq!(target.phase(), Phase::Unbound);
        target.attach().unwrap();
        assert_eq!(target.phase(), Phase::Bound);
        store.set_query("k", "apple", None);
        assert_eq!(target.phase(), Phase::Matched);
        store.set_query("k", "kiwi", None);
        assert_eq!(target.phase(), Phase::Idle);
        target.detach().unwrap();
        assert_eq!(target.phase(), Phase::Unbound);
        assert_eq!(store.subscriber_count("k"), 0);
    }

    #[test]
    fn attach_replays_existing_query() {
        let (store, host, root) = fixture();
        store.set_query("k", "pie", None);
        let mut target = SyncBindingController::target(store, "k", host.clone(), root);
        target.attach().unwrap();
        assert!(target.match_state().unwrap().has_local_match);
        assert!(host.inner_html(root).contains("<mark>pie</mark>"));
    }

    #[test]
    fn roles_reject_the_other_roles_operations() {
        let (store, host, root) = fixture();
        let mut target = SyncBindingController::target(store.clone(), "k", host, root);
        assert!(matches!(
            target.update_query("x"),
            Err(BindingError::WrongRole { expected: Role::Source, .. })
        ));
        assert!(target.set_options(HighlightOptions::default()).is_err());

        let source = SyncBindingController::source(store, "k", HighlightOptions::default());
        assert!(matches!(source.update_query("x"), Err(BindingError::NotAttached)));
        assert_eq!(source.match_state(), None);
    }

    #[test]
    fn source_publishes_with_bound_options() {
        let (store, host, root) = fixture();
        let mut source = SyncBindingController::source(store.clone(), "k", HighlightOptions::default());
        let mut target = SyncBindingController::target(store.clone(), "k", host.clone(), root);
        source.attach().unwrap();
        target.attach().unwrap();

        source
            .set_options(HighlightOptions::default().split_words(true))
            .unwrap();
        source.update_query("apple pie").unwrap();
        assert!(store.get_query_options("k").unwrap().split_words);
        assert_eq!(
            host.inner_html(root),
            "<p highlightable>I like <mark>apple</mark> <mark>pie</mark></p>"
        );
    }

    #[test]
    fn set_key_rebinds_to_the_new_channel() {
        let (store, host, root) = fixture();
        store.set_query("other", "like", None);
        let mut target = SyncBindingController::target(store.clone(), "k", host.clone(), root);
        target.attach().unwrap();
        target.set_key("other").unwrap();
        assert_eq!(store.subscriber_count("k"), 0);
        assert_eq!(store.subscriber_count("other"), 1);
        assert!(host.inner_html(root).contains("<mark>like</mark>"));
        store.set_query("k", "apple", None);
        assert!(!host.inner_html(root).contains("<mark>apple</mark>"));
    }

    #[test]
    fn busy_host_leaves_target_bound_until_detach_succeeds() {
        let (store, host, root) = fixture();
        let mut target = SyncBindingController::target(store.clone(), "k", host.clone(), root);
        target.attach().unwrap();
        store.set_query("k", "apple", None);

        let busy = host.with_document_mut(|_| target.detach());
        assert!(matches!(busy, Err(BindingError::HostBusy)));
        assert!(target.is_attached());
        assert_eq!(host.target_count(), 1);
        assert_eq!(store.subscriber_count("k"), 1);

        target.detach().unwrap();
        assert_eq!(host.target_count(), 0);
        assert_eq!(host.inner_html(root), "<p highlightable>I like apple pie</p>");
        target.attach().unwrap();
        assert_eq!(target.phase(), Phase::Matched);
    }

    #[test]
    fn reattach_binds_fresh() {
        let (store, host, root) = fixture();
        let mut target = SyncBindingController::target(store.clone(), "k", host.clone(), root);
        target.attach().unwrap();
        store.set_query("k", "apple", None);
        let first = target.target_id();
        target.detach().unwrap();
        assert_eq!(host.inner_html(root), "<p highlightable>I like apple pie</p>");
        target.attach().unwrap();
        assert_ne!(target.target_id(), first);
        assert_eq!(target.phase(), Phase::Matched);
        assert_eq!(store.subscriber_count("k"), 1);
    }
}

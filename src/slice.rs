//! Client-side state containers
//!
//! A [`Slice`] holds one piece of UI-facing state (wishlist membership, chat
//! messages, the selected category) that is not a plain cache entry. Writes go
//! through reducers; readers take snapshots or watch for changes.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared, observable state updated through reducers
pub struct Slice<S> {
    sender: Arc<watch::Sender<S>>,
}

impl<S> Clone for Slice<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S: Default + Send + Sync + 'static> Default for Slice<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Send + Sync + 'static> Slice<S> {
    pub fn new(initial: S) -> Self {
        Self {
            sender: Arc::new(watch::Sender::new(initial)),
        }
    }

    /// Reads the current state without cloning it.
    pub fn read<R>(&self, reader: impl FnOnce(&S) -> R) -> R {
        reader(&self.sender.borrow())
    }

    /// Applies `reducer` and notifies watchers.
    pub fn reduce(&self, reducer: impl FnOnce(&mut S)) {
        self.sender.send_modify(reducer);
    }

    /// Applies `reducer`; watchers are only notified when it returns `true`.
    pub fn reduce_if(&self, reducer: impl FnOnce(&mut S) -> bool) -> bool {
        self.sender.send_if_modified(reducer)
    }

    /// Replaces the whole state.
    pub fn replace(&self, state: S) -> S {
        self.sender.send_replace(state)
    }

    /// Receives every future change.
    pub fn watch(&self) -> watch::Receiver<S> {
        self.sender.subscribe()
    }
}

impl<S: Clone + Send + Sync + 'static> Slice<S> {
    pub fn snapshot(&self) -> S {
        self.sender.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watchers_see_reduced_state() {
        let slice = Slice::new(Vec::<u32>::new());
        let mut watcher = slice.watch();

        slice.reduce(|items| items.push(4));
        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow_and_update(), vec![4]);

        assert!(!slice.reduce_if(|_| false));
        assert!(!watcher.has_changed().unwrap());
        assert_eq!(slice.read(Vec::len), 1);
    }
}

/// Listener registry with scoped subscriptions
///
/// `subscribe` hands back a `Subscription` guard; dropping the guard removes
/// the listener. Single-threaded: the registry is shared through `Rc`.
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

type Callback<E> = Box<dyn FnMut(&E)>;

struct Entry<E> {
    id: u64,
    callback: Callback<E>,
}

struct RegistryInner<E> {
    next_id: u64,
    entries: Vec<Entry<E>>,
    // Ids released while their callback was detached for an emit
    released: HashSet<u64>,
}

pub struct ListenerRegistry<E> {
    inner: Rc<RefCell<RegistryInner<E>>>,
}

/// Keeps a listener registered for as long as it is alive
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    release: Option<Box<dyn FnOnce(u64)>>,
}

impl<E: 'static> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                next_id: 0,
                entries: Vec::new(),
                released: HashSet::new(),
            })),
        }
    }

    pub fn subscribe(&self, callback: impl FnMut(&E) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push(Entry {
                id,
                callback: Box::new(callback),
            });
            id
        };

        let weak: Weak<RefCell<RegistryInner<E>>> = Rc::downgrade(&self.inner);
        Subscription {
            id,
            release: Some(Box::new(move |id| {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = inner.borrow_mut();
                    let before = inner.entries.len();
                    inner.entries.retain(|e| e.id != id);
                    if inner.entries.len() == before {
                        inner.released.insert(id);
                    }
                }
            })),
        }
    }

    /// Deliver `event` to every listener; returns how many were called
    pub fn emit(&self, event: &E) -> usize {
        // Detach callbacks so listeners may (un)subscribe while being called
        let mut entries = std::mem::take(&mut self.inner.borrow_mut().entries);
        for entry in entries.iter_mut() {
            (entry.callback)(event);
        }
        let delivered = entries.len();

        let mut inner = self.inner.borrow_mut();
        let released = std::mem::take(&mut inner.released);
        entries.retain(|e| !released.contains(&e.id));
        entries.append(&mut inner.entries);
        inner.entries = entries;

        delivered
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

type Lookup<T, E> = Shared<LocalBoxFuture<'static, Result<T, E>>>;

struct Entry<T, E> {
    created_at: i64,
    generation: u64,
    lookup: Lookup<T, E>,
}

/// Collapses identical lookups issued within `ttl_ms` of the first one into a
/// single in-flight future. Failed lookups are forgotten once they settle.
pub struct DedupCache<T, E> {
    ttl_ms: i64,
    entries: Rc<RefCell<HashMap<String, Entry<T, E>>>>,
    next_generation: Cell<u64>,
}

impl<T, E> DedupCache<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            ttl_ms,
            entries: Rc::new(RefCell::new(HashMap::new())),
            next_generation: Cell::new(0),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn get_or_insert_with(
        &self,
        key: &str,
        now: i64,
        fetch: impl FnOnce() -> LocalBoxFuture<'static, Result<T, E>>,
    ) -> LocalBoxFuture<'static, Result<T, E>> {
        {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|_, e| now - e.created_at < self.ttl_ms);
            if let Some(hit) = entries.get(key) {
                return hit.lookup.clone().boxed_local();
            }
        }

        let generation = self.next_generation.get();
        self.next_generation.set(generation + 1);

        let pending = fetch();
        let entries = Rc::downgrade(&self.entries);
        let owned_key = key.to_string();
        let lookup = async move {
            let result = pending.await;
            if result.is_err() {
                if let Some(entries) = entries.upgrade() {
                    let mut entries = entries.borrow_mut();
                    // A newer lookup may already own the key.
                    if entries.get(&owned_key).map(|e| e.generation) == Some(generation) {
                        entries.remove(&owned_key);
                    }
                }
            }
            result
        }
        .boxed_local()
        .shared();

        self.entries.borrow_mut().insert(
            key.to_string(),
            Entry {
                created_at: now,
                generation,
                lookup: lookup.clone(),
            },
        );

        lookup.boxed_local()
    }
}

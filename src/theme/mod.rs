//! Process-wide dark mode.
//!
//! One store per page process, created from persisted storage on first access.
//! Components subscribe for changes instead of keeping their own copy.

use crate::storage::{load_json_from_storage, save_json_to_storage, DARK_MODE_KEY};
use leptos::prelude::*;
use std::cell::{Cell, OnceCell, RefCell};
use std::rc::Rc;

pub trait ThemePersistence {
    fn load(&self) -> Option<bool>;
    fn save(&self, dark: bool);

    /// Used when nothing was persisted yet.
    fn system_prefers_dark(&self) -> bool {
        false
    }
}

/// `localStorage` + `prefers-color-scheme`.
pub struct LocalStorageTheme;

impl ThemePersistence for LocalStorageTheme {
    fn load(&self) -> Option<bool> {
        load_json_from_storage::<bool>(DARK_MODE_KEY)
    }

    fn save(&self, dark: bool) {
        save_json_to_storage(DARK_MODE_KEY, &dark);
    }

    fn system_prefers_dark(&self) -> bool {
        web_sys::window()
            .and_then(|w| w.match_media("(prefers-color-scheme: dark)").ok().flatten())
            .map(|mq| mq.matches())
            .unwrap_or(false)
    }
}

pub type SubscriptionId = u64;

type Listener = Rc<dyn Fn(bool)>;

pub struct ThemeStore {
    dark: Cell<bool>,
    persistence: Box<dyn ThemePersistence>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_id: Cell<SubscriptionId>,
}

impl ThemeStore {
    pub fn init(persistence: Box<dyn ThemePersistence>) -> Self {
        let dark = persistence
            .load()
            .unwrap_or_else(|| persistence.system_prefers_dark());

        Self {
            dark: Cell::new(dark),
            persistence,
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn is_dark(&self) -> bool {
        self.dark.get()
    }

    pub fn set(&self, dark: bool) {
        if self.dark.replace(dark) == dark {
            return;
        }
        self.persistence.save(dark);
        self.notify(dark);
    }

    pub fn toggle(&self) {
        self.set(!self.is_dark());
    }

    pub fn subscribe(&self, listener: impl Fn(bool) + 'static) -> SubscriptionId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(i, _)| *i != id);
    }

    fn notify(&self, dark: bool) {
        // Snapshot so a listener may (un)subscribe while being called.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for l in listeners {
            l(dark);
        }
    }
}

thread_local! {
    static THEME: OnceCell<Rc<ThemeStore>> = const { OnceCell::new() };
}

pub fn theme_store() -> Rc<ThemeStore> {
    THEME.with(|cell| {
        cell.get_or_init(|| Rc::new(ThemeStore::init(Box::new(LocalStorageTheme))))
            .clone()
    })
}

/// Reactive view of the store; the subscription ends with the calling owner.
pub(crate) fn use_dark_mode() -> (
    ReadSignal<bool>,
    impl Fn() + Copy + Send + Sync + 'static,
) {
    let store = theme_store();
    let (dark, set_dark) = signal(store.is_dark());

    let id = store.subscribe(move |d| set_dark.set(d));
    on_cleanup(move || theme_store().unsubscribe(id));

    let toggle = move || theme_store().toggle();
    (dark, toggle)
}

pub(crate) fn apply_body_class(dark: bool) {
    if let Some(body) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body())
    {
        let _ = body.class_list().toggle_with_force("dark-mode", dark);
    }
}

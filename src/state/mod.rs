use leptos::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mobile sidebar + search overlay visibility.
///
/// The two are mutually exclusive; every mutator keeps that invariant so
/// callers never have to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavState {
    pub sidebar_open: bool,
    pub search_open: bool,
}

impl NavState {
    pub fn open(&mut self) {
        self.sidebar_open = true;
        self.search_open = false;
    }

    /// Closing the menu also dismisses search.
    pub fn close(&mut self) {
        self.sidebar_open = false;
        self.search_open = false;
    }

    pub fn toggle(&mut self) {
        if self.sidebar_open {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn open_search(&mut self) {
        self.search_open = true;
        self.sidebar_open = false;
    }

    pub fn close_search(&mut self) {
        self.search_open = false;
    }

    pub fn toggle_search(&mut self) {
        if self.search_open {
            self.close_search();
        } else {
            self.open_search();
        }
    }

    /// Only the sidebar pins the page underneath.
    pub fn locks_background(&self) -> bool {
        self.sidebar_open
    }
}

/// Page-lifetime UI flags. Dark mode lives in [`crate::theme`] because it
/// outlives navigation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageUiState {
    pub nav: NavState,
    pub toc_collapsed: bool,
}

impl PageUiState {
    pub fn toggle_toc_collapsed(&mut self) {
        self.toc_collapsed = !self.toc_collapsed;
    }
}

/// Shared through context by the page shell so the header, sidebar and
/// overlay never pass flags through props.
#[derive(Clone, Copy)]
pub(crate) struct MobileNavigation {
    pub state: RwSignal<PageUiState>,
}

impl MobileNavigation {
    pub fn new() -> Self {
        Self {
            state: RwSignal::new(PageUiState::default()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.get().nav.sidebar_open
    }

    pub fn is_search_open(&self) -> bool {
        self.state.get().nav.search_open
    }

    pub fn is_toc_collapsed(&self) -> bool {
        self.state.get().toc_collapsed
    }

    pub fn close(&self) {
        self.state.update(|s| s.nav.close());
    }

    /// Sidebar items run their action and then dismiss the sidebar.
    pub fn then_close(&self, action: impl FnOnce()) {
        action();
        self.close();
    }

    pub fn locks_background(&self) -> bool {
        self.state.with(|s| s.nav.locks_background())
    }

    pub fn toggle(&self) {
        self.state.update(|s| s.nav.toggle());
    }

    pub fn open_search(&self) {
        self.state.update(|s| s.nav.open_search());
    }

    pub fn close_search(&self) {
        self.state.update(|s| s.nav.close_search());
    }

    pub fn toggle_search(&self) {
        self.state.update(|s| s.nav.toggle_search());
    }

    pub fn toggle_toc_collapsed(&self) {
        self.state.update(|s| s.toggle_toc_collapsed());
    }
}

impl Default for MobileNavigation {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn provide_mobile_navigation() -> MobileNavigation {
    let nav = MobileNavigation::new();
    provide_context(nav);
    nav
}

pub(crate) fn use_mobile_navigation() -> MobileNavigation {
    expect_context::<MobileNavigation>()
}

/// Something that can stop the page behind an overlay from scrolling.
pub trait BackgroundScroll {
    fn suspend(&self);
    fn resume(&self);
}

/// Holds background scrolling suspended until released or dropped.
/// Releasing twice is harmless.
pub struct ScrollLock<B: BackgroundScroll> {
    target: B,
    held: AtomicBool,
}

impl<B: BackgroundScroll> ScrollLock<B> {
    pub fn acquire(target: B) -> Self {
        target.suspend();
        Self {
            target,
            held: AtomicBool::new(true),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            self.target.resume();
        }
    }
}

impl<B: BackgroundScroll> Drop for ScrollLock<B> {
    fn drop(&mut self) {
        self.release();
    }
}

/// `document.body.style.overflow`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyOverflow;

impl BodyOverflow {
    fn set(value: &str) {
        if let Some(body) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.body())
        {
            let _ = body.style().set_property("overflow", value);
        }
    }
}

impl BackgroundScroll for BodyOverflow {
    fn suspend(&self) {
        Self::set("hidden");
    }

    fn resume(&self) {
        Self::set("unset");
    }
}

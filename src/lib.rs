pub mod anchors;
pub mod api;
pub mod app;
mod components;
pub mod models;
pub mod pages;
pub mod render;
pub mod scroll;
pub mod search;
#[cfg(not(target_arch = "wasm32"))]
pub mod server;
pub mod state;
pub mod storage;
pub mod theme;
pub mod toc;
pub mod util;

pub use app::App;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    mount_to_body(App);
}

use leptos::prelude::*;
use leptos_ui::clx;

mod components {
    use super::*;
    clx! {Alert, div, "notion-callout relative w-full rounded-md border px-4 py-3 text-sm"}
    clx! {AlertDescription, p, "text-sm leading-relaxed"}
}

pub use components::*;

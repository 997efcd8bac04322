use leptos::html;
use leptos::prelude::*;
use tw_merge::tw_merge;
use wasm_bindgen::JsCast;

/// Text input mirrored into `bind_value` on every keystroke.
#[component]
pub fn Input(
    #[prop(into, optional)] class: String,
    #[prop(into, default = "search")] r#type: &'static str,
    #[prop(into, optional)] placeholder: String,
    #[prop(into)] bind_value: RwSignal<String>,
    #[prop(optional)] node_ref: NodeRef<html::Input>,
) -> impl IntoView {
    let merged_class = tw_merge!(
        "placeholder:text-muted-foreground flex h-9 w-full min-w-0 rounded-md border border-input bg-transparent px-3 py-1 text-base outline-none dark:bg-input/30 md:text-sm",
        "focus-visible:border-ring focus-visible:ring-2 focus-visible:ring-ring/50",
        class
    );

    let on_input = move |ev: web_sys::Event| {
        if let Some(input) = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
        {
            bind_value.set(input.value());
        }
    };

    view! {
        <input
            type=r#type
            class=merged_class
            placeholder=placeholder
            autocomplete="off"
            spellcheck="false"
            prop:value=move || bind_value.get()
            on:input=on_input
            node_ref=node_ref
        />
    }
}

use icons::Loader;
use leptos::prelude::*;
use tw_merge::tw_merge;

/// Shown in the search bar while a query is in flight.
#[component]
pub fn Spinner(#[prop(into, optional)] class: String) -> impl IntoView {
    let merged_class = tw_merge!("notion-search-spinner size-4 animate-spin", class);

    view! { <Loader class=merged_class attr:role="status" attr:aria-label="Searching" /> }
}

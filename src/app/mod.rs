use crate::pages::SitePage;
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    // Every route renders the page the host embedded; `:page_id` only names it
    // when the embedded props leave the id out.
    view! {
        <Router>
            <Routes fallback=|| view! { <div class="notion-page-missing">"Not found"</div> }>
                <Route path=path!("") view=SitePage />
                <Route path=path!(":page_id") view=SitePage />
            </Routes>
        </Router>
    }
}

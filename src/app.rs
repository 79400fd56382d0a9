use leptos::prelude::*;
use leptos_router::components::*;
use leptos_router::path;

use crate::components::nav::Nav;
use crate::pages::manual::ManualEntryPage;
use crate::pages::upload::UploadPage;

#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <div class="widget-layout">
                <Nav />
                <main class="content">
                    <Routes fallback=|| view! { <p>"Page not found"</p> }>
                        <Route path=path!("/") view=UploadPage />
                        <Route path=path!("/manual") view=ManualEntryPage />
                    </Routes>
                </main>
            </div>
        </Router>
    }
}

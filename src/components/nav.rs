use leptos::prelude::*;

#[component]
pub fn Nav() -> impl IntoView {
    view! {
        <nav class="widget-nav">
            <div class="widget-nav-header">
                <h1 class="widget-title">"W-2 Refund Estimator"</h1>
                <p class="widget-subtitle">"Estimate your refund from withholding"</p>
            </div>
            <ul class="nav-list">
                <li class="nav-item">
                    <a href="/" class="nav-link">"Upload W-2"</a>
                </li>
                <li class="nav-item">
                    <a href="/manual" class="nav-link">"Enter Manually"</a>
                </li>
            </ul>
        </nav>
    }
}

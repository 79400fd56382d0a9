mod api;
mod app;
mod cache;
mod components;
mod flow;
mod pages;
mod types;

use app::App;

fn main() {
    leptos::mount::mount_to_body(App);
}

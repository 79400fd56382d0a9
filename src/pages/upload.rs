//! W-2 upload page.
//!
//! Users drop or browse for a W-2 image or PDF; the backend reads Box 2 and
//! Box 17 and returns an estimate. The last document and result survive a
//! reload within the same tab.

use leptos::prelude::*;
use tracing::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use crate::api;
use crate::cache::{SessionCache, WebStorage};
use crate::components::refund_result::RefundResult;
use crate::flow::{EstimationFlow, FlowState, ACCEPTED_MIME_TYPES};
use crate::types::CachedDocument;

type BrowserFlow = EstimationFlow<WebStorage, WebStorage>;

#[component]
pub fn UploadPage() -> impl IntoView {
    let flow = StoredValue::new_local(BrowserFlow::new(SessionCache::browser()));
    let (state, set_state) = signal(FlowState::Idle);
    let (preview_url, set_preview_url) = signal::<Option<String>>(None);
    let (validation_error, set_validation_error) = signal::<Option<String>>(None);

    let sync_state = move || set_state.set(flow.with_value(|f| f.state().clone()));

    // Swap the preview object URL, revoking the old one
    let replace_preview = move |document: Option<CachedDocument>| {
        if let Some(old) = preview_url.get_untracked() {
            revoke_preview(&old);
        }
        let next = document.filter(|d| d.is_image()).and_then(|d| create_preview(&d));
        set_preview_url.set(next);
    };

    // Restore cached document or result on mount
    Effect::new(move |_| {
        flow.update_value(|f| {
            f.restore();
        });
        sync_state();
        replace_preview(flow.with_value(|f| f.state().document().cloned()));
    });

    on_cleanup(move || {
        if let Some(url) = preview_url.get_untracked() {
            revoke_preview(&url);
        }
    });

    let on_file = move |document: CachedDocument| {
        match flow.try_update_value(|f| f.select_document(document)) {
            Some(Ok(())) => set_validation_error.set(None),
            Some(Err(e)) => set_validation_error.set(Some(e.to_string())),
            None => {}
        }
        sync_state();
        replace_preview(flow.with_value(|f| f.state().document().cloned()));
    };

    let on_submit = move |_| {
        let Some((ticket, document)) = flow.try_update_value(|f| f.begin_submit()).flatten() else {
            return;
        };
        sync_state();

        spawn_local(async move {
            let outcome = api::upload_w2(&document, None)
                .await
                .map_err(|e| e.to_string());
            let applied = flow
                .try_update_value(|f| f.complete(ticket, outcome))
                .unwrap_or(false);
            if applied {
                sync_state();
                if matches!(state.get_untracked(), FlowState::ResultReady(_)) {
                    replace_preview(None);
                }
            }
        });
    };

    let on_reset = move |_| {
        flow.update_value(|f| f.reset());
        set_validation_error.set(None);
        replace_preview(None);
        sync_state();
    };

    view! {
        <div class="page upload-page">
            <h2>"Estimate From Your W-2"</h2>
            <p class="page-description">
                "Upload a photo or PDF of your W-2. We read the federal and state withholding and estimate your refund."
            </p>

            <Show when=move || validation_error.get().is_some()>
                <p class="validation-error">{move || validation_error.get().unwrap_or_default()}</p>
            </Show>

            {move || {
                match state.get() {
                    FlowState::Idle => view! {
                        <DocumentDropZone on_file=on_file set_error=set_validation_error />
                    }.into_any(),

                    FlowState::DocumentSelected(document) => view! {
                        <div class="document-selected">
                            <DocumentPreview document=document preview_url=preview_url />
                            <div class="action-row">
                                <button class="btn btn-primary" on:click=on_submit>
                                    "Estimate Refund"
                                </button>
                                <button class="btn btn-secondary" on:click=on_reset>
                                    "Clear"
                                </button>
                            </div>
                            <DocumentDropZone on_file=on_file set_error=set_validation_error />
                        </div>
                    }.into_any(),

                    FlowState::Submitting(document) => view! {
                        <div class="submitting-state">
                            <DocumentPreview document=document preview_url=preview_url />
                            <div class="spinner"></div>
                            <p>"Reading your W-2..."</p>
                            <button class="btn btn-secondary" on:click=on_reset>
                                "Cancel"
                            </button>
                        </div>
                    }.into_any(),

                    FlowState::ResultReady(result) => {
                        let computed_at = Some(result.computed_at.format("%b %-d, %Y %H:%M UTC").to_string());
                        view! {
                            <div class="result-state">
                                <RefundResult
                                    estimate=result.estimate
                                    source_name=result.source_document_name
                                    computed_at=computed_at
                                />
                                <button class="btn btn-secondary" on:click=on_reset>
                                    "Start Over"
                                </button>
                            </div>
                        }.into_any()
                    },

                    FlowState::Failed { document, message } => view! {
                        <div class="error-state">
                            <DocumentPreview document=document preview_url=preview_url />
                            <div class="error-message">
                                <h3>"Estimate Failed"</h3>
                                <p>{message}</p>
                            </div>
                            <div class="action-row">
                                <button class="btn btn-primary" on:click=on_submit>
                                    "Try Again"
                                </button>
                                <button class="btn btn-secondary" on:click=on_reset>
                                    "Start Over"
                                </button>
                            </div>
                        </div>
                    }.into_any(),
                }
            }}

            <p class="page-footer">
                "No W-2 handy? " <a href="/manual">"Enter the amounts manually"</a>
            </p>
        </div>
    }
}

#[component]
fn DocumentPreview(document: CachedDocument, preview_url: ReadSignal<Option<String>>) -> impl IntoView {
    let is_pdf = !document.is_image();
    let size_kb = document.bytes.len().div_ceil(1024);

    view! {
        <div class="document-preview">
            {move || match preview_url.get() {
                Some(url) => view! { <img class="preview-image" src=url alt="W-2 preview" /> }.into_any(),
                None => view! {
                    <div class="preview-placeholder">{if is_pdf { "[PDF]" } else { "[file]" }}</div>
                }.into_any(),
            }}
            <p class="document-name">{document.file_name} " (" {size_kb} " KB)"</p>
        </div>
    }
}

/// Drop zone with drag-and-drop and browse.
#[component]
fn DocumentDropZone<F>(on_file: F, set_error: WriteSignal<Option<String>>) -> impl IntoView
where
    F: Fn(CachedDocument) + Copy + Send + Sync + 'static,
{
    let (is_over, set_is_over) = signal(false);
    let (is_loading, set_is_loading) = signal(false);
    let file_input_id = "w2-file-input";
    let accept = ACCEPTED_MIME_TYPES.join(",");

    let load_file = move |file: web_sys::File| {
        set_is_loading.set(true);
        spawn_local(async move {
            match read_file(file).await {
                Ok(document) => on_file(document),
                Err(e) => set_error.set(Some(e)),
            }
            set_is_loading.set(false);
        });
    };

    let on_drop = move |ev: web_sys::DragEvent| {
        ev.prevent_default();
        set_is_over.set(false);

        if let Some(file) = ev
            .data_transfer()
            .and_then(|dt| dt.files())
            .and_then(|files| files.get(0))
        {
            load_file(file);
        }
    };

    let on_input_change = move |ev: web_sys::Event| {
        let Some(input) = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
        else {
            return;
        };
        let file = input.files().and_then(|files| files.get(0));
        // Allow picking the same file again
        input.set_value("");
        if let Some(file) = file {
            load_file(file);
        }
    };

    view! {
        <div
            class="drop-zone"
            class:drop-zone-active=move || is_over.get()
            class:drop-zone-loading=move || is_loading.get()
            on:dragover=move |ev: web_sys::DragEvent| {
                ev.prevent_default();
                set_is_over.set(true);
            }
            on:dragleave=move |_| set_is_over.set(false)
            on:drop=on_drop
        >
            <Show
                when=move || is_loading.get()
                fallback=move || view! {
                    <div class="drop-zone-content">
                        <p class="drop-main">"Drop your W-2 here"</p>
                        <p class="drop-hint">"or"</p>
                        <label for=file_input_id class="btn btn-secondary">
                            "Browse Files"
                        </label>
                        <input
                            type="file"
                            id=file_input_id
                            accept=accept.clone()
                            style="display: none"
                            on:change=on_input_change
                        />
                        <p class="drop-formats">"Supports JPEG, PNG, PDF"</p>
                    </div>
                }
            >
                <div class="drop-zone-loading-content">
                    <div class="spinner"></div>
                    <p>"Loading file..."</p>
                </div>
            </Show>
        </div>
    }
}

/// Read a picked or dropped file into memory.
async fn read_file(file: web_sys::File) -> Result<CachedDocument, String> {
    let buffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|e| format!("Failed to read file: {:?}", e))?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();

    Ok(CachedDocument {
        bytes,
        file_name: file.name(),
        mime_type: file.type_(),
        last_modified: file.last_modified(),
    })
}

fn create_preview(document: &CachedDocument) -> Option<String> {
    let array = js_sys::Uint8Array::from(document.bytes.as_slice());
    let parts = js_sys::Array::of1(&array);
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(&document.mime_type);

    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options).ok()?;
    web_sys::Url::create_object_url_with_blob(&blob).ok()
}

fn revoke_preview(url: &str) {
    if let Err(e) = web_sys::Url::revoke_object_url(url) {
        debug!("Failed to revoke preview URL: {:?}", e);
    }
}

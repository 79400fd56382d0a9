//! Manual entry of Box 2 and Box 17. Results are kept in memory only.

use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api;
use crate::components::refund_result::RefundResult;
use crate::flow::{parse_manual_input, RequestTickets};
use crate::types::RefundEstimate;

#[component]
pub fn ManualEntryPage() -> impl IntoView {
    let (federal, set_federal) = signal(String::new());
    let (state_tax, set_state_tax) = signal(String::new());
    let (error, set_error) = signal::<Option<String>>(None);
    let (result, set_result) = signal::<Option<RefundEstimate>>(None);
    let (submitting, set_submitting) = signal(false);
    let tickets = StoredValue::new(RequestTickets::default());

    let on_calculate = move |_| {
        if tickets.with_value(|t| t.is_busy()) {
            return;
        }

        let (federal, state) = match parse_manual_input(&federal.get(), &state_tax.get()) {
            Ok(amounts) => amounts,
            Err(e) => {
                set_error.set(Some(e.to_string()));
                return;
            }
        };

        let Some(ticket) = tickets.try_update_value(|t| t.issue()) else {
            return;
        };
        set_error.set(None);
        set_submitting.set(true);
        spawn_local(async move {
            let outcome = api::calculate(federal, state).await;
            // Cleared while the request was running
            if !tickets.try_update_value(|t| t.finish(ticket)).unwrap_or(false) {
                return;
            }
            match outcome {
                Ok(estimate) => set_result.set(Some(estimate)),
                Err(e) => {
                    set_result.set(None);
                    set_error.set(Some(e.to_string()));
                }
            }
            set_submitting.set(false);
        });
    };

    let on_clear = move |_| {
        tickets.update_value(|t| t.invalidate());
        set_submitting.set(false);
        set_federal.set(String::new());
        set_state_tax.set(String::new());
        set_error.set(None);
        set_result.set(None);
    };

    view! {
        <div class="page manual-page">
            <h2>"Enter Your Withholding"</h2>
            <p class="page-description">
                "Copy the amounts from Box 2 and Box 17 of your W-2."
            </p>

            <div class="form-group">
                <label for="box2-federal">"Federal income tax withheld (Box 2)"</label>
                <input
                    id="box2-federal"
                    type="text"
                    inputmode="decimal"
                    placeholder="0.00"
                    class="input"
                    prop:value=move || federal.get()
                    on:input=move |ev| set_federal.set(event_target_value(&ev))
                />
            </div>

            <div class="form-group">
                <label for="box17-state">"State income tax withheld (Box 17)"</label>
                <input
                    id="box17-state"
                    type="text"
                    inputmode="decimal"
                    placeholder="0.00"
                    class="input"
                    prop:value=move || state_tax.get()
                    on:input=move |ev| set_state_tax.set(event_target_value(&ev))
                />
            </div>

            <Show when=move || error.get().is_some()>
                <p class="validation-error">{move || error.get().unwrap_or_default()}</p>
            </Show>

            <div class="action-row">
                <button
                    class="btn btn-primary"
                    disabled=move || submitting.get()
                    on:click=on_calculate
                >
                    {move || if submitting.get() { "Calculating..." } else { "Calculate Refund" }}
                </button>
                <button class="btn btn-secondary" on:click=on_clear>"Clear"</button>
            </div>

            {move || result.get().map(|estimate| view! { <RefundResult estimate=estimate /> })}

            <p class="page-footer">
                "Have your W-2 handy? " <a href="/">"Upload it instead"</a>
            </p>
        </div>
    }
}

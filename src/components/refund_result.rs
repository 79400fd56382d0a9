//! Estimate display shared by the upload and manual-entry pages.

use leptos::prelude::*;

use crate::components::confidence_badge::ConfidenceBadge;
use crate::types::{ConfidenceTag, RefundEstimate};

#[component]
pub fn RefundResult(
    estimate: RefundEstimate,
    /// File the amounts were read from, if any
    #[prop(optional_no_strip)]
    source_name: Option<String>,
    /// When the estimate was computed, already formatted
    #[prop(optional_no_strip)]
    computed_at: Option<String>,
) -> impl IntoView {
    let low_confidence = estimate.ocr_confidence == ConfidenceTag::Low;

    view! {
        <div class="refund-result">
            <div class="refund-header">
                <h3>"Estimated Refund"</h3>
                <ConfidenceBadge tag=estimate.ocr_confidence />
            </div>

            <p class="refund-amount">{format_currency(estimate.estimated_refund)}</p>

            <table class="refund-breakdown">
                <tbody>
                    <tr>
                        <td>"Federal income tax withheld (Box 2)"</td>
                        <td class="amount">{format_currency(estimate.box2_federal)}</td>
                    </tr>
                    <tr>
                        <td>"State income tax withheld (Box 17)"</td>
                        <td class="amount">{format_currency(estimate.box17_state)}</td>
                    </tr>
                </tbody>
            </table>

            {low_confidence.then(|| view! {
                <p class="refund-warning">
                    "We could not read every value clearly. Check the amounts against your W-2, or enter them manually."
                </p>
            })}

            <div class="refund-meta">
                {source_name.map(|name| view! { <span class="refund-source">"From " {name}</span> })}
                {computed_at.map(|at| view! { <span class="refund-time">"Computed " {at}</span> })}
            </div>

            <p class="refund-disclaimer">
                "This is an estimate only, not tax advice."
            </p>
        </div>
    }
}

/// Format a dollar amount with thousands separators, e.g. `$1,360.00`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1360.0), "$1,360.00");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.5), "$999.50");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(-12.3), "-$12.30");
    }
}

use leptos::prelude::*;

use crate::types::ConfidenceTag;

#[component]
pub fn ConfidenceBadge(
    /// How the amounts were obtained
    tag: ConfidenceTag,
) -> impl IntoView {
    let (icon, class) = match tag {
        ConfidenceTag::High | ConfidenceTag::AiExtracted => ("\u{2713}", "confidence-badge confidence-high"),
        ConfidenceTag::Medium => ("~", "confidence-badge confidence-medium"),
        ConfidenceTag::Low => ("!", "confidence-badge confidence-low"),
        ConfidenceTag::Manual => ("\u{270E}", "confidence-badge confidence-manual"),
    };

    view! {
        <span class=class>
            <span class="confidence-icon">{icon}</span>
            <span class="confidence-label">{tag.label()}</span>
        </span>
    }
}

//! Localized rendering of notification text
//!
//! Messages live in Fluent resources under `locales/{lang}/`. The
//! recipient's preferred language is negotiated against what we ship, with
//! English as the fallback.

use fluent::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use fluent_langneg::{negotiate_languages, NegotiationStrategy};
use unic_langid::LanguageIdentifier;

use crate::error::NotificationError;
use crate::kind::NotificationKind;

const EN: &str = include_str!("../locales/en/notifications.ftl");
const SW: &str = include_str!("../locales/sw/notifications.ftl");

/// Languages we ship resources for
pub const AVAILABLE: [&str; 2] = ["en", "sw"];
pub const DEFAULT_LANGUAGE: &str = "en";

/// Rendered title and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub title: String,
    pub message: String,
}

/// Named values substituted into a message
#[derive(Debug, Clone, Default)]
pub struct MessageArgs {
    values: Vec<(&'static str, String)>,
}

impl MessageArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl ToString) -> Self {
        self.values.push((name, value.to_string()));
        self
    }

    fn to_fluent(&self) -> FluentArgs<'_> {
        let mut args = FluentArgs::new();
        for (name, value) in &self.values {
            args.set(*name, FluentValue::from(value.as_str()));
        }
        args
    }
}

/// Picks the best shipped language for `requested`
pub fn negotiate(requested: &str) -> &'static str {
    let available: Vec<LanguageIdentifier> = AVAILABLE
        .iter()
        .filter_map(|l| l.parse().ok())
        .collect();
    let requested: Vec<LanguageIdentifier> = requested.parse().ok().into_iter().collect();
    let default: Option<LanguageIdentifier> = DEFAULT_LANGUAGE.parse().ok();

    let chosen = negotiate_languages(
        &requested,
        &available,
        default.as_ref(),
        NegotiationStrategy::Lookup,
    );
    chosen
        .first()
        .and_then(|id| AVAILABLE.iter().copied().find(|l| *l == id.language.as_str()))
        .unwrap_or(DEFAULT_LANGUAGE)
}

fn bundle_for(language: &'static str) -> Result<FluentBundle<FluentResource>, NotificationError> {
    let source = match language {
        "sw" => SW,
        _ => EN,
    };
    let langid: LanguageIdentifier = language
        .parse()
        .map_err(|_| NotificationError::Localization(format!("bad language tag {}", language)))?;
    let resource = FluentResource::try_new(source.to_string())
        .map_err(|(_, errors)| NotificationError::Localization(format!("{:?}", errors)))?;

    let mut bundle = FluentBundle::new(vec![langid]);
    bundle.set_use_isolating(false);
    bundle
        .add_resource(resource)
        .map_err(|errors| NotificationError::Localization(format!("{:?}", errors)))?;
    Ok(bundle)
}

fn format(
    bundle: &FluentBundle<FluentResource>,
    id: &str,
    args: &FluentArgs<'_>,
) -> Result<String, NotificationError> {
    let pattern = bundle
        .get_message(id)
        .and_then(|m| m.value())
        .ok_or_else(|| NotificationError::MissingMessage(id.to_string()))?;
    let mut errors = Vec::new();
    let text = bundle.format_pattern(pattern, Some(args), &mut errors);
    if !errors.is_empty() {
        tracing::warn!(message_id = id, ?errors, "Notification rendered with missing arguments");
    }
    Ok(text.trim().to_string())
}

/// Renders the title and body of `kind` in the negotiated language
pub fn render(
    kind: NotificationKind,
    language: &str,
    args: &MessageArgs,
) -> Result<RenderedMessage, NotificationError> {
    let language = negotiate(language);
    let bundle = bundle_for(language)?;
    let fluent_args = args.to_fluent();
    let id = kind.message_id();
    Ok(RenderedMessage {
        title: format(&bundle, &format!("{}-title", id), &fluent_args)?,
        message: format(&bundle, &format!("{}-message", id), &fluent_args)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_falls_back_to_english() {
        assert_eq!(negotiate("sw"), "sw");
        assert_eq!(negotiate("sw-KE"), "sw");
        assert_eq!(negotiate("fr"), "en");
        assert_eq!(negotiate("not a tag"), "en");
    }

    #[test]
    fn test_every_kind_has_both_languages() {
        let args = MessageArgs::new()
            .with("title", "t")
            .with("message", "m");
        for kind in NotificationKind::ALL {
            for lang in AVAILABLE {
                let rendered = render(kind, lang, &args).unwrap();
                assert!(!rendered.title.is_empty(), "{} {}", kind, lang);
            }
        }
    }

    #[test]
    fn test_arguments_are_substituted() {
        let args = MessageArgs::new()
            .with("claim_number", "CLM-2024-000123")
            .with("amount", "50,000.00");
        let en = render(NotificationKind::ClaimApproved, "en", &args).unwrap();
        assert_eq!(en.title, "Claim Approved");
        assert!(en.message.contains("CLM-2024-000123"));
        assert!(en.message.contains("KES 50,000.00"));

        let sw = render(NotificationKind::ClaimApproved, "sw", &args).unwrap();
        assert_eq!(sw.title, "Dai Limeidhinishwa");
    }
}

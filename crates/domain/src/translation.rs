use std::fmt;
use std::str::FromStr;

use rolegate_core::{AppError, AppResult};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Languages used for fallback when no list is configured.
pub const DEFAULT_LANGUAGES: [&str; 3] = ["en", "ar", "fr"];

/// Locale-keyed text stored verbatim, in insertion order.
///
/// Locale codes are free-form and no completeness is enforced. Every stored
/// locale carries text, so `null` values are rejected when parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatableText {
    entries: Vec<(String, String)>,
}

impl TranslatableText {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses already-serialized JSON text such as `{"en":"Admin"}`.
    pub fn parse(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw).map_err(|error| {
            AppError::Validation(format!("invalid translation mapping '{raw}': {error}"))
        })
    }

    /// Serializes the mapping to JSON text, preserving insertion order.
    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|error| {
            AppError::Internal(format!("failed to serialize translation mapping: {error}"))
        })
    }

    /// Sets the text for a locale. Existing locales keep their position.
    pub fn set(&mut self, locale: impl Into<String>, value: impl Into<String>) {
        let locale = locale.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(stored_locale, _)| stored_locale == &locale)
        {
            Some((_, stored_value)) => *stored_value = value,
            None => self.entries.push((locale, value)),
        }
    }

    /// Builder form of [`TranslatableText::set`].
    #[must_use]
    pub fn with(mut self, locale: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(locale, value);
        self
    }

    /// Returns the text stored for a locale.
    #[must_use]
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(stored_locale, _)| stored_locale == locale)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the text of the first locale present from `locales`.
    #[must_use]
    pub fn get_any(&self, locales: &[&str]) -> Option<&str> {
        locales.iter().find_map(|locale| self.get(locale))
    }

    /// Returns the first stored text by insertion order.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.entries.first().map(|(_, value)| value.as_str())
    }

    /// Iterates locales in insertion order.
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(locale, _)| locale.as_str())
    }

    /// Iterates `(locale, text)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(locale, value)| (locale.as_str(), value.as_str()))
    }

    /// Returns the number of stored locales.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no locale is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TranslatableText {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .fold(Self::new(), |text, (locale, value)| text.with(locale, value))
    }
}

impl FromStr for TranslatableText {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for TranslatableText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (locale, value) in &self.entries {
            map.serialize_entry(locale, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TranslatableText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TranslatableTextVisitor;

        impl<'de> Visitor<'de> for TranslatableTextVisitor {
            type Value = TranslatableText;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of locale codes to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut text = TranslatableText::new();
                while let Some((locale, value)) = access.next_entry::<String, Option<String>>()? {
                    let Some(value) = value else {
                        return Err(de::Error::custom(format!(
                            "locale '{locale}' has no text"
                        )));
                    };
                    text.set(locale, value);
                }
                Ok(text)
            }
        }

        deserializer.deserialize_map(TranslatableTextVisitor)
    }
}

/// Resolves translation mappings against a current locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleFallback {
    languages: Vec<String>,
}

impl LocaleFallback {
    /// Creates a resolver with an ordered list of fallback languages.
    #[must_use]
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            languages: languages.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the configured fallback languages.
    #[must_use]
    pub fn languages(&self) -> &[String] {
        self.languages.as_slice()
    }

    /// Returns the locale order tried for `text` under `current_locale`.
    ///
    /// The current locale comes first, then configured languages, then any
    /// remaining locale of the mapping in insertion order. No locale repeats.
    #[must_use]
    pub fn candidate_locales<'a>(
        &'a self,
        text: &'a TranslatableText,
        current_locale: &'a str,
    ) -> Vec<&'a str> {
        let mut candidates = vec![current_locale];
        let configured = self.languages.iter().map(String::as_str);
        for locale in configured.chain(text.locales()) {
            if !candidates.contains(&locale) {
                candidates.push(locale);
            }
        }
        candidates
    }

    /// Resolves a mapping to a single display string.
    ///
    /// Returns `None` only for an empty mapping.
    #[must_use]
    pub fn resolve<'a>(&self, text: &'a TranslatableText, current_locale: &str) -> Option<&'a str> {
        self.candidate_locales(text, current_locale)
            .into_iter()
            .find_map(|locale| text.get(locale))
            .or_else(|| text.first())
    }
}

impl Default for LocaleFallback {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGES)
    }
}

/// Records carrying attributes stored as translation mappings.
pub trait Translatable {
    /// Attribute names resolved through [`LocaleFallback`].
    const TRANSLATABLE: &'static [&'static str];

    /// Returns the stored mapping for an attribute, if the record has it.
    fn translation_field(&self, attribute: &str) -> Option<&TranslatableText>;

    /// Returns every translation of a translatable attribute.
    ///
    /// Attributes outside [`Translatable::TRANSLATABLE`] yield `None`.
    fn translations(&self, attribute: &str) -> Option<&TranslatableText> {
        if !Self::TRANSLATABLE.contains(&attribute) {
            return None;
        }
        self.translation_field(attribute)
    }
}

/// Resolves a translatable attribute of `entity` for `locale`.
#[must_use]
pub fn resolve_translatable<'a, T: Translatable>(
    entity: &'a T,
    attribute: &str,
    locale: &str,
    fallback: &LocaleFallback,
) -> Option<&'a str> {
    entity
        .translations(attribute)
        .and_then(|text| fallback.resolve(text, locale))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rolegate_core::AppError;

    use super::{LocaleFallback, Translatable, TranslatableText, resolve_translatable};

    struct Labelled {
        name: TranslatableText,
        code: TranslatableText,
    }

    impl Translatable for Labelled {
        const TRANSLATABLE: &'static [&'static str] = &["name"];

        fn translation_field(&self, attribute: &str) -> Option<&TranslatableText> {
            match attribute {
                "name" => Some(&self.name),
                "code" => Some(&self.code),
                _ => None,
            }
        }
    }

    #[test]
    fn resolves_current_locale_first() {
        let text = TranslatableText::from([("en", "Admin"), ("ar", "مشرف"), ("fr", "Administrateur")]);
        let fallback = LocaleFallback::default();

        assert_eq!(fallback.resolve(&text, "ar"), Some("مشرف"));
        assert_eq!(fallback.resolve(&text, "en"), Some("Admin"));
        assert_eq!(fallback.resolve(&text, "fr"), Some("Administrateur"));
    }

    #[test]
    fn unconfigured_locale_falls_back_to_configured_languages() {
        let text = TranslatableText::from([("ar", "مشرف"), ("en", "Admin")]);
        let fallback = LocaleFallback::default();

        assert_eq!(fallback.resolve(&text, "de"), Some("Admin"));
    }

    #[test]
    fn unknown_locales_fall_back_to_insertion_order() {
        let text = TranslatableText::from([("es", "Administrador")]);
        let fallback = LocaleFallback::default();

        assert_eq!(fallback.resolve(&text, "ar"), Some("Administrador"));
    }

    #[test]
    fn absent_locale_uses_first_available_value() {
        let text = TranslatableText::from([("en", "Admin"), ("ar", "مشرف")]);
        let fallback = LocaleFallback::new(Vec::<String>::new());

        assert_eq!(fallback.resolve(&text, "fr"), Some("Admin"));
    }

    #[test]
    fn empty_mapping_resolves_to_none() {
        let fallback = LocaleFallback::default();
        assert_eq!(fallback.resolve(&TranslatableText::new(), "en"), None);
    }

    #[test]
    fn empty_values_are_returned_as_stored() {
        let text = TranslatableText::from([("en", "")]);
        assert_eq!(LocaleFallback::default().resolve(&text, "en"), Some(""));
    }

    #[test]
    fn candidate_order_has_no_duplicates() {
        let text = TranslatableText::from([("fr", "x"), ("es", "y")]);
        let fallback = LocaleFallback::default();

        assert_eq!(
            fallback.candidate_locales(&text, "ar"),
            vec!["ar", "en", "fr", "es"]
        );
    }

    #[test]
    fn parse_preserves_insertion_order() {
        let parsed = TranslatableText::parse(r#"{"fr":"Test","en":"Test EN","ar":"اختبار"}"#);
        assert!(parsed.is_ok());
        let parsed = parsed.unwrap_or_default();
        assert_eq!(parsed.locales().collect::<Vec<_>>(), vec!["fr", "en", "ar"]);
        assert_eq!(
            parsed.to_json().unwrap_or_default(),
            r#"{"fr":"Test","en":"Test EN","ar":"اختبار"}"#
        );
    }

    #[test]
    fn parse_rejects_non_mapping_text() {
        assert!(TranslatableText::parse("plain text").is_err());
        assert!(TranslatableText::parse("[\"en\"]").is_err());
    }

    #[test]
    fn parse_rejects_locales_without_text() {
        let parsed = TranslatableText::parse(r#"{"en":"Admin","ar":null}"#);
        assert!(matches!(parsed, Err(AppError::Validation(message)) if message.contains("'ar'")));
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut text = TranslatableText::from([("en", "Edit"), ("ar", "تعديل")]);
        text.set("en", "Modify");

        assert_eq!(text.len(), 2);
        assert_eq!(text.first(), Some("Modify"));
    }

    #[test]
    fn translations_are_limited_to_translatable_attributes() {
        let record = Labelled {
            name: TranslatableText::from([("en", "Description"), ("ar", "الوصف")]),
            code: TranslatableText::from([("en", "X")]),
        };

        assert_eq!(
            record.translations("name"),
            Some(&TranslatableText::from([("en", "Description"), ("ar", "الوصف")]))
        );
        assert_eq!(record.translations("code"), None);
        assert_eq!(
            resolve_translatable(&record, "name", "ar", &LocaleFallback::default()),
            Some("الوصف")
        );
        assert_eq!(
            resolve_translatable(&record, "code", "en", &LocaleFallback::default()),
            None
        );
    }

    fn mapping_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
        proptest::collection::vec(("[a-z]{2}", "[A-Za-z ]{0,12}"), 0..6)
    }

    proptest! {
        #[test]
        fn resolution_follows_fallback_order(
            pairs in mapping_strategy(),
            current in "[a-z]{2}",
        ) {
            let text = pairs.iter().fold(TranslatableText::new(), |text, (locale, value)| {
                text.with(locale.as_str(), value.as_str())
            });
            let fallback = LocaleFallback::default();
            let resolved = fallback.resolve(&text, current.as_str());

            let expected = text
                .get(current.as_str())
                .or_else(|| text.get_any(&["en", "ar", "fr"]))
                .or_else(|| text.first());
            prop_assert_eq!(resolved, expected);
            prop_assert_eq!(resolved.is_none(), text.is_empty());
        }
    }
}

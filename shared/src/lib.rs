use derive_more::Add;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Labels the classification backend assigns to a tweet.
///
/// `Unknown` stands in for any tag the backend sends that is not one of the
/// three recognised classes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum TweetLabel {
    #[serde(rename = "hate speech")]
    #[strum(serialize = "hate speech")]
    HateSpeech,
    #[serde(rename = "offensive language")]
    #[strum(serialize = "offensive language")]
    OffensiveLanguage,
    #[serde(rename = "neither")]
    #[strum(serialize = "neither")]
    Neither,
    #[serde(rename = "unknown")]
    #[strum(serialize = "unknown")]
    Unknown,
}

impl TweetLabel {
    pub fn from_backend(tag: &str) -> Self {
        tag.trim().parse().unwrap_or(TweetLabel::Unknown)
    }
}

/// Closed label set for meme classification. There is no fallback member.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum MemeLabel {
    #[serde(rename = "hate meme")]
    #[strum(serialize = "hate meme")]
    HateMeme,
    #[serde(rename = "not hate meme")]
    #[strum(serialize = "not hate meme")]
    NotHateMeme,
    #[serde(rename = "normal meme")]
    #[strum(serialize = "normal meme")]
    NormalMeme,
    #[serde(rename = "fair meme")]
    #[strum(serialize = "fair meme")]
    FairMeme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSignal {
    pub word: String,
    pub tfidf: f64,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "predicted_class")]
    pub label: TweetLabel,
    #[serde(rename = "confidence")]
    pub confidence_score: f64,
    #[serde(rename = "word_scores")]
    pub signals: Vec<WordSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemeResult {
    pub label: MemeLabel,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Add, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: u64,
    pub hate_speech: u64,
    pub offensive: u64,
    pub neither: u64,
}

impl Stats {
    pub fn record(&mut self, label: TweetLabel) {
        self.total += 1;
        match label {
            TweetLabel::HateSpeech => self.hate_speech += 1,
            TweetLabel::OffensiveLanguage => self.offensive += 1,
            TweetLabel::Neither => self.neither += 1,
            TweetLabel::Unknown => {}
        }
    }

    pub fn categorized(&self) -> u64 {
        self.hate_speech + self.offensive + self.neither
    }
}

impl std::iter::Sum for Stats {
    fn sum<I: Iterator<Item = Stats>>(iter: I) -> Self {
        iter.fold(Stats::default(), |acc, s| acc + s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRow {
    pub row: Map<String, Value>,
    pub label: TweetLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub stats: Stats,
    pub csv: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<BatchRow>,
}

/// Body of every non-2xx response the console returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            hint: None,
            raw: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tweet_labels_parse_loosely() {
        assert_eq!(TweetLabel::from_backend("Hate Speech"), TweetLabel::HateSpeech);
        assert_eq!(TweetLabel::from_backend(" neither "), TweetLabel::Neither);
        assert_eq!(TweetLabel::from_backend("spam"), TweetLabel::Unknown);
    }

    #[test]
    fn meme_labels_are_exact() {
        assert!("Hate Meme".parse::<MemeLabel>().is_err());
        assert_eq!("fair meme".parse::<MemeLabel>().unwrap(), MemeLabel::FairMeme);
        assert_eq!(MemeLabel::iter().count(), 4);
    }

    #[test]
    fn labels_serialize_as_display_strings() {
        for label in TweetLabel::iter() {
            let json = serde_json::to_value(label).unwrap();
            assert_eq!(json, Value::String(label.to_string()));
        }
        for label in MemeLabel::iter() {
            let json = serde_json::to_value(label).unwrap();
            assert_eq!(json, Value::String(label.to_string()));
        }
    }

    #[test]
    fn stats_serialize_camel_case() {
        let stats = Stats {
            total: 4,
            hate_speech: 1,
            offensive: 2,
            neither: 0,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"total": 4, "hateSpeech": 1, "offensive": 2, "neither": 0})
        );
        assert!(stats.categorized() <= stats.total);
    }

    #[test]
    fn error_body_omits_empty_fields() {
        let body = ErrorBody::new("Tweet text is required");
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"error":"Tweet text is required"}"#
        );
    }
}

//! Turns loosely-typed external responses into the console's result types.
//!
//! Classification backend fields are read through ordered alias lists.
//! Vision model text is searched for a JSON object and its label is checked
//! against the closed meme label set.

use serde_json::{Map, Value};
use shared::{AnalysisResult, BatchResult, BatchRow, MemeLabel, MemeResult, Stats, TweetLabel, WordSignal};

use crate::error::AnalysisError;
use crate::stats;

pub const PREDICTED_CLASS: &[&str] = &["predicted_class", "predictedClass", "class"];
pub const CONFIDENCE: &[&str] = &["confidence", "score"];
pub const WORD_SCORES: &[&str] = &["word_scores", "wordScores", "words"];

pub const CSV: &[&str] = &["csv"];
pub const ROWS: &[&str] = &["rows", "results", "predictions"];
pub const ROW_LABEL: &[&str] = &[
    "predicted_behavior",
    "predicted_class",
    "predictedClass",
    "class",
    "label",
];
pub const STATS: &[&str] = &["stats"];
pub const STATS_TOTAL: &[&str] = &["total"];
pub const STATS_HATE: &[&str] = &["hateSpeech", "hate_speech"];
pub const STATS_OFFENSIVE: &[&str] = &["offensive", "offensive_language", "offensiveLanguage"];
pub const STATS_NEITHER: &[&str] = &["neither"];

pub const DEFAULT_REASON: &str = "No reason provided by the model.";
const NON_JSON_MODEL_OUTPUT: &str = "model returned non-JSON response";

/// Read the first candidate field that is present and readable as `T`.
///
/// Candidates are tried in order; a field that exists but is null or of the
/// wrong type does not stop the search.
pub fn pick_first_present<T>(
    candidates: &[&str],
    record: &Map<String, Value>,
    default: T,
    read: impl Fn(&Value) -> Option<T>,
) -> T {
    candidates
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(read)
        .unwrap_or(default)
}

fn read_str(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn read_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_array(value: &Value) -> Option<Vec<Value>> {
    value.as_array().cloned()
}

fn as_record<'a>(body: &'a Value, source: &str) -> Result<&'a Map<String, Value>, AnalysisError> {
    body.as_object().ok_or_else(|| {
        AnalysisError::ExternalFormat(format!("{} returned a non-object JSON response", source))
    })
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 100.0) } else { 0.0 }
}

fn word_signal(entry: &Value) -> Option<WordSignal> {
    let entry = entry.as_object()?;
    let word = entry.get("word")?.as_str()?.to_string();
    let tfidf = entry.get("tfidf").and_then(read_f64).filter(|v| v.is_finite());
    let coefficient = entry
        .get("coefficient")
        .and_then(read_f64)
        .filter(|v| v.is_finite());
    Some(WordSignal {
        word,
        tfidf: tfidf.unwrap_or(0.0).max(0.0),
        coefficient: coefficient.unwrap_or(0.0),
    })
}

pub fn normalize_tweet(body: &Value) -> Result<AnalysisResult, AnalysisError> {
    let record = as_record(body, "classification backend")?;

    let tag = pick_first_present(PREDICTED_CLASS, record, "unknown".to_string(), read_str);
    let confidence = pick_first_present(CONFIDENCE, record, 0.0, read_f64);
    let words = pick_first_present(WORD_SCORES, record, Vec::new(), read_array);

    Ok(AnalysisResult {
        label: TweetLabel::from_backend(&tag),
        confidence_score: clamp_confidence(confidence),
        signals: words.iter().filter_map(word_signal).collect(),
    })
}

fn batch_row(entry: &Value) -> Option<BatchRow> {
    let mut row = entry.as_object()?.clone();
    let label_key = ROW_LABEL
        .iter()
        .find(|key| row.get(**key).is_some_and(Value::is_string))?;
    let label = row
        .remove(*label_key)
        .and_then(|v| v.as_str().map(TweetLabel::from_backend))
        .unwrap_or(TweetLabel::Unknown);
    Some(BatchRow { row, label })
}

fn unlabelled_row(entry: &Value) -> BatchRow {
    BatchRow {
        row: entry.as_object().cloned().unwrap_or_default(),
        label: TweetLabel::Unknown,
    }
}

fn reported_stats(record: &Map<String, Value>) -> Stats {
    let stats = pick_first_present(STATS, record, Map::new(), |v| v.as_object().cloned());
    let mut reported = Stats {
        total: pick_first_present(STATS_TOTAL, &stats, 0, read_u64),
        hate_speech: pick_first_present(STATS_HATE, &stats, 0, read_u64),
        offensive: pick_first_present(STATS_OFFENSIVE, &stats, 0, read_u64),
        neither: pick_first_present(STATS_NEITHER, &stats, 0, read_u64),
    };
    // Bucket counts never exceed the total.
    reported.total = reported.total.max(reported.categorized());
    reported
}

/// Normalize a bulk response.
///
/// When the backend sends per-row labels the counts are derived from them;
/// otherwise the backend's own summary is read through its aliases.
pub fn normalize_batch(body: &Value) -> Result<BatchResult, AnalysisError> {
    let record = as_record(body, "classification backend")?;
    let csv = pick_first_present(CSV, record, String::new(), read_str);

    let rows = ROWS
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(Value::as_array);

    let (stats, rows) = match rows {
        Some(entries) => {
            let rows: Vec<BatchRow> = entries
                .iter()
                .map(|entry| batch_row(entry).unwrap_or_else(|| unlabelled_row(entry)))
                .collect();
            (stats::aggregate(rows.iter().map(|r| r.label)), rows)
        }
        None => (reported_stats(record), Vec::new()),
    };

    Ok(BatchResult { stats, csv, rows })
}

/// Byte ranges of every balanced `{...}` span, in order of their opening brace.
///
/// Braces inside JSON string literals are ignored. A `{` that never closes
/// yields nothing and scanning resumes at the next one.
fn balanced_objects(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();

    for start in bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'{')
        .map(|(i, _)| i)
    {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, &b) in bytes[start..].iter().enumerate() {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push((start, start + offset + 1));
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    spans
}

/// Recover one JSON value from model output that may be wrapped in prose.
pub fn extract_json_object(text: &str) -> Result<Value, AnalysisError> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(value);
    }

    for (start, end) in balanced_objects(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&text[start..end]) {
            return Ok(value);
        }
    }

    Err(AnalysisError::ExternalFormat(NON_JSON_MODEL_OUTPUT.to_string()))
}

pub fn normalize_meme(text: &str) -> Result<MemeResult, AnalysisError> {
    let parsed = extract_json_object(text)?;

    let label = parsed
        .get("label")
        .and_then(Value::as_str)
        .and_then(|label| label.parse::<MemeLabel>().ok());
    let Some(label) = label else {
        return Err(AnalysisError::ExternalValidation { raw: parsed });
    };

    let reason = parsed
        .get("reason")
        .and_then(Value::as_str)
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or(DEFAULT_REASON)
        .to_string();

    Ok(MemeResult { label, reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pick_first_present_prefers_earlier_aliases() {
        let record = json!({"class": "neither", "predictedClass": "hate speech"});
        let record = record.as_object().unwrap();
        let picked = pick_first_present(PREDICTED_CLASS, record, "unknown".to_string(), read_str);
        assert_eq!(picked, "hate speech");
    }

    #[test]
    fn pick_first_present_skips_null_and_mistyped_fields() {
        let record = json!({"confidence": null, "score": 71.5});
        let record = record.as_object().unwrap();
        assert_eq!(pick_first_present(CONFIDENCE, record, 0.0, read_f64), 71.5);

        let record = json!({"predicted_class": 3, "class": "neither"});
        let record = record.as_object().unwrap();
        let picked = pick_first_present(PREDICTED_CLASS, record, "unknown".to_string(), read_str);
        assert_eq!(picked, "neither");
    }

    #[test]
    fn alias_choice_does_not_change_the_result() {
        let signals = json!([{"word": "idiot", "tfidf": 0.42, "coefficient": 1.7}]);
        let results: Vec<AnalysisResult> = PREDICTED_CLASS
            .iter()
            .map(|alias| {
                let mut body = json!({"confidence": 88.0, "word_scores": signals.clone()});
                body[*alias] = json!("offensive language");
                normalize_tweet(&body).unwrap()
            })
            .collect();
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(results[0].label, TweetLabel::OffensiveLanguage);
    }

    #[test]
    fn missing_fields_fall_back_to_sentinels() {
        let result = normalize_tweet(&json!({})).unwrap();
        assert_eq!(result.label, TweetLabel::Unknown);
        assert_eq!(result.confidence_score, 0.0);
        assert!(result.signals.is_empty());
    }

    #[test]
    fn unrecognized_tag_becomes_unknown() {
        let result = normalize_tweet(&json!({"predicted_class": "spam", "score": 12})).unwrap();
        assert_eq!(result.label, TweetLabel::Unknown);
        assert_eq!(result.confidence_score, 12.0);
    }

    #[test]
    fn confidence_is_clamped_into_percent_range() {
        let high = normalize_tweet(&json!({"confidence": 140})).unwrap();
        assert_eq!(high.confidence_score, 100.0);
        let low = normalize_tweet(&json!({"confidence": -3})).unwrap();
        assert_eq!(low.confidence_score, 0.0);
    }

    #[test]
    fn word_signals_keep_backend_order() {
        let body = json!({
            "predicted_class": "hate speech",
            "wordScores": [
                {"word": "b", "tfidf": 0.9, "coefficient": -0.2},
                {"tfidf": 0.5},
                {"word": "a", "tfidf": -1.0, "coefficient": 2.5},
                {"word": "c"}
            ]
        });
        let result = normalize_tweet(&body).unwrap();
        let words: Vec<&str> = result.signals.iter().map(|s| s.word.as_str()).collect();
        assert_eq!(words, ["b", "a", "c"]);
        assert_eq!(result.signals[1].tfidf, 0.0);
        assert_eq!(result.signals[1].coefficient, 2.5);
        assert_eq!(result.signals[2].coefficient, 0.0);
    }

    #[test]
    fn non_object_backend_body_is_a_format_error() {
        let err = normalize_tweet(&json!(["neither"])).unwrap_err();
        assert!(matches!(err, AnalysisError::ExternalFormat(_)));
    }

    #[test]
    fn batch_stats_come_from_rows_when_present() {
        let body = json!({
            "csv": "tweets,predicted_behavior\na,neither\n",
            "rows": [
                {"tweets": "a", "predicted_behavior": "neither"},
                {"tweets": "b", "predicted_behavior": "hate speech"},
                {"tweets": "c", "predicted_behavior": "gibberish"},
                {"tweets": "d"}
            ],
            "stats": {"total": 99}
        });
        let result = normalize_batch(&body).unwrap();
        assert_eq!(
            result.stats,
            Stats {
                total: 4,
                hate_speech: 1,
                offensive: 0,
                neither: 1
            }
        );
        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.rows[0].row.get("tweets"), Some(&json!("a")));
        assert!(!result.rows[0].row.contains_key("predicted_behavior"));
        assert_eq!(result.rows[3].label, TweetLabel::Unknown);
        assert!(result.csv.starts_with("tweets,predicted_behavior"));
    }

    #[test]
    fn batch_stats_fall_back_to_reported_summary() {
        let body = json!({
            "csv": "tweets,predicted_behavior\n",
            "stats": {"total": 10, "hate_speech": 2, "offensive": 3, "neither": 4}
        });
        let result = normalize_batch(&body).unwrap();
        assert_eq!(
            result.stats,
            Stats {
                total: 10,
                hate_speech: 2,
                offensive: 3,
                neither: 4
            }
        );
        assert!(result.rows.is_empty());
    }

    #[test]
    fn reported_total_is_raised_to_cover_buckets() {
        let body = json!({
            "csv": "",
            "stats": {"total": 1, "hateSpeech": 5, "offensive": 2, "neither": 0}
        });
        let stats = normalize_batch(&body).unwrap().stats;
        assert_eq!(stats.total, 7);
        assert_eq!((stats.hate_speech, stats.offensive, stats.neither), (5, 2, 0));
        assert!(stats.categorized() <= stats.total);
    }

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let text = r#"here you go: {"label":"fair meme","reason":"x"} thanks"#;
        let result = normalize_meme(text).unwrap();
        assert_eq!(
            result,
            MemeResult {
                label: MemeLabel::FairMeme,
                reason: "x".into()
            }
        );
    }

    #[test]
    fn extraction_skips_stray_braces_in_prose() {
        let text = "Sure {see below}: ```json\n{\"label\": \"hate meme\", \"reason\": \"uses a slur } here\"}\n``` done {";
        let result = normalize_meme(text).unwrap();
        assert_eq!(result.label, MemeLabel::HateMeme);
        assert_eq!(result.reason, "uses a slur } here");
    }

    #[test]
    fn label_outside_closed_set_is_rejected() {
        let err = normalize_meme(r#"{"label":"funny meme","reason":"x"}"#).unwrap_err();
        match err {
            AnalysisError::ExternalValidation { raw } => {
                assert_eq!(raw, json!({"label": "funny meme", "reason": "x"}));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn missing_label_is_rejected() {
        let err = normalize_meme(r#"{"reason":"x"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::ExternalValidation { .. }));
    }

    #[test]
    fn text_without_json_is_a_format_error() {
        let err = normalize_meme("I cannot classify this image.").unwrap_err();
        match err {
            AnalysisError::ExternalFormat(message) => {
                assert_eq!(message, "model returned non-JSON response")
            }
            other => panic!("expected format error, got {:?}", other),
        }
        assert!(matches!(
            normalize_meme("{ not json at all }"),
            Err(AnalysisError::ExternalFormat(_))
        ));
    }

    #[test]
    fn missing_reason_uses_placeholder() {
        let result = normalize_meme(r#"{"label":"normal meme"}"#).unwrap();
        assert_eq!(result.reason, DEFAULT_REASON);
    }
}

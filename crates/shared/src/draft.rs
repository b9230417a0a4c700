//! Autosave draft keys and the emptiness rule that decides when a draft is
//! worth keeping.

/// Build the storage key for a draft: `<prefix>:draft:<segment>:...:<segment>`.
pub fn draft_key<S: AsRef<str>>(prefix: &str, segments: &[S]) -> String {
    let mut key = format!("{}:draft", prefix);
    for segment in segments {
        key.push(':');
        key.push_str(segment.as_ref());
    }
    key
}

/// Values that can be autosaved. An empty draft is removed from storage
/// instead of being written.
pub trait DraftValue {
    fn is_empty_draft(&self) -> bool;
}

/// Markup a rich text editor emits for an empty document.
const EMPTY_RICH_TEXT: &[&str] = &["<p></p>", "<p><br></p>", "<p><br/></p>"];

fn is_blank_text(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || EMPTY_RICH_TEXT.contains(&trimmed)
}

impl DraftValue for String {
    fn is_empty_draft(&self) -> bool {
        is_blank_text(self)
    }
}

impl<T: DraftValue> DraftValue for Option<T> {
    fn is_empty_draft(&self) -> bool {
        self.as_ref().map_or(true, DraftValue::is_empty_draft)
    }
}

impl<T> DraftValue for Vec<T> {
    fn is_empty_draft(&self) -> bool {
        self.is_empty()
    }
}

impl DraftValue for serde_json::Value {
    fn is_empty_draft(&self) -> bool {
        match self {
            serde_json::Value::Null => true,
            serde_json::Value::String(s) => is_blank_text(s),
            serde_json::Value::Array(items) => items.is_empty(),
            serde_json::Value::Object(fields) => fields.values().all(DraftValue::is_empty_draft),
            serde_json::Value::Bool(_) | serde_json::Value::Number(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_joins_segments() {
        assert_eq!(
            draft_key("courtside", &["rich-comment", "event", "e-42"]),
            "courtside:draft:rich-comment:event:e-42"
        );
        assert_eq!(draft_key::<&str>("courtside", &[]), "courtside:draft");
    }

    #[test]
    fn whitespace_and_empty_markup_are_empty() {
        assert!("   ".to_string().is_empty_draft());
        assert!("<p></p>".to_string().is_empty_draft());
        assert!(!"<p>hi</p>".to_string().is_empty_draft());
        assert!(None::<String>.is_empty_draft());
    }

    #[test]
    fn json_objects_are_empty_when_every_field_is() {
        assert!(json!({"title": "", "drills": []}).is_empty_draft());
        assert!(!json!({"title": "", "duration": 0}).is_empty_draft());
    }
}

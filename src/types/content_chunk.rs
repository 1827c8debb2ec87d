use serde::{Deserialize, Serialize};

/// The JSON object carried by each `data: ` record of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// The next piece of reply text.
    pub content: String,
}

impl From<ContentChunk> for crate::types::Delta {
    fn from(chunk: ContentChunk) -> Self {
        crate::types::Delta::TextFragment(chunk.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_chunk_ignores_extra_fields() {
        let json = json!({"content": "Hi", "index": 3});
        let chunk: ContentChunk = serde_json::from_value(json).unwrap();
        assert_eq!(chunk.content, "Hi");
    }

    #[test]
    fn content_chunk_requires_string_content() {
        assert!(serde_json::from_value::<ContentChunk>(json!({"content": 7})).is_err());
        assert!(serde_json::from_value::<ContentChunk>(json!({"text": "Hi"})).is_err());
    }
}

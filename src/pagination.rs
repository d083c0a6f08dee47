//! Page results and offset cursors
//!
//! A paged search returns a [`Page`] carrying the requested window and the
//! total number of matching rows. Offsets can also be handed out as opaque
//! cursors so a client can continue after the last row it has seen.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;

/// One page of results with total-count metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The items on this page, in query order
    pub content: Vec<T>,
    /// Number of rows matching the same predicate as `content`
    pub total_elements: u64,
    pub page: u32,
    pub size: u32,
    /// Row offset of the first item
    #[serde(skip)]
    pub offset: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: u64, page: u32, size: u32, offset: u64) -> Self {
        Self {
            content,
            total_elements,
            page,
            size,
            offset,
        }
    }

    /// Create an empty page
    pub fn empty(page: u32, size: u32) -> Self {
        Self::new(Vec::new(), 0, page, size, page as u64 * size as u64)
    }

    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(self.size as u64)
    }

    /// Are there rows after this page?
    pub fn has_next(&self) -> bool {
        self.offset + (self.content.len() as u64) < self.total_elements
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Cursor of the last item, to continue with the next page
    pub fn next_cursor(&self) -> Option<String> {
        if self.content.is_empty() || !self.has_next() {
            return None;
        }
        let last = self.offset + self.content.len() as u64 - 1;
        Some(encode_cursor(last as i64))
    }

    /// Transform every item, keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            page: self.page,
            size: self.size,
            offset: self.offset,
        }
    }
}

/// Encode an offset as a cursor string
pub fn encode_cursor(offset: i64) -> String {
    BASE64.encode(format!("cursor:{}", offset))
}

/// Decode a cursor string to an offset
pub fn decode_cursor(cursor: &str) -> Result<i64, &'static str> {
    let decoded = BASE64.decode(cursor).map_err(|_| "invalid cursor format")?;

    let s = String::from_utf8(decoded).map_err(|_| "invalid cursor encoding")?;

    let Some(value) = s.strip_prefix("cursor:") else {
        return Err("invalid cursor prefix");
    };

    value.parse().map_err(|_| "invalid cursor value")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_roundtrip() {
        for offset in [0, 1, 100, 999999] {
            let cursor = encode_cursor(offset);
            let decoded = decode_cursor(&cursor).unwrap();
            assert_eq!(offset, decoded);
        }
    }

    #[test]
    fn test_cursor_errors() {
        assert_eq!(decode_cursor("%%%"), Err("invalid cursor format"));
        assert_eq!(
            decode_cursor(&BASE64.encode("offset:3")),
            Err("invalid cursor prefix")
        );
        assert_eq!(
            decode_cursor(&BASE64.encode("cursor:abc")),
            Err("invalid cursor value")
        );
    }

    #[test]
    fn test_page_metadata() {
        let page = Page::new(vec![1, 2, 3], 7, 0, 3, 0);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert_eq!(page.next_cursor(), Some(encode_cursor(2)));

        let last = Page::new(vec![7], 7, 2, 3, 6);
        assert!(!last.has_next());
        assert_eq!(last.next_cursor(), None);

        let beyond: Page<i32> = Page::new(Vec::new(), 20, 1, 20, 20);
        assert!(beyond.is_empty());
        assert!(!beyond.has_next());
        assert_eq!(beyond.total_pages(), 1);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let page = Page::new(vec!["a"], 1, 0, 20, 0);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "content": ["a"],
                "totalElements": 1,
                "page": 0,
                "size": 20
            })
        );
    }
}

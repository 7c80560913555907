/// RTSP header collection (RFC 2326 §4.2).
///
/// Names compare case-insensitively. Each distinct name keeps its values in
/// arrival order, and names keep the order in which they were first seen.
/// Repeating a header appends a value instead of overwriting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value under `name`, keeping the spelling of the first occurrence.
    pub fn append(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(idx) => self.entries[idx].1.push(value.to_string()),
            None => self
                .entries
                .push((name.to_string(), vec![value.to_string()])),
        }
    }

    /// Replace every value of `name` with `value`.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(idx) => self.entries[idx].1 = vec![value.to_string()],
            None => self
                .entries
                .push((name.to_string(), vec![value.to_string()])),
        }
    }

    /// First value recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|idx| self.entries[idx].1.first())
            .map(String::as_str)
    }

    /// All values recorded for `name`, in arrival order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|idx| self.entries[idx].1.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs, grouped by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(name, values)| {
            values.iter().map(move |v| (name.as_str(), v.as_str()))
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.append("CSeq", "7");
        assert_eq!(headers.get("cseq"), Some("7"));
        assert_eq!(headers.get("CSEQ"), Some("7"));
        assert!(headers.contains("Cseq"));
        assert_eq!(headers.get("Session"), None);
    }

    #[test]
    fn duplicates_accumulate_and_first_wins() {
        let mut headers = HeaderMap::new();
        headers.append("Via", "a");
        headers.append("CSeq", "1");
        headers.append("via", "b");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("VIA"), Some("a"));
        assert_eq!(headers.get_all("Via"), ["a".to_string(), "b".to_string()]);

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("Via", "a"), ("Via", "b"), ("CSeq", "1")]);
    }

    #[test]
    fn set_replaces_all_values_in_place() {
        let mut headers = HeaderMap::new();
        headers.append("CSeq", "1");
        headers.append("Content-Length", "3");
        headers.append("content-length", "4");
        headers.set("CONTENT-LENGTH", "9");
        headers.set("Session", "0A1B2C3D");

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(
            pairs,
            vec![("CSeq", "1"), ("Content-Length", "9"), ("Session", "0A1B2C3D")]
        );
    }
}

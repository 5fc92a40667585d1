//! Resource trie (C7): path-pattern dispatch with literal, single-segment
//! (`*`), and subtree (`**`) wildcards, matched in that preference order.

use std::collections::HashMap;

use crate::error::UcResult;
use crate::xml::percent_decode;

/// A node in the resource trie. `H` is the handler type stored at each
/// registered path (typically `Arc<dyn ResourceHandler>`).
pub struct TrieNode<H> {
    handler: Option<H>,
    literal: HashMap<String, TrieNode<H>>,
    wildcard: Option<Box<TrieNode<H>>>,
    subtree: Option<H>,
}

impl<H> Default for TrieNode<H> {
    fn default() -> Self {
        Self {
            handler: None,
            literal: HashMap::new(),
            wildcard: None,
            subtree: None,
        }
    }
}

impl<H: Clone> TrieNode<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` at `segments`, where `"*"` matches exactly one
    /// segment and `"**"` matches the remainder of the path (must be the
    /// last segment).
    pub fn insert(&mut self, segments: &[&str], handler: H) {
        match segments.split_first() {
            None => self.handler = Some(handler),
            Some((&"*", rest)) => {
                self.wildcard
                    .get_or_insert_with(|| Box::new(TrieNode::default()))
                    .insert(rest, handler);
            }
            Some((&"**", _rest)) => {
                self.subtree = Some(handler);
            }
            Some((head, rest)) => {
                self.literal
                    .entry((*head).to_string())
                    .or_default()
                    .insert(rest, handler);
            }
        }
    }

    /// Walks `segments`, preferring literal matches, then `*`, then `**`.
    /// On a `**` match the walk terminates immediately and returns the
    /// remaining (unconsumed) segments joined by `/` as the single capture.
    /// Returns the matched handler plus the ordered list of wildcard
    /// captures (one per `*`, then the `**` remainder if applicable).
    pub fn lookup(&self, segments: &[String]) -> Option<(H, Vec<String>)> {
        if segments.is_empty() {
            if let Some(h) = &self.handler {
                return Some((h.clone(), Vec::new()));
            }
        } else if let Some((head, rest)) = segments.split_first() {
            if let Some(child) = self.literal.get(head) {
                if let Some(found) = child.lookup(rest) {
                    return Some(found);
                }
            }
            if let Some(wc) = &self.wildcard {
                if let Some((h, mut captures)) = wc.lookup(rest) {
                    captures.insert(0, head.clone());
                    return Some((h, captures));
                }
            }
        }

        if let Some(h) = &self.subtree {
            let remainder = segments.join("/");
            return Some((h.clone(), vec![remainder]));
        }

        None
    }
}

/// Splits and percent-decodes a request path into segments, dropping empty
/// leading/trailing segments produced by a leading/trailing `/`.
pub fn split_path(path: &str) -> UcResult<Vec<String>> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(percent_decode)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_literal_path() {
        let mut trie: TrieNode<&'static str> = TrieNode::new();
        trie.insert(&["uc", "time"], "time-handler");
        let (h, captures) = trie.lookup(&segs(&["uc", "time"])).unwrap();
        assert_eq!(h, "time-handler");
        assert!(captures.is_empty());
    }

    #[test]
    fn matches_single_wildcard_and_captures_it() {
        let mut trie: TrieNode<&'static str> = TrieNode::new();
        trie.insert(&["uc", "sources", "*"], "source-handler");
        let (h, captures) = trie.lookup(&segs(&["uc", "sources", "abc123"])).unwrap();
        assert_eq!(h, "source-handler");
        assert_eq!(captures, vec!["abc123".to_string()]);
    }

    #[test]
    fn prefers_literal_over_wildcard() {
        let mut trie: TrieNode<&'static str> = TrieNode::new();
        trie.insert(&["uc", "outputs", "*"], "output-handler");
        trie.insert(&["uc", "outputs", "main"], "main-output-handler");
        let (h, _) = trie.lookup(&segs(&["uc", "outputs", "main"])).unwrap();
        assert_eq!(h, "main-output-handler");
        let (h, captures) = trie.lookup(&segs(&["uc", "outputs", "xyz"])).unwrap();
        assert_eq!(h, "output-handler");
        assert_eq!(captures, vec!["xyz".to_string()]);
    }

    #[test]
    fn subtree_wildcard_captures_remainder_including_empty() {
        let mut trie: TrieNode<&'static str> = TrieNode::new();
        trie.insert(&["uc", "apps", "*", "ext", "**"], "ext-handler");
        let (h, captures) = trie
            .lookup(&segs(&["uc", "apps", "a1", "ext", "foo", "bar"]))
            .unwrap();
        assert_eq!(h, "ext-handler");
        assert_eq!(captures, vec!["a1".to_string(), "foo/bar".to_string()]);

        let (_, captures) = trie
            .lookup(&segs(&["uc", "apps", "a1", "ext"]))
            .unwrap();
        assert_eq!(captures, vec!["a1".to_string(), String::new()]);
    }

    #[test]
    fn no_match_returns_none() {
        let mut trie: TrieNode<&'static str> = TrieNode::new();
        trie.insert(&["uc", "time"], "time-handler");
        assert!(trie.lookup(&segs(&["uc", "power"])).is_none());
    }

    #[test]
    fn split_path_decodes_and_drops_empty_segments() {
        let segments = split_path("/uc/sources/crid%3A%2F%2Fa/").unwrap();
        assert_eq!(segments, vec!["uc", "sources", "crid://a"]);
    }
}

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct Node {
    children: HashMap<char, Node>,
    // How many times the prefix ending here was added.
    terminal: usize,
}

/// A prefix trie over encoding escape sequences.
///
/// Used to find the longest known escape sequence that starts at some position of a line, e.g.
/// while the user is typing `\"a`.
#[derive(Debug, Clone, Default)]
pub struct PrefixStore {
    root: Node,
    len: usize,
}

impl PrefixStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct prefixes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no prefix is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add a prefix. Adding the same prefix twice requires removing it twice.
    pub fn add_prefix(&mut self, prefix: &str) {
        if prefix.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for c in prefix.chars() {
            node = node.children.entry(c).or_default();
        }
        if node.terminal == 0 {
            self.len += 1;
        }
        node.terminal += 1;
    }

    /// Remove one occurrence of a prefix.
    pub fn remove_prefix(&mut self, prefix: &str) {
        let chars: Vec<char> = prefix.chars().collect();
        if chars.is_empty() {
            return;
        }
        if let Some(emptied) = remove_from(&mut self.root, &chars)
            && emptied
        {
            self.len -= 1;
        }
    }

    /// Whether `prefix` is stored.
    pub fn contains(&self, prefix: &str) -> bool {
        let mut node = &self.root;
        for c in prefix.chars() {
            match node.children.get(&c) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.terminal > 0
    }

    /// Longest stored prefix of `text[start..]` (`start` is a char index).
    ///
    /// Returns the matching slice of `text`.
    pub fn longest_prefix_match<'t>(&self, text: &'t str, start: usize) -> Option<&'t str> {
        let (start_byte, _) = text.char_indices().nth(start)?;
        let rest = &text[start_byte..];

        let mut node = &self.root;
        let mut best = None;
        for (i, c) in rest.char_indices() {
            match node.children.get(&c) {
                Some(next) => node = next,
                None => break,
            }
            if node.terminal > 0 {
                best = Some(&rest[..i + c.len_utf8()]);
            }
        }
        best
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.root = Node::default();
        self.len = 0;
    }
}

// Returns Some(true) if the prefix disappeared completely, Some(false) if only its count
// dropped, None if it was not stored.
fn remove_from(node: &mut Node, chars: &[char]) -> Option<bool> {
    let Some((first, rest)) = chars.split_first() else {
        if node.terminal == 0 {
            return None;
        }
        node.terminal -= 1;
        return Some(node.terminal == 0);
    };

    let child = node.children.get_mut(first)?;
    let result = remove_from(child, rest)?;
    if child.terminal == 0 && child.children.is_empty() {
        node.children.remove(first);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        let mut store = PrefixStore::new();
        store.add_prefix("\\\"");
        store.add_prefix("\\\"a");
        store.add_prefix("\\ss");

        assert_eq!(store.longest_prefix_match("x\\\"ab", 1), Some("\\\"a"));
        assert_eq!(store.longest_prefix_match("\\\"o", 0), Some("\\\""));
        assert_eq!(store.longest_prefix_match("\\s", 0), None);
        assert_eq!(store.longest_prefix_match("abc", 10), None);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_remove_respects_add_count() {
        let mut store = PrefixStore::new();
        store.add_prefix("&auml;");
        store.add_prefix("&auml;");
        store.add_prefix("&a");

        store.remove_prefix("&auml;");
        assert!(store.contains("&auml;"));
        store.remove_prefix("&auml;");
        assert!(!store.contains("&auml;"));
        assert!(store.contains("&a"));
        assert_eq!(store.len(), 1);

        store.remove_prefix("missing");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_non_ascii_start_index() {
        let mut store = PrefixStore::new();
        store.add_prefix("ß");
        assert_eq!(store.longest_prefix_match("äß", 1), Some("ß"));
    }
}

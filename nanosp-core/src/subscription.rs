//! Prefix subscription trie for SUB sockets.
//!
//! Topics are matched by byte prefix. The empty prefix matches every
//! message; an empty trie matches nothing.

use hashbrown::HashMap;

#[derive(Debug, Default)]
struct Node {
    /// Number of times this exact prefix was subscribed
    refs: usize,
    children: HashMap<u8, Node>,
}

impl Node {
    fn is_vacant(&self) -> bool {
        self.refs == 0 && self.children.is_empty()
    }
}

/// Subscription set with reference-counted prefixes.
///
/// Subscribing the same prefix twice requires two unsubscribes to remove it.
#[derive(Debug, Default)]
pub struct SubscriptionTrie {
    root: Node,
    len: usize,
}

impl SubscriptionTrie {
    /// Create a new empty subscription trie
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription
    pub fn subscribe(&mut self, prefix: &[u8]) {
        let mut node = &mut self.root;
        for byte in prefix {
            node = node.children.entry(*byte).or_default();
        }
        if node.refs == 0 {
            self.len += 1;
        }
        node.refs += 1;
    }

    /// Remove one reference to a subscription.
    ///
    /// Returns `false` if the prefix was not subscribed.
    pub fn unsubscribe(&mut self, prefix: &[u8]) -> bool {
        let removed = Self::remove(&mut self.root, prefix);
        if removed == Some(true) {
            self.len -= 1;
        }
        removed.is_some()
    }

    /// Returns `None` if absent, `Some(true)` if the last reference went away.
    fn remove(node: &mut Node, prefix: &[u8]) -> Option<bool> {
        match prefix.split_first() {
            None => {
                if node.refs == 0 {
                    return None;
                }
                node.refs -= 1;
                Some(node.refs == 0)
            }
            Some((byte, rest)) => {
                let child = node.children.get_mut(byte)?;
                let result = Self::remove(child, rest)?;
                if child.is_vacant() {
                    node.children.remove(byte);
                }
                Some(result)
            }
        }
    }

    /// Check if a message body matches any subscription.
    #[must_use]
    pub fn matches(&self, body: &[u8]) -> bool {
        let mut node = &self.root;
        if node.refs > 0 {
            return true;
        }
        for byte in body {
            match node.children.get(byte) {
                Some(child) => node = child,
                None => return false,
            }
            if node.refs > 0 {
                return true;
            }
        }
        false
    }

    /// Distinct prefixes currently subscribed
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

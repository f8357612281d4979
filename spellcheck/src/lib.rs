//! Spell checker backed by a letter trie.
//!
//! Every dictionary word is stored as a chain of [`LETTER`] nodes hanging off
//! the root, one per character, with a [`WORD`] node under the last letter
//! marking the end of a complete word. Words sharing a prefix share the
//! letter nodes of that prefix.

use std::ops::ControlFlow;
use std::path::Path;

use ntree::{NodeHandle, NodeType, Scope, Timing, Tree};
use tracing::debug;

/// Type tag of a node holding one letter.
pub const LETTER: NodeType = NodeType::from_fourcc(*b"LETR");
/// Type tag of a node marking a complete word.
pub const WORD: NodeType = NodeType::from_fourcc(*b"WORD");

/// Word list used when no dictionary file is given.
pub const DEFAULT_DICTIONARY: &str = include_str!("dictionary.txt");

/// Payload of a trie node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Entry {
    #[default]
    Root,
    Letter(char),
    Word(String),
}

/// Dictionary of known words.
#[derive(Debug)]
pub struct SpellChecker {
    tree: Tree<Entry>,
    words: usize,
}

impl SpellChecker {
    /// An empty dictionary.
    pub fn new() -> Self {
        Self {
            tree: Tree::new(),
            words: 0,
        }
    }

    /// Builds a dictionary from whitespace-delimited words.
    pub fn from_dictionary(text: &str) -> ntree::Result<Self> {
        let mut checker = Self::new();
        for word in text.split_whitespace() {
            checker.add_word(word)?;
        }
        debug!(
            words = checker.words,
            nodes = checker.tree.len(),
            "loaded dictionary"
        );
        Ok(checker)
    }

    /// Builds a dictionary from a word-list file.
    pub fn load_file(path: impl AsRef<Path>) -> ntree::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_dictionary(&text)
    }

    /// Number of distinct words.
    #[inline]
    pub fn len(&self) -> usize {
        self.words
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    #[inline]
    pub fn tree(&self) -> &Tree<Entry> {
        &self.tree
    }

    /// Adds `word` (case-insensitively) and reports whether it was new.
    ///
    /// The word is threaded into the trie by a single entry walk over the
    /// whole tree. Each node whose path from the root spells the part of the
    /// word matched so far gets the next letter as a child, if it lacks one,
    /// and the walk then reaches that child in turn. The node for the last
    /// letter receives the word marker and ends the walk.
    pub fn add_word(&mut self, word: &str) -> ntree::Result<bool> {
        let word = word.to_lowercase();
        let letters: Vec<char> = word.chars().collect();
        if letters.is_empty() {
            return Ok(false);
        }

        let mut matched = 0usize;
        let mut added = false;
        let mut failure = None;
        let root = self.tree.root();
        self.tree.walk(root, Timing::OnEntry, Scope::WholeTree, |walk, node| {
            if walk.node_type(node) == Some(WORD) || !spells(walk, node, &letters[..matched]) {
                return ControlFlow::Continue(());
            }

            if matched == letters.len() {
                if find_word(walk, node, &word).is_none() {
                    match attach(walk, node, WORD, Entry::Word(word.clone())) {
                        Ok(()) => added = true,
                        Err(err) => failure = Some(err),
                    }
                }
                return ControlFlow::Break(());
            }

            let letter = letters[matched];
            if find_letter(walk, node, letter).is_none() {
                if let Err(err) = attach(walk, node, LETTER, Entry::Letter(letter)) {
                    failure = Some(err);
                    return ControlFlow::Break(());
                }
            }
            matched += 1;
            ControlFlow::Continue(())
        });

        if let Some(err) = failure {
            return Err(err);
        }
        if added {
            self.words += 1;
        }
        Ok(added)
    }

    /// Whether `word` (case-insensitively) is in the dictionary.
    pub fn check(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        if word.is_empty() {
            return false;
        }
        let mut node = self.tree.root();
        for letter in word.chars() {
            match find_letter(&self.tree, node, letter) {
                Some(child) => node = child,
                None => return false,
            }
        }
        find_word(&self.tree, node, &word).is_some()
    }

    /// Indented dump of the trie, each line labelled with its letter or word.
    pub fn dump(&mut self) -> String {
        self.tree.dump_with(|node| match node.payload() {
            Entry::Root => String::new(),
            Entry::Letter(c) => c.to_string(),
            Entry::Word(w) => w.clone(),
        })
    }
}

impl Default for SpellChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the letters on the path from the root down to `node` are exactly
/// `prefix`.
fn spells(tree: &Tree<Entry>, node: NodeHandle, prefix: &[char]) -> bool {
    let mut cursor = node;
    for &expected in prefix.iter().rev() {
        if tree.payload(cursor) != Some(&Entry::Letter(expected)) {
            return false;
        }
        match tree.parent(cursor) {
            Some(parent) => cursor = parent,
            None => return false,
        }
    }
    tree.is_root(cursor)
}

fn find_letter(tree: &Tree<Entry>, parent: NodeHandle, letter: char) -> Option<NodeHandle> {
    tree.children(parent)
        .iter()
        .copied()
        .find(|&c| tree.payload(c) == Some(&Entry::Letter(letter)))
}

fn find_word(tree: &Tree<Entry>, parent: NodeHandle, word: &str) -> Option<NodeHandle> {
    tree.children(parent)
        .iter()
        .copied()
        .find(|&c| matches!(tree.payload(c), Some(Entry::Word(w)) if w == word))
}

fn attach(
    tree: &mut Tree<Entry>,
    parent: NodeHandle,
    node_type: NodeType,
    entry: Entry,
) -> ntree::Result<()> {
    let id = tree.allocate_id();
    let child = tree.create(node_type, id, entry);
    tree.insert_child(parent, child)
}

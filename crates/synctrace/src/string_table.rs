use rustc_hash::FxHashMap;

/// Process-wide interning of event labels.
///
/// Keys are dense and start at 1; 0 means "no string". A key never changes
/// or gets reused once assigned.
#[derive(Debug, Default)]
pub struct StringTable {
    keys: FxHashMap<String, u32>,
    strings: Vec<String>,
}

impl StringTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key of `text`, assigning the next key when it is new.
    ///
    /// The flag is `true` when the string was inserted by this call, which is
    /// when the caller must emit the string-table record.
    pub fn intern(&mut self, text: &str) -> (u32, bool) {
        if let Some(&key) = self.keys.get(text) {
            return (key, false);
        }
        self.strings.push(text.to_owned());
        let key = self.strings.len() as u32;
        self.keys.insert(text.to_owned(), key);
        (key, true)
    }

    /// Key of an already interned string.
    #[must_use]
    pub fn key(&self, text: &str) -> Option<u32> {
        self.keys.get(text).copied()
    }

    /// String assigned to `key`.
    #[must_use]
    pub fn resolve(&self, key: u32) -> Option<&str> {
        let index = usize::try_from(key).ok()?.checked_sub(1)?;
        self.strings.get(index).map(String::as_str)
    }

    /// Appends a string received from a peer, assigning it the next key.
    pub fn push(&mut self, text: String) -> u32 {
        self.keys.entry(text.clone()).or_insert(self.strings.len() as u32 + 1);
        self.strings.push(text);
        self.strings.len() as u32
    }

    /// Number of interned strings, which is also the highest assigned key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` when nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Per-thread read-through cache in front of the shared [`StringTable`].
#[derive(Debug, Default)]
pub struct StringCache {
    keys: FxHashMap<String, u32>,
}

impl StringCache {
    /// Returns the cached key of `text`.
    #[must_use]
    pub fn get(&self, text: &str) -> Option<u32> {
        self.keys.get(text).copied()
    }

    /// Caches the key of `text`.
    pub fn insert(&mut self, text: &str, key: u32) {
        self.keys.insert(text.to_owned(), key);
    }
}

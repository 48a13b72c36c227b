use serde::Serialize;

/// Ordered ingredient names, unique under case-insensitive comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IngredientSet {
    items: Vec<String>,
}

fn identity(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Display form: first character uppercase, remainder lowercase.
pub fn normalize_display(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IngredientSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        let key = identity(name);
        self.items.iter().any(|item| identity(item) == key)
    }

    /// Append `name` as typed unless it is blank or already present in any casing.
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.contains(name) {
            return false;
        }
        self.items.push(name.to_string());
        true
    }

    /// Out-of-range indices are ignored; the UI may race a removal.
    pub fn remove_at(&mut self, index: usize) -> Option<String> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Union identified names into the set and rewrite every entry in display form.
    ///
    /// Existing entries keep their positions and new names follow in the order
    /// given. Custom casing on manually added entries does not survive.
    pub fn merge_identified<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut merged: Vec<String> = Vec::with_capacity(self.items.len());
        let mut seen: Vec<String> = Vec::with_capacity(self.items.len());

        let existing = std::mem::take(&mut self.items);
        let incoming = names.into_iter().map(|n| n.as_ref().to_string());
        for name in existing.into_iter().chain(incoming) {
            let key = identity(&name);
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            merged.push(normalize_display(&name));
        }

        self.items = merged;
    }

    /// Replace the whole set, keeping casing and dropping case-insensitive repeats.
    pub fn replace_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.items.clear();
        for name in names {
            self.add(name.as_ref());
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for IngredientSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.replace_all(iter);
        set
    }
}

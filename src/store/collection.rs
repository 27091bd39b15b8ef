use crate::domain::Entity;

/// Id-unique, display-ordered list of entities.
///
/// Every operation is a no-op when it does not apply (duplicate create,
/// update or delete of an unknown id) and reports whether anything changed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCollection<T> {
    items: Vec<T>,
}

impl<T> Default for EntityCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity + Clone> EntityCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<T>) -> Self {
        let mut collection = Self::new();
        collection.replace_all(items);
        collection
    }

    /// Replace the whole collection, keeping the given order. Later
    /// duplicates of an id are dropped.
    pub fn replace_all(&mut self, items: Vec<T>) {
        let mut unique: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.iter().any(|existing| existing.id() == item.id()) {
                unique.push(item);
            }
        }
        self.items = unique;
    }

    /// Insert at the front unless the id is already present.
    pub fn apply_created(&mut self, item: T) -> bool {
        if self.contains(item.id()) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Replace the entity with the same id, in place.
    pub fn apply_updated(&mut self, item: T) -> bool {
        match self.position(item.id()) {
            Some(index) => {
                self.items[index] = item;
                true
            }
            None => false,
        }
    }

    pub fn update_with(&mut self, id: &str, update: impl FnOnce(&mut T)) -> bool {
        match self.position(id) {
            Some(index) => {
                update(&mut self.items[index]);
                true
            }
            None => false,
        }
    }

    pub fn apply_deleted(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }

    /// Apply `mutator` to every entity matching `predicate`; returns how many.
    pub fn optimistic_transition(
        &mut self,
        predicate: impl Fn(&T) -> bool,
        mut mutator: impl FnMut(&mut T),
    ) -> usize {
        let mut touched = 0;
        for item in self.items.iter_mut().filter(|item| predicate(item)) {
            mutator(item);
            touched += 1;
        }
        touched
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn processing_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_processing()).count()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }
}

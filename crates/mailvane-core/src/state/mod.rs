//! Reducer-driven category state.
//!
//! The store is the single source of truth for the rendered lists:
//! five message sequences plus per-category loading flags and
//! pagination cursors. All list mutation funnels through one dispatch
//! point into a pure transition function.

mod actions;
mod reducer;

pub use actions::{EmailUpdate, ListAction};

use crate::model::{Category, Email};
use reducer::reduce;

/// Per-category slots for an arbitrary value type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CategoryTable<T> {
    inbox: T,
    starred: T,
    spam: T,
    trash: T,
    search: T,
}

impl<T> CategoryTable<T> {
    fn get(&self, category: Category) -> &T {
        match category {
            Category::Inbox => &self.inbox,
            Category::Starred => &self.starred,
            Category::Spam => &self.spam,
            Category::Trash => &self.trash,
            Category::Search => &self.search,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut T {
        match category {
            Category::Inbox => &mut self.inbox,
            Category::Starred => &mut self.starred,
            Category::Spam => &mut self.spam,
            Category::Trash => &mut self.trash,
            Category::Search => &mut self.search,
        }
    }
}

/// The five category sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryLists(CategoryTable<Vec<Email>>);

impl CategoryLists {
    /// The sequence for a category.
    #[must_use]
    pub fn list(&self, category: Category) -> &[Email] {
        self.0.get(category)
    }

    pub(crate) fn list_mut(&mut self, category: Category) -> &mut Vec<Email> {
        self.0.get_mut(category)
    }
}

/// Reducer-driven store of category lists, loading flags, and
/// pagination cursors.
#[derive(Debug, Default)]
pub struct CategoryStore {
    lists: CategoryLists,
    loading: CategoryTable<bool>,
    cursors: CategoryTable<Option<String>>,
}

impl CategoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The single dispatch point: applies one action to the lists.
    pub fn dispatch(&mut self, action: ListAction) {
        let previous = std::mem::take(&mut self.lists);
        self.lists = reduce(previous, action);
    }

    /// The rendered sequence for a category.
    #[must_use]
    pub fn emails(&self, category: Category) -> &[Email] {
        self.lists.list(category)
    }

    /// Whether a category is currently loading.
    #[must_use]
    pub fn is_loading(&self, category: Category) -> bool {
        *self.loading.get(category)
    }

    /// Flags a category as loading or settled.
    pub fn set_loading(&mut self, category: Category, loading: bool) {
        *self.loading.get_mut(category) = loading;
    }

    /// The pagination cursor for a category; `None` means no further
    /// pages.
    #[must_use]
    pub fn next_cursor(&self, category: Category) -> Option<&str> {
        self.cursors.get(category).as_deref()
    }

    /// Stores a category's pagination cursor.
    pub fn set_cursor(&mut self, category: Category, cursor: Option<String>) {
        *self.cursors.get_mut(category) = cursor;
    }

    /// Number of messages held for a category.
    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.lists.list(category).len()
    }

    /// Message counts for every category.
    #[must_use]
    pub fn counts(&self) -> [(Category, usize); 5] {
        Category::ALL.map(|category| (category, self.count(category)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::labels;
    use crate::model::tests::email;

    fn store_with_inbox(ids: &[&str]) -> CategoryStore {
        let mut store = CategoryStore::new();
        store.dispatch(ListAction::Set {
            category: Category::Inbox,
            emails: ids.iter().map(|id| email(id, &["INBOX", "UNREAD"])).collect(),
        });
        store
    }

    #[test]
    fn set_replaces_wholesale() {
        let mut store = store_with_inbox(&["a", "b"]);
        store.dispatch(ListAction::Set {
            category: Category::Inbox,
            emails: vec![email("c", &["INBOX"])],
        });
        let ids: Vec<_> = store.emails(Category::Inbox).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c"]);
    }

    #[test]
    fn append_concatenates_at_the_end() {
        let mut store = store_with_inbox(&["a"]);
        store.dispatch(ListAction::Append {
            category: Category::Inbox,
            emails: vec![email("b", &["INBOX"]), email("c", &["INBOX"])],
        });
        let ids: Vec<_> = store.emails(Category::Inbox).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn prepend_is_idempotent_on_id() {
        let mut store = store_with_inbox(&["a"]);
        let fresh = email("n", &["INBOX", "UNREAD"]);
        store.dispatch(ListAction::Prepend {
            category: Category::Inbox,
            email: fresh.clone(),
        });
        store.dispatch(ListAction::Prepend {
            category: Category::Inbox,
            email: fresh,
        });

        let ids: Vec<_> = store.emails(Category::Inbox).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["n", "a"]);
    }

    #[test]
    fn update_touches_only_the_named_category() {
        let mut store = store_with_inbox(&["a"]);
        store.dispatch(ListAction::Set {
            category: Category::Starred,
            emails: vec![email("a", &["STARRED"])],
        });

        store.dispatch(ListAction::Update {
            category: Category::Inbox,
            id: "a".to_string(),
            update: EmailUpdate::starred(true),
        });

        assert!(store.emails(Category::Inbox)[0].is_starred);
        // Starred list's own flag state comes from its labels, so the
        // other copy is untouched by a single-category update.
        assert!(store.emails(Category::Starred)[0].labels.contains(labels::STARRED));
        assert!(store.emails(Category::Inbox)[0].labels.contains(labels::STARRED));
    }

    #[test]
    fn update_all_reaches_every_category() {
        let mut store = store_with_inbox(&["a"]);
        store.dispatch(ListAction::Set {
            category: Category::Starred,
            emails: vec![email("a", &["STARRED"]), email("z", &["STARRED"])],
        });

        store.dispatch(ListAction::UpdateAll {
            id: "a".to_string(),
            update: EmailUpdate::starred(true),
        });

        for category in [Category::Inbox, Category::Starred] {
            let copy = store
                .emails(category)
                .iter()
                .find(|e| e.id == "a")
                .cloned()
                .unwrap();
            assert!(copy.is_starred);
            assert!(copy.labels.contains(labels::STARRED));
        }
        // Non-matching entries pass through unchanged.
        let bystander = &store.emails(Category::Starred)[1];
        assert_eq!(bystander.id, "z");
    }

    #[test]
    fn mark_read_clears_flag_and_label_everywhere() {
        let mut store = store_with_inbox(&["a"]);
        store.dispatch(ListAction::Set {
            category: Category::Starred,
            emails: vec![email("a", &["STARRED", "UNREAD"])],
        });

        store.dispatch(ListAction::MarkRead { id: "a".to_string() });

        for category in [Category::Inbox, Category::Starred] {
            let copy = &store.emails(category)[0];
            assert!(!copy.is_unread);
            assert!(!copy.labels.contains(labels::UNREAD));
        }
    }

    #[test]
    fn remove_filters_one_category_only() {
        let mut store = store_with_inbox(&["a", "b"]);
        store.dispatch(ListAction::Set {
            category: Category::Trash,
            emails: vec![email("a", &["TRASH"])],
        });

        store.dispatch(ListAction::Remove {
            category: Category::Inbox,
            id: "a".to_string(),
        });

        let ids: Vec<_> = store.emails(Category::Inbox).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["b"]);
        assert_eq!(store.count(Category::Trash), 1);
    }

    #[test]
    fn clear_resets_a_category() {
        let mut store = store_with_inbox(&["a"]);
        store.dispatch(ListAction::Set {
            category: Category::Search,
            emails: vec![email("s", &["INBOX"])],
        });

        store.dispatch(ListAction::Clear { category: Category::Search });

        assert_eq!(store.count(Category::Search), 0);
        assert_eq!(store.count(Category::Inbox), 1);
    }

    #[test]
    fn loading_flags_and_cursors_are_per_category() {
        let mut store = CategoryStore::new();
        store.set_loading(Category::Spam, true);
        store.set_cursor(Category::Spam, Some("p2".to_string()));

        assert!(store.is_loading(Category::Spam));
        assert!(!store.is_loading(Category::Inbox));
        assert_eq!(store.next_cursor(Category::Spam), Some("p2"));
        assert_eq!(store.next_cursor(Category::Inbox), None);
    }

    #[test]
    fn counts_cover_all_categories() {
        let store = store_with_inbox(&["a", "b"]);
        let counts = store.counts();
        assert!(counts.contains(&(Category::Inbox, 2)));
        assert!(counts.contains(&(Category::Search, 0)));
    }
}

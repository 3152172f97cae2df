//! The pure state-transition function over category lists.

use super::actions::{EmailUpdate, ListAction};
use super::CategoryLists;
use crate::model::{Category, Email};

/// Applies one action, consuming the previous state and returning the
/// next. Sequences that an action does not name pass through untouched.
pub(crate) fn reduce(mut lists: CategoryLists, action: ListAction) -> CategoryLists {
    match action {
        ListAction::Set { category, emails } => {
            *lists.list_mut(category) = emails;
        }
        ListAction::Append { category, emails } => {
            lists.list_mut(category).extend(emails);
        }
        ListAction::Prepend { category, email } => {
            let list = lists.list_mut(category);
            if !list.iter().any(|e| e.id == email.id) {
                list.insert(0, email);
            }
        }
        ListAction::Update {
            category,
            id,
            update,
        } => {
            map_matching(lists.list_mut(category), &id, |email| update.apply(email));
        }
        ListAction::UpdateAll { id, update } => {
            for category in Category::ALL {
                map_matching(lists.list_mut(category), &id, |email| update.apply(email));
            }
        }
        ListAction::MarkRead { id } => {
            let update = EmailUpdate::unread(false);
            for category in Category::ALL {
                map_matching(lists.list_mut(category), &id, |email| update.apply(email));
            }
        }
        ListAction::Remove { category, id } => {
            lists.list_mut(category).retain(|e| e.id != id);
        }
        ListAction::Clear { category } => {
            lists.list_mut(category).clear();
        }
    }
    lists
}

/// Rebuilds a sequence, replacing entries matching `id` with the mapped
/// copy and passing everything else through unchanged.
fn map_matching(list: &mut Vec<Email>, id: &str, f: impl Fn(&Email) -> Email) {
    let previous = std::mem::take(list);
    *list = previous
        .into_iter()
        .map(|email| if email.id == id { f(&email) } else { email })
        .collect();
}

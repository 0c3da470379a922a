//! Client-side view computation: tab partition plus free-text filtering
//! over an already-sorted item list.

use crate::models::{Item, ItemStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTab {
    /// Items still waiting to be claimed.
    Pending,
    /// Claimed items.
    Completed,
}

fn matches_query(item: &Item, needle: &str) -> bool {
    item.title.to_lowercase().contains(needle)
        || item.description.to_lowercase().contains(needle)
        || item.found_location.to_lowercase().contains(needle)
}

/// Filters a list view by status tab and free-text query. The query is
/// case-insensitive and matches title, description or found location.
/// Input ordering is preserved.
pub fn filter_view(items: &[Item], tab: ActiveTab, search_query: &str) -> Vec<Item> {
    let needle = search_query.trim().to_lowercase();

    items
        .iter()
        .filter(|item| {
            let in_tab = match tab {
                ActiveTab::Pending => item.status == ItemStatus::Pending.as_str(),
                ActiveTab::Completed => item.status == ItemStatus::Claimed.as_str(),
            };
            in_tab && (needle.is_empty() || matches_query(item, &needle))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str, description: &str, location: &str, status: &str) -> Item {
        Item {
            id: title.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            found_location: location.to_string(),
            handover_location: "Security Office".to_string(),
            reporter_roll_no: "20071A1205".to_string(),
            status: status.to_string(),
            claimer_roll_no: None,
            category: None,
            image: None,
            created_at: Utc::now(),
        }
    }

    fn sample_items() -> Vec<Item> {
        vec![
            item("Blue Backpack", "Navy blue", "Library 2F", "pending"),
            item("Calculator", "Casio fx-991", "Physics Lab", "claimed"),
            item("Umbrella", "Black, long handle", "Bus Stop", "pending"),
        ]
    }

    #[test]
    fn test_tabs_partition_items_by_status() {
        let items = sample_items();

        let pending = filter_view(&items, ActiveTab::Pending, "");
        let completed = filter_view(&items, ActiveTab::Completed, "");

        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|i| i.status == "pending"));
        assert_eq!(completed.len(), 1);
        assert!(completed.iter().all(|i| i.status == "claimed"));
        assert_eq!(pending.len() + completed.len(), items.len());
    }

    #[test]
    fn test_query_matches_any_text_field_case_insensitively() {
        let items = sample_items();

        let by_title = filter_view(&items, ActiveTab::Pending, "BACKPACK");
        assert_eq!(by_title.len(), 1);

        let by_description = filter_view(&items, ActiveTab::Pending, "long handle");
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].title, "Umbrella");

        let by_location = filter_view(&items, ActiveTab::Completed, "physics");
        assert_eq!(by_location.len(), 1);
        assert_eq!(by_location[0].title, "Calculator");
    }

    #[test]
    fn test_query_and_tab_combine() {
        let items = sample_items();

        // Calculator matches the query but sits in the completed tab.
        let hits = filter_view(&items, ActiveTab::Pending, "casio");
        assert!(hits.is_empty());
    }

    #[test]
    fn test_input_order_is_preserved() {
        let items = sample_items();
        let pending = filter_view(&items, ActiveTab::Pending, "");
        assert_eq!(pending[0].title, "Blue Backpack");
        assert_eq!(pending[1].title, "Umbrella");
    }
}

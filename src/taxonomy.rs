//! Category hierarchy: grouping for navigation and descendant lookup for
//! filtering.

use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::models::Category;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

fn children_by_parent(categories: &[Category]) -> HashMap<Uuid, Vec<&Category>> {
    let mut map: HashMap<Uuid, Vec<&Category>> = HashMap::new();
    for category in categories {
        if let Some(parent) = category.parent {
            map.entry(parent).or_default().push(category);
        }
    }
    map
}

fn build_node(category: &Category, children: &HashMap<Uuid, Vec<&Category>>) -> CategoryNode {
    CategoryNode {
        category: category.clone(),
        children: children
            .get(&category.id)
            .map(|kids| kids.iter().map(|c| build_node(c, children)).collect())
            .unwrap_or_default(),
    }
}

/// Top-level categories in stored order, each with its children (also in
/// stored order). A category whose parent is not in `categories` is left
/// out. Nodes unreachable from a root, such as members of a parent cycle,
/// are left out too, so the walk always terminates.
pub fn group_categories(categories: &[Category]) -> Vec<CategoryNode> {
    let children = children_by_parent(categories);
    categories
        .iter()
        .filter(|c| c.parent.is_none())
        .map(|root| build_node(root, &children))
        .collect()
}

/// `root` followed by every category beneath it.
pub fn descendants(categories: &[Category], root: Uuid) -> Vec<Uuid> {
    let children = children_by_parent(categories);
    let mut found = vec![root];
    let mut cursor = 0;
    while cursor < found.len() {
        if let Some(kids) = children.get(&found[cursor]) {
            for kid in kids {
                if !found.contains(&kid.id) {
                    found.push(kid.id);
                }
            }
        }
        cursor += 1;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(name: &str, parent: Option<Uuid>) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: name.to_lowercase(),
            description: None,
            parent,
            article_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_children_grouped_under_parents_in_stored_order() {
        let politics = category("Politics", None);
        let sport = category("Sport", None);
        let elections = category("Elections", Some(politics.id));
        let football = category("Football", Some(sport.id));
        let policy = category("Policy", Some(politics.id));
        let all = vec![
            elections.clone(),
            politics.clone(),
            football.clone(),
            sport.clone(),
            policy.clone(),
        ];

        let groups = group_categories(&all);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category.id, politics.id);
        let names: Vec<&str> = groups[0]
            .children
            .iter()
            .map(|n| n.category.name.as_str())
            .collect();
        assert_eq!(names, vec!["Elections", "Policy"]);
        assert_eq!(groups[1].category.id, sport.id);
        assert_eq!(groups[1].children[0].category.id, football.id);
    }

    #[test]
    fn test_orphans_are_dropped_without_panicking() {
        let world = category("World", None);
        let orphan = category("Lost", Some(Uuid::new_v4()));
        let groups = group_categories(&[world.clone(), orphan]);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].children.is_empty());
    }

    #[test]
    fn test_deeper_nesting_is_kept() {
        let root = category("Business", None);
        let mid = category("Markets", Some(root.id));
        let leaf = category("Crypto", Some(mid.id));
        let groups = group_categories(&[root.clone(), mid.clone(), leaf.clone()]);
        assert_eq!(groups[0].children[0].children[0].category.id, leaf.id);

        let ids = descendants(&[root.clone(), mid.clone(), leaf.clone()], root.id);
        assert_eq!(ids, vec![root.id, mid.id, leaf.id]);
    }

    #[test]
    fn test_descendants_tolerates_cycles() {
        let mut a = category("A", None);
        let b = category("B", Some(a.id));
        a.parent = Some(b.id);
        let ids = descendants(&[a.clone(), b.clone()], a.id);
        assert_eq!(ids, vec![a.id, b.id]);
        assert!(group_categories(&[a, b]).is_empty());
    }

    #[test]
    fn test_node_serializes_flat_with_children() {
        let root = category("Tech", None);
        let json = serde_json::to_value(group_categories(&[root])).unwrap();
        assert_eq!(json[0]["name"], "Tech");
        assert_eq!(json[0]["articleCount"], 0);
        assert!(json[0]["children"].as_array().unwrap().is_empty());
    }
}

//! Category Aggregate and hierarchy walks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::aggregates::product::Seo;
use crate::domain::value_objects::LocalizedText;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: LocalizedText,
    pub slug: String,
    pub description: LocalizedText,
    pub parent_id: Option<Uuid>,
    pub children: Vec<Uuid>,
    pub image: Option<CategoryImage>,
    pub icon: Option<CategoryIcon>,
    pub seo: Seo,
    pub status: CategoryStatus,
    pub featured: bool,
    pub sort_order: i32,
    pub product_count: i64,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryImage { pub url: String, #[serde(default)] pub alt: Option<String> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryIcon { pub name: String, #[serde(default)] pub color: Option<String> }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    #[default]
    Active,
    Inactive,
}

impl CategoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::Inactive => "inactive" }
    }
}

impl FromStr for CategoryStatus {
    type Err = CategoryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(CategoryError::UnknownStatus(other.to_string())),
        }
    }
}

impl Category {
    /// Adds `child` to the denormalized children list unless already present.
    pub fn attach_child(&mut self, child: Uuid) -> bool {
        if self.children.contains(&child) { return false; }
        self.children.push(child);
        self.updated_at = Utc::now();
        true
    }

    pub fn detach_child(&mut self, child: Uuid) -> bool {
        let before = self.children.len();
        self.children.retain(|c| *c != child);
        let removed = self.children.len() != before;
        if removed { self.updated_at = Utc::now(); }
        removed
    }
}

/// Breadcrumb entry, root first
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Crumb {
    pub id: Uuid,
    pub name: LocalizedText,
    pub slug: String,
}

/// Parent-pointer view over the whole category table.
///
/// Every walk keeps a visited set, so a corrupted parent cycle ends the walk
/// instead of looping.
#[derive(Debug, Default)]
pub struct CategoryTree {
    nodes: HashMap<Uuid, Crumb>,
    parent: HashMap<Uuid, Uuid>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl CategoryTree {
    pub fn new<'a>(categories: impl IntoIterator<Item = &'a Category>) -> Self {
        let mut tree = Self::default();
        for c in categories {
            tree.insert(c.id, c.parent_id, c.name.clone(), c.slug.clone());
        }
        tree
    }

    pub fn insert(&mut self, id: Uuid, parent_id: Option<Uuid>, name: LocalizedText, slug: String) {
        self.nodes.insert(id, Crumb { id, name, slug });
        if let Some(p) = parent_id {
            self.parent.insert(id, p);
            self.children.entry(p).or_default().push(id);
        }
    }

    pub fn contains(&self, id: Uuid) -> bool { self.nodes.contains_key(&id) }

    /// Path from the root down to `id` (inclusive).
    pub fn breadcrumb(&self, id: Uuid) -> Vec<Crumb> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            if !seen.insert(cid) {
                tracing::warn!(category_id = %cid, "category parent cycle detected");
                break;
            }
            let Some(node) = self.nodes.get(&cid) else { break };
            path.push(node.clone());
            current = self.parent.get(&cid).copied();
        }
        path.reverse();
        path
    }

    pub fn ancestors(&self, id: Uuid) -> Vec<Uuid> {
        let mut crumbs = self.breadcrumb(id);
        crumbs.pop();
        crumbs.into_iter().map(|c| c.id).collect()
    }

    /// Every descendant of `id`, depth-first, excluding `id` itself.
    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<Uuid> = self.children.get(&id).map(|c| c.iter().rev().copied().collect()).unwrap_or_default();
        while let Some(cid) = stack.pop() {
            if !seen.insert(cid) { continue; }
            out.push(cid);
            if let Some(kids) = self.children.get(&cid) {
                stack.extend(kids.iter().rev().copied());
            }
        }
        out
    }

    /// True when making `new_parent` the parent of `id` would close a loop.
    pub fn would_cycle(&self, id: Uuid, new_parent: Uuid) -> bool {
        new_parent == id || self.descendants(id).contains(&new_parent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryError { UnknownStatus(String) }
impl std::error::Error for CategoryError {}
impl fmt::Display for CategoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::UnknownStatus(s) => write!(f, "Unknown category status: {s}") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(tree: &mut CategoryTree, parent: Option<Uuid>, en: &str) -> Uuid {
        let id = Uuid::new_v4();
        tree.insert(id, parent, LocalizedText::new(en, en), en.to_lowercase());
        id
    }

    fn category(parent_id: Option<Uuid>) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(), name: LocalizedText::new("ყუთები", "Boxes"), slug: "boxes".into(),
            description: LocalizedText::default(), parent_id, children: vec![], image: None, icon: None,
            seo: Seo::default(), status: CategoryStatus::Active, featured: false, sort_order: 0,
            product_count: 0, created_by: Uuid::new_v4(), updated_by: None, created_at: now, updated_at: now,
        }
    }

    #[test]
    fn test_attach_child_is_idempotent() {
        let mut parent = category(None);
        let child = category(Some(parent.id));
        assert!(parent.attach_child(child.id));
        assert!(!parent.attach_child(child.id));
        assert_eq!(parent.children, vec![child.id]);
    }

    #[test]
    fn test_detach_child_removes_id() {
        let mut parent = category(None);
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        parent.attach_child(keep);
        parent.attach_child(gone);
        assert!(parent.detach_child(gone));
        assert!(!parent.detach_child(gone));
        assert_eq!(parent.children, vec![keep]);
    }

    #[test]
    fn test_breadcrumb_is_root_first() {
        let mut tree = CategoryTree::default();
        let root = node(&mut tree, None, "Packaging");
        let mid = node(&mut tree, Some(root), "Boxes");
        let leaf = node(&mut tree, Some(mid), "Pizza");
        let slugs: Vec<_> = tree.breadcrumb(leaf).into_iter().map(|c| c.slug).collect();
        assert_eq!(slugs, vec!["packaging", "boxes", "pizza"]);
        assert_eq!(tree.ancestors(leaf), vec![root, mid]);
    }

    #[test]
    fn test_descendants_depth_first() {
        let mut tree = CategoryTree::default();
        let root = node(&mut tree, None, "Root");
        let a = node(&mut tree, Some(root), "A");
        let a1 = node(&mut tree, Some(a), "A1");
        let b = node(&mut tree, Some(root), "B");
        assert_eq!(tree.descendants(root), vec![a, a1, b]);
        assert!(tree.descendants(b).is_empty());
    }

    #[test]
    fn test_walks_terminate_on_parent_cycle() {
        let mut tree = CategoryTree::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        tree.insert(a, Some(b), LocalizedText::new("A", "A"), "a".into());
        tree.insert(b, Some(a), LocalizedText::new("B", "B"), "b".into());
        assert_eq!(tree.breadcrumb(a).len(), 2);
        assert_eq!(tree.descendants(a), vec![b]);
    }

    #[test]
    fn test_would_cycle() {
        let mut tree = CategoryTree::default();
        let root = node(&mut tree, None, "Root");
        let child = node(&mut tree, Some(root), "Child");
        let other = node(&mut tree, None, "Other");
        assert!(tree.would_cycle(root, child));
        assert!(tree.would_cycle(root, root));
        assert!(!tree.would_cycle(child, other));
    }
}

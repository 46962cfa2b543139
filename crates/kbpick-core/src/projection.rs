//! View projection over a directory listing.
//!
//! Everything here is a pure function of the cached resources and the view
//! options: filtering by search query, splitting into folders and files,
//! the indexed flags, sorting and breadcrumbs.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{InodeType, Resource, ResourceId};

/// Mime type reported for every file entry.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

// ============================================================================
// Items
// ============================================================================

/// A folder entry of the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: ResourceId,
    pub name: String,
    pub path: String,
    pub knowledge_base_id: Option<Uuid>,
    pub modified_at: DateTime<Utc>,
}

/// A file entry of the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: ResourceId,
    pub name: String,
    pub path: String,
    pub knowledge_base_id: Option<Uuid>,
    pub modified_at: DateTime<Utc>,
    pub mime_type: String,
}

/// A folder or a file, as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileItem {
    Folder(Folder),
    File(File),
}

impl FileItem {
    pub fn id(&self) -> &ResourceId {
        match self {
            Self::Folder(f) => &f.id,
            Self::File(f) => &f.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Folder(f) => &f.name,
            Self::File(f) => &f.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Folder(f) => &f.path,
            Self::File(f) => &f.path,
        }
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        match self {
            Self::Folder(f) => f.modified_at,
            Self::File(f) => f.modified_at,
        }
    }

    pub fn knowledge_base_id(&self) -> Option<Uuid> {
        match self {
            Self::Folder(f) => f.knowledge_base_id,
            Self::File(f) => f.knowledge_base_id,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Folders, files and indexed flags derived from a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub folders: Vec<Folder>,
    pub files: Vec<File>,
    pub indexed_items: BTreeMap<ResourceId, bool>,
}

impl Projection {
    /// All items, folders first, in listing order.
    pub fn items(&self) -> Vec<FileItem> {
        self.folders
            .iter()
            .cloned()
            .map(FileItem::Folder)
            .chain(self.files.iter().cloned().map(FileItem::File))
            .collect()
    }

    /// All items sorted by `options`.
    pub fn sorted_items(&self, options: SortOptions) -> Vec<FileItem> {
        let mut items = self.items();
        sort_items(&mut items, options);
        items
    }

    pub fn is_indexed(&self, id: &ResourceId) -> bool {
        self.indexed_items.get(id).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.folders.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn last_segment(path: &str) -> String {
    path.rsplit('/').next().unwrap_or("").to_string()
}

/// Whether `resource` passes the search filter.
///
/// Case-insensitive substring match on the full path. An empty query matches
/// everything.
pub fn matches_query(resource: &Resource, query: &str) -> bool {
    resource
        .path()
        .to_lowercase()
        .contains(&query.to_lowercase())
}

/// Derive the projection of `resources` under the search `query`.
pub fn project(resources: &[Resource], query: &str) -> Projection {
    let mut projection = Projection::default();

    for resource in resources.iter().filter(|r| matches_query(r, query)) {
        let id = resource.resource_id.clone();
        let name = last_segment(resource.path());
        let path = resource.path().to_string();

        projection
            .indexed_items
            .insert(id.clone(), resource.is_indexed());

        match resource.inode_type {
            InodeType::Directory => projection.folders.push(Folder {
                id,
                name,
                path,
                knowledge_base_id: resource.knowledge_base_id,
                modified_at: resource.modified_at,
            }),
            InodeType::File => projection.files.push(File {
                id,
                name,
                path,
                knowledge_base_id: resource.knowledge_base_id,
                modified_at: resource.modified_at,
                mime_type: DEFAULT_MIME_TYPE.to_string(),
            }),
        }
    }

    projection
}

// ============================================================================
// Sorting
// ============================================================================

/// Secondary sort key (folders always come first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Date,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "date" | "modified" => Ok(Self::Date),
            _ => Err(format!("Unknown sort key: '{}'. Use 'name' or 'date'.", s)),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Date => write!(f, "date"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortOptions {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

/// Compare names the way a person expects: case folded first, then by the
/// raw string so the order is total.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Compare two items: folders before files, then by `options`.
pub fn compare_items(a: &FileItem, b: &FileItem, options: SortOptions) -> Ordering {
    match (a.is_folder(), b.is_folder()) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let ordering = match options.key {
        SortKey::Name => compare_names(a.name(), b.name()),
        SortKey::Date => a.modified_at().cmp(&b.modified_at()),
    };

    match options.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Sort `items` in place (stable).
pub fn sort_items(items: &mut [FileItem], options: SortOptions) {
    items.sort_by(|a, b| compare_items(a, b, options));
}

// ============================================================================
// Breadcrumbs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
}

/// Breadcrumbs for `path`: one per non-empty segment, each with the
/// cumulative path up to and including it.
pub fn breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let mut crumbs = Vec::new();
    let mut prefix = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        prefix.push('/');
        prefix.push_str(segment);
        crumbs.push(Breadcrumb {
            name: segment.to_string(),
            path: prefix.clone(),
        });
    }
    crumbs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InodePath, ResourceStatus};
    use chrono::TimeZone;

    fn resource(id: &str, kind: InodeType, path: &str, day: u32) -> Resource {
        Resource {
            resource_id: ResourceId::new(id),
            inode_type: kind,
            inode_path: InodePath {
                path: path.to_string(),
            },
            status: None,
            knowledge_base_id: None,
            modified_at: Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap(),
        }
    }

    fn sample() -> Vec<Resource> {
        vec![
            resource("f1", InodeType::File, "docs/zeta.txt", 3),
            resource("d1", InodeType::Directory, "docs/Reports", 1),
            resource("f2", InodeType::File, "docs/alpha.md", 5),
            resource("d2", InodeType::Directory, "docs/archive", 9),
            resource("f3", InodeType::File, "docs/Beta.pdf", 2),
        ]
    }

    fn names(items: &[FileItem]) -> Vec<&str> {
        items.iter().map(FileItem::name).collect()
    }

    #[test]
    fn test_project_splits_folders_and_files() {
        let projection = project(&sample(), "");
        assert_eq!(projection.folders.len(), 2);
        assert_eq!(projection.files.len(), 3);
        assert_eq!(projection.files[0].name, "zeta.txt");
        assert_eq!(projection.files[0].mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(projection.indexed_items.len(), 5);
    }

    #[test]
    fn test_search_is_case_insensitive_substring_of_path() {
        let resources = sample();
        let projection = project(&resources, "REPORT");
        assert_eq!(projection.len(), 1);
        assert_eq!(projection.folders[0].id, ResourceId::new("d1"));

        // Matches on any part of the path, not only the name.
        assert_eq!(project(&resources, "docs/").len(), 5);

        for query in ["a", "Z", ".md", "nothing"] {
            let projection = project(&resources, query);
            let expected: Vec<_> = resources
                .iter()
                .filter(|r| r.path().to_lowercase().contains(&query.to_lowercase()))
                .map(|r| r.resource_id.clone())
                .collect();
            let mut got: Vec<_> = projection.items().iter().map(|i| i.id().clone()).collect();
            let mut expected_sorted = expected.clone();
            got.sort();
            expected_sorted.sort();
            assert_eq!(got, expected_sorted, "query {:?}", query);
        }
    }

    #[test]
    fn test_indexed_flags() {
        let mut resources = sample();
        resources[0].status = Some(ResourceStatus::Indexed);
        resources[2].status = Some(ResourceStatus::Indexing);

        let projection = project(&resources, "");
        assert!(projection.is_indexed(&ResourceId::new("f1")));
        assert!(!projection.is_indexed(&ResourceId::new("f2")));
        assert!(!projection.is_indexed(&ResourceId::new("missing")));
    }

    #[test]
    fn test_sort_name_ascending_folders_first() {
        let items = project(&sample(), "").sorted_items(SortOptions::default());
        assert_eq!(
            names(&items),
            vec!["archive", "Reports", "alpha.md", "Beta.pdf", "zeta.txt"]
        );
    }

    #[test]
    fn test_sort_name_descending_keeps_folders_first() {
        let items = project(&sample(), "")
            .sorted_items(SortOptions::new(SortKey::Name, SortDirection::Desc));
        assert_eq!(
            names(&items),
            vec!["Reports", "archive", "zeta.txt", "Beta.pdf", "alpha.md"]
        );
    }

    #[test]
    fn test_sort_by_date() {
        let projection = project(&sample(), "");

        let asc = projection.sorted_items(SortOptions::new(SortKey::Date, SortDirection::Asc));
        assert_eq!(
            names(&asc),
            vec!["Reports", "archive", "Beta.pdf", "zeta.txt", "alpha.md"]
        );

        let desc = projection.sorted_items(SortOptions::new(SortKey::Date, SortDirection::Desc));
        assert_eq!(
            names(&desc),
            vec!["archive", "Reports", "alpha.md", "zeta.txt", "Beta.pdf"]
        );
    }

    #[test]
    fn test_sorted_names_are_non_decreasing_within_kind() {
        let items = project(&sample(), "").sorted_items(SortOptions::default());
        let first_file = items.iter().position(|i| !i.is_folder()).unwrap();
        assert!(items[first_file..].iter().all(|i| !i.is_folder()));
        for pair in items.windows(2) {
            if pair[0].is_folder() == pair[1].is_folder() {
                assert_ne!(
                    compare_names(pair[0].name(), pair[1].name()),
                    Ordering::Greater
                );
            }
        }
    }

    #[test]
    fn test_sort_key_from_str() {
        assert_eq!("name".parse::<SortKey>().unwrap(), SortKey::Name);
        assert_eq!("DATE".parse::<SortKey>().unwrap(), SortKey::Date);
        assert!("size".parse::<SortKey>().is_err());
        assert_eq!(SortDirection::Asc.toggled(), SortDirection::Desc);
    }

    #[test]
    fn test_breadcrumbs() {
        assert_eq!(
            breadcrumbs("/A/B"),
            vec![
                Breadcrumb {
                    name: "A".into(),
                    path: "/A".into()
                },
                Breadcrumb {
                    name: "B".into(),
                    path: "/A/B".into()
                },
            ]
        );
    }

    #[test]
    fn test_breadcrumbs_drop_empty_segments() {
        assert!(breadcrumbs("/").is_empty());
        assert!(breadcrumbs("").is_empty());
        let crumbs = breadcrumbs("//docs///2024/");
        assert_eq!(crumbs.len(), 2);
        assert_eq!(crumbs[1].path, "/docs/2024");
    }

    #[test]
    fn test_item_serializes_with_type_tag() {
        let items = project(&sample(), "Reports").items();
        let json = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(json["type"], "folder");
        assert_eq!(json["name"], "Reports");
        assert!(json.get("modifiedAt").is_some());
    }
}

//! [`TagPoseLibrary`] – registry of known tag placements.
//!
//! A library is built once from a [`TagLayout`] and is read-only afterwards.
//! Layouts are swappable: [`CenterStageLayout`] ships the CenterStage field,
//! [`TableLayout`] wraps any list of entries (for example one loaded from the
//! config file).
//!
//! # Example
//!
//! ```rust
//! use fieldpose_perception::tag_library::{CenterStageLayout, TagPoseLibrary};
//!
//! let library = TagPoseLibrary::from_layout(&CenterStageLayout).unwrap();
//! let tag = library.lookup(1).unwrap();
//! assert_eq!(tag.label, "BlueAllianceLeft");
//! assert!(library.lookup(99).is_none());
//! ```

use std::collections::BTreeMap;

use fieldpose_types::{PoseError, Quaternion, TagPoseEntry, Vector3};

/// A source of tag placements for one field layout.
pub trait TagLayout {
    /// Human-readable layout name, used in logs.
    fn name(&self) -> &str;

    fn entries(&self) -> Vec<TagPoseEntry>;
}

/// The CenterStage field: six backdrop tags and four audience wall tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterStageLayout;

const BACKDROP: Quaternion = Quaternion::new(0.3536, -0.6124, 0.6124, -0.3536);
const AUDIENCE_WALL: Quaternion = Quaternion::new(0.5, -0.5, -0.5, 0.5);

impl TagLayout for CenterStageLayout {
    fn name(&self) -> &str {
        "center_stage"
    }

    fn entries(&self) -> Vec<TagPoseEntry> {
        let table: [(u32, &str, f64, Vector3, Quaternion); 10] = [
            (1, "BlueAllianceLeft", 2.0, Vector3::new(61.75, 41.41, 4.0), BACKDROP),
            (2, "BlueAllianceCenter", 2.0, Vector3::new(61.75, 35.41, 4.0), BACKDROP),
            (3, "BlueAllianceRight", 2.0, Vector3::new(61.75, 29.41, 4.0), BACKDROP),
            (4, "RedAllianceLeft", 2.0, Vector3::new(61.75, -29.41, 4.0), BACKDROP),
            (5, "RedAllianceCenter", 2.0, Vector3::new(61.75, -35.41, 4.0), BACKDROP),
            (6, "RedAllianceRight", 2.0, Vector3::new(61.75, -41.41, 4.0), BACKDROP),
            (7, "RedAudienceWallLarge", 5.0, Vector3::new(-70.25, -40.625, 5.5), AUDIENCE_WALL),
            (8, "RedAudienceWallSmall", 2.0, Vector3::new(-70.25, -35.125, 4.0), AUDIENCE_WALL),
            (9, "BlueAudienceWallSmall", 2.0, Vector3::new(-70.25, 35.125, 4.0), AUDIENCE_WALL),
            (10, "BlueAudienceWallLarge", 5.0, Vector3::new(-70.25, 40.625, 5.5), AUDIENCE_WALL),
        ];

        table
            .into_iter()
            .map(|(id, label, size, field_position, field_orientation)| TagPoseEntry {
                id,
                label: label.to_string(),
                size,
                field_position,
                field_orientation,
            })
            .collect()
    }
}

/// A layout backed by an explicit list of entries.
#[derive(Debug, Clone)]
pub struct TableLayout {
    name: String,
    entries: Vec<TagPoseEntry>,
}

impl TableLayout {
    pub fn new(name: impl Into<String>, entries: Vec<TagPoseEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }
}

impl TagLayout for TableLayout {
    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> Vec<TagPoseEntry> {
        self.entries.clone()
    }
}

/// Immutable id → placement registry.
#[derive(Debug, Clone)]
pub struct TagPoseLibrary {
    name: String,
    tags: BTreeMap<u32, TagPoseEntry>,
}

impl TagPoseLibrary {
    pub fn builder(name: impl Into<String>) -> TagPoseLibraryBuilder {
        TagPoseLibraryBuilder {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Build a library from every entry of `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::DuplicateTag`] if the layout lists an id twice.
    pub fn from_layout(layout: &dyn TagLayout) -> Result<Self, PoseError> {
        layout
            .entries()
            .into_iter()
            .fold(Self::builder(layout.name()), TagPoseLibraryBuilder::add_tag)
            .build()
    }

    /// Placement of tag `id`, or `None` if it is not part of this layout.
    pub fn lookup(&self, id: u32) -> Option<&TagPoseEntry> {
        self.tags.get(&id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// All entries, ordered by id.
    pub fn entries(&self) -> Vec<TagPoseEntry> {
        self.tags.values().cloned().collect()
    }
}

/// Collects entries and checks id uniqueness on [`build`][Self::build].
pub struct TagPoseLibraryBuilder {
    name: String,
    entries: Vec<TagPoseEntry>,
}

impl TagPoseLibraryBuilder {
    pub fn add_tag(mut self, entry: TagPoseEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// # Errors
    ///
    /// Returns [`PoseError::DuplicateTag`] for the first repeated id.
    pub fn build(self) -> Result<TagPoseLibrary, PoseError> {
        let mut tags = BTreeMap::new();
        for entry in self.entries {
            let id = entry.id;
            if tags.insert(id, entry).is_some() {
                return Err(PoseError::DuplicateTag(id));
            }
        }
        Ok(TagPoseLibrary {
            name: self.name,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center_stage() -> TagPoseLibrary {
        TagPoseLibrary::from_layout(&CenterStageLayout).unwrap()
    }

    fn entry(id: u32) -> TagPoseEntry {
        TagPoseEntry {
            id,
            label: format!("tag_{id}"),
            size: 2.0,
            field_position: Vector3::new(id as f64, 0.0, 4.0),
            field_orientation: Quaternion::identity(),
        }
    }

    #[test]
    fn center_stage_has_ten_tags() {
        let library = center_stage();
        assert_eq!(library.len(), 10);
        assert_eq!(library.name(), "center_stage");
        let ids: Vec<u32> = library.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn lookup_returns_configured_placement() {
        let library = center_stage();

        let tag1 = library.lookup(1).unwrap();
        assert_eq!(tag1.label, "BlueAllianceLeft");
        assert_eq!(tag1.size, 2.0);
        assert_eq!(tag1.field_position, Vector3::new(61.75, 41.41, 4.0));
        assert_eq!(tag1.field_orientation, BACKDROP);

        let tag7 = library.lookup(7).unwrap();
        assert_eq!(tag7.label, "RedAudienceWallLarge");
        assert_eq!(tag7.size, 5.0);
        assert_eq!(tag7.field_position, Vector3::new(-70.25, -40.625, 5.5));
        assert_eq!(tag7.field_orientation, AUDIENCE_WALL);

        let tag8 = library.lookup(8).unwrap();
        assert_eq!(tag8.field_position, Vector3::new(-70.25, -35.125, 4.0));
    }

    #[test]
    fn lookup_unknown_id_misses() {
        let library = center_stage();
        assert!(library.lookup(0).is_none());
        assert!(library.lookup(11).is_none());
        assert!(library.lookup(583).is_none());
    }

    #[test]
    fn repeated_lookup_is_stable() {
        let library = center_stage();
        let first = library.lookup(4).cloned();
        for _ in 0..5 {
            assert_eq!(library.lookup(4).cloned(), first);
        }
        assert_eq!(library.len(), 10);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = TagPoseLibrary::builder("dup").add_tag(entry(3)).add_tag(entry(3)).build();
        assert_eq!(result.unwrap_err(), PoseError::DuplicateTag(3));
    }

    #[test]
    fn table_layout_swaps_in_without_center_stage_tags() {
        let layout = TableLayout::new("practice_field", vec![entry(20), entry(21)]);
        let library = TagPoseLibrary::from_layout(&layout).unwrap();
        assert_eq!(library.name(), "practice_field");
        assert!(library.lookup(1).is_none());
        assert_eq!(library.lookup(21).unwrap().field_position.x, 21.0);
    }
}

//! Relation Maintenance
//!
//! Group-tag and image-tag links live in their own join collections. The
//! store knows nothing about them, so every cascade is done here explicitly.

use std::collections::{HashMap, HashSet};

use crate::domain::{DomainError, DomainResult, Group, RecordId, Tag, TagRef};
use super::collection::{Collection, Link, LinkKey};
use super::db::Database;

/// Two-step lookup: join rows for `owner_id`, then the tags they point at
fn linked_tags<L: Link>(links: &Collection<L>, tags: &Collection<Tag>, owner_id: RecordId) -> Vec<Tag> {
    let tag_ids: Vec<RecordId> = links
        .find_links(LinkKey::Owner(owner_id))
        .iter()
        .map(|link| link.tag_id())
        .collect();
    tags.find_by_ids(&tag_ids)
}

/// Owners linked to every tag named in `names`
///
/// Unknown names (or no owner carrying all of them) yield an empty set.
fn owners_with_all<L: Link>(
    links: &Collection<L>,
    tags: &Collection<Tag>,
    names: &[String],
) -> HashSet<RecordId> {
    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
    if wanted.is_empty() {
        return HashSet::new();
    }

    let mut tag_ids = Vec::with_capacity(wanted.len());
    for name in &wanted {
        match tags.find_one_by("name", name) {
            Some(tag) => tag_ids.push(tag.id),
            None => return HashSet::new(),
        }
    }

    let mut seen: HashMap<RecordId, HashSet<RecordId>> = HashMap::new();
    for link in links.find_links(LinkKey::Tags(&tag_ids)) {
        seen.entry(link.owner_id()).or_default().insert(link.tag_id());
    }

    seen.into_iter()
        .filter(|(_, linked)| linked.len() == tag_ids.len())
        .map(|(owner_id, _)| owner_id)
        .collect()
}

impl Database {
    pub fn tags_for_group(&self, group_id: RecordId) -> Vec<Tag> {
        linked_tags(&self.group_tags, &self.tags, group_id)
    }

    pub fn groups_for_tag(&self, tag_id: RecordId) -> Vec<Group> {
        let group_ids: Vec<RecordId> = self
            .group_tags
            .find_links(LinkKey::Tag(tag_id))
            .iter()
            .map(|link| link.group_id)
            .collect();
        self.groups.find_by_ids(&group_ids)
    }

    pub fn tags_for_image(&self, image_id: RecordId) -> Vec<Tag> {
        linked_tags(&self.image_tags, &self.tags, image_id)
    }

    /// Images carrying every tag in `names` (AND semantics)
    pub fn images_with_all_tags(&self, names: &[String]) -> HashSet<RecordId> {
        owners_with_all(&self.image_tags, &self.tags, names)
    }

    /// Tags linked to no group at all
    pub fn ungrouped_tags(&self) -> Vec<Tag> {
        let grouped: HashSet<RecordId> = self.group_tags.iter().map(|link| link.tag_id).collect();
        self.tags.find(|tag| !grouped.contains(&tag.id))
    }

    /// Link a group and a tag; an existing link is left as is
    ///
    /// Returns whether a new join row was inserted.
    pub fn link_group_tag(&mut self, group_id: RecordId, tag_id: RecordId) -> DomainResult<bool> {
        if !self.groups.contains(group_id) {
            return Err(DomainError::not_found("group", group_id));
        }
        if !self.tags.contains(tag_id) {
            return Err(DomainError::not_found("tag", tag_id));
        }
        Ok(self.group_tags.link(group_id, tag_id)?.is_some())
    }

    /// Link an image and a tag; an existing link is left as is
    pub fn link_image_tag(&mut self, image_id: RecordId, tag_id: RecordId) -> DomainResult<bool> {
        if !self.images.contains(image_id) {
            return Err(DomainError::not_found("image", image_id));
        }
        if !self.tags.contains(tag_id) {
            return Err(DomainError::not_found("tag", tag_id));
        }
        Ok(self.image_tags.link(image_id, tag_id)?.is_some())
    }

    pub fn unlink_by_group(&mut self, group_id: RecordId) -> usize {
        self.group_tags.remove_links(LinkKey::Owner(group_id))
    }

    pub fn unlink_by_image(&mut self, image_id: RecordId) -> usize {
        self.image_tags.remove_links(LinkKey::Owner(image_id))
    }

    /// Remove every join row (group and image) that references `tag_id`
    pub fn unlink_by_tag(&mut self, tag_id: RecordId) -> usize {
        self.group_tags.remove_links(LinkKey::Tag(tag_id))
            + self.image_tags.remove_links(LinkKey::Tag(tag_id))
    }

    pub fn unlink_group_tag(&mut self, group_id: RecordId, tag_id: RecordId) -> usize {
        self.group_tags.remove_links(LinkKey::Pair {
            owner_id: group_id,
            tag_id,
        })
    }

    /// Purge join rows for `tag_ids`, then the tags themselves
    ///
    /// Returns the number of tags removed.
    pub fn cascade_delete_tags(&mut self, tag_ids: &[RecordId]) -> usize {
        self.group_tags.remove_links(LinkKey::Tags(tag_ids));
        self.image_tags.remove_links(LinkKey::Tags(tag_ids));
        self.tags.remove_ids(tag_ids).len()
    }

    /// Resolve tag references to stored tags, creating the unknown names
    ///
    /// References are de-duplicated by name, keeping the first occurrence.
    pub fn resolve_tags(&mut self, refs: &[TagRef]) -> DomainResult<Vec<Tag>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(refs.len());

        for tag_ref in refs {
            let name = tag_ref.name().trim();
            if name.is_empty() || !seen.insert(name.to_string()) {
                continue;
            }

            let by_id = match tag_ref {
                TagRef::Existing(tag) => self.tags.get(tag.id).cloned(),
                TagRef::Name(_) => None,
            };
            let existing = by_id.or_else(|| self.tags.find_one_by("name", name).cloned());
            let tag = match existing {
                Some(tag) => tag,
                None => {
                    log::info!("Creating tag: {}", name);
                    self.tags.insert(Tag::new(0, name.to_string()))?
                }
            };
            resolved.push(tag);
        }
        Ok(resolved)
    }

    /// Replace an image's tag links with `refs`
    pub fn replace_image_tags(&mut self, image_id: RecordId, refs: &[TagRef]) -> DomainResult<Vec<Tag>> {
        if !self.images.contains(image_id) {
            return Err(DomainError::not_found("image", image_id));
        }
        self.unlink_by_image(image_id);
        let tags = self.resolve_tags(refs)?;
        for tag in &tags {
            self.link_image_tag(image_id, tag.id)?;
        }
        Ok(tags)
    }

    /// `NotFound` for the first id with no group behind it
    pub fn ensure_groups(&self, group_ids: &[RecordId]) -> DomainResult<()> {
        match group_ids.iter().find(|id| !self.groups.contains(**id)) {
            Some(missing) => Err(DomainError::not_found("group", *missing)),
            None => Ok(()),
        }
    }

    /// Replace a tag's group links with `group_ids`
    pub fn replace_tag_groups(&mut self, tag_id: RecordId, group_ids: &[RecordId]) -> DomainResult<()> {
        self.ensure_groups(group_ids)?;
        self.group_tags.remove_links(LinkKey::Tag(tag_id));
        for group_id in group_ids {
            self.link_group_tag(*group_id, tag_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Image;

    fn seeded() -> Database {
        let mut db = Database::new();
        for name in ["Genshin", "Star Rail"] {
            db.groups.insert(Group::new(0, name.into())).unwrap();
        }
        for name in ["Raiden", "Kafka", "Zhongli"] {
            db.tags.insert(Tag::new(0, name.into())).unwrap();
        }
        db
    }

    #[test]
    fn test_tags_for_group_two_step_lookup() {
        let mut db = seeded();
        db.link_group_tag(1, 1).unwrap();
        db.link_group_tag(1, 3).unwrap();
        db.link_group_tag(2, 2).unwrap();

        let names: Vec<String> = db.tags_for_group(1).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Raiden", "Zhongli"]);
        assert_eq!(db.groups_for_tag(2)[0].name, "Star Rail");
        assert!(db.tags_for_group(99).is_empty());
    }

    #[test]
    fn test_link_requires_both_ends() {
        let mut db = seeded();
        assert!(matches!(db.link_group_tag(9, 1), Err(DomainError::NotFound(_))));
        assert!(matches!(db.link_group_tag(1, 9), Err(DomainError::NotFound(_))));
        assert!(db.group_tags.is_empty());
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut db = seeded();
        assert!(db.link_group_tag(1, 1).unwrap());
        assert!(!db.link_group_tag(1, 1).unwrap());
        assert_eq!(db.group_tags.len(), 1);
    }

    #[test]
    fn test_ungrouped_tags() {
        let mut db = seeded();
        db.link_group_tag(1, 1).unwrap();
        let names: Vec<String> = db.ungrouped_tags().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Kafka", "Zhongli"]);
    }

    #[test]
    fn test_cascade_delete_tags_purges_links() {
        let mut db = seeded();
        let image = db.images.insert(Image::new(0, "card".into(), "repo/a.png".into())).unwrap();
        db.link_group_tag(1, 1).unwrap();
        db.link_group_tag(2, 2).unwrap();
        db.link_image_tag(image.id, 1).unwrap();

        assert_eq!(db.cascade_delete_tags(&[1]), 1);
        assert!(db.tags.get(1).is_none());
        assert!(db.tags_for_image(image.id).is_empty());
        assert_eq!(db.group_tags.len(), 1);
        assert!(db.group_tags.has_link(2, 2));
    }

    #[test]
    fn test_images_with_all_tags_and_semantics() {
        let mut db = seeded();
        let a = db.images.insert(Image::new(0, "a".into(), "repo/a.png".into())).unwrap();
        let b = db.images.insert(Image::new(0, "b".into(), "repo/b.png".into())).unwrap();
        db.link_image_tag(a.id, 1).unwrap();
        db.link_image_tag(a.id, 2).unwrap();
        db.link_image_tag(b.id, 1).unwrap();

        let both = db.images_with_all_tags(&["Raiden".into(), "Kafka".into()]);
        assert_eq!(both, HashSet::from([a.id]));

        let one = db.images_with_all_tags(&["Raiden".into(), "Raiden".into()]);
        assert_eq!(one, HashSet::from([a.id, b.id]));

        assert!(db.images_with_all_tags(&["Raiden".into(), "Nobody".into()]).is_empty());
    }

    #[test]
    fn test_resolve_tags_creates_missing_once() {
        let mut db = seeded();
        let refs = vec![TagRef::from("Raiden"), TagRef::from("Nahida"), TagRef::from("Nahida")];
        let tags = db.resolve_tags(&refs).unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].id, 1);
        assert_eq!(tags[1].name, "Nahida");
        assert_eq!(db.tags.len(), 4);
    }

    #[test]
    fn test_resolve_tags_existing_by_id() {
        let mut db = seeded();
        let refs = vec![TagRef::Existing(Tag::new(2, "Kafka".into()))];
        assert_eq!(db.resolve_tags(&refs).unwrap()[0].id, 2);

        // stale id falls back to the name
        let refs = vec![TagRef::Existing(Tag::new(42, "Zhongli".into()))];
        assert_eq!(db.resolve_tags(&refs).unwrap()[0].id, 3);
    }

    #[test]
    fn test_replace_tag_groups() {
        let mut db = seeded();
        db.link_group_tag(1, 1).unwrap();
        db.replace_tag_groups(1, &[2]).unwrap();

        assert!(!db.group_tags.has_link(1, 1));
        assert!(db.group_tags.has_link(2, 1));
        assert!(matches!(db.replace_tag_groups(1, &[7]), Err(DomainError::NotFound(_))));
        assert!(db.group_tags.has_link(2, 1));
    }
}

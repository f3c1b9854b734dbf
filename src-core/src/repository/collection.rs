//! Collection Store - Typed Collections
//!
//! An in-memory record collection with store-assigned ids and unique-field
//! constraints. Mutations are only reachable through narrow selectors:
//! a record id, an id set, or (for join collections) a `LinkKey`.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{
    DomainError, DomainResult, Entity, Group, GroupTag, Image, ImageTag, RecordId, Tag,
};

/// Value of a named record field, used for sorting and unique keys
///
/// Variant order is the sort order: missing values come first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldValue {
    Missing,
    Int(i64),
    Text(String),
}

impl FieldValue {
    fn key(&self) -> Option<String> {
        match self {
            FieldValue::Missing => None,
            FieldValue::Int(n) => Some(n.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
        }
    }
}

/// A record that can live in a `Collection`
pub trait Document: Entity<Id = RecordId> + Serialize + DeserializeOwned {
    fn set_id(&mut self, id: RecordId);

    /// Named field lookup; `id` and `$loki` both resolve to the identity
    fn field(&self, name: &str) -> FieldValue;
}

/// A join record linking an owner (group or image) to a tag
pub trait Link: Document {
    fn new_link(owner_id: RecordId, tag_id: RecordId) -> Self;
    fn owner_id(&self) -> RecordId;
    fn tag_id(&self) -> RecordId;
}

/// Narrowing key for join-row lookups and removals
#[derive(Debug, Clone, Copy)]
pub enum LinkKey<'a> {
    Owner(RecordId),
    Tag(RecordId),
    Tags(&'a [RecordId]),
    Pair { owner_id: RecordId, tag_id: RecordId },
}

impl LinkKey<'_> {
    fn matches<L: Link>(&self, link: &L) -> bool {
        match *self {
            LinkKey::Owner(owner_id) => link.owner_id() == owner_id,
            LinkKey::Tag(tag_id) => link.tag_id() == tag_id,
            LinkKey::Tags(tag_ids) => tag_ids.contains(&link.tag_id()),
            LinkKey::Pair { owner_id, tag_id } => {
                link.owner_id() == owner_id && link.tag_id() == tag_id
            }
        }
    }
}

/// On-disk form of one collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCollection {
    pub name: String,
    #[serde(default)]
    pub unique: Vec<String>,
    #[serde(default)]
    pub max_id: RecordId,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

pub struct Collection<T: Document> {
    name: &'static str,
    unique: &'static [&'static str],
    records: BTreeMap<RecordId, T>,
    max_id: RecordId,
    index: HashMap<&'static str, HashMap<String, RecordId>>,
    dirty: bool,
    revision: u64,
}

impl<T: Document> Collection<T> {
    pub fn new(name: &'static str, unique: &'static [&'static str]) -> Self {
        Self {
            name,
            unique,
            records: BTreeMap::new(),
            max_id: 0,
            index: unique.iter().map(|field| (*field, HashMap::new())).collect(),
            dirty: false,
            revision: 0,
        }
    }

    /// Rebuild a collection (and its unique indexes) from its stored form
    pub fn restore(
        name: &'static str,
        unique: &'static [&'static str],
        stored: StoredCollection,
    ) -> DomainResult<Self> {
        let mut collection = Self::new(name, unique);
        for value in stored.data {
            let record: T = serde_json::from_value(value)?;
            let id = record.id();
            if id == 0 || collection.records.contains_key(&id) {
                return Err(DomainError::Storage(format!(
                    "{}: invalid or repeated record id {}",
                    name, id
                )));
            }
            collection.check_unique(&record, None)?;
            collection.index_record(&record);
            collection.max_id = collection.max_id.max(id);
            collection.records.insert(id, record);
        }
        collection.max_id = collection.max_id.max(stored.max_id);
        Ok(collection)
    }

    pub fn to_stored(&self) -> DomainResult<StoredCollection> {
        let data = self
            .records
            .values()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StoredCollection {
            name: self.name.to_string(),
            unique: self.unique.iter().map(|f| f.to_string()).collect(),
            max_id: self.max_id,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Bumped on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    pub fn get(&self, id: RecordId) -> Option<&T> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    /// Records in insertion (id) order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    pub fn find<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.records.values().filter(|r| predicate(*r)).cloned().collect()
    }

    /// Records whose id is in `ids`, in id order
    pub fn find_by_ids(&self, ids: &[RecordId]) -> Vec<T> {
        let wanted: HashSet<RecordId> = ids.iter().copied().collect();
        self.records
            .range(..)
            .filter(|(id, _)| wanted.contains(*id))
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// First record whose `field` equals `value` (uses the unique index when there is one)
    pub fn find_one_by(&self, field: &str, value: &str) -> Option<&T> {
        if let Some(index) = self.index.get(field) {
            return index.get(value).and_then(|id| self.records.get(id));
        }
        self.records
            .values()
            .find(|r| r.field(field).key().as_deref() == Some(value))
    }

    pub fn insert(&mut self, mut record: T) -> DomainResult<T> {
        self.check_unique(&record, None)?;
        self.max_id += 1;
        record.set_id(self.max_id);
        self.index_record(&record);
        self.records.insert(self.max_id, record.clone());
        self.touch();
        Ok(record)
    }

    /// Insert a batch; nothing is inserted if any record violates a unique field
    pub fn insert_many(&mut self, records: Vec<T>) -> DomainResult<Vec<T>> {
        for field in self.unique {
            let mut seen = HashSet::new();
            for record in &records {
                if let Some(key) = record.field(field).key() {
                    if !seen.insert(key.clone()) {
                        return Err(DomainError::duplicate_key(self.name, field, key));
                    }
                }
            }
        }
        for record in &records {
            self.check_unique(record, None)?;
        }
        records.into_iter().map(|r| self.insert(r)).collect()
    }

    /// Apply `mutate` to the record with `id`
    ///
    /// The record is left untouched if the mutation would break a unique field.
    pub fn update<F>(&mut self, id: RecordId, mutate: F) -> DomainResult<T>
    where
        F: FnOnce(&mut T),
    {
        let current = self
            .records
            .get(&id)
            .ok_or_else(|| DomainError::not_found(self.name, id))?;
        let mut updated = current.clone();
        mutate(&mut updated);
        updated.set_id(id);
        self.check_unique(&updated, Some(id))?;

        if let Some(old) = self.records.remove(&id) {
            self.unindex_record(&old);
        }
        self.index_record(&updated);
        self.records.insert(id, updated.clone());
        self.touch();
        Ok(updated)
    }

    pub fn remove(&mut self, id: RecordId) -> Option<T> {
        let removed = self.records.remove(&id)?;
        self.unindex_record(&removed);
        self.touch();
        Some(removed)
    }

    pub fn remove_ids(&mut self, ids: &[RecordId]) -> Vec<T> {
        ids.iter().filter_map(|id| self.remove(*id)).collect()
    }

    fn check_unique(&self, record: &T, except: Option<RecordId>) -> DomainResult<()> {
        for field in self.unique {
            let Some(key) = record.field(field).key() else {
                continue;
            };
            let holder = self.index.get(field).and_then(|index| index.get(&key));
            if let Some(holder) = holder {
                if Some(*holder) != except {
                    return Err(DomainError::duplicate_key(self.name, field, key));
                }
            }
        }
        Ok(())
    }

    fn index_record(&mut self, record: &T) {
        for field in self.unique {
            if let Some(key) = record.field(field).key() {
                if let Some(index) = self.index.get_mut(field) {
                    index.insert(key, record.id());
                }
            }
        }
    }

    fn unindex_record(&mut self, record: &T) {
        for field in self.unique {
            if let Some(key) = record.field(field).key() {
                if let Some(index) = self.index.get_mut(field) {
                    index.remove(&key);
                }
            }
        }
    }
}

impl<L: Link> Collection<L> {
    pub fn find_links(&self, key: LinkKey<'_>) -> Vec<L> {
        self.find(|link| key.matches(link))
    }

    pub fn has_link(&self, owner_id: RecordId, tag_id: RecordId) -> bool {
        let key = LinkKey::Pair { owner_id, tag_id };
        self.records.values().any(|link| key.matches(link))
    }

    /// Insert a join row unless the pair is already linked
    ///
    /// Returns `None` when the link already existed.
    pub fn link(&mut self, owner_id: RecordId, tag_id: RecordId) -> DomainResult<Option<L>> {
        if self.has_link(owner_id, tag_id) {
            return Ok(None);
        }
        self.insert(L::new_link(owner_id, tag_id)).map(Some)
    }

    pub fn remove_links(&mut self, key: LinkKey<'_>) -> usize {
        let ids: Vec<RecordId> = self
            .records
            .values()
            .filter(|link| key.matches(*link))
            .map(|link| link.id())
            .collect();
        self.remove_ids(&ids).len()
    }
}

// ========================
// Field access for domain records
// ========================

fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}

fn int(value: impl Into<i64>) -> FieldValue {
    FieldValue::Int(value.into())
}

impl Document for Group {
    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" | "$loki" => int(self.id),
            "name" => text(&self.name),
            "index" => self.index.map(int).unwrap_or(FieldValue::Missing),
            _ => FieldValue::Missing,
        }
    }
}

impl Document for Tag {
    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" | "$loki" => int(self.id),
            "name" => text(&self.name),
            _ => FieldValue::Missing,
        }
    }
}

impl Document for Image {
    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" | "$loki" => int(self.id),
            "name" => text(&self.name),
            "path" => text(&self.path),
            "remark" => text(&self.remark),
            "size" => FieldValue::Int(i64::try_from(self.size).unwrap_or(i64::MAX)),
            "useCount" | "use_count" => self
                .use_count
                .map(|n| FieldValue::Int(i64::try_from(n).unwrap_or(i64::MAX)))
                .unwrap_or(FieldValue::Missing),
            _ => FieldValue::Missing,
        }
    }
}

impl Document for GroupTag {
    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" | "$loki" => int(self.id),
            "group_id" => int(self.group_id),
            "tag_id" => int(self.tag_id),
            _ => FieldValue::Missing,
        }
    }
}

impl Link for GroupTag {
    fn new_link(owner_id: RecordId, tag_id: RecordId) -> Self {
        GroupTag {
            id: 0,
            group_id: owner_id,
            tag_id,
        }
    }

    fn owner_id(&self) -> RecordId {
        self.group_id
    }

    fn tag_id(&self) -> RecordId {
        self.tag_id
    }
}

impl Document for ImageTag {
    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" | "$loki" => int(self.id),
            "image_id" => int(self.image_id),
            "tag_id" => int(self.tag_id),
            _ => FieldValue::Missing,
        }
    }
}

impl Link for ImageTag {
    fn new_link(owner_id: RecordId, tag_id: RecordId) -> Self {
        ImageTag {
            id: 0,
            image_id: owner_id,
            tag_id,
        }
    }

    fn owner_id(&self) -> RecordId {
        self.image_id
    }

    fn tag_id(&self) -> RecordId {
        self.tag_id
    }
}

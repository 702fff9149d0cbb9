//! # Entity Collector
//!
//! Merges tracking requests into one deduplicated set of companies and people.
//!
//! - Names are matched case-insensitively with whitespace collapsed; the first
//!   spelling seen is kept for display.
//! - Later duplicates fill in identifiers (ticker, filing id, title) the first one lacked.
//! - Every owner that asked for an entity is remembered, in request order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ingest::{mentions_name, NameMatcher};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRef {
    pub name: String,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub filing_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRef {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// One party's request to track a set of companies and people.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRequest {
    pub owner: String,
    #[serde(default)]
    pub companies: Vec<CompanyRef>,
    #[serde(default)]
    pub people: Vec<PersonRef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Company,
    Person,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntity {
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub filing_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TrackedEntity {
    pub fn company(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            kind: EntityKind::Company,
            ticker: None,
            filing_id: None,
            title: None,
        }
    }

    pub fn person(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            kind: EntityKind::Person,
            ticker: None,
            filing_id: None,
            title: None,
        }
    }

    /// Matching key: lowercase, whitespace collapsed.
    pub fn key(&self) -> String {
        entity_key(&self.name)
    }
}

/// Lowercase + collapse whitespace. Used for every entity-name comparison.
pub fn entity_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deduplicated entities for one run plus the owners tracking each of them.
#[derive(Debug, Clone, Default)]
pub struct TrackedEntities {
    pub companies: Vec<TrackedEntity>,
    pub people: Vec<TrackedEntity>,
    owners: HashMap<(EntityKind, String), Vec<String>>,
    all_owners: Vec<String>,
    matchers: HashMap<(EntityKind, String), NameMatcher>,
}

impl TrackedEntities {
    pub fn is_empty(&self) -> bool {
        self.companies.is_empty() && self.people.is_empty()
    }

    pub fn len(&self) -> usize {
        self.companies.len() + self.people.len()
    }

    /// Companies first, then people.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.companies.iter().chain(self.people.iter())
    }

    /// Case-insensitive lookup within one kind.
    pub fn find(&self, kind: EntityKind, name: &str) -> Option<&TrackedEntity> {
        let key = entity_key(name);
        if key.is_empty() {
            return None;
        }
        let list = match kind {
            EntityKind::Company => &self.companies,
            EntityKind::Person => &self.people,
        };
        list.iter().find(|e| e.key() == key)
    }

    /// Owners that track the given entity, in request order.
    pub fn owners_of(&self, kind: EntityKind, name: &str) -> &[String] {
        self.owners
            .get(&(kind, entity_key(name)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Word-boundary, case-insensitive mention of a tracked name in `text`.
    /// Uses the matcher compiled when the entity was collected.
    pub fn mentions(&self, kind: EntityKind, name: &str, text: &str) -> bool {
        match self.matchers.get(&(kind, entity_key(name))) {
            Some(m) => m.is_match(text),
            None => mentions_name(text, name),
        }
    }

    /// Every distinct owner across all requests, in request order.
    pub fn all_owners(&self) -> &[String] {
        &self.all_owners
    }

    fn add(&mut self, entity: TrackedEntity, owner: &str) {
        let key = entity.key();
        if key.is_empty() {
            return;
        }
        let kind = entity.kind;
        let list = match kind {
            EntityKind::Company => &mut self.companies,
            EntityKind::Person => &mut self.people,
        };
        match list.iter_mut().find(|e| e.key() == key) {
            Some(existing) => {
                if existing.ticker.is_none() {
                    existing.ticker = entity.ticker;
                }
                if existing.filing_id.is_none() {
                    existing.filing_id = entity.filing_id;
                }
                if existing.title.is_none() {
                    existing.title = entity.title;
                }
            }
            None => {
                self.matchers
                    .insert((kind, key.clone()), NameMatcher::new(&entity.name));
                list.push(entity);
            }
        }

        let owner = owner.trim();
        if owner.is_empty() {
            return;
        }
        let owners = self.owners.entry((kind, key)).or_default();
        if !owners.iter().any(|o| o == owner) {
            owners.push(owner.to_string());
        }
        if !self.all_owners.iter().any(|o| o == owner) {
            self.all_owners.push(owner.to_string());
        }
    }
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Merge all tracking requests of a run. Pure; blank names are ignored.
pub fn collect_entities(requests: &[TrackingRequest]) -> TrackedEntities {
    let mut out = TrackedEntities::default();
    for req in requests {
        for c in &req.companies {
            let mut e = TrackedEntity::company(&c.name);
            e.ticker = non_empty(&c.ticker);
            e.filing_id = non_empty(&c.filing_id);
            out.add(e, &req.owner);
        }
        for p in &req.people {
            let mut e = TrackedEntity::person(&p.name);
            e.title = non_empty(&p.title);
            out.add(e, &req.owner);
        }
    }
    out
}

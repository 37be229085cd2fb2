//! In-memory directory used by the integration tests.
//!
//! Evaluates the filter text produced by the library, pages results by cookie and applies
//! modifications, so relations can be exercised end to end without a server. `memberof` is
//! computed from the groups' `member` values, the way Active Directory maintains it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Deserialize;

use dirlink_core::{Error, Result};
use dirlink_ldap::{
    DirectoryTransport, DistinguishedName, Entry, Modification, SearchPage, SearchRequest,
};

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    dn: String,
    attributes: HashMap<String, Vec<String>>,
}

/// Loads `tests/fixtures/<name>` into entries.
pub fn load_fixture(name: &str) -> Vec<Entry> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let raw = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture at {}: {}", path.display(), e));
    let entries: Vec<FixtureEntry> = serde_json::from_str(&raw)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e));

    entries
        .into_iter()
        .map(|fixture| {
            let mut entry = Entry::with_dn(dn(&fixture.dn));
            for (name, values) in fixture.attributes {
                entry.set(&name, values);
            }
            entry
        })
        .collect()
}

/// Parses a DN, panicking on malformed input.
pub fn dn(value: &str) -> DistinguishedName {
    DistinguishedName::parse(value).unwrap()
}

#[derive(Debug, Default)]
pub struct State {
    pub entries: Vec<Entry>,
    pub searches: Vec<SearchRequest>,
    pub modifications: Vec<(String, Modification)>,
    pub lookups: usize,
}

/// Shared handle; clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<State>>,
}

impl FakeDirectory {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries,
                ..State::default()
            })),
        }
    }

    pub fn from_fixture(name: &str) -> Self {
        Self::new(load_fixture(name))
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Stored entry with `memberof` filled in.
    pub fn entry(&self, value: &str) -> Entry {
        let state = self.state();
        let target = dn(value);
        let entry = state
            .entries
            .iter()
            .find(|entry| entry.dn() == Some(&target))
            .unwrap_or_else(|| panic!("no entry {value}"));
        with_member_of(entry, &state.entries)
    }

    pub fn values(&self, entry_dn: &str, attribute: &str) -> Vec<String> {
        self.entry(entry_dn)
            .strings(attribute)
            .into_iter()
            .map(str::to_ascii_lowercase)
            .collect()
    }

    pub fn search_count(&self) -> usize {
        self.state().searches.len()
    }
}

fn with_member_of(entry: &Entry, entries: &[Entry]) -> Entry {
    let mut entry = entry.clone();
    let Some(own) = entry.dn().cloned() else {
        return entry;
    };
    let groups = entries
        .iter()
        .filter(|group| {
            group
                .strings("member")
                .iter()
                .any(|member| DistinguishedName::parse(member).is_ok_and(|member| member == own))
        })
        .filter_map(|group| group.dn().map(ToString::to_string))
        .collect::<Vec<_>>();
    if !groups.is_empty() {
        entry.set("memberof", groups);
    }
    entry
}

#[async_trait]
impl DirectoryTransport for FakeDirectory {
    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: Option<Vec<u8>>,
    ) -> Result<SearchPage> {
        let mut state = self.state();
        state.searches.push(request.clone());

        let matching = state
            .entries
            .iter()
            .map(|entry| with_member_of(entry, &state.entries))
            .filter(|entry| matches(&request.filter, entry))
            .collect::<Vec<_>>();

        let offset = cookie
            .map(|cookie| String::from_utf8(cookie).unwrap().parse::<usize>().unwrap())
            .unwrap_or(0);
        let end = (offset + request.page_size as usize).min(matching.len());
        let next = if end < matching.len() {
            end.to_string().into_bytes()
        } else {
            Vec::new()
        };

        Ok(SearchPage {
            entries: matching[offset..end].to_vec(),
            cookie: Some(next),
        })
    }

    async fn find(&mut self, dn_text: &str, _attributes: &[String]) -> Result<Option<Entry>> {
        let mut state = self.state();
        state.lookups += 1;
        let target = DistinguishedName::parse(dn_text)?;
        Ok(state
            .entries
            .iter()
            .find(|entry| entry.dn() == Some(&target))
            .map(|entry| with_member_of(entry, &state.entries)))
    }

    async fn add(&mut self, dn_text: &str, attributes: &[(String, Vec<Vec<u8>>)]) -> Result<()> {
        let mut entry = Entry::with_dn(DistinguishedName::parse(dn_text)?);
        for (name, values) in attributes {
            entry.set(name, values.clone());
        }
        self.state().entries.push(entry);
        Ok(())
    }

    async fn modify(&mut self, dn_text: &str, modifications: &[Modification]) -> Result<()> {
        let target = DistinguishedName::parse(dn_text)?;
        let mut state = self.state();
        for modification in modifications {
            state
                .modifications
                .push((dn_text.to_string(), modification.clone()));
        }
        let entry = state
            .entries
            .iter_mut()
            .find(|entry| entry.dn() == Some(&target))
            .ok_or_else(|| Error::transport("modify", "No such object"))?;

        for modification in modifications {
            match modification {
                Modification::Add { attribute, values } => {
                    for value in values {
                        entry.add_value(attribute, value.clone());
                    }
                }
                Modification::Delete { attribute, values } => {
                    if values.is_empty() {
                        entry.remove(attribute);
                    }
                    for value in values {
                        entry.remove_value(attribute, value);
                    }
                }
                Modification::Replace { attribute, values } => {
                    if values.is_empty() {
                        entry.remove(attribute);
                    } else {
                        entry.set(attribute, values.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Evaluates rendered filter text against an entry.
pub fn matches(filter: &str, entry: &Entry) -> bool {
    let (result, rest) = evaluate(filter, entry);
    assert!(rest.is_empty(), "trailing filter text: {rest}");
    result
}

fn evaluate<'f>(filter: &'f str, entry: &Entry) -> (bool, &'f str) {
    let inner = filter
        .strip_prefix('(')
        .unwrap_or_else(|| panic!("expected `(` in {filter}"));

    match inner.as_bytes().first() {
        Some(b'&') => evaluate_list(&inner[1..], entry, true),
        Some(b'|') => evaluate_list(&inner[1..], entry, false),
        Some(b'!') => {
            let (result, rest) = evaluate(&inner[1..], entry);
            (!result, &rest[1..])
        }
        _ => {
            let end = inner.find(')').unwrap();
            let (attribute, value) = inner[..end].split_once('=').unwrap();
            let result = if value == "*" {
                entry.has(attribute)
            } else {
                let wanted = unescape(value);
                entry
                    .values(attribute)
                    .unwrap_or_default()
                    .iter()
                    .any(|stored| stored.eq_ignore_ascii_case(&wanted))
            };
            (result, &inner[end + 1..])
        }
    }
}

fn evaluate_list<'f>(mut rest: &'f str, entry: &Entry, all: bool) -> (bool, &'f str) {
    let mut result = all;
    while rest.starts_with('(') {
        let (matched, remaining) = evaluate(rest, entry);
        result = if all { result && matched } else { result || matched };
        rest = remaining;
    }
    (result, &rest[1..])
}

fn unescape(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            out.push(u8::from_str_radix(&value[i + 1..i + 3], 16).unwrap());
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

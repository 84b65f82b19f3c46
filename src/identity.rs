use std::collections::BTreeSet;

use crate::models::EvaluationRecord;

/// Lowercases `name`, drops whitespace, commas and periods, then strips
/// trailing academic titles until none is left. A title that would consume
/// the whole identifier is kept.
pub fn canonical_identifier<S: AsRef<str>>(name: &str, titles: &[S]) -> String {
    let mut identifier: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '.')
        .collect();

    loop {
        let mut stripped = false;
        for title in titles {
            let title = title.as_ref();
            if !title.is_empty() && identifier.len() > title.len() && identifier.ends_with(title) {
                identifier.truncate(identifier.len() - title.len());
                stripped = true;
            }
        }
        if !stripped {
            return identifier;
        }
    }
}

/// Canonical identifiers of every teacher known to the store.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    identifiers: BTreeSet<String>,
}

impl IdentityIndex {
    pub fn build<'a, I, S>(records: I, titles: &[S]) -> Self
    where
        I: IntoIterator<Item = &'a EvaluationRecord>,
        S: AsRef<str>,
    {
        let identifiers = records
            .into_iter()
            .map(|record| canonical_identifier(&record.teacher, titles))
            .filter(|identifier| !identifier.is_empty())
            .collect();
        Self { identifiers }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }
}

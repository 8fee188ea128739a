//! Column name clean-up shared by the file readers.

use std::collections::{HashMap, HashSet};

const BOM: char = '\u{feff}';

/// Turns the raw cells of a header row into unique column names.
///
/// Blank names become `Unnamed: <index>`; a repeated name gets a `.1`, `.2`,
/// ... suffix in order of appearance.
pub(crate) fn normalize(raw: Vec<Option<String>>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(raw.len());
    for (index, cell) in raw.into_iter().enumerate() {
        let base = cell
            .as_deref()
            .map(|s| s.trim_start_matches(BOM).trim())
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("Unnamed: {index}"), ToString::to_string);
        let mut name = base.clone();
        while seen.contains(&name) {
            let n = repeats.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{base}.{n}");
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

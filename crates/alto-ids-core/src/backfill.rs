use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::PrefixConfig;
use crate::detector::GapCounts;
use crate::error::Error;
use crate::idgen::IdGenerator;
use crate::locator::{self, Role, ID_ATTRIBUTE};
use crate::xml::{Document, NodeId};

/// Assigns an `ID` to every element in `elements` that has none. Existing
/// values, including empty ones, are never changed or reused.
pub fn assign_missing_ids(doc: &mut Document, elements: &[NodeId], prefix: &str) -> usize {
    let mut used: HashSet<String> = elements
        .iter()
        .filter_map(|&id| doc.element(id))
        .filter_map(|element| element.attribute(ID_ATTRIBUTE))
        .map(str::to_string)
        .collect();

    let mut generator = IdGenerator::new(prefix);
    let mut assigned = 0;

    for &node in elements {
        let Some(element) = doc.element_mut(node) else {
            continue;
        };
        if element.has_attribute(ID_ATTRIBUTE) {
            continue;
        }
        // The generator is unbounded, so `find` always yields a value.
        if let Some(id) = generator.by_ref().find(|candidate| !used.contains(candidate)) {
            used.insert(id.clone());
            element.set_attribute(ID_ATTRIBUTE, id);
            assigned += 1;
        }
    }
    assigned
}

/// Fills every gap in the document: blocks first, then lines, then words,
/// each with a fresh generator.
pub fn backfill_document(doc: &mut Document, prefixes: &PrefixConfig) -> GapCounts {
    let mut assigned = GapCounts::default();
    for role in Role::ALL {
        let elements = locator::locate_role(doc, role);
        let count = assign_missing_ids(doc, &elements, prefixes.for_role(role));
        assigned.add(role, count);
    }
    assigned
}

/// Parses `path`, fills its gaps and rewrites it in place.
pub fn backfill_file(path: &Path, prefixes: &PrefixConfig) -> Result<GapCounts, Error> {
    let mut doc = Document::from_path(path)?;
    let assigned = backfill_document(&mut doc, prefixes);
    doc.write_to_path(path)?;
    debug!(
        "Rewrote {} ({} block, {} line, {} word IDs added)",
        path.display(),
        assigned.blocks,
        assigned.lines,
        assigned.words,
    );
    Ok(assigned)
}

/// Rewrites the files in order. The first failure stops the pass; files
/// already rewritten stay rewritten.
pub fn backfill_file_set(
    files: &[PathBuf],
    prefixes: &PrefixConfig,
    mut on_file: impl FnMut(usize, &Path, &GapCounts),
) -> Result<GapCounts, Error> {
    let mut total = GapCounts::default();
    for (index, path) in files.iter().enumerate() {
        let assigned = backfill_file(path, prefixes)?;
        for role in Role::ALL {
            total.add(role, assigned.get(role));
        }
        on_file(index, path, &assigned);
    }
    Ok(total)
}

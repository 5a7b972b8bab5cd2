use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;
use crate::locator::{self, Role, ID_ATTRIBUTE};
use crate::xml::{Document, NodeId};

/// True when any of the elements lacks an `ID` attribute. An empty value
/// still counts as present.
pub fn has_gap(doc: &Document, elements: &[NodeId]) -> bool {
    elements
        .iter()
        .filter_map(|&id| doc.element(id))
        .any(|element| !element.has_attribute(ID_ATTRIBUTE))
}

/// Checks blocks, then lines, then words, stopping at the first role with a gap.
pub fn document_has_gap(doc: &Document) -> bool {
    Role::ALL
        .iter()
        .any(|&role| has_gap(doc, &locator::locate_role(doc, role)))
}

pub fn file_has_gap(path: &Path) -> Result<bool, Error> {
    let doc = Document::from_path(path)?;
    Ok(document_has_gap(&doc))
}

/// Read-only pre-flight pass. Files are checked in order and the scan stops
/// at the first file with a gap; files after it are not opened.
pub fn any_file_has_gap(files: &[PathBuf]) -> Result<bool, Error> {
    Ok(first_file_with_gap(files, |_| {})?.is_some())
}

/// Like [`any_file_has_gap`], returning the file that ended the scan.
/// `on_checked` receives the number of files checked so far.
pub fn first_file_with_gap<'a>(
    files: &'a [PathBuf],
    mut on_checked: impl FnMut(usize),
) -> Result<Option<&'a Path>, Error> {
    for (index, path) in files.iter().enumerate() {
        let gap = file_has_gap(path)?;
        on_checked(index + 1);
        if gap {
            debug!("Missing IDs found in {}", path.display());
            return Ok(Some(path.as_path()));
        }
    }
    Ok(None)
}

/// Number of elements without an `ID`, per role.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GapCounts {
    pub blocks: usize,
    pub lines: usize,
    pub words: usize,
}

impl GapCounts {
    pub fn total(&self) -> usize {
        self.blocks + self.lines + self.words
    }

    pub fn get(&self, role: Role) -> usize {
        match role {
            Role::Block => self.blocks,
            Role::Line => self.lines,
            Role::Word => self.words,
        }
    }

    pub(crate) fn add(&mut self, role: Role, count: usize) {
        match role {
            Role::Block => self.blocks += count,
            Role::Line => self.lines += count,
            Role::Word => self.words += count,
        }
    }
}

pub fn count_gaps(doc: &Document) -> GapCounts {
    let located = locator::locate(doc);
    let mut counts = GapCounts::default();
    for role in Role::ALL {
        let missing = located
            .of(role)
            .iter()
            .filter_map(|&id| doc.element(id))
            .filter(|element| !element.has_attribute(ID_ATTRIBUTE))
            .count();
        counts.add(role, missing);
    }
    counts
}

//! Tree transformations: timeframe selection, merging, moving editions and
//! shifting timecodes.

use tracing::trace;

use crate::model::{ChapterAtom, Chapters};

/// End assumed for the last atom of a level that has no explicit end.
const UNBOUNDED_END: u64 = 1 << 62;

/// Window passed down while selecting atoms.
#[derive(Debug, Clone, Copy)]
struct Window {
    min: u64,
    max: Option<u64>,
    offset: u64,
}

impl Chapters {
    /// Keep only the atoms inside `[min, max]` and shift them by `-offset`.
    ///
    /// Atoms that start before `min` but end after it are kept with their
    /// start moved to `min`. Explicit end timecodes are clamped to `max`.
    /// Editions left without atoms are dropped; `None` is returned if no
    /// edition survives.
    pub fn select_in_timeframe(mut self, min: u64, max: Option<u64>, offset: u64) -> Option<Self> {
        let window = Window { min, max, offset };
        for edition in &mut self.editions {
            select_atoms(&mut edition.atoms, window);
        }
        self.editions.retain(|e| !e.atoms.is_empty());

        if self.editions.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    /// Fold sibling atoms sharing a UID into the first of them.
    ///
    /// The merged atom starts at the earliest start and ends at the latest
    /// end of all instances. Applying it twice changes nothing.
    pub fn merge_entries(&mut self) {
        for edition in &mut self.editions {
            merge_atoms(&mut edition.atoms);
        }
    }

    /// Move all editions of `src` into `self`.
    ///
    /// An edition whose UID already exists here only contributes its atoms
    /// to the existing edition. `src` is empty afterwards.
    pub fn move_by_edition(&mut self, src: &mut Chapters) {
        for edition in src.editions.drain(..) {
            let target = edition.uid.and_then(|uid| self.find_edition_mut(uid));
            match target {
                Some(target) => target.atoms.extend(edition.atoms),
                None => self.editions.push(edition),
            }
        }
    }

    /// Add `delta` to every start and end timecode, clamping at zero.
    pub fn adjust_timecodes(&mut self, delta: i64) {
        for edition in &mut self.editions {
            adjust_atoms(&mut edition.atoms, delta);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Selection {
    remove: bool,
    spans: bool,
}

fn select_atoms(atoms: &mut Vec<ChapterAtom>, window: Window) {
    if atoms.is_empty() {
        return;
    }

    let starts: Vec<u64> = atoms.iter().map(|a| a.start_or(0)).collect();
    let last = atoms.len() - 1;
    let mut selection = vec![Selection::default(); atoms.len()];

    for (i, atom) in atoms.iter_mut().enumerate() {
        let start = starts[i];
        let end = match atom.time_end {
            Some(end) => end,
            None if i == last => UNBOUNDED_END,
            None => starts[i + 1],
        };

        let remove = start < window.min || window.max.is_some_and(|max| start > max);
        let spans = remove && start < window.min && end > window.min;
        selection[i] = Selection { remove, spans };

        trace!(
            "remove_chapters: entries[{}]: remove {} spans {} start {} end {}",
            i,
            remove,
            spans,
            start,
            end
        );

        if remove && !spans {
            continue;
        }

        let start = if spans { window.min } else { start };
        atom.time_start = Some(start.saturating_sub(window.offset));
        if let Some(end) = atom.time_end {
            let end = window.max.map_or(end, |max| end.min(max));
            atom.time_end = Some(end.saturating_sub(window.offset));
        }

        select_atoms(&mut atom.children, window);
    }

    let mut index = 0;
    atoms.retain(|_| {
        let keep = !selection[index].remove || selection[index].spans;
        index += 1;
        keep
    });
}

fn merge_atoms(atoms: &mut Vec<ChapterAtom>) {
    let mut i = 0;
    while i < atoms.len() {
        let Some(uid) = atoms[i].uid else {
            i += 1;
            continue;
        };

        let mut start = atoms[i].start_or(0);
        let mut end = atoms[i].time_end;
        trace!(
            "chapters: merge_entries: looking for {} with {}, {:?}",
            uid,
            start,
            end
        );

        let mut k = i + 1;
        while k < atoms.len() {
            if atoms[k].uid != Some(uid) {
                k += 1;
                continue;
            }

            let duplicate = atoms.remove(k);
            let merge_start = duplicate.start_or(0);
            start = start.min(merge_start);
            end = match (end, duplicate.time_end) {
                (None, merge_end) => merge_end,
                (Some(end), Some(merge_end)) => Some(end.max(merge_end)),
                (Some(end), None) => Some(end),
            };
            trace!(
                "chapters: merge_entries:   found one at {} with {}, {:?}; merged to {}, {:?}",
                k,
                merge_start,
                duplicate.time_end,
                start,
                end
            );
        }

        atoms[i].time_start = Some(start);
        if end.is_some() {
            atoms[i].time_end = end;
        }
        i += 1;
    }

    for atom in atoms.iter_mut() {
        merge_atoms(&mut atom.children);
    }
}

fn adjust_atoms(atoms: &mut [ChapterAtom], delta: i64) {
    let shift = |value: u64| -> u64 {
        let shifted = i128::from(value) + i128::from(delta);
        u64::try_from(shifted.max(0)).unwrap_or(u64::MAX)
    };

    for atom in atoms.iter_mut() {
        atom.time_start = atom.time_start.map(shift);
        atom.time_end = atom.time_end.map(shift);
        adjust_atoms(&mut atom.children, delta);
    }
}

//! UID based lookup.
//!
//! A UID of 0 acts as a wildcard for "the first one".

use crate::model::{ChapterAtom, Chapters, Edition};

impl Chapters {
    /// Edition with the given UID, or the first edition for UID 0.
    pub fn find_edition(&self, uid: u64) -> Option<&Edition> {
        if uid == 0 {
            return self.editions.first();
        }
        self.editions.iter().find(|e| e.uid == Some(uid))
    }

    pub fn find_edition_mut(&mut self, uid: u64) -> Option<&mut Edition> {
        if uid == 0 {
            return self.editions.first_mut();
        }
        self.editions.iter_mut().find(|e| e.uid == Some(uid))
    }

    /// Top level atom with the given UID in any edition, or the first atom
    /// of the first edition for UID 0.
    pub fn find_chapter(&self, uid: u64) -> Option<&ChapterAtom> {
        if uid == 0 {
            return self.editions.first()?.atoms.first();
        }
        self.editions
            .iter()
            .flat_map(|e| e.atoms.iter())
            .find(|a| a.uid == Some(uid))
    }
}

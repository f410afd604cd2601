//! Filling in mandatory chapter elements.

use crate::model::{
    ChapterAtom, ChapterDisplay, ChapterProcess, ChapterTrack, Chapters, Edition, ProcessCommand,
    UNDETERMINED_LANGUAGE,
};
use crate::uid::{UidKind, UniqueIds};

impl Chapters {
    /// Add every mandatory element that is missing, recursively.
    ///
    /// Existing values are never overwritten. Missing UIDs are drawn from
    /// `uids`, which should already know about the UIDs present in the
    /// tree (see [`Chapters::register_uids`]).
    pub fn fix_mandatory_elements(&mut self, uids: &mut UniqueIds) {
        for edition in &mut self.editions {
            fix_edition(edition, uids);
        }
    }

    /// Reserve all UIDs present in the tree.
    pub fn register_uids(&self, uids: &mut UniqueIds) {
        fn walk(atoms: &[ChapterAtom], uids: &mut UniqueIds) {
            for atom in atoms {
                if let Some(uid) = atom.uid {
                    uids.register(UidKind::Chapter, uid);
                }
                walk(&atom.children, uids);
            }
        }

        for edition in &self.editions {
            if let Some(uid) = edition.uid {
                uids.register(UidKind::Edition, uid);
            }
            walk(&edition.atoms, uids);
        }
    }
}

fn fix_edition(edition: &mut Edition, uids: &mut UniqueIds) {
    edition.flag_default.get_or_insert(false);
    edition.flag_hidden.get_or_insert(false);
    if edition.uid.is_none() {
        edition.uid = Some(uids.create(UidKind::Edition));
    }
    for atom in &mut edition.atoms {
        fix_atom(atom, uids);
    }
}

fn fix_atom(atom: &mut ChapterAtom, uids: &mut UniqueIds) {
    atom.flag_hidden.get_or_insert(false);
    atom.flag_enabled.get_or_insert(true);
    if atom.uid.is_none() {
        atom.uid = Some(uids.create(UidKind::Chapter));
    }
    atom.time_start.get_or_insert(0);

    if let Some(track) = atom.track.as_mut() {
        fix_track(track);
    }
    for display in &mut atom.displays {
        fix_display(display);
    }
    for process in &mut atom.processes {
        fix_process(process);
    }
    for child in &mut atom.children {
        fix_atom(child, uids);
    }
}

fn fix_track(track: &mut ChapterTrack) {
    if track.track_numbers.is_empty() {
        track.track_numbers.push(0);
    }
}

fn fix_display(display: &mut ChapterDisplay) {
    display.string.get_or_insert_with(String::new);
    display
        .language
        .get_or_insert_with(|| UNDETERMINED_LANGUAGE.to_string());
}

fn fix_process(process: &mut ChapterProcess) {
    process.codec_id.get_or_insert(0);
    for command in &mut process.commands {
        fix_command(command);
    }
}

fn fix_command(command: &mut ProcessCommand) {
    command.time.get_or_insert(0);
    command.data.get_or_insert_with(Vec::new);
}

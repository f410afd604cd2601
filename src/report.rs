//! Human readable rendering of identification results and chapter trees.

use std::fmt::Write;

use mediasplice_chapters::{ChapterAtom, Chapters};
use mediasplice_demux::Identification;

use crate::timecode::format_timecode;

pub fn render_identification(info: &Identification) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "File type: {}", info.container);
    for track in &info.tracks {
        let _ = write!(out, "Track ID {}: {} ({})", track.id, track.kind, track.codec);
        if !track.properties.is_empty() {
            let props: Vec<String> = track
                .properties
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect();
            let _ = write!(out, " [{}]", props.join(" "));
        }
        out.push('\n');
    }
    out
}

pub fn render_chapters(chapters: &Chapters) -> String {
    let mut out = String::new();
    for (i, edition) in chapters.editions.iter().enumerate() {
        let _ = write!(out, "Edition {} (UID {})", i + 1, edition.uid.unwrap_or(0));
        if edition.flag_default == Some(true) {
            out.push_str(" [default]");
        }
        if edition.flag_hidden == Some(true) {
            out.push_str(" [hidden]");
        }
        out.push('\n');
        for atom in &edition.atoms {
            render_atom(&mut out, atom, 1);
        }
    }
    out
}

fn render_atom(out: &mut String, atom: &ChapterAtom, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{}{}", indent, format_timecode(atom.start_or(0)));
    if let Some(end) = atom.end() {
        let _ = write!(out, " - {}", format_timecode(end));
    }
    let name = atom.name();
    if !name.is_empty() {
        let _ = write!(out, " \"{}\"", name);
    }
    if let Some(language) = atom.displays.first().and_then(|d| d.language.as_deref()) {
        let _ = write!(out, " [{}]", language);
    }
    let _ = writeln!(out, " (UID {})", atom.uid.unwrap_or(0));
    for child in &atom.children {
        render_atom(out, child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasplice_chapters::{ChapterDisplay, Edition};
    use mediasplice_demux::TrackKind;

    #[test]
    fn test_render_identification() {
        let mut info = Identification::new("MPEG-2 program stream (PS)");
        info.add_track(
            TrackKind::Audio,
            "AC3",
            [("stream_id".to_string(), "bd".to_string())],
        );
        let text = render_identification(&info);
        assert!(text.starts_with("File type: MPEG-2 program stream (PS)\n"));
        assert!(text.contains("Track ID 0: audio (AC3) [stream_id:bd]"));
    }

    #[test]
    fn test_render_nested_chapters() {
        let child = ChapterAtom::new(60_000_000_000, None)
            .with_uid(7)
            .with_display(ChapterDisplay::new("Scene", "eng"));
        let parent = ChapterAtom::new(0, Some(120_000_000_000))
            .with_uid(5)
            .with_display(ChapterDisplay::new("Act", "ger"))
            .with_child(child);
        let mut edition = Edition::with_uid(3);
        edition.atoms.push(parent);
        let chapters = Chapters {
            editions: vec![edition],
        };

        let text = render_chapters(&chapters);
        assert_eq!(
            text,
            "Edition 1 (UID 3)\n\
             \x20 00:00:00.000 - 00:02:00.000 \"Act\" [ger] (UID 5)\n\
             \x20   00:01:00.000 \"Scene\" [eng] (UID 7)\n"
        );
    }
}

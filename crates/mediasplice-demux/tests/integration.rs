//! Integration tests for mediasplice-demux

use std::io::{Cursor, Write};

use mediasplice_demux::{
    container::tta::{FRAME_TIME, MAGIC},
    detect_container, open_file, open_reader, Codec, Container, Error, FileStatus, MemorySink,
    MpegPsReader, PsConfig, Reader, TrackKind,
};

fn pts_bytes(pts: u64) -> [u8; 5] {
    [
        0x21 | (((pts >> 29) & 0x0e) as u8),
        (pts >> 22) as u8,
        (((pts >> 14) & 0xfe) as u8) | 1,
        (pts >> 7) as u8,
        (((pts << 1) & 0xfe) as u8) | 1,
    ]
}

/// MPEG-2 pack header without stuffing
fn pack_header() -> Vec<u8> {
    vec![
        0x00, 0x00, 0x01, 0xba, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xc3, 0xf8,
    ]
}

fn system_header() -> Vec<u8> {
    vec![
        0x00, 0x00, 0x01, 0xbb, 0x00, 0x0c, 0x80, 0x00, 0x01, 0x04, 0xe1, 0xff, // fixed part
        0xe0, 0xe0, 0xe8, // video P-STD
        0xbd, 0xe0, 0x20, // private stream 1 P-STD
    ]
}

fn pes(id: u8, sub_id: Option<u8>, pts: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0x81, if pts.is_some() { 0x80 } else { 0x00 }];
    match pts {
        Some(pts) => {
            body.push(5);
            body.extend_from_slice(&pts_bytes(pts));
        }
        None => body.push(0),
    }
    if let Some(sub_id) = sub_id {
        body.extend_from_slice(&[sub_id, 0x01, 0x00, 0x01]);
    }
    body.extend_from_slice(payload);

    let mut packet = vec![0x00, 0x00, 0x01, id];
    packet.extend_from_slice(&(body.len() as u16).to_be_bytes());
    packet.extend_from_slice(&body);
    packet
}

fn mpeg2_video() -> Vec<u8> {
    let mut data = vec![
        0x00, 0x00, 0x01, 0xb3, 0x2d, 0x02, 0x40, 0x33, 0xff, 0xff, 0xe0, 0x00,
    ];
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb5, 0x14, 0x8a, 0x00, 0x01, 0x00, 0x00]);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x0f, 0xff, 0xf8]);
    data.extend_from_slice(&[0x12; 32]);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x4f, 0xff, 0xf8]);
    data
}

fn ac3_frame() -> Vec<u8> {
    let mut data = vec![0x0b, 0x77, 0x00, 0x00, 0x14, 0x40, 0xe1, 0x00];
    data.extend_from_slice(&[0x55; 24]);
    data
}

fn program_stream() -> Vec<u8> {
    let mut data = pack_header();
    data.extend(system_header());
    data.extend(pes(0xe0, None, Some(180_000), &mpeg2_video()));
    data.extend(pes(0xbd, Some(0x80), Some(183_600), &ac3_frame()));
    data.extend(pack_header());
    data.extend(pes(0xe0, None, Some(183_600), &[0x44; 64]));
    data.extend(pes(0xbd, Some(0x80), Some(186_480), &ac3_frame()));
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb9]);
    data
}

fn tta_file(frames: &[usize], sample_rate: u32, data_length: u32) -> Vec<u8> {
    let mut data = MAGIC.to_vec();
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&16u16.to_le_bytes());
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&data_length.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    for &len in frames {
        data.extend_from_slice(&(len as u32).to_le_bytes());
    }
    data.extend_from_slice(&0u32.to_le_bytes());
    for &len in frames {
        data.extend(std::iter::repeat(0xa5).take(len));
    }
    data
}

/// Test the two-track program stream scenario end to end
#[test]
fn test_program_stream_video_and_ac3() {
    let mut reader = open_reader(Cursor::new(program_stream()), PsConfig::default()).unwrap();

    let tracks = reader.tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].kind, TrackKind::Video);
    assert_eq!(tracks[0].codec, Codec::MpegVideo(2));
    assert_eq!(tracks[0].timestamp_offset, Some(0));
    assert_eq!(tracks[1].kind, TrackKind::Audio);
    assert_eq!(tracks[1].codec, Codec::Ac3);
    assert_eq!(tracks[1].timestamp_offset, Some(40_000_000));

    let audio_params = tracks[1].params.audio().unwrap();
    assert_eq!(audio_params.channels, 6);
    assert_eq!(audio_params.sample_rate, 48000);

    let identification = reader.identify();
    assert_eq!(identification.container, "MPEG-2 program stream (PS)");
    assert_eq!(identification.tracks[1].properties["stream_id"], "bd");
    assert_eq!(identification.tracks[1].properties["sub_stream_id"], "80");

    let video = MemorySink::new();
    let audio = MemorySink::new();
    reader.set_sink(0, Box::new(video.clone())).unwrap();
    reader.set_sink(1, Box::new(audio.clone())).unwrap();
    while reader.read().unwrap() == FileStatus::MoreData {}

    let audio_timestamps: Vec<_> = audio.frames().iter().map(|f| f.timestamp).collect();
    assert_eq!(audio_timestamps, vec![Some(40_000_000), Some(72_000_000)]);
    assert_eq!(video.frame_count(), 1);
    assert_eq!(video.total_bytes(), mpeg2_video().len() + 64);
    assert_eq!(video.flush_count(), 1);
    assert_eq!(audio.flush_count(), 1);
}

/// Test resynchronisation on leading garbage
#[test]
fn test_resync_after_garbage() {
    let mut data = vec![0x47, 0x11, 0x22, 0x33, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02];
    data.extend(program_stream());

    // garbage in front defeats the pack header probe
    assert_eq!(detect_container(&mut Cursor::new(data.clone())), None);

    let mut reader = MpegPsReader::new(Cursor::new(data)).expect("reader opens");
    assert_eq!(reader.tracks().len(), 2);

    let audio = MemorySink::new();
    reader.set_sink(1, Box::new(audio.clone())).unwrap();
    while reader.read().unwrap() == FileStatus::MoreData {}
    assert_eq!(audio.frame_count(), 2);
}

/// Test garbage between packets in the middle of a stream
#[test]
fn test_resync_between_packets() {
    let mut data = pack_header();
    data.extend(pes(0xbd, Some(0x80), Some(90_000), &ac3_frame()));
    data.extend_from_slice(&[0x99; 37]);
    data.extend(pack_header());
    data.extend(pes(0xbd, Some(0x80), Some(92_880), &ac3_frame()));

    let mut reader = open_reader(Cursor::new(data), PsConfig::default()).unwrap();
    let audio = MemorySink::new();
    reader.set_sink(0, Box::new(audio.clone())).unwrap();
    while reader.read().unwrap() == FileStatus::MoreData {}

    let timestamps: Vec<_> = audio.frames().iter().map(|f| f.timestamp).collect();
    assert_eq!(timestamps, vec![Some(0), Some(32_000_000)]);
}

/// Test that an unknown format is rejected
#[test]
fn test_unknown_format() {
    let result = open_reader(Cursor::new(b"RIFF....WAVEfmt ".to_vec()), PsConfig::default());
    assert!(matches!(result, Err(Error::UnknownFormat)));
}

/// Test TTA demuxing from a file on disk
#[test]
fn test_tta_file_on_disk() {
    let rate = 44100;
    let nominal = (FRAME_TIME * f64::from(rate)).round() as u32;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&tta_file(&[100, 80], rate, nominal + 100))
        .unwrap();
    file.flush().unwrap();

    let mut reader = open_file(file.path(), PsConfig::default()).unwrap();
    assert_eq!(reader.identify().container, "TTA");

    let sink = MemorySink::new();
    reader.set_sink(0, Box::new(sink.clone())).unwrap();
    while reader.read().unwrap() == FileStatus::MoreData {}

    let frames = sink.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].len(), 100);
    assert!(frames[1].duration.is_some());
}

/// Test that a TTA file whose seek table does not cover the file fails
#[test]
fn test_tta_broken_seek_table() {
    let mut data = tta_file(&[100, 80], 44100, 50_000);
    data.extend_from_slice(&[0u8; 7]);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    assert_eq!(
        detect_container(&mut std::fs::File::open(file.path()).unwrap()),
        Some(Container::Tta)
    );
    match open_file(file.path(), PsConfig::default()) {
        Err(Error::BrokenSeekTable { .. }) => {}
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("broken seek table accepted"),
    }
}

/// Test TTA behind a leading ID3v2 tag
#[test]
fn test_tta_with_id3v2_tag() {
    let mut data = b"ID3".to_vec();
    data.extend_from_slice(&[0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0a]);
    data.extend_from_slice(&[0u8; 10]);
    data.extend(tta_file(&[12, 12, 12], 48000, 1000));

    let mut source = Cursor::new(data);
    assert_eq!(detect_container(&mut source), Some(Container::Tta));
    let mut reader = open_reader(source, PsConfig::default()).unwrap();
    let sink = MemorySink::new();
    reader.set_sink(0, Box::new(sink.clone())).unwrap();
    while reader.read().unwrap() == FileStatus::MoreData {}
    assert_eq!(sink.total_bytes(), 36);
}

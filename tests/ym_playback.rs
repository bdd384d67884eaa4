//! End-to-end playback of YM files through the player.

#![cfg(feature = "ym-backend")]

use gmplayer::{
    format_metadata, ErrorKind, EventKind, PlaybackState, Player, PlayerEvent, PlayerOptions,
    PlaylistKind, SAMPLES_PER_BLOCK,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// YM3 file of `frames` frames (2 s per 100) holding a steady tone on channel A.
fn ym3_tone(frames: usize) -> Vec<u8> {
    let mut frame = [0u8; 14];
    frame[0] = 0x1c;
    frame[1] = 0x01;
    frame[7] = 0x3e;
    frame[8] = 0x0f;
    frame[13] = 0xff;

    let mut data = b"YM3!".to_vec();
    for reg in frame {
        data.extend(std::iter::repeat(reg).take(frames));
    }
    data
}

fn write(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write test file");
    path
}

fn block_peak(block: &[f32]) -> f32 {
    block.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

#[test]
fn ym_file_plays_and_reports_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "tone.ym", &ym3_tone(100));
    let player = Player::with_ym_backend(PlayerOptions::default());

    let status = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&status);
    player.on(EventKind::TrackChanged, move |e| {
        if let PlayerEvent::TrackChanged { metadata, .. } = e {
            *sink.lock() = format_metadata("%b - %s", metadata);
        }
    });

    player.add_file(&path).unwrap();
    player.load_pair(0, 0).unwrap();
    assert_eq!(*status.lock(), "Atari ST - Track 1");
    assert_eq!(player.length(), 2_000);
    assert_eq!(player.channel_names(), vec!["Channel A", "Channel B", "Channel C"]);

    player.start_or_resume();
    let mut buf = vec![0.0f32; SAMPLES_PER_BLOCK * 4];
    player.render(&mut buf);
    assert!(block_peak(&buf) > 0.01);
    assert_eq!(player.position(), 4 * 2048 * 1000 / 44_100);
}

#[test]
fn odd_sized_renders_match_whole_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "tone.ym", &ym3_tone(100));
    let start = || {
        let player = Player::with_ym_backend(PlayerOptions::default());
        player.add_file(&path).unwrap();
        player.load_pair(0, 0).unwrap();
        player.start_or_resume();
        player
    };

    let whole = start();
    let mut expected = vec![0.0f32; SAMPLES_PER_BLOCK * 3];
    whole.render(&mut expected);

    let halves = start();
    let mut got = vec![0.0f32; SAMPLES_PER_BLOCK * 3];
    for chunk in got.chunks_mut(SAMPLES_PER_BLOCK / 2) {
        halves.render(chunk);
    }
    assert_eq!(got, expected);
    assert_eq!(halves.position(), whole.position());

    let odd = start();
    let mut got = vec![0.0f32; SAMPLES_PER_BLOCK * 3];
    for chunk in got.chunks_mut(1_000) {
        odd.render(chunk);
    }
    assert_eq!(got, expected);
    assert_eq!(odd.position(), whole.position());
}

#[test]
fn playback_stops_after_last_track() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "short.ym", &ym3_tone(50));
    let player = Player::with_ym_backend(PlayerOptions {
        autoplay: true,
        ..Default::default()
    });
    let stops = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&stops);
    player.on(EventKind::Stopped, move |_| *counter.lock() += 1);

    player.add_file(&path).unwrap();
    assert!(player.is_playing());

    let mut buf = vec![0.0f32; SAMPLES_PER_BLOCK * 40];
    player.render(&mut buf);

    assert_eq!(*stops.lock(), 1);
    assert_eq!(player.state(), PlaybackState::Stopped);
    assert_eq!(player.position(), 0);
    assert_eq!(block_peak(&buf[buf.len() - SAMPLES_PER_BLOCK..]), 0.0);
}

#[test]
fn fade_out_attenuates_track_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "fade.ym", &ym3_tone(100));
    let player = Player::with_ym_backend(PlayerOptions {
        fade_out: 1_000,
        ..Default::default()
    });
    player.add_file(&path).unwrap();
    player.load_pair(0, 0).unwrap();
    player.start_or_resume();

    let mut buf = vec![0.0f32; SAMPLES_PER_BLOCK * 41];
    player.render(&mut buf);
    let early = block_peak(&buf[10 * SAMPLES_PER_BLOCK..11 * SAMPLES_PER_BLOCK]);
    let late = block_peak(&buf[40 * SAMPLES_PER_BLOCK..]);
    assert!(early > 0.01);
    assert!(late < early * 0.25, "late {late} early {early}");
}

#[test]
fn companion_m3u_renames_and_retimes_track() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "song.ym", &ym3_tone(100));
    write(&dir, "song.m3u", b"# tracks\nsong.ym::YM,1,Intro Theme,0:05\n");
    let player = Player::with_ym_backend(PlayerOptions::default());

    player.add_file(&path).unwrap();
    player.load_file(0).unwrap();
    assert_eq!(player.names(PlaylistKind::Track), vec!["Intro Theme"]);
    assert_eq!(player.track_info(0).map(|m| m.length), Some(5_000));
}

#[test]
fn unknown_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "noise.ym", b"RIFF....WAVEfmt ");
    let player = Player::with_ym_backend(PlayerOptions::default());

    let err = player.add_file(&path).unwrap_err();
    assert_eq!(err.kind, ErrorKind::LoadFile);
    assert_eq!(player.file_count(), 0);
    assert!(err.to_string().contains("noise.ym"));
}

#[test]
fn options_file_configures_player() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("options.json");
    PlayerOptions {
        fade_out: 2_500,
        volume: 90,
        file_repeat: true,
        ..Default::default()
    }
    .save(&config)
    .unwrap();

    let player = Player::with_ym_backend(PlayerOptions::load_or_default(&config).unwrap());
    let options = player.options();
    assert_eq!(options.fade_out, 2_500);
    assert_eq!(options.volume, 90);
    assert!(options.file_repeat);
    assert!(!options.track_repeat);
}

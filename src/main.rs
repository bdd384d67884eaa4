#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!(
        "The gmplayer CLI requires the \"cli\" feature. Rebuild with `--features cli` to enable playback."
    );
}

#[cfg(feature = "cli")]
mod cli {
    use std::io::{self, Read, Write};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{bail, Context};
    use clap::Parser;
    use gmplayer::metadata::Timestamp;
    use gmplayer::output::AudioOutput;
    use gmplayer::{
        format_metadata, EventKind, PlaybackState, Player, PlayerEvent, PlayerOptions,
        PlaylistKind, MAX_VOLUME,
    };

    const STATUS_UPDATE_MS: u64 = 100;
    const SEEK_STEP_MS: i64 = 5_000;
    const VOLUME_STEP: u8 = 8;

    /// Console player for YM chiptunes.
    #[derive(Parser, Debug)]
    #[command(author, version, about, long_about = None)]
    struct Args {
        /// Files to queue, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// JSON options file. Missing files fall back to defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fade-out at the end of each track, in milliseconds.
        #[arg(long)]
        fade: Option<u64>,

        /// Playback speed multiplier.
        #[arg(long)]
        tempo: Option<f64>,

        /// Master volume (0-128).
        #[arg(long)]
        volume: Option<u8>,

        /// Track to start with (1-based).
        #[arg(short, long, default_value_t = 1)]
        track: usize,

        /// Repeat the current track forever.
        #[arg(long)]
        repeat_track: bool,

        /// Restart the current file when its tracks run out.
        #[arg(long)]
        repeat_file: bool,

        /// Shuffle the file playlist before playing.
        #[arg(long)]
        shuffle: bool,

        /// Status line format (%s song, %a author, %g game, %b system).
        #[arg(long, default_value = "%s - %a")]
        format: String,
    }

    impl Args {
        fn options(&self) -> anyhow::Result<PlayerOptions> {
            let mut options = match &self.config {
                Some(path) => PlayerOptions::load_or_default(path)
                    .with_context(|| format!("failed to read options from {}", path.display()))?,
                None => PlayerOptions::default(),
            };
            if let Some(fade) = self.fade {
                options.fade_out = fade;
            }
            if let Some(tempo) = self.tempo {
                options.tempo = tempo;
            }
            if let Some(volume) = self.volume {
                options.volume = volume;
            }
            options.track_repeat |= self.repeat_track;
            options.file_repeat |= self.repeat_file;
            options.autoplay = false;
            options.sanitize();
            Ok(options)
        }
    }

    fn restore_terminal_mode() {
        #[cfg(unix)]
        let _ = std::process::Command::new("stty")
            .arg("echo")
            .arg("-raw")
            .status();
    }

    fn spawn_key_reader(running: Arc<AtomicBool>) -> mpsc::Receiver<u8> {
        let (tx, rx) = mpsc::channel::<u8>();
        std::thread::spawn(move || {
            #[cfg(unix)]
            let _ = std::process::Command::new("stty")
                .arg("-echo")
                .arg("raw")
                .status();
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1];
            while running.load(Ordering::Relaxed) {
                if stdin.read_exact(&mut buf).is_ok() {
                    if tx.send(buf[0]).is_err() || buf[0] == b'\x03' {
                        break;
                    }
                }
            }
            restore_terminal_mode();
        });
        rx
    }

    /// Console line for the events the player prints, with the status line
    /// cleared first.
    fn event_line(event: &PlayerEvent<'_>, format: &str) -> Option<String> {
        match event {
            PlayerEvent::TrackChanged { index, metadata } => Some(format!(
                "\r\x1b[K[{}] {} ({})\r\n",
                index + 1,
                format_metadata(format, metadata),
                Timestamp(metadata.length)
            )),
            PlayerEvent::Error(err) => Some(format!("\r\x1b[Kerror: {err}\r\n")),
            _ => None,
        }
    }

    /// Apply one key press. Returns `false` when the user asked to quit.
    /// Failed commands are printed by the error subscription.
    fn handle_key(player: &Player, key: u8, muted: &mut [bool; 3]) -> bool {
        match key {
            b' ' => player.play_pause(),
            b'n' => {
                let _ = player.next();
            }
            b'p' => {
                let _ = player.prev();
            }
            b'f' => {
                let _ = player.seek_relative(SEEK_STEP_MS);
            }
            b'b' => {
                let _ = player.seek_relative(-SEEK_STEP_MS);
            }
            b'+' | b'=' => {
                let volume = player.options().volume;
                player.set_volume(volume.saturating_add(VOLUME_STEP).min(MAX_VOLUME));
            }
            b'-' => {
                let volume = player.options().volume;
                player.set_volume(volume.saturating_sub(VOLUME_STEP));
            }
            b'1'..=b'3' => {
                let ch = usize::from(key - b'1');
                muted[ch] = !muted[ch];
                player.mute_channel(ch, muted[ch]);
            }
            b'q' | b'Q' | b'\x03' => return false,
            _ => {}
        }
        true
    }

    pub fn run() -> anyhow::Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .init();

        let args = Args::parse();
        let player = Player::with_ym_backend(args.options()?);

        let (errors, added) = player.add_files(&args.files);
        for err in &errors {
            eprintln!("skipping: {err}");
        }
        if added == 0 {
            bail!("none of the given files could be opened");
        }
        if args.shuffle {
            player.shuffle(PlaylistKind::File);
        }

        let finished = Arc::new(AtomicBool::new(false));
        let finished_flag = Arc::clone(&finished);
        player.on(EventKind::Stopped, move |_| {
            finished_flag.store(true, Ordering::Relaxed);
        });
        let format = args.format.clone();
        player.on(EventKind::TrackChanged, move |event| {
            if let Some(line) = event_line(event, &format) {
                print!("{line}");
            }
        });
        player.on(EventKind::Error, |event| {
            if let Some(line) = event_line(event, "") {
                eprint!("{line}");
            }
        });

        player
            .load_pair(0, args.track.saturating_sub(1))
            .context("failed to start playback")?;
        let output = AudioOutput::new(&player)?;
        player.start_or_resume();

        println!("space: play/pause  n/p: next/prev  f/b: seek  +/-: volume  1-3: mute  q: quit\r");

        let running = Arc::new(AtomicBool::new(true));
        let keys = spawn_key_reader(Arc::clone(&running));
        let mut muted = [false; 3];

        while running.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(STATUS_UPDATE_MS));

            while let Ok(key) = keys.try_recv() {
                if !handle_key(&player, key, &mut muted) {
                    running.store(false, Ordering::Relaxed);
                }
            }
            // a stop only ends the session once the playlist ran out
            if finished.swap(false, Ordering::Relaxed) && !player.has_next() {
                running.store(false, Ordering::Relaxed);
            }

            let state = match player.state() {
                PlaybackState::Playing => "playing",
                PlaybackState::Paused => "paused",
                PlaybackState::Stopped => "stopped",
                PlaybackState::Empty => "empty",
            };
            print!(
                "\r\x1b[K{} / {}  vol {:3}  {state}",
                Timestamp(player.position()),
                Timestamp(player.length()),
                player.options().volume
            );
            io::stdout().flush()?;
        }

        output.finish();
        restore_terminal_mode();
        println!("\r");
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use gmplayer::{ErrorKind, Metadata, MetadataField, PlayerError};

        #[test]
        fn errors_are_printed() {
            let err = PlayerError::new(ErrorKind::Play, "emulation fault").with_file("song.ym");
            let line = event_line(&PlayerEvent::Error(&err), "%s").unwrap();
            assert_eq!(
                line,
                "\r\x1b[Kerror: song.ym: playback error: emulation fault\r\n"
            );
        }

        #[test]
        fn track_changes_use_the_status_format() {
            let metadata = Metadata::with_length(65_000)
                .with(MetadataField::Song, "Intro")
                .with(MetadataField::Author, "Mad Max");
            let event = PlayerEvent::TrackChanged {
                index: 1,
                metadata: &metadata,
            };
            let line = event_line(&event, "%s - %a").unwrap();
            assert!(line.starts_with("\r\x1b[K[2] Intro - Mad Max ("));
        }

        #[test]
        fn other_events_print_nothing() {
            assert_eq!(event_line(&PlayerEvent::Stopped, "%s"), None);
        }

        #[test]
        fn quit_keys_end_the_session() {
            let player = Player::with_ym_backend(PlayerOptions::default());
            let mut muted = [false; 3];
            assert!(handle_key(&player, b'n', &mut muted));
            assert!(handle_key(&player, b'2', &mut muted));
            assert_eq!(muted, [false, true, false]);
            assert!(!handle_key(&player, b'q', &mut muted));
        }
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::run()
}

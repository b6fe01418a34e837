//! Interactive command-line front end for the CD player engine
//!
//! Disc scanning, CD-Text, device discovery, and the real MCUB serial
//! link are all out of scope for the engine this drives; `scan` here
//! fabricates a synthetic TOC and [`demo_provider::DemoProvider`] hands
//! out silence so the transport has something real to play.

mod demo_provider;
mod mcub;

use anyhow::{Context, Result};
use cdplayer_core::config::AppConfig;
use cdplayer_core::ram::sink::RecordingSink;
#[cfg(feature = "alsa-backend")]
use cdplayer_core::ram::sink::AlsaSink;
use cdplayer_core::ram::RamPlayer;
use cdplayer_core::types::{Disc, Track, FRAMES_PER_SECOND};
use cdplayer_core::{Controller, PlayerState};
use clap::Parser;
use demo_provider::DemoProvider;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Emits an MCUB `"m"` line roughly every 500ms while a track is playing,
/// standing in for the real device's own periodic status push.
struct McubTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl McubTicker {
    fn spawn(controller: Arc<Controller>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("mcub-ticker".to_string())
            .spawn(move || {
                while !stop_thread.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(500));
                    if controller.state() == PlayerState::Playing {
                        mcub::emit_status(&controller);
                    }
                }
            })
            .expect("spawning mcub ticker thread");
        McubTicker { stop, handle: Some(handle) }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for McubTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Parser, Debug)]
#[command(name = "cdplayer", about = "Bit-perfect CD player control shell")]
struct Args {
    /// Path to a JSON configuration override file
    #[arg(short, long, default_value = "cdplayer.json")]
    config: String,

    /// Track count used by `scan` to fabricate a demo disc
    #[arg(long, default_value_t = 3)]
    demo_tracks: u32,

    /// Per-track duration, in seconds, used by `scan`
    #[arg(long, default_value_t = 5)]
    demo_track_seconds: u32,
}

fn synthetic_disc(track_count: u32, seconds_per_track: u32) -> Disc {
    let duration_frames = seconds_per_track * FRAMES_PER_SECOND;
    let tracks = (1..=track_count)
        .map(|number| Track {
            number,
            duration_frames,
            byte_offset: None,
            title: None,
            artist: None,
            album: None,
        })
        .collect();
    Disc {
        tracks,
        total_duration_frames: duration_frames * track_count,
        cdtext_present: false,
    }
}

fn open_sink(config: &AppConfig) -> Result<Box<dyn cdplayer_core::ram::sink::PcmSink>> {
    #[cfg(feature = "alsa-backend")]
    {
        match AlsaSink::open(&config.alsa_device, config.audio_buffer_frames) {
            Ok(sink) => return Ok(Box::new(sink)),
            Err(e) => {
                log::warn!("falling back to an in-memory sink: {e}");
            }
        }
    }
    let _ = config;
    Ok(Box::new(RecordingSink::new()))
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load_from_path(std::path::Path::new(&args.config))
        .context("loading configuration")?;

    let provider = Arc::new(DemoProvider::new());
    let sink = open_sink(&config)?;
    let transport = RamPlayer::new(sink, Arc::clone(&provider), config.audio_buffer_frames);
    let controller = Controller::new(Box::new(transport), config);
    mcub::attach(&controller);
    let mut ticker = McubTicker::spawn(Arc::clone(&controller));

    let mut disc: Option<Disc> = None;
    let stdin = io::stdin();
    print!("cdplayer> ");
    io::stdout().flush().ok();

    for line in stdin.lock().lines() {
        let line = line.context("reading command")?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => {}
            ["scan"] => {
                let synth = synthetic_disc(args.demo_tracks, args.demo_track_seconds);
                provider.rescan(args.demo_tracks, args.demo_track_seconds);
                println!("scanned {} tracks", synth.track_count());
                disc = Some(synth);
            }
            ["load", level] => match (disc.clone(), level.parse::<u8>()) {
                (Some(d), Ok(level)) if level <= 3 => {
                    controller.load(d, level)?;
                    println!("loaded");
                }
                (None, _) => println!("no disc scanned yet"),
                _ => println!("level must be 0, 1, 2, or 3"),
            },
            ["load"] => match disc.clone() {
                Some(d) => {
                    controller.load(d, 0)?;
                    println!("loaded");
                }
                None => println!("no disc scanned yet"),
            },
            ["play"] => controller.play()?,
            ["pause"] => controller.pause()?,
            ["stop"] => controller.stop()?,
            ["next"] => controller.next()?,
            ["prev"] => controller.prev()?,
            ["goto", n] => match n.parse::<usize>() {
                Ok(index) => controller.goto(index.saturating_sub(1))?,
                Err(_) => println!("goto requires a track number"),
            },
            ["seek", s] => match s.parse::<f64>() {
                Ok(seconds) => controller.seek(seconds)?,
                Err(_) => println!("seek requires a number of seconds"),
            },
            ["repeat"] => println!("repeat mode: {:?}", controller.repeat()),
            ["shuffle"] => {
                controller.shuffle();
                println!("shuffle: {}", controller.shuffle_on());
            }
            ["tracks"] => match &disc {
                Some(d) => {
                    for (i, track) in d.tracks.iter().enumerate() {
                        println!("{:>2}. {:>6.1}s", i + 1, track.duration_seconds());
                    }
                }
                None => println!("no disc scanned yet"),
            },
            ["verify"] => println!("verify: not implemented (disc ripping is out of scope)"),
            ["eject"] => {
                controller.eject()?;
                disc = None;
                println!("ejected");
            }
            ["help"] => print_help(),
            ["quit"] => {
                ticker.stop();
                controller.cleanup();
                break;
            }
            _ => println!("unrecognised command; try `help`"),
        }
        print!("cdplayer> ");
        io::stdout().flush().ok();
    }
    Ok(())
}

fn print_help() {
    println!(
        "commands: scan, load [N], play, pause, stop, next, prev, goto N, seek S, \
         repeat, shuffle, tracks, verify, eject, help, quit"
    );
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

//! Runs one installation in real time against a simulated or replayed
//! ranging feed, and writes what the listener hears to a WAV file.

use clap::Parser;
use soundwalk::{
    args::{FeedCommand, SimulateCommand, SoundwalkArgs},
    assets::AssetBank,
    component::run_component,
    config::InstallationConfig,
    decoder::FilterProfile,
    ranging::RangingSource,
    scan_ranging::{feed_from_reader, ScanRanging},
    simulated_ranging::{SimulatedRanging, WalkPath},
    soundscape::{OrientationSample, Soundscape},
    wav_sink::{StereoBlock, WavSink},
};

use hound::Error as HoundError;
use log::{debug, info};
use std::{
    error::Error,
    fs::File,
    io::BufReader,
    sync::mpsc::channel,
    time::{Duration, Instant},
};

// Example:
// RUST_LOG=info cargo run --bin soundwalk --
//                            --config  installation.ron
//                            --out     walk.wav
//                            --duration 90
//                            --spin-rate 10 simulate
//                            --noise   0.4

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = SoundwalkArgs::parse();

    let config = match &args.config {
        Some(path) => InstallationConfig::from_path(path)?,
        None => InstallationConfig::default(),
    };
    if let Some(path) = &args.save_config {
        config.to_path(path)?;
        info!("installation written to {}", path.display());
    }
    let assets = AssetBank::synthetic(&config);
    let mut scape = Soundscape::new(config.clone(), assets)?;
    if args.reverb {
        scape.set_filter_profile(FilterProfile::RoomReverb)?;
    }

    let mut feed: Box<dyn RangingSource> = match &args.command {
        FeedCommand::Simulate(sim) => Box::new(simulated_feed(&config, sim)),
        FeedCommand::Replay(replay) => {
            let ranging = ScanRanging::new(config.tx_power);
            let reader = BufReader::new(File::open(&replay.input)?);
            feed_from_reader(ranging.clone(), reader, true);
            Box::new(ranging)
        }
    };

    let sink = WavSink::create(&args.outfile, config.sample_rate)?;
    let (block_tx, block_rx) = channel::<StereoBlock>();
    let (result_tx, result_rx) = channel::<Result<u64, HoundError>>();
    let sink_thread = run_component(Box::new(sink), block_rx, result_tx);

    let block_size = scape.context().block_size();
    let block_time = Duration::from_secs_f64(block_size as f64 / config.sample_rate as f64);
    let total_blocks = (scape.context().seconds_to_frames(args.duration) as usize)
        .div_ceil(block_size);
    info!(
        "rendering {:.1}s to {} ({} blocks)",
        args.duration,
        args.outfile.display(),
        total_blocks
    );

    let started = Instant::now();
    for block in 0..total_blocks {
        for sample in feed.by_ref() {
            debug!("ranging {:?}", sample);
            scape.on_ranging(sample);
        }

        let now = scape.context().current_time();
        scape.on_orientation(OrientationSample {
            azimuth: (args.spin_rate * now).rem_euclid(360.0),
            elevation: Some(0.0),
            timestamp: now,
        });

        let (mut left, mut right) = (vec![0.0; block_size], vec![0.0; block_size]);
        scape.render_block(&mut left, &mut right);
        block_tx.send((left, right))?;

        while let Ok(written) = result_rx.try_recv() {
            written?;
        }
        if block % (10 * config.sample_rate as usize / block_size).max(1) == 0 {
            let state = scape.zone_state();
            info!(
                "{:.0}s: zone {:?} since {:?}, bonus {}, {} sources",
                now,
                state.current_zone,
                state.last_transition,
                scape.is_bonus_active(),
                scape.sources().len()
            );
        }

        let deadline = block_time * (block as u32 + 1);
        if let Some(wait) = deadline.checked_sub(started.elapsed()) {
            spin_sleep::sleep(wait);
        }
    }

    drop(block_tx);
    if sink_thread.join().is_err() {
        return Err("wav sink thread panicked".into());
    }
    for written in result_rx.try_iter() {
        written?;
    }
    feed.clear();
    info!("done, wrote {}", args.outfile.display());
    Ok(())
}

/// A listener walking out from the zone beacon and back, brushing past the
/// bonus beacon on the way.
fn simulated_feed(config: &InstallationConfig, sim: &SimulateCommand) -> SimulatedRanging {
    let far = config.zone_radii.last().copied().unwrap_or(3.0) + 3.0;
    let mut builder = SimulatedRanging::builder()
        .beacon(
            config.zone_beacon,
            WalkPath::back_and_forth(0.5, far, sim.period),
        )
        .interval(
            Duration::try_from_secs_f64(sim.interval.max(0.01)).unwrap_or(Duration::from_secs(1)),
        )
        .noise(sim.noise)
        .dropout(sim.dropout)
        .tx_power(config.tx_power);

    if let Some(bonus) = &config.bonus {
        let away = bonus.exit_distance + 5.0;
        builder = builder.beacon(
            bonus.beacon,
            WalkPath::new(vec![
                (0.0, away),
                (sim.period * 0.6, away),
                (sim.period * 0.7, bonus.enter_distance * 0.5),
                (sim.period * 0.8, away),
            ]),
        );
    }
    builder.spawn()
}

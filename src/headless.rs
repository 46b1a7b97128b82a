//! Terminal shell: plays the asset without a window and prints one bar per band.

use anyhow::Result;
use log::info;
use std::time::{Duration, Instant};

use crate::scene::{BandVisualState, FrequencyBand};
use crate::visualizer::Visualizer;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const PRINT_EVERY: u64 = 3;
const BAR_WIDTH: usize = 40;

pub fn run(mut visualizer: Visualizer, duration: Option<Duration>) -> Result<()> {
    info!("Starting headless run of {}", visualizer.pipeline().asset_path().display());

    // first toggle loads, second one plays
    visualizer.toggle();
    visualizer.pipeline_mut().wait_until_ready()?;
    visualizer.toggle();

    let started = Instant::now();
    let mut frame = 0u64;

    loop {
        visualizer.frame();

        if frame % PRINT_EVERY == 0 {
            let states = visualizer.band_states();
            print!("\x1B[2J\x1B[1;1H");
            println!("boxbeat - {}", visualizer.pipeline().asset_path().display());
            println!("{}", "=".repeat(BAR_WIDTH + 24));
            print!("{}", render_bars(visualizer.mapper().bands(), &states));
            println!();
            println!("Press Ctrl+C to exit");
        }

        if visualizer.pipeline().is_finished() {
            info!("Asset finished after {:.1}s", started.elapsed().as_secs_f32());
            break;
        }
        if duration.is_some_and(|limit| started.elapsed() >= limit) {
            info!("Duration limit reached");
            break;
        }

        std::thread::sleep(FRAME_INTERVAL);
        frame += 1;
    }

    visualizer.toggle();
    Ok(())
}

/// One line per band: name, a bar proportional to intensity, raw average.
pub fn render_bars(bands: &[FrequencyBand], states: &[BandVisualState]) -> String {
    let mut out = String::new();
    for (band, state) in bands.iter().zip(states) {
        let filled = (state.intensity.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize;
        out.push_str(&format!(
            "{:>10} |{}{}| {:6.1}\n",
            band.name,
            "█".repeat(filled),
            " ".repeat(BAR_WIDTH - filled),
            state.average,
        ));
    }
    out
}

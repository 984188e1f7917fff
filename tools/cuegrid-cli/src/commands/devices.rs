//! List output devices.

use cuegrid_common::config::AppConfig;
use cuegrid_output_core::{audio_outputs_or_default, displays_or_default, select_secondary_display};
use cuegrid_output_headless::HeadlessDevices;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Cuegrid Output Devices");
    println!("{}", "=".repeat(50));

    // No native backend is linked into this build.
    let provider = HeadlessDevices::dual_display();

    let audio = audio_outputs_or_default(&provider);
    println!("[OK] Audio outputs: {}", audio.len());
    for device in &audio {
        let selected = config.output.audio_device_index == Some(device.index);
        println!(
            "     #{} {} {}{}",
            device.index,
            device.name,
            if device.is_default { "(default)" } else { "" },
            if selected { " (selected)" } else { "" }
        );
    }

    let displays = displays_or_default(&provider);
    println!("[OK] Displays: {}", displays.len());
    for d in &displays {
        println!(
            "     #{} {} {}x{} at ({}, {}) (scale: {}x) {}",
            d.index,
            d.name,
            d.width,
            d.height,
            d.x,
            d.y,
            d.scale_factor,
            if d.primary { "(primary)" } else { "" }
        );
    }

    println!();
    match select_secondary_display(&displays, config.output.secondary_display_index) {
        Some(d) => println!("Mirrored output goes to display #{} ({}).", d.index, d.name),
        None => println!("[WARN] No secondary display. Output stays on the operator screen."),
    }

    Ok(())
}

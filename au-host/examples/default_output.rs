//! Play a sine tone through the default output device for two seconds

use au_host::backends::cpal_backend::{default_output_description, CpalOutputFactory};
use au_host::prelude::*;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let factory = Arc::new(CpalOutputFactory::new());
    println!("Output devices: {:?}", factory.output_devices());

    let config = UnitConfig::default();
    let mut output = AudioUnit::builder(factory)
        .description(default_output_description())
        .config(config)
        .build()?;

    let rate = config.sample_rate as f32;
    let mut phase = 0.0f32;
    output.set_render_callback(
        0,
        RenderCallback::new(move |args| {
            let step = TAU * 440.0 / rate;
            let frames = args.frames as usize;
            for frame in 0..frames {
                let sample = phase.sin() * 0.2;
                for buffer in &mut args.buffers.buffers {
                    buffer[frame] = sample;
                }
                phase = (phase + step) % TAU;
            }
            Status::NO_ERR
        }),
    )?;

    output.initialize()?;
    output.start_output()?;
    std::thread::sleep(Duration::from_secs(2));
    output.stop_output()?;

    if let Some(status) = output.last_render_error() {
        println!("Render error: {}", status);
    }
    output.close()?;
    Ok(())
}

//! Build a synth -> filter chain on the in-memory backend and snapshot it

use au_host::prelude::*;
use std::sync::Arc;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Effect Chain");
    println!("============\n");

    let synth = ComponentDescription::new(kind::MUSIC_DEVICE, FourCc::new(b"sine"), FourCc::new(b"demo"));
    let filter = ComponentDescription::new(kind::EFFECT, FourCc::new(b"lpas"), FourCc::new(b"demo"));

    let factory = Arc::new(MemoryFactory::new());
    factory.register(MemoryComponent::new(synth).parameter(0, "Level", 0.0, 1.0, 0.8));
    factory.register(
        MemoryComponent::new(filter)
            .parameter(0, "Cutoff", 10.0, 20000.0, 6900.0)
            .parameter(1, "Resonance", -20.0, 40.0, 0.0)
            .factory_preset(0, "Dark", &[(0, 400.0), (1, 6.0)]),
    );

    let config = UnitConfig {
        sample_rate: 48000.0,
        ..UnitConfig::default()
    };
    let mut source = AudioUnit::builder(factory.clone())
        .description(synth)
        .config(config)
        .build()?;
    let mut dest = AudioUnit::builder(factory.clone())
        .description(filter)
        .config(config)
        .build()?;

    let graph = GraphContext::new(MemoryGraph::new());
    dest.connect_input(&graph, 0, &mut source, 0)?;
    println!("Connections: {:?}", graph.connections()?);

    source.initialize()?;
    dest.initialize()?;

    for preset in dest.presets()? {
        println!("Factory preset {}: {}", preset.number, preset.name);
    }
    dest.select_preset_at(0)?;
    let (id, info) = dest.find_parameter("Cutoff")?;
    let cutoff = dest.parameter(ParameterKey::global(id))?;
    println!("{} = {}", info.name, info.format_value(cutoff));

    let snapshot = dest.save_preset("Dark filter")?;
    println!(
        "Snapshot '{}' holds {} parameters and {} properties",
        snapshot.name,
        snapshot.class_info.parameters.len(),
        snapshot.class_info.properties.len()
    );

    dest.close()?;
    source.close()?;
    println!("\nInstances created: {}, disposed: {}", factory.instantiated(), factory.disposed());
    Ok(())
}

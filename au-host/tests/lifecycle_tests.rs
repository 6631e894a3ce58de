use au_host::prelude::*;
use au_host::ComponentDescriptor;
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn effect() -> ComponentDescription {
    ComponentDescription::new(kind::EFFECT, FourCc::new(b"dely"), FourCc::new(b"test"))
}

fn factory_with_effect() -> Arc<MemoryFactory> {
    let factory = Arc::new(MemoryFactory::new());
    factory.register(
        MemoryComponent::new(effect())
            .parameter(0, "Mix", 0.0, 1.0, 1.0)
            .parameter(1, "Time", 0.0, 2.0, 0.25)
            .parameter(2, "Feedback", 0.0, 1.0, 0.3),
    );
    factory.register(MemoryComponent::new(ComponentDescription::new(
        kind::OUTPUT,
        FourCc::new(b"genr"),
        FourCc::new(b"test"),
    )));
    factory
}

fn open_effect(factory: &Arc<MemoryFactory>) -> AudioUnit {
    let mut unit = AudioUnit::with_description(factory.clone(), effect()).unwrap();
    unit.open().unwrap();
    unit
}

#[test]
fn test_open_then_close_disposes_native_instance() {
    init_logging();
    let factory = factory_with_effect();
    let mut unit = AudioUnit::with_description(factory.clone(), effect()).unwrap();
    assert_eq!(unit.state(), UnitState::Closed);

    unit.open().unwrap();
    assert_eq!(factory.instantiated(), 1);
    assert_eq!(factory.live(), 1);

    unit.close().unwrap();
    assert_eq!(unit.state(), UnitState::Closed);
    assert_eq!(factory.disposed(), 1);
    assert_eq!(factory.live(), 0);
}

#[test]
fn test_open_is_idempotent() {
    let factory = factory_with_effect();
    let mut unit = AudioUnit::with_description(factory.clone(), effect()).unwrap();
    unit.open().unwrap();
    unit.open().unwrap();
    assert!(unit.is_open());
    assert_eq!(factory.instantiated(), 1);
}

#[test]
fn test_close_is_idempotent() {
    let factory = factory_with_effect();
    let mut unit = open_effect(&factory);
    unit.close().unwrap();
    unit.close().unwrap();
    assert_eq!(factory.disposed(), 1);
}

#[test]
fn test_lookup_without_match_fails() {
    let factory = factory_with_effect();
    let missing = ComponentDescription::new(kind::MIXER, FourCc::ANY, FourCc::ANY);
    let result = AudioUnit::with_description(factory, missing);
    assert!(matches!(result, Err(Error::LookupFailed(d)) if d == missing));
}

#[test]
fn test_wildcard_lookup_picks_first_match() {
    let factory = factory_with_effect();
    let descriptor =
        ComponentDescriptor::resolve_by_triple(factory.as_ref(), kind::EFFECT, FourCc::ANY, FourCc::ANY)
            .unwrap();
    assert_eq!(descriptor.description(), effect());
}

#[test]
fn test_rejected_instantiation_reports_open_failed() {
    let factory = factory_with_effect();
    let mut unit = AudioUnit::with_description(factory.clone(), effect()).unwrap();
    factory.set_reject_instantiation(true);

    let result = unit.open();
    assert!(matches!(result, Err(Error::OpenFailed { status, .. }) if status == Status::MEM_FULL));
    assert!(!unit.is_open());
    assert_eq!(unit.last_error(), Some(Status::MEM_FULL));
}

#[test]
fn test_zero_sample_rate_fails_initialize_and_stays_opened() {
    let factory = factory_with_effect();
    let mut unit = open_effect(&factory);
    unit.set_stream_format(Scope::Output, 0, &StreamFormat::float32(0.0, 2))
        .unwrap();

    let result = unit.initialize();
    assert!(matches!(result, Err(Error::InitFailed(Status::FORMAT_NOT_SUPPORTED))));
    assert_eq!(unit.state(), UnitState::Opened);

    // Fixing the format lets initialize succeed.
    unit.set_stream_format(Scope::Output, 0, &StreamFormat::float32(48000.0, 2))
        .unwrap();
    unit.initialize().unwrap();
    assert_eq!(unit.state(), UnitState::Initialized);
}

#[test]
fn test_initialize_requires_open() {
    let factory = factory_with_effect();
    let mut unit = AudioUnit::with_description(factory, effect()).unwrap();
    assert!(matches!(unit.initialize(), Err(Error::NotApplicable(_))));
    assert_eq!(unit.state(), UnitState::Closed);
}

#[test]
fn test_effect_scenario() {
    init_logging();
    let factory = factory_with_effect();
    let mut unit = open_effect(&factory);
    let format = StreamFormat::float32(44100.0, 2);
    unit.set_stream_format(Scope::Input, 0, &format).unwrap();
    unit.set_stream_format(Scope::Output, 0, &format).unwrap();
    unit.initialize().unwrap();

    let mix = ParameterKey::new(0, Scope::Global, 0);
    unit.set_parameter(mix, 0.5).unwrap();
    assert_eq!(unit.parameter(mix).unwrap(), 0.5);

    unit.close().unwrap();
    assert!(!unit.is_open());
}

#[test]
fn test_uninitialize_allows_reconfiguration() {
    let factory = factory_with_effect();
    let mut unit = open_effect(&factory);
    unit.initialize().unwrap();

    let result = unit.set_max_frames_per_slice(256);
    assert!(matches!(result, Err(Error::NotApplicable(_))));

    unit.uninitialize();
    assert_eq!(unit.state(), UnitState::Opened);
    unit.set_max_frames_per_slice(256).unwrap();
    unit.initialize().unwrap();
    assert_eq!(unit.max_frames_per_slice().unwrap(), 256);
    // The native instance survived the round trip.
    assert_eq!(factory.instantiated(), 1);
}

#[test]
fn test_reset_keeps_state() {
    let factory = factory_with_effect();
    let mut unit = open_effect(&factory);
    unit.initialize().unwrap();
    unit.reset().unwrap();
    assert!(unit.is_initialized());
    assert_eq!(factory.last_instance().unwrap().reset_count(), 1);
}

#[test]
fn test_start_output_on_effect_is_not_applicable() {
    let factory = factory_with_effect();
    let mut unit = open_effect(&factory);
    unit.initialize().unwrap();
    assert!(matches!(unit.start_output(), Err(Error::NotApplicable(_))));
    assert!(matches!(unit.stop_output(), Err(Error::NotApplicable(_))));
}

#[test]
fn test_output_unit_starts_only_when_initialized() {
    let factory = factory_with_effect();
    let mut output = AudioUnit::with_triple(factory.clone(), kind::OUTPUT, FourCc::ANY, FourCc::ANY).unwrap();
    output.open().unwrap();
    assert!(matches!(output.start_output(), Err(Error::NotApplicable(_))));

    output.initialize().unwrap();
    output.start_output().unwrap();
    assert!(output.is_output_running());
    assert!(factory.last_instance().unwrap().is_running());

    output.stop_output().unwrap();
    assert!(!output.is_output_running());
}

#[test]
fn test_close_stops_running_output() {
    let factory = factory_with_effect();
    let mut output = AudioUnit::with_triple(factory.clone(), kind::OUTPUT, FourCc::ANY, FourCc::ANY).unwrap();
    output.open().unwrap();
    output.initialize().unwrap();
    output.start_output().unwrap();

    output.close().unwrap();
    assert!(!output.is_output_running());
    assert_eq!(factory.live(), 0);
}

#[test]
fn test_drop_closes_open_unit() {
    let factory = factory_with_effect();
    {
        let mut unit = open_effect(&factory);
        unit.initialize().unwrap();
        assert_eq!(factory.live(), 1);
    }
    assert_eq!(factory.instantiated(), 1);
    assert_eq!(factory.disposed(), 1);
}

#[test]
fn test_duplicate_starts_closed_with_copied_state() {
    let factory = factory_with_effect();
    let mut unit = open_effect(&factory);
    unit.set_parameter(ParameterKey::global(1), 1.5).unwrap();
    unit.set_max_frames_per_slice(128).unwrap();
    unit.initialize().unwrap();

    let mut copy = unit.duplicate().unwrap();
    assert_eq!(copy.state(), UnitState::Closed);
    assert_eq!(copy.descriptor(), unit.descriptor());
    assert_eq!(factory.instantiated(), 1);

    copy.open().unwrap();
    assert_eq!(copy.parameter(ParameterKey::global(1)).unwrap(), 1.5);
    assert_eq!(copy.max_frames_per_slice().unwrap(), 128);
    assert_eq!(factory.live(), 2);

    // The copy is independent of the original.
    copy.set_parameter(ParameterKey::global(1), 0.5).unwrap();
    assert_eq!(unit.parameter(ParameterKey::global(1)).unwrap(), 1.5);
}

#[test]
fn test_duplicate_of_closed_unit_is_plain() {
    let factory = factory_with_effect();
    let unit = AudioUnit::with_description(factory.clone(), effect()).unwrap();
    let mut copy = unit.duplicate().unwrap();
    copy.open().unwrap();
    assert_eq!(copy.parameter(ParameterKey::global(1)).unwrap(), 0.25);
}

#[test]
fn test_kind_predicates() {
    let factory = factory_with_effect();
    let unit = AudioUnit::with_description(factory.clone(), effect()).unwrap();
    assert!(unit.is_effect());
    assert!(!unit.is_output());
    assert!(!unit.is_instrument());
    assert!(!unit.is_mixer());

    let output = AudioUnit::with_triple(factory, kind::OUTPUT, FourCc::ANY, FourCc::ANY).unwrap();
    assert!(output.is_output());
}

#[test]
fn test_builder_applies_config() {
    let factory = factory_with_effect();
    let unit = AudioUnit::builder(factory)
        .description(effect())
        .sample_rate(48000.0)
        .channels(1)
        .max_frames_per_slice(256)
        .initialize(true)
        .build()
        .unwrap();

    assert!(unit.is_initialized());
    assert_eq!(unit.sample_rate(Scope::Output, 0).unwrap(), 48000.0);
    assert_eq!(unit.stream_format(Scope::Input, 0).unwrap().channels_per_frame, 1);
    assert_eq!(unit.max_frames_per_slice().unwrap(), 256);
}

#[test]
fn test_builder_without_open_leaves_unit_closed() {
    let factory = factory_with_effect();
    let unit = AudioUnit::builder(factory.clone())
        .description(effect())
        .open(false)
        .build()
        .unwrap();
    assert!(!unit.is_open());
    assert_eq!(factory.instantiated(), 0);
}

#[test]
fn test_unit_config_defaults() {
    let config = UnitConfig::default();
    assert_eq!(config.sample_rate, 44100.0);
    assert_eq!(config.channels, 2);
    assert_eq!(config.max_frames_per_slice, 512);
}

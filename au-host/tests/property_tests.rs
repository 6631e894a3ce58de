use au_host::prelude::*;
use au_host::{ChannelInfo, ExternalBuffer, ValueKind};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn reverb() -> ComponentDescription {
    ComponentDescription::new(kind::EFFECT, FourCc::new(b"rvb2"), FourCc::new(b"test"))
}

fn open_reverb() -> (Arc<MemoryFactory>, AudioUnit) {
    let factory = Arc::new(MemoryFactory::new());
    factory.register(
        MemoryComponent::new(reverb())
            .parameter(0, "Dry/Wet", 0.0, 100.0, 50.0)
            .latency(0.005)
            .tail_time(2.5)
            .bus_count_writable(true)
            .supported_channels(vec![
                ChannelInfo { inputs: 1, outputs: 2 },
                ChannelInfo { inputs: 2, outputs: 2 },
            ]),
    );
    let mut unit = AudioUnit::with_description(factory.clone(), reverb()).unwrap();
    unit.open().unwrap();
    (factory, unit)
}

#[test]
fn test_typed_round_trip() {
    let (_factory, mut unit) = open_reverb();
    let key = PropertyKey::global(property::MAXIMUM_FRAMES_PER_SLICE);

    unit.set_property_u32(key, 4096).unwrap();
    assert_eq!(unit.property_u32(key).unwrap(), 4096);
    assert_eq!(
        unit.property_value(key, ValueKind::U32).unwrap(),
        PropertyValue::U32(4096)
    );
    assert_eq!(unit.property(key).unwrap(), 4096u32.to_le_bytes().to_vec());
}

#[test]
fn test_wrong_value_kind_is_rejected() {
    let (_factory, unit) = open_reverb();
    let key = PropertyKey::global(property::LATENCY);
    assert!(unit.property_u32(key).is_err());
    assert_eq!(unit.last_error(), Some(Status::INVALID_PROPERTY_VALUE));
    assert_eq!(unit.property_f64(key).unwrap(), 0.005);
}

#[test]
fn test_introspection_does_not_mutate() {
    let (_factory, unit) = open_reverb();
    let key = PropertyKey::output(property::STREAM_FORMAT, 0);
    let before = unit.property(key).unwrap();

    assert_eq!(unit.property_size(key).unwrap(), StreamFormat::ENCODED_SIZE as u32);
    assert!(unit.is_property_writable(key));
    assert!(!unit.is_property_writable(PropertyKey::global(property::TAIL_TIME)));

    assert_eq!(unit.property(key).unwrap(), before);
}

#[test]
fn test_unsupported_property_is_classified() {
    let (_factory, unit) = open_reverb();
    let key = PropertyKey::global(0xdead);
    let result = unit.property(key);
    assert!(matches!(
        result,
        Err(Error::PropertyUnsupported { key: k, status: Status::INVALID_PROPERTY }) if k == key
    ));
    assert!(!unit.is_property_writable(key));
    assert_eq!(unit.last_result(), Status::INVALID_PROPERTY);
}

#[test]
fn test_wrong_scope_is_unsupported() {
    let (_factory, unit) = open_reverb();
    let result = unit.property(PropertyKey::input(property::LATENCY, 0));
    assert!(matches!(
        result,
        Err(Error::PropertyUnsupported { status: Status::INVALID_SCOPE, .. })
    ));
}

#[test]
fn test_read_only_property_rejects_writes() {
    let (_factory, mut unit) = open_reverb();
    let result = unit.set_property_f64(PropertyKey::global(property::LATENCY), 1.0);
    assert!(matches!(
        result,
        Err(Error::NativeFailure(Status::PROPERTY_NOT_WRITABLE))
    ));
}

#[test]
fn test_accessors_on_closed_unit_fail() {
    let (_factory, mut unit) = open_reverb();
    unit.close().unwrap();
    assert!(matches!(unit.latency(), Err(Error::NotApplicable(_))));
    assert!(!unit.is_property_writable(PropertyKey::global(property::BYPASS_EFFECT)));
}

#[test]
fn test_latency_and_tail_time() {
    let (_factory, unit) = open_reverb();
    assert_eq!(unit.latency().unwrap(), 0.005);
    assert_eq!(unit.tail_time().unwrap(), 2.5);
}

#[test]
fn test_bypass() {
    let (_factory, mut unit) = open_reverb();
    assert!(!unit.is_bypassing().unwrap());
    unit.set_bypassing(true).unwrap();
    assert!(unit.is_bypassing().unwrap());
}

#[test]
fn test_render_quality_range() {
    let (_factory, mut unit) = open_reverb();
    unit.set_render_quality(64).unwrap();
    assert_eq!(unit.render_quality().unwrap(), 64);
    assert!(unit.set_render_quality(128).is_err());
    assert_eq!(unit.render_quality().unwrap(), 64);
}

#[test]
fn test_max_cpu_load_range() {
    let (_factory, mut unit) = open_reverb();
    unit.set_max_cpu_load(0.75).unwrap();
    assert_eq!(unit.max_cpu_load().unwrap(), 0.75);
    assert!(unit.set_max_cpu_load(1.5).is_err());
}

#[test]
fn test_stream_format_per_bus() {
    let (_factory, mut unit) = open_reverb();
    let mono = StreamFormat::float32(96000.0, 1);
    unit.set_stream_format(Scope::Input, 0, &mono).unwrap();

    assert_eq!(unit.stream_format(Scope::Input, 0).unwrap(), mono);
    assert_eq!(unit.sample_rate(Scope::Input, 0).unwrap(), 96000.0);
    assert_eq!(unit.sample_rate(Scope::Output, 0).unwrap(), 44100.0);

    let missing_bus = unit.stream_format(Scope::Output, 3);
    assert!(matches!(missing_bus, Err(Error::NativeFailure(Status::INVALID_ELEMENT))));

    let global = unit.stream_format(Scope::Global, 0);
    assert!(matches!(global, Err(Error::NotApplicable(_))));
}

#[test]
fn test_bus_count() {
    let (_factory, mut unit) = open_reverb();
    assert_eq!(unit.bus_count(Scope::Input).unwrap(), 1);
    assert!(unit.is_bus_count_writable(Scope::Input));
    assert!(!unit.is_bus_count_writable(Scope::Global));

    unit.set_bus_count(Scope::Input, 3).unwrap();
    assert_eq!(unit.bus_count(Scope::Input).unwrap(), 3);
    assert!(unit.stream_format(Scope::Input, 2).is_ok());
}

#[test]
fn test_supported_channels() {
    let (_factory, mut unit) = open_reverb();
    let channels = unit.supported_channels().unwrap();
    assert_eq!(channels.len(), 2);

    // 2 in / 1 out is not among the configurations.
    unit.set_stream_format(Scope::Output, 0, &StreamFormat::float32(44100.0, 1))
        .unwrap();
    assert!(matches!(unit.initialize(), Err(Error::InitFailed(_))));
}

#[test]
fn test_structural_changes_rejected_after_initialize() {
    let (_factory, mut unit) = open_reverb();
    unit.initialize().unwrap();

    let format = StreamFormat::float32(48000.0, 2);
    assert!(matches!(
        unit.set_stream_format(Scope::Output, 0, &format),
        Err(Error::NotApplicable(_))
    ));
    assert!(matches!(unit.set_bus_count(Scope::Input, 2), Err(Error::NotApplicable(_))));
    assert!(matches!(
        unit.set_external_buffer(ExternalBuffer::new(1024)),
        Err(Error::NotApplicable(_))
    ));
    assert_eq!(unit.last_error(), Some(Status::CANNOT_DO_IN_CURRENT_CONTEXT));

    // Non-structural properties stay writable.
    unit.set_bypassing(true).unwrap();
}

#[test]
fn test_external_buffer_lifecycle() {
    let (factory, mut unit) = open_reverb();
    unit.set_external_buffer(ExternalBuffer::new(2048)).unwrap();
    let instance = factory.last_instance().unwrap();
    assert_eq!(instance.external_buffer_len(), Some(2048));

    unit.use_default_buffer().unwrap();
    assert_eq!(instance.external_buffer_len(), None);
}

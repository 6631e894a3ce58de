use au_host::parameters::*;
use au_host::prelude::*;
use std::sync::Arc;

fn info(name: &str, unit: ParameterUnit, min: f32, max: f32, default: f32) -> ParameterInfo {
    ParameterInfo {
        name: name.to_string(),
        unit,
        min_value: min,
        max_value: max,
        default_value: default,
        flags: parameter_flags::IS_READABLE | parameter_flags::IS_WRITABLE,
    }
}

fn mixer() -> ComponentDescription {
    ComponentDescription::new(kind::MIXER, FourCc::new(b"mxmx"), FourCc::new(b"test"))
}

fn open_mixer() -> AudioUnit {
    let factory = Arc::new(MemoryFactory::new());
    factory.register(
        MemoryComponent::new(mixer())
            .buses(4, 1)
            .parameter(0, "Master", 0.0, 1.0, 1.0)
            .parameter_info(Scope::Input, 0, info("Volume", ParameterUnit::LinearGain, 0.0, 1.0, 1.0))
            .parameter_info(Scope::Input, 1, info("Pan", ParameterUnit::Pan, -1.0, 1.0, 0.0))
            .parameter_info(Scope::Output, 0, info("Out Volume", ParameterUnit::LinearGain, 0.0, 1.0, 1.0)),
    );
    let mut unit = AudioUnit::with_description(factory, mixer()).unwrap();
    unit.open().unwrap();
    unit
}

#[test]
fn test_parameter_info_flags() {
    let volume = info("Volume", ParameterUnit::Decibels, -96.0, 12.0, 0.0);
    assert!(volume.is_readable());
    assert!(volume.is_writable());

    let meter = ParameterInfo {
        flags: parameter_flags::IS_READABLE,
        ..volume
    };
    assert!(!meter.is_writable());
}

#[test]
fn test_parameter_normalization() {
    let gain = info("Gain", ParameterUnit::Decibels, -12.0, 12.0, 0.0);

    assert_eq!(gain.denormalize(0.0), -12.0);
    assert_eq!(gain.denormalize(0.5), 0.0);
    assert_eq!(gain.denormalize(1.0), 12.0);

    assert_eq!(gain.normalize(-12.0), 0.0);
    assert_eq!(gain.normalize(0.0), 0.5);
    assert_eq!(gain.normalize(12.0), 1.0);
    assert_eq!(gain.clamp(20.0), 12.0);
}

#[test]
fn test_parameter_formatting() {
    let gain = info("Gain", ParameterUnit::Decibels, -12.0, 12.0, 0.0);
    assert_eq!(gain.format_value(0.5), "0.500 dB");

    let bypass = info("Bypass", ParameterUnit::Boolean, 0.0, 1.0, 0.0);
    assert_eq!(bypass.format_value(0.0), "Off");
    assert_eq!(bypass.format_value(1.0), "On");

    let mode = info("Mode", ParameterUnit::Indexed, 0.0, 3.0, 0.0);
    assert_eq!(mode.format_value(2.0), "2");
}

#[test]
fn test_parameter_list_in_enumeration_order() {
    let unit = open_mixer();
    assert_eq!(unit.parameter_list(Scope::Global).unwrap(), vec![0]);
    assert_eq!(unit.parameter_list(Scope::Input).unwrap(), vec![0, 1]);
    assert!(unit.parameter_list(Scope::Group).unwrap().is_empty());
}

#[test]
fn test_parameter_info_lookup() {
    let unit = open_mixer();
    let pan = unit.parameter_info(1, Scope::Input).unwrap();
    assert_eq!(pan.name, "Pan");
    assert_eq!(pan.unit, ParameterUnit::Pan);
    assert_eq!(pan.min_value, -1.0);

    let (id, master) = unit.find_parameter("Master").unwrap();
    assert_eq!(id, 0);
    assert_eq!(master.default_value, 1.0);
    assert!(unit.find_parameter("Nope").is_err());
}

#[test]
fn test_parameter_info_requires_open() {
    let mut unit = open_mixer();
    unit.close().unwrap();
    assert!(matches!(unit.parameter_info(0, Scope::Global), Err(Error::NotApplicable(_))));
}

#[test]
fn test_input_and_output_shortcuts() {
    let mut unit = open_mixer();
    unit.set_input_parameter(0, 2, 0.25).unwrap();
    assert_eq!(unit.input_parameter(0, 2).unwrap(), 0.25);
    // Other buses keep their default.
    assert_eq!(unit.input_parameter(0, 1).unwrap(), 1.0);

    unit.set_output_parameter(0, 0, 0.5).unwrap();
    assert_eq!(unit.output_parameter(0, 0).unwrap(), 0.5);
    assert_eq!(
        unit.parameter(ParameterKey::new(0, Scope::Output, 0)).unwrap(),
        0.5
    );
}

#[test]
fn test_invalid_parameter_addresses() {
    let mut unit = open_mixer();
    assert!(matches!(
        unit.set_input_parameter(0, 9, 0.5),
        Err(Error::NativeFailure(Status::INVALID_ELEMENT))
    ));
    assert!(matches!(
        unit.parameter(ParameterKey::global(42)),
        Err(Error::NativeFailure(Status::INVALID_PARAMETER))
    ));
    assert!(matches!(
        unit.set_parameter(ParameterKey::global(0), 3.0),
        Err(Error::NativeFailure(Status::INVALID_PARAMETER_VALUE))
    ));
    assert_eq!(unit.parameter(ParameterKey::global(0)).unwrap(), 1.0);
}

#[test]
fn test_batch_update_stops_at_first_failure() {
    let mut unit = open_mixer();
    let result = unit.update_parameters(|batch| {
        batch
            .set(ParameterKey::new(1, Scope::Input, 0), -0.5)
            .set(ParameterKey::global(7), 1.0)
            .set(ParameterKey::global(0), 0.1);
    });
    assert!(result.is_err());
    assert_eq!(unit.input_parameter(1, 0).unwrap(), -0.5);
    assert_eq!(unit.parameter(ParameterKey::global(0)).unwrap(), 1.0);
}

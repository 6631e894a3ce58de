use au_host::prelude::*;
use au_host::render::BeatAndTempo;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn compressor() -> ComponentDescription {
    ComponentDescription::new(kind::EFFECT, FourCc::new(b"cmpr"), FourCc::new(b"test"))
}

fn open_compressor() -> (Arc<MemoryFactory>, AudioUnit) {
    let factory = Arc::new(MemoryFactory::new());
    factory.register(MemoryComponent::new(compressor()).parameter(0, "Threshold", -60.0, 0.0, -20.0));
    let mut unit = AudioUnit::with_description(factory.clone(), compressor()).unwrap();
    unit.open().unwrap();
    (factory, unit)
}

#[test]
fn test_last_error_survives_later_success() {
    let (_factory, mut unit) = open_compressor();

    let failed = unit.set_property_f64(PropertyKey::global(property::LATENCY), 0.1);
    assert!(failed.is_err());
    assert_eq!(unit.last_result(), Status::PROPERTY_NOT_WRITABLE);

    unit.latency().unwrap();
    assert_eq!(unit.last_result(), Status::NO_ERR);
    assert_eq!(unit.last_error(), Some(Status::PROPERTY_NOT_WRITABLE));
}

#[test]
fn test_every_accessor_records_its_result() {
    let (_factory, mut unit) = open_compressor();
    assert_eq!(unit.last_error(), None);

    let _ = unit.parameter(ParameterKey::global(9));
    assert_eq!(unit.last_result(), Status::INVALID_PARAMETER);

    unit.set_parameter(ParameterKey::global(0), -30.0).unwrap();
    assert_eq!(unit.last_result(), Status::NO_ERR);

    assert!(!unit.is_property_writable(PropertyKey::global(0xbeef)));
    assert_eq!(unit.last_result(), Status::INVALID_PROPERTY);
}

#[test]
fn test_register_result_passes_through() {
    let (_factory, unit) = open_compressor();
    let status = Status(-12345);
    assert_eq!(unit.register_result(status), status);
    assert_eq!(unit.last_error(), Some(status));
}

#[test]
fn test_render_callback_failures_reach_render_slot() {
    let (factory, mut unit) = open_compressor();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    unit.set_render_callback(
        0,
        RenderCallback::new(move |args| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                for buffer in &mut args.buffers.buffers {
                    buffer.fill(0.25);
                }
                Status::NO_ERR
            } else {
                Status::NO_CONNECTION
            }
        }),
    )
    .unwrap();
    assert!(unit.has_render_callback());
    unit.initialize().unwrap();

    let instance = factory.last_instance().unwrap();
    let rendered = instance.pull(0, 64).unwrap();
    assert_eq!(rendered.channels(), 2);
    assert_eq!(rendered.frames(), 64);
    assert!(rendered.buffers[1].iter().all(|s| *s == 0.25));
    assert_eq!(unit.last_render_error(), None);

    assert_eq!(instance.pull(0, 64).err(), Some(Status::NO_CONNECTION));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(unit.last_render_error(), Some(Status::NO_CONNECTION));
    // The configuration-side slots are untouched by render failures.
    assert_eq!(unit.last_error(), None);
}

#[test]
fn test_remove_render_callback() {
    let (factory, mut unit) = open_compressor();
    unit.set_render_callback(0, RenderCallback::new(|_| Status::NO_ERR))
        .unwrap();
    unit.remove_render_callback(0).unwrap();
    assert!(!unit.has_render_callback());

    unit.initialize().unwrap();
    let instance = factory.last_instance().unwrap();
    assert!(!instance.has_render_callback(0));
    assert_eq!(instance.pull(0, 32).err(), Some(Status::NO_CONNECTION));
}

#[test]
fn test_render_callback_on_missing_input() {
    let (_factory, mut unit) = open_compressor();
    let result = unit.set_render_callback(4, RenderCallback::new(|_| Status::NO_ERR));
    assert!(matches!(result, Err(Error::NativeFailure(Status::INVALID_ELEMENT))));
    assert!(!unit.has_render_callback());
}

#[test]
fn test_oversized_slice_is_a_render_error() {
    let (factory, mut unit) = open_compressor();
    unit.set_max_frames_per_slice(256).unwrap();
    unit.set_render_callback(0, RenderCallback::new(|_| Status::NO_ERR))
        .unwrap();
    unit.initialize().unwrap();

    let instance = factory.last_instance().unwrap();
    assert_eq!(
        instance.pull(0, 512).err(),
        Some(Status::TOO_MANY_FRAMES_TO_PROCESS)
    );
    let key = PropertyKey::global(property::LAST_RENDER_ERROR);
    assert_eq!(
        unit.property(key).unwrap(),
        Status::TOO_MANY_FRAMES_TO_PROCESS.0.to_le_bytes().to_vec()
    );
}

#[test]
fn test_unit_render_failure_is_last_render_error() {
    let (factory, mut unit) = open_compressor();
    unit.set_max_frames_per_slice(256).unwrap();
    unit.set_render_callback(0, RenderCallback::new(|_| Status::NO_ERR))
        .unwrap();
    unit.initialize().unwrap();
    assert_eq!(unit.last_render_error(), None);

    let instance = factory.last_instance().unwrap();
    assert!(instance.pull(0, 512).is_err());
    assert_eq!(
        unit.last_render_error(),
        Some(Status::TOO_MANY_FRAMES_TO_PROCESS)
    );
    // Reading the render error is not a configuration result.
    assert_eq!(unit.last_error(), None);
}

#[test]
fn test_host_callbacks_require_one_entry() {
    let (factory, mut unit) = open_compressor();
    assert!(matches!(
        unit.set_host_callbacks(HostCallbacks::new()),
        Err(Error::NativeFailure(Status::PARAM_ERR))
    ));

    let callbacks = HostCallbacks::new().with_beat_and_tempo(|| {
        Some(BeatAndTempo {
            current_beat: 16.0,
            current_tempo: 120.0,
        })
    });
    unit.set_host_callbacks(callbacks).unwrap();
    let tempo = factory.last_instance().unwrap().host_beat_and_tempo();
    assert_eq!(tempo.map(|t| t.current_tempo), Some(120.0));
}

#[test]
fn test_error_display() {
    let error = Error::InitFailed(Status::FORMAT_NOT_SUPPORTED);
    assert_eq!(
        error.to_string(),
        "Initialization failed: FormatNotSupported (-10868)"
    );
    assert_eq!(error.status(), Status::FORMAT_NOT_SUPPORTED);
}

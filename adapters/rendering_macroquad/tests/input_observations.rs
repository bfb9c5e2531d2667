use glam::Vec2;
use gridstage_core::{InputEvent, InputKind, Key};
use gridstage_rendering::SurfaceTransform;
use gridstage_rendering_macroquad::{frame_input_from_observations, InputObservations};

fn half_scale() -> SurfaceTransform {
    SurfaceTransform::new(
        Vec2::new(960.0, 640.0),
        Vec2::new(20.0, 10.0),
        Vec2::new(480.0, 320.0),
    )
}

#[test]
fn clicks_are_converted_into_surface_space() {
    let observations = InputObservations {
        cursor: Vec2::new(70.0, 60.0),
        previous_cursor: Some(Vec2::new(70.0, 60.0)),
        pressed: true,
        ..InputObservations::default()
    };

    let input = frame_input_from_observations(&half_scale(), &observations);

    assert_eq!(
        input.events,
        vec![InputEvent::pointer(
            InputKind::PointerDown,
            Vec2::new(100.0, 100.0)
        )]
    );
}

#[test]
fn pointer_events_precede_key_events() {
    let observations = InputObservations {
        cursor: Vec2::new(20.0, 10.0),
        previous_cursor: Some(Vec2::new(0.0, 0.0)),
        pressed: false,
        released: true,
        keys_down: vec![Key::Enter, Key::Char('p')],
        keys_up: vec![Key::Space],
    };

    let kinds: Vec<_> = frame_input_from_observations(&half_scale(), &observations)
        .events
        .iter()
        .map(|event| (event.kind, event.key))
        .collect();

    assert_eq!(
        kinds,
        vec![
            (InputKind::PointerMove, None),
            (InputKind::PointerUp, None),
            (InputKind::KeyDown, Some(Key::Enter)),
            (InputKind::KeyDown, Some(Key::Char('p'))),
            (InputKind::KeyUp, Some(Key::Space)),
        ]
    );
}

#[test]
fn first_frame_reports_no_movement() {
    let observations = InputObservations {
        cursor: Vec2::new(5.0, 5.0),
        ..InputObservations::default()
    };

    assert!(frame_input_from_observations(&half_scale(), &observations).is_empty());
}

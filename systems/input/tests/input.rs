use std::{cell::RefCell, rc::Rc};

use glam::Vec2;
use gridstage_core::{EntityId, InputEvent, InputKind, Key, StageId, StageStatus, Transition};
use gridstage_system_input::InputRouter;
use gridstage_world::{EntityConfig, Stage, StageConfig};

fn stage_with_entities(positions: &[Vec2]) -> Stage {
    let mut stage = Stage::new(StageId::new(0), StageConfig::default());
    for position in positions {
        let _ = stage
            .create_entity(EntityConfig::at(*position))
            .expect("unbound entity");
    }
    stage.reset();
    stage
}

#[test]
fn pointer_events_reach_hit_entities_in_order_then_stage() {
    let mut stage = stage_with_entities(&[
        Vec2::new(50.0, 50.0),
        Vec2::new(55.0, 50.0),
        Vec2::new(300.0, 300.0),
    ]);
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut router = InputRouter::new();
    for index in 0..3 {
        let order = Rc::clone(&order);
        router.bind_entity(
            InputKind::PointerDown,
            stage.id(),
            EntityId::new(index),
            move |entity, _| order.borrow_mut().push(format!("entity {}", entity.id().get())),
        );
    }
    {
        let order = Rc::clone(&order);
        router.bind_stage(InputKind::PointerDown, stage.id(), move |_, _| {
            order.borrow_mut().push("stage".to_owned());
        });
    }

    let event = InputEvent::pointer(InputKind::PointerDown, Vec2::new(52.0, 48.0));
    let invoked = router.dispatch(&mut stage, &event, 1);

    assert_eq!(invoked, 3);
    assert_eq!(*order.borrow(), vec!["entity 0", "entity 1", "stage"]);
}

#[test]
fn hits_without_a_handler_for_the_kind_are_skipped() {
    let mut stage = stage_with_entities(&[Vec2::new(10.0, 10.0)]);
    let mut router = InputRouter::new();
    router.bind_entity(InputKind::PointerUp, stage.id(), EntityId::new(0), |entity, _| {
        entity.speed = 99.0;
    });

    let event = InputEvent::pointer(InputKind::PointerDown, Vec2::new(10.0, 10.0));
    assert_eq!(router.dispatch(&mut stage, &event, 1), 0);
    let entity = stage.entity(EntityId::new(0)).expect("entity exists");
    assert_eq!(entity.speed, 0.0, "pointer-up handler must not run on pointer-down");
}

#[test]
fn entity_handlers_mutate_the_entity_they_hit() {
    let mut stage = stage_with_entities(&[Vec2::new(10.0, 10.0), Vec2::new(100.0, 10.0)]);
    let mut router = InputRouter::new();
    for index in 0..2 {
        router.bind_entity(
            InputKind::PointerDown,
            stage.id(),
            EntityId::new(index),
            |entity, event| {
                entity.position = event.position.unwrap_or(entity.position) + Vec2::ONE;
            },
        );
    }

    let event = InputEvent::pointer(InputKind::PointerDown, Vec2::new(101.0, 12.0));
    assert_eq!(router.dispatch(&mut stage, &event, 1), 1);
    assert_eq!(
        stage.entity(EntityId::new(0)).expect("entity exists").position,
        Vec2::new(10.0, 10.0)
    );
    assert_eq!(
        stage.entity(EntityId::new(1)).expect("entity exists").position,
        Vec2::new(102.0, 13.0)
    );
}

#[test]
fn last_registration_wins() {
    let mut stage = stage_with_entities(&[]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut router = InputRouter::new();
    for label in ["first", "second"] {
        let seen = Rc::clone(&seen);
        router.bind_stage(InputKind::KeyDown, stage.id(), move |_, _| {
            seen.borrow_mut().push(label);
        });
    }

    let event = InputEvent::key(InputKind::KeyDown, Key::Space);
    assert_eq!(router.dispatch(&mut stage, &event, 1), 1);
    assert_eq!(*seen.borrow(), vec!["second"]);
}

#[test]
fn key_events_skip_entities() {
    let mut stage = stage_with_entities(&[Vec2::ZERO]);
    let mut router = InputRouter::new();
    router.bind_entity(InputKind::KeyDown, stage.id(), EntityId::new(0), |entity, _| {
        entity.speed = 1.0;
    });

    let event = InputEvent::key(InputKind::KeyDown, Key::Enter);
    assert_eq!(router.dispatch(&mut stage, &event, 1), 0);
}

#[test]
fn stage_handlers_can_pause_and_request_transitions() {
    let mut stage = stage_with_entities(&[]);
    let mut router = InputRouter::new();
    router.bind_stage(InputKind::KeyDown, stage.id(), |context, event| {
        match event.key {
            Some(Key::Char('p')) => context.set_status(StageStatus::Paused),
            Some(Key::Enter) => context.request(Transition::Next),
            _ => {}
        }
    });

    let _ = router.dispatch(&mut stage, &InputEvent::key(InputKind::KeyDown, Key::Char('p')), 4);
    assert_eq!(stage.status(), StageStatus::Paused);

    let _ = router.dispatch(&mut stage, &InputEvent::key(InputKind::KeyDown, Key::Enter), 5);
    assert_eq!(stage.take_transitions(), vec![Transition::Next]);
}

#[test]
fn handlers_are_scoped_to_their_stage() {
    let mut stage = stage_with_entities(&[]);
    let mut router = InputRouter::new();
    router.bind_stage(InputKind::KeyDown, StageId::new(7), |context, _| {
        context.set_timeout(42);
    });
    assert!(router.has_stage_handler(InputKind::KeyDown, StageId::new(7)));

    let event = InputEvent::key(InputKind::KeyDown, Key::Up);
    assert_eq!(router.dispatch(&mut stage, &event, 1), 0);
    assert_eq!(stage.timeout(), 0);

    assert!(router.unbind_stage(InputKind::KeyDown, StageId::new(7)));
    assert!(!router.unbind_stage(InputKind::KeyDown, StageId::new(7)));
}

#![allow(clippy::unwrap_used, clippy::expect_used)]

//! `App` に組み込んだ状態でのアクションキューの動作

use bevy::ecs::message::Messages;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use std::time::Duration;

use action_queue::ActionQueuePlugin;
use action_queue::constants::{BULLET_ITEM_ID, STONE_ITEM_ID};
use action_queue::entities::agent::{
    AgentCapabilities, Health, Interactable, spawn_agent_at, spawn_node_at,
};
use action_queue::events::{
    ActionQueueChanged, ActionQueueRequest, TaskCategoryChanged, TaskNameChanged,
};
use action_queue::systems::GameSystemSet;
use action_queue::systems::action_queue::{
    ActionQueue, ActionQueueStatusView, QueueChange, QueueKind, RouteStop, TaskCategory,
    TaskParams,
};
use action_queue::systems::logistics::{CargoHold, CargoNodeKind};

/// 受信した Message をため込む
#[derive(Resource)]
struct Seen<M: Message>(Vec<M>);

impl<M: Message> Default for Seen<M> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

fn record<M: Message + Clone>(mut reader: MessageReader<M>, mut seen: ResMut<Seen<M>>) {
    seen.0.extend(reader.read().cloned());
}

fn test_app() -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, ActionQueuePlugin))
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(100)))
        .init_resource::<Seen<TaskNameChanged>>()
        .init_resource::<Seen<TaskCategoryChanged>>()
        .init_resource::<Seen<ActionQueueChanged>>()
        .add_systems(
            Update,
            (
                record::<TaskNameChanged>,
                record::<TaskCategoryChanged>,
                record::<ActionQueueChanged>,
            )
                .after(GameSystemSet::Logic),
        );
    app
}

fn spawn_agent(app: &mut App, position: Vec3) -> Entity {
    let world = app.world_mut();
    let agent = spawn_agent_at(
        &mut world.commands(),
        "Tester",
        position,
        AgentCapabilities::default(),
    );
    world.flush();
    agent
}

fn spawn_node(app: &mut App, kind: CargoNodeKind, position: Vec3, hold: CargoHold) -> Entity {
    let world = app.world_mut();
    let node = spawn_node_at(&mut world.commands(), kind, position, hold);
    world.flush();
    node
}

fn request(app: &mut App, request: ActionQueueRequest) {
    app.world_mut()
        .resource_mut::<Messages<ActionQueueRequest>>()
        .write(request);
}

fn run(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}

fn position(app: &App, entity: Entity) -> Vec3 {
    app.world().get::<Transform>(entity).unwrap().translation
}

fn hold(app: &App, entity: Entity) -> &CargoHold {
    app.world().get::<CargoHold>(entity).unwrap()
}

#[test]
fn move_request_walks_agent_and_reports_name_changes() {
    let mut app = test_app();
    let agent = spawn_agent(&mut app, Vec3::ZERO);
    let destination = Vec3::new(100.0, 0.0, 0.0);
    request(
        &mut app,
        ActionQueueRequest::insert(
            agent,
            "Walk",
            TaskParams::new(TaskCategory::MoveToLocation).with_location(destination),
            QueueKind::RealTime,
        ),
    );

    run(&mut app, 3);
    let view = app.world().get::<ActionQueueStatusView>(agent).unwrap();
    assert_eq!(view.current_name, "Walk");
    assert_eq!(view.real_time.len(), 1);
    assert!(view.real_time[0].status.starts_with("Executing"));

    run(&mut app, 20);
    assert!(position(&app, agent).distance(destination) <= 8.0);
    assert!(app.world().get::<ActionQueue>(agent).unwrap().is_idle());

    let names: Vec<(String, String)> = app
        .world()
        .resource::<Seen<TaskNameChanged>>()
        .0
        .iter()
        .map(|m| (m.previous.clone(), m.current.clone()))
        .collect();
    assert_eq!(
        names,
        [
            (String::new(), "Walk".to_string()),
            ("Walk".to_string(), String::new())
        ]
    );
    let categories = &app.world().resource::<Seen<TaskCategoryChanged>>().0;
    assert_eq!(categories[0].current, TaskCategory::MoveToLocation);
    assert_eq!(categories.last().unwrap().current, TaskCategory::Undefined);

    let changes = &app.world().resource::<Seen<ActionQueueChanged>>().0;
    assert!(matches!(
        changes[0].change,
        QueueChange::Inserted { index: 0, .. }
    ));
    assert!(
        changes
            .iter()
            .any(|c| matches!(c.change, QueueChange::Removed { index: 0, .. }))
    );
}

#[test]
fn attack_request_incapacitates_target_then_drops_task() {
    let mut app = test_app();
    let agent = spawn_agent(&mut app, Vec3::ZERO);
    let dummy = app
        .world_mut()
        .spawn((
            Transform::from_translation(Vec3::new(150.0, 0.0, 0.0)),
            Health::new(20.0),
            Interactable::default(),
        ))
        .id();
    request(
        &mut app,
        ActionQueueRequest::insert(
            agent,
            "Hit",
            TaskParams::new(TaskCategory::AttackOnChara).with_target(dummy),
            QueueKind::RealTime,
        ),
    );

    run(&mut app, 40);

    assert!(!app.world().get::<Health>(dummy).unwrap().is_alive());
    assert!(app.world().get::<ActionQueue>(agent).unwrap().is_idle());
}

#[test]
fn trade_route_delivers_cargo() {
    let mut app = test_app();
    let agent = spawn_agent(&mut app, Vec3::ZERO);
    let source = spawn_node(
        &mut app,
        CargoNodeKind::Storage,
        Vec3::new(100.0, 0.0, 0.0),
        CargoHold::default().with(STONE_ITEM_ID, 5),
    );
    let destination = spawn_node(
        &mut app,
        CargoNodeKind::Storage,
        Vec3::new(-100.0, 0.0, 0.0),
        CargoHold::default(),
    );
    let mut params = TaskParams::new(TaskCategory::TradeCargo);
    params.route = vec![
        RouteStop::new(source).carrying(STONE_ITEM_ID, 5),
        RouteStop::new(destination),
    ];
    request(
        &mut app,
        ActionQueueRequest::insert(agent, "Trade", params, QueueKind::Procedural),
    );

    run(&mut app, 100);

    assert_eq!(hold(&app, source).quantity(STONE_ITEM_ID), 0);
    assert_eq!(hold(&app, destination).quantity(STONE_ITEM_ID), 5);
    assert_eq!(hold(&app, agent).quantity(STONE_ITEM_ID), 0);
    assert!(app.world().get::<ActionQueue>(agent).unwrap().is_idle());
}

#[test]
fn production_request_hauls_material_and_makes_bullets() {
    let mut app = test_app();
    let agent = spawn_agent(&mut app, Vec3::ZERO);
    let storage = spawn_node(
        &mut app,
        CargoNodeKind::Storage,
        Vec3::new(100.0, 0.0, 0.0),
        CargoHold::default().with(STONE_ITEM_ID, 6),
    );
    let production = spawn_node(
        &mut app,
        CargoNodeKind::Production,
        Vec3::new(-100.0, 0.0, 0.0),
        CargoHold::default(),
    );
    request(
        &mut app,
        ActionQueueRequest::insert(
            agent,
            "Produce",
            TaskParams::new(TaskCategory::InteractWithProduction).with_target(production),
            QueueKind::Procedural,
        ),
    );

    run(&mut app, 150);

    assert_eq!(hold(&app, storage).quantity(STONE_ITEM_ID), 0);
    assert_eq!(hold(&app, production).quantity(STONE_ITEM_ID), 0);
    assert_eq!(hold(&app, production).quantity(BULLET_ITEM_ID), 3);
    // 原料が尽きたら保留のまま残る
    let queue = app.world().get::<ActionQueue>(agent).unwrap();
    assert_eq!(queue.procedural().len(), 1);
    assert_eq!(queue.current_task_name(), "");
}

#[test]
fn remove_all_request_keeps_named_task() {
    let mut app = test_app();
    let agent = spawn_agent(&mut app, Vec3::ZERO);
    let ore = spawn_node(
        &mut app,
        CargoNodeKind::Ore,
        Vec3::new(500.0, 0.0, 0.0),
        CargoHold::default().with(STONE_ITEM_ID, 50),
    );
    for name in ["Mine", "Keep Mining"] {
        request(
            &mut app,
            ActionQueueRequest::insert(
                agent,
                name,
                TaskParams::new(TaskCategory::InteractWithActor).with_target(ore),
                QueueKind::Procedural,
            ),
        );
    }
    run(&mut app, 3);

    request(
        &mut app,
        ActionQueueRequest::remove_all(agent, Some("Keep Mining")),
    );
    run(&mut app, 2);

    let queue = app.world().get::<ActionQueue>(agent).unwrap();
    let names: Vec<&str> = queue.procedural().iter().map(|t| t.name()).collect();
    assert_eq!(names, ["Keep Mining"]);
    assert_eq!(queue.current_task_name(), "Keep Mining");
}

#[test]
fn request_for_unknown_agent_is_dropped() {
    let mut app = test_app();
    let stranger = app.world_mut().spawn_empty().id();
    request(
        &mut app,
        ActionQueueRequest::insert(
            stranger,
            "Walk",
            TaskParams::new(TaskCategory::MoveToLocation),
            QueueKind::RealTime,
        ),
    );

    run(&mut app, 2);

    assert!(app.world().resource::<Seen<TaskNameChanged>>().0.is_empty());
}

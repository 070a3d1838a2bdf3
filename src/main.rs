//! ヘッドレスのデモ
//!
//! 倉庫・コンテナ・鉱石・生産施設と数体のエージェントを配置し、
//! 各キューにタスクを積んで一定フレーム数だけ回す。
//!
//! - `HW_DEMO_AGENTS`: エージェント数（既定 3）
//! - `HW_DEMO_FRAMES`: 実行フレーム数（既定 900 = 30fps で 30 秒）

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use rand::Rng;
use std::env;
use std::time::Duration;

use action_queue::ActionQueuePlugin;
use action_queue::constants::{BULLET_ITEM_ID, STONE_ITEM_ID};
use action_queue::entities::agent::{
    AgentCapabilities, Health, Interactable, spawn_agent_at, spawn_node_at,
};
use action_queue::events::ActionQueueRequest;
use action_queue::systems::GameSystemSet;
use action_queue::systems::action_queue::{
    ActionQueue, ActionQueueStatusView, QueueKind, RouteStop, TaskCategory, TaskParams,
};
use action_queue::systems::logistics::{CargoHold, CargoNode, CargoNodeKind};

const DEFAULT_AGENTS: usize = 3;
const DEFAULT_FRAMES: u32 = 900;
const FRAME_SECS: f32 = 1.0 / 30.0;
const REPORT_INTERVAL_SECS: f32 = 5.0;

#[derive(Resource)]
struct DemoReportTimer(Timer);

impl Default for DemoReportTimer {
    fn default() -> Self {
        Self(Timer::from_seconds(
            REPORT_INTERVAL_SECS,
            TimerMode::Repeating,
        ))
    }
}

fn main() {
    let frames = env_or("HW_DEMO_FRAMES", DEFAULT_FRAMES);

    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins,
        bevy::log::LogPlugin {
            level: bevy::log::Level::INFO,
            filter: "bevy_app=warn,bevy_ecs=warn".to_string(),
            ..default()
        },
        ActionQueuePlugin,
    ))
    .insert_resource(TimeUpdateStrategy::ManualDuration(
        Duration::from_secs_f32(FRAME_SECS),
    ))
    .init_resource::<DemoReportTimer>()
    .add_systems(Startup, setup_demo)
    .add_systems(Update, report_queues_system.after(GameSystemSet::Actor));

    for _ in 0..frames {
        app.update();
    }

    log_final_holds(app.world_mut());
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

fn setup_demo(mut commands: Commands, mut ev_requests: MessageWriter<ActionQueueRequest>) {
    let mut rng = rand::thread_rng();
    let mut scatter = |radius: f32| {
        Vec3::new(
            rng.gen_range(-radius..radius),
            rng.gen_range(-radius..radius),
            0.0,
        )
    };

    let storage = spawn_node_at(
        &mut commands,
        CargoNodeKind::StoneStorage,
        Vec3::ZERO,
        CargoHold::default(),
    );
    let market = spawn_node_at(
        &mut commands,
        CargoNodeKind::Storage,
        Vec3::new(-250.0, 150.0, 0.0),
        CargoHold::default()
            .with(BULLET_ITEM_ID, 120)
            .with(STONE_ITEM_ID, 10),
    );
    let production = spawn_node_at(
        &mut commands,
        CargoNodeKind::Production,
        Vec3::new(200.0, -120.0, 0.0),
        CargoHold::default(),
    );
    let ore = spawn_node_at(
        &mut commands,
        CargoNodeKind::Ore,
        scatter(300.0),
        CargoHold::default().with(STONE_ITEM_ID, 8),
    );
    for _ in 0..3 {
        let stone = rng_quantity(&mut rand::thread_rng());
        spawn_node_at(
            &mut commands,
            CargoNodeKind::Container,
            scatter(300.0),
            CargoHold::default().with(STONE_ITEM_ID, stone),
        );
    }

    let dummy = commands
        .spawn((
            Name::new("Training Dummy"),
            Transform::from_translation(Vec3::new(350.0, 250.0, 0.0)),
            Health::new(40.0),
            Interactable::default(),
        ))
        .id();

    let agents = env_or("HW_DEMO_AGENTS", DEFAULT_AGENTS).max(1);
    for i in 0..agents {
        let capabilities = AgentCapabilities {
            // 最後の1体は攻撃できない（攻撃タスクは生成時に弾かれる）
            can_attack: i + 1 < agents || agents == 1,
            ..default()
        };
        let agent = spawn_agent_at(
            &mut commands,
            &format!("Worker {}", i + 1),
            scatter(150.0),
            capabilities,
        );

        let requests = match i % 3 {
            0 => vec![
                ActionQueueRequest::insert(
                    agent,
                    "Collect Stone",
                    TaskParams::new(TaskCategory::CollectCargo).with_target(storage),
                    QueueKind::Procedural,
                ),
                ActionQueueRequest::insert(
                    agent,
                    "Attack Dummy",
                    TaskParams::new(TaskCategory::AttackOnChara).with_target(dummy),
                    QueueKind::RealTime,
                ),
            ],
            1 => {
                let mut trade = TaskParams::new(TaskCategory::TradeCargo);
                trade.route = vec![
                    RouteStop::new(market).carrying(STONE_ITEM_ID, 4),
                    RouteStop::new(production),
                ];
                vec![
                    ActionQueueRequest::insert(
                        agent,
                        "Produce Bullets",
                        TaskParams::new(TaskCategory::InteractWithProduction)
                            .with_target(production),
                        QueueKind::Procedural,
                    ),
                    ActionQueueRequest::insert(agent, "Supply Run", trade, QueueKind::RealTime),
                ]
            }
            _ => vec![
                ActionQueueRequest::insert(
                    agent,
                    "Mine Ore",
                    TaskParams::new(TaskCategory::InteractWithActor).with_target(ore),
                    QueueKind::Procedural,
                ),
                ActionQueueRequest::insert(
                    agent,
                    "Restock Bullets",
                    TaskParams::new(TaskCategory::CollectBullets),
                    QueueKind::RealTime,
                ),
                ActionQueueRequest::insert(
                    agent,
                    "Go Home",
                    TaskParams::new(TaskCategory::MoveToLocation).with_location(Vec3::ZERO),
                    QueueKind::RealTime,
                ),
            ],
        };
        ev_requests.write_batch(requests);
    }
    info!("DEMO: spawned {} agent(s)", agents);
}

fn rng_quantity(rng: &mut impl Rng) -> i32 {
    rng.gen_range(2..=6)
}

/// 定期的に各エージェントのキューの状態を出力する
fn report_queues_system(
    time: Res<Time>,
    mut timer: ResMut<DemoReportTimer>,
    q_agents: Query<(&Name, &ActionQueue, &ActionQueueStatusView)>,
) {
    if !timer.0.tick(time.delta()).just_finished() {
        return;
    }
    for (name, queue, view) in q_agents.iter() {
        info!(
            "DEMO: [{}] current='{}' ({:?}) rt={} proc={}",
            name,
            view.current_name,
            view.current_category,
            queue.real_time().len(),
            queue.procedural().len()
        );
        for line in view.real_time.iter().chain(view.procedural.iter()) {
            debug!(
                "DEMO:   {} [{}] {}",
                line.name,
                line.category.label(),
                line.status.replace('\n', " / ")
            );
        }
    }
}

fn log_final_holds(world: &mut World) {
    let mut q_nodes = world.query::<(&Name, &CargoNode, &CargoHold)>();
    for (name, node, hold) in q_nodes.iter(world) {
        info!(
            "DEMO: {} {:?} stone={} bullets={}",
            name,
            node.kind,
            hold.quantity(STONE_ITEM_ID),
            hold.quantity(BULLET_ITEM_ID)
        );
    }
}

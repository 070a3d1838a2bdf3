//! エージェント（アクションキューを持つキャラクター）と物流ノード

use bevy::prelude::*;

pub mod factories;
pub mod movement;
pub mod persistence;
pub mod world_view;

pub use factories::{AgentCapabilities, FactoryError, TaskFactory};

use crate::constants::AGENT_MOVE_SPEED;
use crate::systems::action_queue::{ActionQueue, ActionQueueStatusView};
use crate::systems::logistics::{
    CargoHold, CargoLogistics, CargoNode, CargoNodeKind, DeferredTimers,
};

/// エージェントであることを示す
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Agent;

/// 移動の目的地（`None` なら停止）
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveTarget(pub Option<Vec3>);

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct MoveSpeed(pub f32);

impl Default for MoveSpeed {
    fn default() -> Self {
        Self(AGENT_MOVE_SPEED)
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }
}

/// インタラクション可否（`false` の間は一時的に使えない）
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interactable(pub bool);

impl Default for Interactable {
    fn default() -> Self {
        Self(true)
    }
}

/// 攻撃・作業の進行状況
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct WorkProgress {
    pub attacking: Option<Entity>,
    pub attack_cooldown: f32,
    pub interacting: Option<Entity>,
    pub interact_progress: f32,
}

/// エージェントを生成する
pub fn spawn_agent_at(
    commands: &mut Commands,
    name: &str,
    position: Vec3,
    capabilities: AgentCapabilities,
) -> Entity {
    let entity = commands
        .spawn((
            Agent,
            Name::new(format!("Agent: {}", name)),
            Transform::from_translation(position),
            ActionQueue::default(),
            ActionQueueStatusView::default(),
            CargoLogistics::default(),
            DeferredTimers::default(),
            CargoHold::default(),
            MoveTarget::default(),
            MoveSpeed::default(),
            WorkProgress::default(),
            Health::new(100.0),
            capabilities,
        ))
        .id();
    info!("SPAWN: Agent '{}' at {:?}", name, position.truncate());
    entity
}

/// 物流ノード（倉庫・鉱石・生産施設など）を生成する
pub fn spawn_node_at(
    commands: &mut Commands,
    kind: CargoNodeKind,
    position: Vec3,
    hold: CargoHold,
) -> Entity {
    commands
        .spawn((
            Name::new(format!("{:?}", kind)),
            Transform::from_translation(position),
            CargoNode::new(kind),
            hold,
            Interactable::default(),
        ))
        .id()
}

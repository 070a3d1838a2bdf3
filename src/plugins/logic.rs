//! アクションキュー関連のプラグイン

use crate::entities::agent::AgentCapabilities;
use crate::entities::agent::movement::{agent_movement_system, apply_damage_system};
use crate::systems::GameSystemSet;
use crate::systems::action_queue::{ActionQueueConfig, action_queue_tick_system};
use crate::systems::logistics::CargoNode;
use bevy::prelude::*;

pub struct LogicPlugin;

impl Plugin for LogicPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<AgentCapabilities>()
            .register_type::<CargoNode>()
            .init_resource::<ActionQueueConfig>()
            .configure_sets(
                Update,
                (GameSystemSet::Logic, GameSystemSet::Actor).chain(),
            )
            .add_systems(Update, action_queue_tick_system.in_set(GameSystemSet::Logic))
            .add_systems(
                Update,
                (apply_damage_system, agent_movement_system)
                    .chain()
                    .in_set(GameSystemSet::Actor),
            );
    }
}

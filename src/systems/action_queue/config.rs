use bevy::prelude::*;

use crate::constants::*;

/// アクションキュー全体の調整値
///
/// デフォルトは `constants.rs` の値。テストやデモでは個別に上書きする。
#[derive(Resource, Clone, Debug)]
pub struct ActionQueueConfig {
    pub move_speed: f32,
    pub arrive_radius: f32,
    pub node_interaction_radius: f32,
    pub pickup_duration_secs: f32,
    pub dropoff_duration_secs: f32,
    pub bullet_pickup_duration_secs: f32,
    pub transfer_timeout_base_secs: f32,
    pub transfer_timeout_secs_per_distance: f32,
    pub max_bullet_carry: i32,
    pub attack_range: f32,
    pub attack_interval_secs: f32,
    pub attack_damage: f32,
    pub interact_cycle_secs: f32,
    pub production_need_per_cycle: i32,
    pub production_prefer_storage_first: bool,
}

impl Default for ActionQueueConfig {
    fn default() -> Self {
        Self {
            move_speed: AGENT_MOVE_SPEED,
            arrive_radius: ARRIVE_RADIUS,
            node_interaction_radius: NODE_INTERACTION_RADIUS,
            pickup_duration_secs: PICKUP_DURATION_SECS,
            dropoff_duration_secs: DROPOFF_DURATION_SECS,
            bullet_pickup_duration_secs: BULLET_PICKUP_DURATION_SECS,
            transfer_timeout_base_secs: TRANSFER_TIMEOUT_BASE_SECS,
            transfer_timeout_secs_per_distance: TRANSFER_TIMEOUT_SECS_PER_DISTANCE,
            max_bullet_carry: MAX_BULLET_CARRY,
            attack_range: ATTACK_RANGE,
            attack_interval_secs: ATTACK_INTERVAL_SECS,
            attack_damage: ATTACK_DAMAGE,
            interact_cycle_secs: INTERACT_CYCLE_SECS,
            production_need_per_cycle: PRODUCTION_NEED_PER_CYCLE,
            production_prefer_storage_first: PRODUCTION_PREFER_STORAGE_FIRST,
        }
    }
}

//! エージェントの移動とダメージ適用（Actor セット）

use bevy::prelude::*;

use super::{Agent, Health, MoveSpeed, MoveTarget};
use crate::events::DamageRequest;
use crate::systems::action_queue::ActionQueueConfig;

/// `MoveTarget` に向かって直線移動する
///
/// `MoveSpeed` を持たないエージェントは設定値の速度で動く。
pub fn agent_movement_system(
    time: Res<Time>,
    config: Res<ActionQueueConfig>,
    mut q_agents: Query<(&mut Transform, &mut MoveTarget, Option<&MoveSpeed>), With<Agent>>,
) {
    let dt = time.delta_secs();
    for (mut transform, mut move_target, speed) in q_agents.iter_mut() {
        let Some(target) = move_target.0 else {
            continue;
        };
        let to_target = target - transform.translation;
        let distance = to_target.length();
        let step = speed.map_or(config.move_speed, |s| s.0) * dt;

        if distance <= step {
            transform.translation = target;
            move_target.0 = None;
            trace!("AGENT_MOV: Reached {:?}", target.truncate());
        } else {
            transform.translation += to_target / distance * step;
        }
    }
}

/// 攻撃タスクからのダメージ要求を適用する
pub fn apply_damage_system(
    mut ev_damage: MessageReader<DamageRequest>,
    mut q_health: Query<&mut Health>,
) {
    for request in ev_damage.read() {
        let Ok(mut health) = q_health.get_mut(request.target) else {
            continue;
        };
        if !health.is_alive() {
            continue;
        }
        health.current = (health.current - request.amount).max(0.0);
        debug!(
            "COMBAT: {:?} hit {:?} for {:.1} (hp {:.1}/{:.1})",
            request.attacker, request.target, request.amount, health.current, health.max
        );
        if !health.is_alive() {
            info!("COMBAT: {:?} was incapacitated", request.target);
        }
    }
}

//! ECS 上の `AgentWorld` 実装
//!
//! 1体分のコンポーネントとノードのクエリを束ね、タスクから見える世界を作る。
//! 位置や生死はフレーム先頭のスナップショットから読む。

use bevy::prelude::*;
use std::collections::HashMap;

use super::{Health, Interactable, MoveTarget, WorkProgress};
use crate::constants::{BULLET_ITEM_ID, STONE_ITEM_ID};
use crate::events::DamageRequest;
use crate::systems::action_queue::{
    ActionQueue, ActionQueueConfig, AgentWorld, SourceFilter, TargetState,
};
use crate::systems::logistics::{CargoHold, CargoNode, CargoNodeKind, ItemId};

/// エージェント以外の物流ノード
pub type NodeQuery<'w, 's> = Query<
    'w,
    's,
    (Entity, &'static mut CargoHold, &'static CargoNode),
    Without<ActionQueue>,
>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInfo {
    pub position: Vec3,
    pub state: TargetState,
    pub node_kind: Option<CargoNodeKind>,
}

/// フレーム先頭時点の位置・状態
#[derive(Debug, Default)]
pub struct TargetSnapshot {
    targets: HashMap<Entity, TargetInfo>,
}

impl TargetSnapshot {
    pub fn insert(&mut self, entity: Entity, info: TargetInfo) {
        self.targets.insert(entity, info);
    }

    pub fn get(&self, entity: Entity) -> Option<&TargetInfo> {
        self.targets.get(&entity)
    }
}

pub fn target_state_of(health: Option<&Health>, interactable: Option<&Interactable>) -> TargetState {
    if health.is_some_and(|h| !h.is_alive()) {
        TargetState::Incapacitated
    } else if interactable.is_some_and(|i| !i.0) {
        TargetState::NotInteractable
    } else {
        TargetState::Active
    }
}

pub struct AgentWorldView<'a, 'w, 's> {
    pub agent: Entity,
    pub position: Vec3,
    pub hold: &'a mut CargoHold,
    pub move_target: &'a mut MoveTarget,
    pub work: &'a mut WorkProgress,
    pub nodes: &'a mut NodeQuery<'w, 's>,
    pub targets: &'a TargetSnapshot,
    pub config: &'a ActionQueueConfig,
    pub damage: &'a mut Vec<DamageRequest>,
}

impl AgentWorldView<'_, '_, '_> {
    /// 作業サイクルを進め、1サイクル分たまったら `true`
    fn advance_cycle(&mut self, delta_secs: f32) -> bool {
        self.work.interact_progress += delta_secs;
        if self.work.interact_progress >= self.config.interact_cycle_secs {
            self.work.interact_progress -= self.config.interact_cycle_secs;
            true
        } else {
            false
        }
    }

    fn deposit_stone(&mut self, storage: Entity) -> bool {
        let carried = self.hold.quantity(STONE_ITEM_ID);
        if carried > 0 && self.modify_item_quantity(storage, STONE_ITEM_ID, carried) {
            self.hold.modify(STONE_ITEM_ID, -carried);
            debug!(
                "INTERACT: {:?} stored {} stone in {:?}",
                self.agent, carried, storage
            );
        }
        true
    }

    fn mine(&mut self, ore: Entity, delta_secs: f32) -> bool {
        if self.item_quantity(ore, STONE_ITEM_ID) <= 0 {
            return true;
        }
        if !self.advance_cycle(delta_secs) {
            return false;
        }
        if self.modify_item_quantity(ore, STONE_ITEM_ID, -1) {
            self.hold.modify(STONE_ITEM_ID, 1);
        }
        self.item_quantity(ore, STONE_ITEM_ID) <= 0
    }

    /// 施設内の原料を消費して弾薬を作る。原料が1サイクル分を切れば `true`。
    fn produce(&mut self, production: Entity, delta_secs: f32) -> bool {
        let need = self.config.production_need_per_cycle;
        if self.item_quantity(production, STONE_ITEM_ID) < need {
            return true;
        }
        if !self.advance_cycle(delta_secs) {
            return false;
        }
        if self.modify_item_quantity(production, STONE_ITEM_ID, -need) {
            self.modify_item_quantity(production, BULLET_ITEM_ID, 1);
        }
        self.item_quantity(production, STONE_ITEM_ID) < need
    }
}

impl AgentWorld for AgentWorldView<'_, '_, '_> {
    fn agent_position(&self) -> Vec3 {
        self.position
    }

    fn position_of(&self, entity: Entity) -> Option<Vec3> {
        if entity == self.agent {
            return Some(self.position);
        }
        self.targets.get(entity).map(|t| t.position)
    }

    fn target_state(&self, target: Entity) -> TargetState {
        self.targets
            .get(target)
            .map_or(TargetState::Missing, |t| t.state)
    }

    fn node_kind(&self, node: Entity) -> Option<CargoNodeKind> {
        self.targets.get(node).and_then(|t| t.node_kind)
    }

    fn move_to(&mut self, location: Vec3) -> bool {
        if self.position.distance(location) <= self.config.arrive_radius {
            self.move_target.0 = None;
            return true;
        }
        self.move_target.0 = Some(location);
        false
    }

    fn stop_moving(&mut self) {
        self.move_target.0 = None;
    }

    fn attack(&mut self, target: Entity, hit_offset: Vec3, delta_secs: f32) {
        if self.work.attacking != Some(target) {
            self.work.attacking = Some(target);
            self.work.attack_cooldown = 0.0;
        }
        self.work.attack_cooldown -= delta_secs;
        if self.work.attack_cooldown <= 0.0 {
            self.damage.push(DamageRequest {
                attacker: self.agent,
                target,
                amount: self.config.attack_damage,
                hit_offset,
            });
            self.work.attack_cooldown = self.config.attack_interval_secs;
        }
    }

    fn stop_attack(&mut self) {
        self.work.attacking = None;
        self.work.attack_cooldown = 0.0;
    }

    fn interact(&mut self, target: Entity, delta_secs: f32) -> bool {
        if self.work.interacting != Some(target) {
            self.work.interacting = Some(target);
            self.work.interact_progress = 0.0;
        }
        match self.node_kind(target) {
            Some(CargoNodeKind::Storage | CargoNodeKind::StoneStorage) => self.deposit_stone(target),
            Some(CargoNodeKind::Ore) => self.mine(target, delta_secs),
            Some(CargoNodeKind::Production) => self.produce(target, delta_secs),
            Some(CargoNodeKind::Container) | None => self.advance_cycle(delta_secs),
        }
    }

    fn stop_interaction(&mut self) {
        self.work.interacting = None;
        self.work.interact_progress = 0.0;
    }

    fn item_quantity(&self, holder: Entity, item: ItemId) -> i32 {
        if holder == self.agent {
            return self.hold.quantity(item);
        }
        self.nodes
            .get(holder)
            .map_or(0, |(_, hold, _)| hold.quantity(item))
    }

    fn modify_item_quantity(&mut self, holder: Entity, item: ItemId, delta: i32) -> bool {
        if holder == self.agent {
            return self.hold.modify(item, delta);
        }
        match self.nodes.get_mut(holder) {
            Ok((_, mut hold, _)) => hold.modify(item, delta),
            Err(_) => false,
        }
    }

    fn cargo_sources(&self, item: ItemId, filter: SourceFilter) -> Vec<Entity> {
        let mut sources: Vec<(Entity, f32)> = self
            .nodes
            .iter()
            .filter(|(_, hold, node)| hold.quantity(item) > 0 && filter.accepts(node.kind))
            .filter_map(|(entity, _, _)| {
                let position = self.position_of(entity)?;
                Some((entity, self.position.distance_squared(position)))
            })
            .collect();
        sources.sort_by(|a, b| a.1.total_cmp(&b.1));
        sources.into_iter().map(|(entity, _)| entity).collect()
    }
}

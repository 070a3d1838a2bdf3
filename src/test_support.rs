//! テスト用のスタブワールド
//!
//! `App` を立ち上げずに、スケジューラと物流処理をティック単位で駆動する。

use bevy::prelude::*;
use std::collections::HashMap;

use crate::systems::action_queue::{
    ActionQueueConfig, AgentWorld, SourceFilter, TargetState, TaskContext,
};
use crate::systems::logistics::{
    CargoHold, CargoLogistics, CargoNodeKind, DeferredTimers, ItemId, on_timer_fired,
};

pub struct StubWorld {
    pub agent: Entity,
    pub agent_pos: Vec3,
    pub positions: HashMap<Entity, Vec3>,
    pub states: HashMap<Entity, TargetState>,
    pub kinds: HashMap<Entity, CargoNodeKind>,
    pub holds: HashMap<Entity, CargoHold>,
    pub move_target: Option<Vec3>,
    /// `true` なら `move_to` で即座に目的地へ移動する
    pub teleport: bool,
    pub attacks: Vec<Entity>,
    pub interactions: usize,
    pub interact_done: bool,
}

impl StubWorld {
    fn new(agent: Entity) -> Self {
        Self {
            agent,
            agent_pos: Vec3::ZERO,
            positions: HashMap::new(),
            states: HashMap::new(),
            kinds: HashMap::new(),
            holds: HashMap::new(),
            move_target: None,
            teleport: true,
            attacks: Vec::new(),
            interactions: 0,
            interact_done: false,
        }
    }

    pub fn hold(&self, holder: Entity) -> CargoHold {
        self.holds.get(&holder).cloned().unwrap_or_default()
    }

    pub fn quantity(&self, holder: Entity, item: ItemId) -> i32 {
        self.hold(holder).quantity(item)
    }

    pub fn despawn(&mut self, entity: Entity) {
        self.positions.remove(&entity);
        self.states.remove(&entity);
        self.kinds.remove(&entity);
        self.holds.remove(&entity);
    }
}

impl AgentWorld for StubWorld {
    fn agent_position(&self) -> Vec3 {
        self.agent_pos
    }

    fn position_of(&self, entity: Entity) -> Option<Vec3> {
        if entity == self.agent {
            return Some(self.agent_pos);
        }
        self.positions.get(&entity).copied()
    }

    fn target_state(&self, target: Entity) -> TargetState {
        match self.states.get(&target) {
            Some(state) => *state,
            None if self.positions.contains_key(&target) => TargetState::Active,
            None => TargetState::Missing,
        }
    }

    fn node_kind(&self, node: Entity) -> Option<CargoNodeKind> {
        self.kinds.get(&node).copied()
    }

    fn move_to(&mut self, location: Vec3) -> bool {
        if self.teleport || self.agent_pos.distance(location) < 0.01 {
            self.agent_pos = location;
            self.move_target = None;
            return true;
        }
        self.move_target = Some(location);
        false
    }

    fn stop_moving(&mut self) {
        self.move_target = None;
    }

    fn attack(&mut self, target: Entity, _hit_offset: Vec3, _delta_secs: f32) {
        self.attacks.push(target);
    }

    fn stop_attack(&mut self) {}

    fn interact(&mut self, _target: Entity, _delta_secs: f32) -> bool {
        self.interactions += 1;
        self.interact_done
    }

    fn stop_interaction(&mut self) {}

    fn item_quantity(&self, holder: Entity, item: ItemId) -> i32 {
        self.quantity(holder, item)
    }

    fn modify_item_quantity(&mut self, holder: Entity, item: ItemId, delta: i32) -> bool {
        if holder != self.agent && !self.positions.contains_key(&holder) {
            return false;
        }
        self.holds.entry(holder).or_default().modify(item, delta)
    }

    fn cargo_sources(&self, item: ItemId, filter: SourceFilter) -> Vec<Entity> {
        let mut sources: Vec<(Entity, f32)> = self
            .kinds
            .iter()
            .filter(|(_, kind)| filter.accepts(**kind))
            .filter(|(entity, _)| self.quantity(**entity, item) > 0)
            .filter_map(|(entity, _)| {
                let pos = self.positions.get(entity)?;
                Some((*entity, self.agent_pos.distance_squared(*pos)))
            })
            .collect();
        sources.sort_by(|a, b| a.1.total_cmp(&b.1));
        sources.into_iter().map(|(entity, _)| entity).collect()
    }
}

/// 1体分のテスト環境
pub struct Harness {
    pub ecs: World,
    pub agent: Entity,
    pub world: StubWorld,
    pub logistics: CargoLogistics,
    pub timers: DeferredTimers,
    pub config: ActionQueueConfig,
}

impl Harness {
    pub fn new() -> Self {
        let mut ecs = World::new();
        let agent = ecs.spawn_empty().id();
        Self {
            ecs,
            agent,
            world: StubWorld::new(agent),
            logistics: CargoLogistics::default(),
            timers: DeferredTimers::default(),
            config: ActionQueueConfig::default(),
        }
    }

    pub fn cx(&mut self) -> TaskContext<'_> {
        TaskContext::new(
            self.agent,
            &mut self.world,
            &mut self.logistics,
            &mut self.timers,
            &self.config,
        )
    }

    pub fn entity(&mut self) -> Entity {
        self.ecs.spawn_empty().id()
    }

    /// 位置と在庫を持つノードを作る
    pub fn node(&mut self, kind: CargoNodeKind, pos: Vec3, hold: CargoHold) -> Entity {
        let entity = self.entity();
        self.world.positions.insert(entity, pos);
        self.world.kinds.insert(entity, kind);
        self.world.holds.insert(entity, hold);
        entity
    }

    /// タイマーを進め、満了したコールバックを反映する
    pub fn advance_timers(&mut self, secs: f32) {
        let fired = self.timers.tick(std::time::Duration::from_secs_f32(secs));
        let mut cx = self.cx();
        for callback in fired {
            on_timer_fired(&mut cx, callback);
        }
    }
}

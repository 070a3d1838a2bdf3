//! タスク実行コンテキスト
//!
//! タスクのクロージャはグローバルな状態に触れず、呼び出しのたびに
//! ここで束ねた参照だけを使ってワールドを読み書きする。

use bevy::prelude::*;

use super::config::ActionQueueConfig;
use super::queue::QueueKind;
use super::task::TaskId;
use crate::systems::logistics::{CargoLogistics, CargoNodeKind, DeferredTimers, ItemId};

/// 対象エンティティの状態
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    /// 存在しない（破壊済み・デスポーン済み）
    Missing,
    Active,
    /// 存在するがインタラクション不可
    NotInteractable,
    /// 存在するが戦闘不能（HP 0 など）
    Incapacitated,
}

/// 積み荷の探索条件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFilter {
    /// 対象アイテムを持つノードすべて
    Any,
    /// 倉庫・生産施設を除いたコンテナだけ
    ContainersOnly,
    /// 倉庫だけ
    StorageOnly,
    /// 鉱石だけ
    OreOnly,
}

impl SourceFilter {
    pub fn accepts(self, kind: CargoNodeKind) -> bool {
        match self {
            SourceFilter::Any => true,
            SourceFilter::ContainersOnly => kind.is_collect_source(),
            SourceFilter::StorageOnly => kind.is_storage(),
            SourceFilter::OreOnly => kind == CargoNodeKind::Ore,
        }
    }
}

/// エージェントから見たワールドへの窓口
///
/// 1体のエージェントに対して構築される。移動・攻撃・インタラクションは
/// 「要求」を出すだけで、実際の移動積分やダメージ適用は Actor セットの
/// システムが後で行う。
pub trait AgentWorld {
    fn agent_position(&self) -> Vec3;

    fn position_of(&self, entity: Entity) -> Option<Vec3>;

    fn target_state(&self, target: Entity) -> TargetState;

    /// 物流ノードでなければ `None`
    fn node_kind(&self, node: Entity) -> Option<CargoNodeKind>;

    /// 目的地へ向かう。到着済みなら `true` を返す。
    fn move_to(&mut self, location: Vec3) -> bool;

    fn stop_moving(&mut self);

    fn attack(&mut self, target: Entity, hit_offset: Vec3, delta_secs: f32);

    fn stop_attack(&mut self);

    /// 対象とのインタラクションを1ティック進める。やることが無くなれば `true`。
    fn interact(&mut self, target: Entity, delta_secs: f32) -> bool;

    fn stop_interaction(&mut self);

    fn item_quantity(&self, holder: Entity, item: ItemId) -> i32;

    /// 数量を増減する。結果が負になる場合は何もせず `false`。
    fn modify_item_quantity(&mut self, holder: Entity, item: ItemId, delta: i32) -> bool;

    /// `item` を1個以上持つノードを近い順に返す
    fn cargo_sources(&self, item: ItemId, filter: SourceFilter) -> Vec<Entity>;

    fn is_within(&self, entity: Entity, radius: f32) -> bool {
        self.position_of(entity)
            .is_some_and(|pos| self.agent_position().distance(pos) <= radius)
    }
}

/// タスク呼び出し1回分のコンテキスト
pub struct TaskContext<'a> {
    pub agent: Entity,
    pub world: &'a mut dyn AgentWorld,
    pub logistics: &'a mut CargoLogistics,
    pub timers: &'a mut DeferredTimers,
    pub config: &'a ActionQueueConfig,
    current: Option<(TaskId, QueueKind)>,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        agent: Entity,
        world: &'a mut dyn AgentWorld,
        logistics: &'a mut CargoLogistics,
        timers: &'a mut DeferredTimers,
        config: &'a ActionQueueConfig,
    ) -> Self {
        Self {
            agent,
            world,
            logistics,
            timers,
            config,
            current: None,
        }
    }

    /// いま呼び出されているタスク（スケジューラが呼び出しごとに設定する）
    pub fn current_task(&self) -> Option<(TaskId, QueueKind)> {
        self.current
    }

    pub(crate) fn set_current(&mut self, current: Option<(TaskId, QueueKind)>) {
        self.current = current;
    }

    pub fn is_at(&self, entity: Entity) -> bool {
        self.world
            .is_within(entity, self.config.node_interaction_radius)
    }
}

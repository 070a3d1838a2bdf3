//! タスクのファクトリ
//!
//! エージェントの能力は生成時に一度だけ確認する。実行中に
//! 「このエージェントは攻撃できるか」を問い合わせ直すことはない。

use bevy::prelude::*;
use thiserror::Error;

use crate::constants::STONE_ITEM_ID;
use crate::systems::action_queue::{
    RouteStop, TargetState, TaskCategory, TaskContext, TaskDescriptor, TaskParams, TaskStatus,
    TaskValidity,
};
use crate::systems::logistics::{
    CargoNodeKind, RawSupply, TransferStep, collect_bullets, collect_cargo, has_cargo_to_collect,
    has_raw_material, logistics_busy_for, release_logistics, supply_production, trading_cargo,
};

pub const REASON_TARGET_DESTROYED: &str = "Target Destroyed";
pub const REASON_TARGET_DOWN: &str = "Target is Dead or Incapacitated";
pub const REASON_NOT_INTERACTABLE: &str = "Target Not Interactable";
pub const REASON_LOGISTICS_BUSY: &str = "Logistics Busy";
pub const REASON_DEPLETED: &str = "Target Depleted";
pub const REASON_NOTHING_TO_COLLECT: &str = "Nothing to Collect";
pub const REASON_NO_RAW_MATERIAL: &str = "No Raw Material";

/// エージェントが実行できる行動
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct AgentCapabilities {
    pub can_move: bool,
    pub can_attack: bool,
    pub can_interact: bool,
    pub can_carry: bool,
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            can_move: true,
            can_attack: true,
            can_interact: true,
            can_carry: true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("agent is not able to {0}")]
    MissingCapability(&'static str),
    #[error("{0:?} task requires a target entity")]
    MissingTarget(TaskCategory),
    #[error("{0:?} tasks cannot be built from saved parameters")]
    Unsupported(TaskCategory),
}

/// 1体のエージェント用のファクトリ
#[derive(Debug, Clone, Copy)]
pub struct TaskFactory {
    capabilities: AgentCapabilities,
}

impl TaskFactory {
    pub fn new(capabilities: AgentCapabilities) -> Self {
        Self { capabilities }
    }

    fn require(&self, allowed: bool, action: &'static str) -> Result<(), FactoryError> {
        if allowed {
            Ok(())
        } else {
            Err(FactoryError::MissingCapability(action))
        }
    }

    pub fn move_to(
        &self,
        name: impl Into<String>,
        location: Vec3,
    ) -> Result<TaskDescriptor, FactoryError> {
        self.require(self.capabilities.can_move, "move")?;
        let params = TaskParams::new(TaskCategory::MoveToLocation).with_location(location);

        Ok(
            TaskDescriptor::new(name, TaskCategory::MoveToLocation, move |cx, _| {
                if cx.world.move_to(location) {
                    TaskStatus::Finished
                } else {
                    TaskStatus::Running
                }
            })
            .with_description(|_| "Moving to Location".to_string())
            .with_on_exit(|cx, _| cx.world.stop_moving())
            .with_params(params),
        )
    }

    pub fn attack(
        &self,
        name: impl Into<String>,
        target: Entity,
        hit_offset: Vec3,
    ) -> Result<TaskDescriptor, FactoryError> {
        self.require(self.capabilities.can_attack, "attack")?;
        let mut params = TaskParams::new(TaskCategory::AttackOnChara).with_target(target);
        params.hit_offset = hit_offset;

        Ok(
            TaskDescriptor::new(name, TaskCategory::AttackOnChara, move |cx, delta_secs| {
                if matches!(
                    cx.world.target_state(target),
                    TargetState::Missing | TargetState::Incapacitated
                ) {
                    return TaskStatus::Finished;
                }
                let Some(target_pos) = cx.world.position_of(target) else {
                    return TaskStatus::Finished;
                };
                if cx.world.agent_position().distance(target_pos) > cx.config.attack_range {
                    cx.world.move_to(target_pos);
                } else {
                    cx.world.stop_moving();
                    cx.world.attack(target, hit_offset, delta_secs);
                }
                TaskStatus::Running
            })
            .with_validity(move |cx| match cx.world.target_state(target) {
                TargetState::Missing => TaskValidity::invalid(REASON_TARGET_DESTROYED),
                TargetState::Incapacitated => TaskValidity::invalid(REASON_TARGET_DOWN),
                TargetState::Active | TargetState::NotInteractable => TaskValidity::Valid,
            })
            .with_on_exit(|cx, _| {
                cx.world.stop_attack();
                cx.world.stop_moving();
            })
            .with_params(params),
        )
    }

    /// 採掘などの汎用インタラクション
    ///
    /// 一区切りつくと Skipped を返してキューに残り続ける（対象が消えるか手動で外すまで）。
    /// 掘り尽くした鉱石は検証で保留にし、走査で現在タスクを奪わない。
    pub fn interact_with_actor(
        &self,
        name: impl Into<String>,
        target: Entity,
    ) -> Result<TaskDescriptor, FactoryError> {
        self.require(self.capabilities.can_interact, "interact")?;
        let params = TaskParams::new(TaskCategory::InteractWithActor).with_target(target);

        Ok(TaskDescriptor::new(
            name,
            TaskCategory::InteractWithActor,
            move |cx, delta_secs| interact_step(cx, target, delta_secs, TaskStatus::Skipped),
        )
        .with_validity(move |cx| {
            let validity = interactable_validity(cx, target);
            if validity.is_valid()
                && cx.world.node_kind(target) == Some(CargoNodeKind::Ore)
                && cx.world.item_quantity(target, STONE_ITEM_ID) <= 0
            {
                return TaskValidity::skip(REASON_DEPLETED);
            }
            validity
        })
        .with_description(move |_| format!("Interacting with {:?}", target))
        .with_on_exit(stop_interacting)
        .with_params(params))
    }

    /// 生産施設の運用
    ///
    /// 原料が1サイクル分に満たなければ、先に手持ちか最寄りの倉庫・鉱石から運び込む。
    /// どこにも原料が無い間は検証で保留にする。
    pub fn interact_with_production(
        &self,
        name: impl Into<String>,
        production: Entity,
    ) -> Result<TaskDescriptor, FactoryError> {
        self.require(self.capabilities.can_interact, "interact")?;
        let params =
            TaskParams::new(TaskCategory::InteractWithProduction).with_target(production);

        Ok(TaskDescriptor::new(
            name,
            TaskCategory::InteractWithProduction,
            move |cx, delta_secs| match supply_production(cx, production, delta_secs) {
                RawSupply::Hauling => TaskStatus::Running,
                RawSupply::Unavailable => TaskStatus::Skipped,
                RawSupply::Ready => {
                    interact_step(cx, production, delta_secs, TaskStatus::Skipped)
                }
            },
        )
        .with_validity(move |cx| {
            if cx.world.target_state(production) != TargetState::Missing
                && cx.world.node_kind(production) != Some(CargoNodeKind::Production)
            {
                return TaskValidity::invalid("Target is not a Production Facility");
            }
            let validity = interactable_validity(cx, production);
            if !validity.is_valid() {
                return validity;
            }
            if logistics_busy_for(cx) {
                return TaskValidity::skip(REASON_LOGISTICS_BUSY);
            }
            if !has_raw_material(cx, production) {
                return TaskValidity::skip(REASON_NO_RAW_MATERIAL);
            }
            TaskValidity::Valid
        })
        .with_description(move |cx| {
            if cx.logistics.transfer().is_some() && cx.logistics.owner() == cx.current_task() {
                describe_transfer(cx)
            } else {
                format!("Managing Production: {:?}", production)
            }
        })
        .with_on_exit(|cx, interrupted| {
            stop_interacting(cx, interrupted);
            release_logistics(cx);
        })
        .with_params(params))
    }

    /// 手持ちの石材を倉庫へ納める（1回で完了）
    pub fn interact_with_storage(
        &self,
        name: impl Into<String>,
        storage: Entity,
    ) -> Result<TaskDescriptor, FactoryError> {
        self.require(self.capabilities.can_interact, "interact")?;
        let params = TaskParams::new(TaskCategory::InteractWithStorage).with_target(storage);

        Ok(TaskDescriptor::new(
            name,
            TaskCategory::InteractWithStorage,
            move |cx, delta_secs| interact_step(cx, storage, delta_secs, TaskStatus::Finished),
        )
        .with_validity(move |cx| {
            if cx.world.target_state(storage) != TargetState::Missing
                && !cx.world.node_kind(storage).is_some_and(CargoNodeKind::is_storage)
            {
                return TaskValidity::invalid("Target is not a Storage");
            }
            interactable_validity(cx, storage)
        })
        .with_description(move |_| format!("Storing Cargo at {:?}", storage))
        .with_on_exit(stop_interacting)
        .with_params(params))
    }

    /// 石材をかき集めて倉庫へ運ぶ
    ///
    /// 回収し尽くすたびに Skipped を返し、プロシージャルキューに残り続ける。
    /// 回収するものが無い間は検証で保留にする。
    pub fn collect_cargo(
        &self,
        name: impl Into<String>,
        storage: Entity,
    ) -> Result<TaskDescriptor, FactoryError> {
        self.require(self.capabilities.can_carry, "carry cargo")?;
        let params = TaskParams::new(TaskCategory::CollectCargo).with_target(storage);

        Ok(
            TaskDescriptor::new(name, TaskCategory::CollectCargo, move |cx, delta_secs| {
                if cx.world.target_state(storage) == TargetState::Missing {
                    return TaskStatus::Finished;
                }
                if collect_cargo(cx, storage, delta_secs) {
                    TaskStatus::Skipped
                } else {
                    TaskStatus::Running
                }
            })
            .with_validity(move |cx| {
                if cx.world.target_state(storage) != TargetState::Missing
                    && cx.world.node_kind(storage) != Some(CargoNodeKind::StoneStorage)
                {
                    return TaskValidity::invalid("Target is not a Stone Storage");
                }
                let validity = interactable_validity(cx, storage);
                if !validity.is_valid() {
                    return validity;
                }
                if logistics_busy_for(cx) {
                    return TaskValidity::skip(REASON_LOGISTICS_BUSY);
                }
                if !has_cargo_to_collect(cx) {
                    return TaskValidity::skip(REASON_NOTHING_TO_COLLECT);
                }
                TaskValidity::Valid
            })
            .with_description(describe_transfer)
            .with_on_exit(|cx, _| release_logistics(cx))
            .with_params(params),
        )
    }

    /// 弾薬を上限まで補充する
    pub fn collect_bullets(&self, name: impl Into<String>) -> Result<TaskDescriptor, FactoryError> {
        self.require(self.capabilities.can_carry, "carry cargo")?;

        Ok(
            TaskDescriptor::new(name, TaskCategory::CollectBullets, |cx, _| {
                if collect_bullets(cx) {
                    TaskStatus::Finished
                } else {
                    TaskStatus::Running
                }
            })
            .with_validity(|cx| {
                if logistics_busy_for(cx) {
                    TaskValidity::skip(REASON_LOGISTICS_BUSY)
                } else {
                    TaskValidity::Valid
                }
            })
            .with_description(|cx| match cx.logistics.bullet_run() {
                Some(run) if run.pickup_pending => format!("Picking up Bullets: {:?}", run.source),
                Some(run) => format!("Moving to Bullets: {:?}", run.source),
                None => "Searching...".to_string(),
            })
            .with_on_exit(|cx, _| release_logistics(cx))
            .with_params(TaskParams::new(TaskCategory::CollectBullets)),
        )
    }

    /// ルートを1周する交易
    ///
    /// ノードが消えた場合も検証では弾かず、実行側で打ち切って Finished にする。
    pub fn trade_cargo(
        &self,
        name: impl Into<String>,
        route: Vec<RouteStop>,
    ) -> Result<TaskDescriptor, FactoryError> {
        self.require(self.capabilities.can_carry, "carry cargo")?;
        let mut params = TaskParams::new(TaskCategory::TradeCargo);
        params.route = route.clone();

        Ok(
            TaskDescriptor::new(name, TaskCategory::TradeCargo, move |cx, delta_secs| {
                if trading_cargo(cx, &route, delta_secs).is_done() {
                    TaskStatus::Finished
                } else {
                    TaskStatus::Running
                }
            })
            .with_validity(|cx| {
                if logistics_busy_for(cx) {
                    TaskValidity::skip(REASON_LOGISTICS_BUSY)
                } else {
                    TaskValidity::Valid
                }
            })
            .with_description(describe_transfer)
            .with_on_exit(|cx, _| release_logistics(cx))
            .with_params(params),
        )
    }

    /// 保存されたパラメータから同じファクトリで組み立て直す
    pub fn from_params(
        &self,
        name: impl Into<String>,
        params: &TaskParams,
    ) -> Result<TaskDescriptor, FactoryError> {
        let target = || params.target.ok_or(FactoryError::MissingTarget(params.category));
        match params.category {
            TaskCategory::MoveToLocation => self.move_to(name, params.location),
            TaskCategory::AttackOnChara => self.attack(name, target()?, params.hit_offset),
            TaskCategory::InteractWithActor => self.interact_with_actor(name, target()?),
            TaskCategory::InteractWithProduction => {
                self.interact_with_production(name, target()?)
            }
            TaskCategory::InteractWithStorage => self.interact_with_storage(name, target()?),
            TaskCategory::CollectCargo => self.collect_cargo(name, target()?),
            TaskCategory::CollectBullets => self.collect_bullets(name),
            TaskCategory::TradeCargo => self.trade_cargo(name, params.route.clone()),
            TaskCategory::Undefined => Err(FactoryError::Unsupported(params.category)),
        }
    }
}

// ============================================================
// 共通処理
// ============================================================

fn interactable_validity(cx: &TaskContext<'_>, target: Entity) -> TaskValidity {
    match cx.world.target_state(target) {
        TargetState::Missing => TaskValidity::invalid(REASON_TARGET_DESTROYED),
        TargetState::NotInteractable => TaskValidity::skip(REASON_NOT_INTERACTABLE),
        TargetState::Active | TargetState::Incapacitated => TaskValidity::Valid,
    }
}

/// 対象まで歩き、着いたらインタラクションを進める。一区切りついたら `when_done` を返す。
fn interact_step(
    cx: &mut TaskContext<'_>,
    target: Entity,
    delta_secs: f32,
    when_done: TaskStatus,
) -> TaskStatus {
    let Some(target_pos) = cx.world.position_of(target) else {
        return TaskStatus::Finished;
    };
    if !cx.is_at(target) {
        cx.world.move_to(target_pos);
        return TaskStatus::Running;
    }
    cx.world.stop_moving();
    if cx.world.interact(target, delta_secs) {
        when_done
    } else {
        TaskStatus::Running
    }
}

fn stop_interacting(cx: &mut TaskContext<'_>, _interrupted: bool) {
    cx.world.stop_interaction();
    cx.world.stop_moving();
}

fn describe_transfer(cx: &TaskContext<'_>) -> String {
    let owned = cx.logistics.owner().is_some() && cx.logistics.owner() == cx.current_task();
    let Some(transfer) = cx.logistics.transfer().filter(|_| owned) else {
        return "Searching...".to_string();
    };
    let step = match transfer.step() {
        TransferStep::ToSource => "Moving to Source",
        TransferStep::Pickup => "Picking up",
        TransferStep::ToDestination => "Moving to Dest",
        TransferStep::DropOff => "Dropping off",
    };
    match transfer.current_segment() {
        Some(segment) => {
            let node = match transfer.step() {
                TransferStep::ToSource | TransferStep::Pickup => segment.source,
                TransferStep::ToDestination | TransferStep::DropOff => segment.destination,
            };
            format!("{step}: {node:?}")
        }
        None => step.to_string(),
    }
}

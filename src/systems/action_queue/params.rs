//! セーブ／ロード用のタスクパラメータ
//!
//! スケジューラ自身は何も永続化しない。各ファクトリが生成時にこのレコードを
//! 添えておき、ロード時は同じファクトリを呼び直してキューを組み立てる。

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::task::TaskCategory;
use crate::systems::logistics::ItemId;

/// 1行分の積み荷
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoLine {
    pub item: ItemId,
    pub quantity: i32,
}

/// 交易ルートの1地点
///
/// この地点で積んだ `cargo` は次の地点（最後の地点なら先頭）へ運ばれる。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub node: Entity,
    #[serde(default)]
    pub cargo: Vec<CargoLine>,
}

impl RouteStop {
    pub fn new(node: Entity) -> Self {
        Self {
            node,
            cargo: Vec::new(),
        }
    }

    pub fn carrying(mut self, item: ItemId, quantity: i32) -> Self {
        self.cargo.push(CargoLine { item, quantity });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskParams {
    pub category: TaskCategory,
    #[serde(default)]
    pub target: Option<Entity>,
    #[serde(default)]
    pub location: Vec3,
    #[serde(default)]
    pub hit_offset: Vec3,
    #[serde(default)]
    pub route: Vec<RouteStop>,
}

impl TaskParams {
    pub fn new(category: TaskCategory) -> Self {
        Self {
            category,
            target: None,
            location: Vec3::ZERO,
            hit_offset: Vec3::ZERO,
            route: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: Entity) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_location(mut self, location: Vec3) -> Self {
        self.location = location;
        self
    }

    /// エンティティ参照を差し替える。対応先が無いものがあれば `Err` でそのエンティティを返す。
    pub fn remap(
        &self,
        mut map: impl FnMut(Entity) -> Option<Entity>,
    ) -> Result<TaskParams, Entity> {
        let mut mapped = self.clone();
        if let Some(target) = self.target {
            mapped.target = Some(map(target).ok_or(target)?);
        }
        for stop in &mut mapped.route {
            stop.node = map(stop.node).ok_or(stop.node)?;
        }
        Ok(mapped)
    }
}

/// 保存された1タスク
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedTask {
    pub name: String,
    pub params: TaskParams,
}

/// 両キューの保存内容（並び順どおり）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub real_time: Vec<SavedTask>,
    pub procedural: Vec<SavedTask>,
}

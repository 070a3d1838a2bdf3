use bevy::prelude::*;
use std::collections::HashMap;

pub type ItemId = u32;

/// 物流ノードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum CargoNodeKind {
    /// 汎用コンテナ（回収元になる）
    Container,
    /// 鉱石（採掘で石材が出る）
    Ore,
    /// 石材専用の倉庫（回収タスクの納品先）
    StoneStorage,
    /// 汎用倉庫
    Storage,
    /// 生産施設（石材を消費して弾薬を作る）
    Production,
}

impl CargoNodeKind {
    pub fn is_storage(self) -> bool {
        matches!(self, CargoNodeKind::StoneStorage | CargoNodeKind::Storage)
    }

    /// 回収タスクの回収元になり得るか（倉庫・生産施設は除く）
    pub fn is_collect_source(self) -> bool {
        !self.is_storage() && self != CargoNodeKind::Production
    }
}

/// 物流ノードであることを示す
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct CargoNode {
    pub kind: CargoNodeKind,
}

impl CargoNode {
    pub fn new(kind: CargoNodeKind) -> Self {
        Self { kind }
    }
}

/// アイテムの所持数
///
/// エージェントとノードの両方が持つ。数量が負になる変更は受け付けない。
#[derive(Component, Debug, Clone, Default, PartialEq, Eq)]
pub struct CargoHold {
    items: HashMap<ItemId, i32>,
}

impl CargoHold {
    pub fn with(mut self, item: ItemId, quantity: i32) -> Self {
        self.items.insert(item, quantity.max(0));
        self
    }

    pub fn quantity(&self, item: ItemId) -> i32 {
        self.items.get(&item).copied().unwrap_or(0)
    }

    pub fn modify(&mut self, item: ItemId, delta: i32) -> bool {
        let next = self.quantity(item) + delta;
        if next < 0 {
            return false;
        }
        if next == 0 {
            self.items.remove(&item);
        } else {
            self.items.insert(item, next);
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

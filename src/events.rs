use crate::systems::action_queue::{
    InsertIndex, QueueChange, QueueKind, TaskCategory, TaskParams,
};
use bevy::prelude::*;

/// 現在タスクの種別が変わった（ティックごとに最大1回）
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct TaskCategoryChanged {
    pub agent: Entity,
    pub previous: TaskCategory,
    pub current: TaskCategory,
}

/// 現在タスクの名前が変わった（ティックごとに最大1回）
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct TaskNameChanged {
    pub agent: Entity,
    pub previous: String,
    pub current: String,
}

/// キューの構造が変わった（UI の再描画用）
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionQueueChanged {
    pub agent: Entity,
    pub queue: QueueKind,
    pub change: QueueChange,
}

/// キュー操作の種類
#[derive(Debug, Clone, PartialEq)]
pub enum ActionQueueCommand {
    /// ファクトリで生成して挿入する
    Insert {
        name: String,
        params: TaskParams,
        queue: QueueKind,
        index: InsertIndex,
    },
    /// `except` と同名のタスク以外をすべて取り除く
    RemoveAll { except: Option<String> },
    RemoveProceduralAt { index: usize },
    ReorderProcedural { dragged: usize, drop: usize },
}

/// キュー操作の要求
///
/// AI・プレイヤー入力から直接キューを触らず、これを送る。
/// 対象エージェントのティックの先頭でまとめて適用される。
#[derive(Message, Debug, Clone, PartialEq)]
pub struct ActionQueueRequest {
    pub agent: Entity,
    pub command: ActionQueueCommand,
}

impl ActionQueueRequest {
    pub fn insert(
        agent: Entity,
        name: impl Into<String>,
        params: TaskParams,
        queue: QueueKind,
    ) -> Self {
        Self {
            agent,
            command: ActionQueueCommand::Insert {
                name: name.into(),
                params,
                queue,
                index: InsertIndex::Append,
            },
        }
    }

    pub fn remove_all(agent: Entity, except: Option<&str>) -> Self {
        Self {
            agent,
            command: ActionQueueCommand::RemoveAll {
                except: except.map(str::to_string),
            },
        }
    }
}

/// 攻撃によるダメージ適用要求
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct DamageRequest {
    pub attacker: Entity,
    pub target: Entity,
    pub amount: f32,
    pub hit_offset: Vec3,
}

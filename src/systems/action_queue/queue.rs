//! タスクキュー
//!
//! 並び順そのものが意味を持つ（プロシージャル側では先頭ほど優先度が高い）。
//! 構造が変わるたびに `QueueChange` を溜め、ティックの最後に UI へ流す。

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::task::{TaskDescriptor, TaskId};

/// どちらのキューか
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum QueueKind {
    /// 厳密な FIFO。先頭しか評価しない
    RealTime,
    /// 位置による優先度。実行できるものを先頭から探す
    Procedural,
}

/// 挿入位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InsertIndex {
    At(usize),
    #[default]
    Append,
}

/// キューの構造変化
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueChange {
    Inserted { index: usize, id: TaskId },
    Removed { index: usize, id: TaskId },
    Moved { from: usize, to: usize, id: TaskId },
    Cleared,
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<TaskDescriptor>,
    changes: Vec<QueueChange>,
}

impl TaskQueue {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TaskDescriptor> {
        self.tasks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TaskDescriptor> {
        self.tasks.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.iter()
    }

    pub fn position_of(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id() == id)
    }

    pub fn find(&self, id: TaskId) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    pub fn find_mut(&mut self, id: TaskId) -> Option<&mut TaskDescriptor> {
        self.tasks.iter_mut().find(|task| task.id() == id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.position_of(id).is_some()
    }

    pub fn push(&mut self, task: TaskDescriptor) -> usize {
        self.insert(InsertIndex::Append, task)
    }

    /// 範囲外のインデックスは末尾への追加として扱う。挿入位置を返す。
    pub fn insert(&mut self, index: InsertIndex, task: TaskDescriptor) -> usize {
        debug_assert!(
            !self.contains(task.id()),
            "duplicate task id {} in one queue",
            task.id()
        );
        let index = match index {
            InsertIndex::At(i) if i <= self.tasks.len() => i,
            _ => self.tasks.len(),
        };
        self.changes.push(QueueChange::Inserted {
            index,
            id: task.id(),
        });
        self.tasks.insert(index, task);
        index
    }

    /// 残りの要素の順序は変えない
    pub fn remove_at(&mut self, index: usize) -> Option<TaskDescriptor> {
        if index >= self.tasks.len() {
            return None;
        }
        let task = self.tasks.remove(index);
        self.changes.push(QueueChange::Removed {
            index,
            id: task.id(),
        });
        Some(task)
    }

    pub fn pop_front(&mut self) -> Option<TaskDescriptor> {
        self.remove_at(0)
    }

    /// 条件に合うタスクをすべて取り出す（残りの順序は保つ）
    pub fn extract_if(
        &mut self,
        mut predicate: impl FnMut(&TaskDescriptor) -> bool,
    ) -> Vec<TaskDescriptor> {
        let mut removed = Vec::new();
        let mut index = 0;
        while index < self.tasks.len() {
            if predicate(&self.tasks[index]) {
                if let Some(task) = self.remove_at(index) {
                    removed.push(task);
                }
                // 詰めて移動してきた要素を同じ位置で再評価する
                continue;
            }
            index += 1;
        }
        removed
    }

    pub fn move_task(&mut self, from: usize, to: usize) -> bool {
        if from >= self.tasks.len() || to >= self.tasks.len() {
            return false;
        }
        if from == to {
            return true;
        }
        let task = self.tasks.remove(from);
        let id = task.id();
        self.tasks.insert(to, task);
        self.changes.push(QueueChange::Moved { from, to, id });
        true
    }

    pub fn clear(&mut self) -> Vec<TaskDescriptor> {
        if self.tasks.is_empty() {
            return Vec::new();
        }
        self.changes.push(QueueChange::Cleared);
        std::mem::take(&mut self.tasks)
    }

    pub fn drain_changes(&mut self) -> Vec<QueueChange> {
        std::mem::take(&mut self.changes)
    }
}

//! UI 向けの状態文字列
//!
//! キューの各行に「実行中 / 上位タスク待ち / 待機 / 条件未達」を表示するための問い合わせ。

use bevy::prelude::*;

use super::context::TaskContext;
use super::queue::QueueKind;
use super::scheduler::ActionQueue;
use super::task::{TaskCategory, TaskValidity};

pub const STATUS_EXECUTING: &str = "Executing";
pub const STATUS_BLOCKED: &str = "Blocked by Higher Priority Task";
pub const STATUS_READY: &str = "Waiting / Ready";
pub const STATUS_INVALID_INDEX: &str = "Invalid Index";
pub const REASON_INVALID_INDEX: &str = "Invalid Action Index";

impl ActionQueue {
    /// 指定行の有効性チェックの理由文字列（Valid なら空）
    pub fn validity_reason(&self, cx: &mut TaskContext<'_>, index: usize, kind: QueueKind) -> String {
        let Some(task) = self.queue(kind).get(index) else {
            return REASON_INVALID_INDEX.to_string();
        };
        cx.set_current(Some((task.id(), kind)));
        let reason = task.check_validity(cx).reason().to_string();
        cx.set_current(None);
        reason
    }

    pub fn status_string(&self, cx: &mut TaskContext<'_>, index: usize, kind: QueueKind) -> String {
        let queue = self.queue(kind);
        let Some(task) = queue.get(index) else {
            return STATUS_INVALID_INDEX.to_string();
        };
        cx.set_current(Some((task.id(), kind)));

        let status = if self.current_id(kind) == Some(task.id()) {
            let description = task.describe(cx);
            if description.is_empty() {
                STATUS_EXECUTING.to_string()
            } else {
                format!("{STATUS_EXECUTING}\n{description}")
            }
        } else if kind == QueueKind::Procedural
            && self
                .current_id(kind)
                .and_then(|id| queue.position_of(id))
                .is_some_and(|running| index > running)
        {
            STATUS_BLOCKED.to_string()
        } else {
            match task.check_validity(cx) {
                TaskValidity::Valid => STATUS_READY.to_string(),
                other => format!("Condition Not Met: {}", other.reason()),
            }
        };

        cx.set_current(None);
        status
    }
}

/// 1行分の表示内容
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskStatusLine {
    pub name: String,
    pub category: TaskCategory,
    pub status: String,
}

/// UI がポーリングするキューの写し
///
/// このコンポーネントを付けたエージェントだけ、ティックの最後に更新される。
#[derive(Component, Clone, Debug, Default)]
pub struct ActionQueueStatusView {
    pub current_name: String,
    pub current_category: TaskCategory,
    pub real_time: Vec<TaskStatusLine>,
    pub procedural: Vec<TaskStatusLine>,
}

impl ActionQueueStatusView {
    pub fn refresh(&mut self, queue: &ActionQueue, cx: &mut TaskContext<'_>) {
        self.current_name = queue.current_task_name();
        self.current_category = queue.current_task_category();
        self.real_time = Self::lines(queue, cx, QueueKind::RealTime);
        self.procedural = Self::lines(queue, cx, QueueKind::Procedural);
    }

    fn lines(queue: &ActionQueue, cx: &mut TaskContext<'_>, kind: QueueKind) -> Vec<TaskStatusLine> {
        (0..queue.queue(kind).len())
            .filter_map(|index| {
                let task = queue.queue(kind).get(index)?;
                Some(TaskStatusLine {
                    name: task.name().to_string(),
                    category: task.category(),
                    status: queue.status_string(cx, index, kind),
                })
            })
            .collect()
    }
}

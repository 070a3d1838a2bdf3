//! アクションキュー本体（エージェントごとのスケジューラ）
//!
//! 2本のキューを持つ:
//! - リアルタイム: 厳密な FIFO。先頭だけを評価し、先頭がブロックされたら全体が待つ
//! - プロシージャル: 先頭から走査し、今実行できる最初のタスクを実行する
//!
//! 「現在のタスク」は格納位置ではなく `TaskId` で覚え、毎ティック走査して引き直す。

use bevy::prelude::*;

use super::context::TaskContext;
use super::queue::{InsertIndex, QueueChange, QueueKind, TaskQueue};
use super::task::{TaskCategory, TaskDescriptor, TaskId, TaskStatus, TaskValidity};

/// 1ティックで起きた「現在タスク」の変化
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub category_changed: Option<(TaskCategory, TaskCategory)>,
    pub name_changed: Option<(String, String)>,
}

#[derive(Component, Debug, Default)]
pub struct ActionQueue {
    real_time: TaskQueue,
    procedural: TaskQueue,
    current_real_time: Option<TaskId>,
    current_procedural: Option<TaskId>,
    last_name: String,
    last_category: TaskCategory,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, kind: QueueKind) -> &TaskQueue {
        match kind {
            QueueKind::RealTime => &self.real_time,
            QueueKind::Procedural => &self.procedural,
        }
    }

    fn queue_mut(&mut self, kind: QueueKind) -> &mut TaskQueue {
        match kind {
            QueueKind::RealTime => &mut self.real_time,
            QueueKind::Procedural => &mut self.procedural,
        }
    }

    pub fn real_time(&self) -> &TaskQueue {
        &self.real_time
    }

    pub fn procedural(&self) -> &TaskQueue {
        &self.procedural
    }

    pub fn current_id(&self, kind: QueueKind) -> Option<TaskId> {
        match kind {
            QueueKind::RealTime => self.current_real_time,
            QueueKind::Procedural => self.current_procedural,
        }
    }

    fn current_slot(&mut self, kind: QueueKind) -> &mut Option<TaskId> {
        match kind {
            QueueKind::RealTime => &mut self.current_real_time,
            QueueKind::Procedural => &mut self.current_procedural,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.real_time.is_empty() && self.procedural.is_empty()
    }

    /// 挿入したタスクの ID を返す
    pub fn insert(&mut self, task: TaskDescriptor, kind: QueueKind, index: InsertIndex) -> TaskId {
        let id = task.id();
        debug_assert!(
            !self.real_time.contains(id) && !self.procedural.contains(id),
            "task id {id} is already queued"
        );
        self.queue_mut(kind).insert(index, task);
        id
    }

    /// 全タスクを取り除く
    ///
    /// `except` を指定した場合、その名前のタスクは残す。
    /// 取り除かれる側に現在タスクが含まれていれば、先に `on_exit(true)` を呼ぶ。
    pub fn remove_all(&mut self, cx: &mut TaskContext<'_>, except: Option<&str>) {
        for kind in [QueueKind::RealTime, QueueKind::Procedural] {
            let current = self.current_id(kind);
            let keeps_current = match (except, current) {
                (Some(name), Some(id)) => self
                    .queue(kind)
                    .find(id)
                    .is_some_and(|task| task.name() == name),
                _ => false,
            };

            if let Some(id) = current
                && !keeps_current
            {
                self.exit_by_id(cx, kind, id, true);
                *self.current_slot(kind) = None;
            }

            let removed = match except {
                Some(name) => self.queue_mut(kind).extract_if(|task| task.name() != name),
                None => self.queue_mut(kind).clear(),
            };
            if !removed.is_empty() {
                debug!(
                    "ACTION_QUEUE: {:?} removed {} {:?} task(s) (except: {:?})",
                    cx.agent,
                    removed.len(),
                    kind,
                    except
                );
            }
        }
        cx.set_current(None);
    }

    /// プロシージャルキューの並べ替え（ドラッグ＆ドロップ）
    ///
    /// `drop` はドラッグ元を取り除く前のインデックスとして解釈する。
    pub fn reorder_procedural(&mut self, dragged: usize, drop: usize) -> bool {
        let len = self.procedural.len();
        if dragged >= len {
            return false;
        }
        let target = if drop > dragged { drop - 1 } else { drop };
        let target = target.min(len - 1);
        self.procedural.move_task(dragged, target)
    }

    /// プロシージャルキューの指定位置を取り除く。現在タスクなら先に終了させる。
    pub fn remove_procedural_at(&mut self, cx: &mut TaskContext<'_>, index: usize) -> bool {
        let Some(id) = self.procedural.get(index).map(TaskDescriptor::id) else {
            return false;
        };
        if self.current_procedural == Some(id) {
            self.exit_by_id(cx, QueueKind::Procedural, id, true);
            self.current_procedural = None;
        }
        cx.set_current(None);
        self.procedural.remove_at(index).is_some()
    }

    /// 表示用の「現在のタスク」（リアルタイム優先）
    pub fn current_task(&self) -> Option<&TaskDescriptor> {
        self.current_real_time
            .and_then(|id| self.real_time.find(id))
            .or_else(|| {
                self.current_procedural
                    .and_then(|id| self.procedural.find(id))
            })
    }

    pub fn current_task_name(&self) -> String {
        self.current_task()
            .map(|task| task.name().to_string())
            .unwrap_or_default()
    }

    pub fn current_task_category(&self) -> TaskCategory {
        self.current_task()
            .map(TaskDescriptor::category)
            .unwrap_or_default()
    }

    /// 両キューの構造変化を取り出す
    pub fn drain_changes(&mut self) -> Vec<(QueueKind, QueueChange)> {
        let real_time = self.real_time.drain_changes();
        let procedural = self.procedural.drain_changes();
        real_time
            .into_iter()
            .map(|change| (QueueKind::RealTime, change))
            .chain(
                procedural
                    .into_iter()
                    .map(|change| (QueueKind::Procedural, change)),
            )
            .collect()
    }

    /// 1ティック分の配分を行い、現在タスクの名前・種別の変化を返す
    ///
    /// プロシージャル → リアルタイムの順に配分する。
    /// 移動先などの共有アクチュエータは、後に走るリアルタイム側の指示が勝つ。
    pub fn tick(&mut self, cx: &mut TaskContext<'_>, delta_secs: f32) -> TickOutcome {
        self.distribute_procedural(cx, delta_secs);
        self.distribute_real_time(cx, delta_secs);
        cx.set_current(None);

        let name = self.current_task_name();
        let category = self.current_task_category();
        let mut outcome = TickOutcome::default();
        if category != self.last_category {
            outcome.category_changed = Some((self.last_category, category));
        }
        if name != self.last_name {
            outcome.name_changed = Some((std::mem::take(&mut self.last_name), name.clone()));
        }
        self.last_name = name;
        self.last_category = category;
        outcome
    }

    /// リアルタイムキュー: 先頭だけを見る
    fn distribute_real_time(&mut self, cx: &mut TaskContext<'_>, delta_secs: f32) {
        let kind = QueueKind::RealTime;
        let Some(head_id) = self.real_time.get(0).map(TaskDescriptor::id) else {
            self.release_current(cx, kind);
            return;
        };

        cx.set_current(Some((head_id, kind)));
        let validity = self
            .real_time
            .get(0)
            .map(|head| head.check_validity(cx))
            .unwrap_or(TaskValidity::Valid);

        match validity {
            TaskValidity::PermanentInvalid(reason) => {
                if let Some(mut head) = self.real_time.pop_front() {
                    info!(
                        "ACTION_QUEUE: {:?} dropped real-time task '{}': {}",
                        cx.agent,
                        head.name(),
                        reason
                    );
                    head.exit(cx, true);
                }
                if self.current_real_time == Some(head_id) {
                    self.current_real_time = None;
                } else {
                    self.release_current(cx, kind);
                }
                return;
            }
            // 先頭が詰まっている間は後続も走らせない
            TaskValidity::TemporarySkip(_) => return,
            TaskValidity::Valid => {}
        }

        if self.current_real_time != Some(head_id) {
            self.switch_to(cx, kind, head_id);
        }

        cx.set_current(Some((head_id, kind)));
        let Some(status) = self
            .real_time
            .get_mut(0)
            .map(|head| head.execute(cx, delta_secs))
        else {
            return;
        };

        match status {
            TaskStatus::Finished | TaskStatus::Skipped => {
                if let Some(mut head) = self.real_time.pop_front() {
                    trace!(
                        "ACTION_QUEUE: {:?} real-time task '{}' {:?}",
                        cx.agent,
                        head.name(),
                        status
                    );
                    head.exit(cx, false);
                }
                self.current_real_time = None;
            }
            TaskStatus::Running => {}
        }
    }

    /// プロシージャルキュー: 先頭から走査し、最初に Running を返したタスクで止める
    fn distribute_procedural(&mut self, cx: &mut TaskContext<'_>, delta_secs: f32) {
        let kind = QueueKind::Procedural;
        let mut index = 0;
        let mut runner = None;

        while let Some(id) = self.procedural.get(index).map(TaskDescriptor::id) {
            cx.set_current(Some((id, kind)));
            let validity = self
                .procedural
                .get(index)
                .map(|task| task.check_validity(cx))
                .unwrap_or(TaskValidity::Valid);

            match validity {
                TaskValidity::PermanentInvalid(reason) => {
                    if let Some(mut task) = self.procedural.remove_at(index) {
                        info!(
                            "ACTION_QUEUE: {:?} dropped procedural task '{}': {}",
                            cx.agent,
                            task.name(),
                            reason
                        );
                        if self.current_procedural == Some(id) {
                            task.exit(cx, true);
                            self.current_procedural = None;
                        }
                    }
                    // 詰めて移動してきたタスクを同じ位置で評価する
                    continue;
                }
                TaskValidity::TemporarySkip(_) => {
                    index += 1;
                    continue;
                }
                TaskValidity::Valid => {}
            }

            if self.current_procedural != Some(id) {
                self.switch_to(cx, kind, id);
            }

            cx.set_current(Some((id, kind)));
            let Some(status) = self
                .procedural
                .get_mut(index)
                .map(|task| task.execute(cx, delta_secs))
            else {
                break;
            };

            match status {
                TaskStatus::Finished => {
                    if let Some(mut task) = self.procedural.remove_at(index) {
                        trace!(
                            "ACTION_QUEUE: {:?} procedural task '{}' finished",
                            cx.agent,
                            task.name()
                        );
                        task.exit(cx, false);
                    }
                    if self.current_procedural == Some(id) {
                        self.current_procedural = None;
                    }
                }
                TaskStatus::Skipped => index += 1,
                TaskStatus::Running => {
                    runner = Some(id);
                    break;
                }
            }
        }

        // 誰も走らなかった: 直前の現在タスクを終了させてアイドルへ
        if runner.is_none() {
            self.release_current(cx, kind);
        }
    }

    /// 直前の現在タスクを（あれば）中断終了させ、`next` を開始状態にする
    fn switch_to(&mut self, cx: &mut TaskContext<'_>, kind: QueueKind, next: TaskId) {
        if let Some(previous) = self.current_id(kind) {
            self.exit_by_id(cx, kind, previous, true);
        }
        if let Some(task) = self.queue_mut(kind).find_mut(next) {
            trace!(
                "ACTION_QUEUE: {:?} {:?} switched to '{}'",
                cx.agent,
                kind,
                task.name()
            );
            task.enter();
        }
        *self.current_slot(kind) = Some(next);
    }

    fn release_current(&mut self, cx: &mut TaskContext<'_>, kind: QueueKind) {
        if let Some(previous) = self.current_slot(kind).take() {
            self.exit_by_id(cx, kind, previous, true);
        }
    }

    /// ID で引き直して終了させる（すでにキューに無ければ何もしない）
    fn exit_by_id(&mut self, cx: &mut TaskContext<'_>, kind: QueueKind, id: TaskId, interrupted: bool) {
        if let Some(task) = self.queue_mut(kind).find_mut(id) {
            cx.set_current(Some((id, kind)));
            task.exit(cx, interrupted);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::systems::action_queue::status::{STATUS_BLOCKED, STATUS_EXECUTING, STATUS_READY};
    use crate::test_support::Harness;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Execute(&'static str),
        Exit(&'static str, bool),
    }

    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<Call>>>);

    impl Log {
        fn push(&self, call: Call) {
            self.0.lock().unwrap().push(call);
        }

        fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }

        fn executed(&self, name: &str) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, Call::Execute(n) if *n == name))
                .count()
        }

        fn exits(&self, name: &str) -> Vec<bool> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    Call::Exit(n, interrupted) if *n == name => Some(*interrupted),
                    _ => None,
                })
                .collect()
        }
    }

    #[derive(Clone)]
    struct Knobs(Arc<Mutex<(TaskValidity, TaskStatus)>>);

    impl Knobs {
        fn set_validity(&self, validity: TaskValidity) {
            self.0.lock().unwrap().0 = validity;
        }

        fn set_status(&self, status: TaskStatus) {
            self.0.lock().unwrap().1 = status;
        }
    }

    fn scripted(
        log: &Log,
        name: &'static str,
        validity: TaskValidity,
        status: TaskStatus,
    ) -> (TaskDescriptor, Knobs) {
        let knobs = Knobs(Arc::new(Mutex::new((validity, status))));
        let (exec_log, exit_log) = (log.clone(), log.clone());
        let (exec_knobs, check_knobs) = (knobs.clone(), knobs.clone());
        let task = TaskDescriptor::new(name, TaskCategory::Undefined, move |_, _| {
            exec_log.push(Call::Execute(name));
            exec_knobs.0.lock().unwrap().1
        })
        .with_validity(move |_| check_knobs.0.lock().unwrap().0.clone())
        .with_on_exit(move |_, interrupted| exit_log.push(Call::Exit(name, interrupted)));
        (task, knobs)
    }

    fn running(log: &Log, name: &'static str) -> (TaskDescriptor, Knobs) {
        scripted(log, name, TaskValidity::Valid, TaskStatus::Running)
    }

    fn names(queue: &ActionQueue, kind: QueueKind) -> Vec<String> {
        queue
            .queue(kind)
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    #[test]
    fn real_time_head_blocks_the_whole_queue() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = scripted(&log, "A", TaskValidity::skip("no ammo"), TaskStatus::Running);
        let (b, _) = running(&log, "B");
        queue.insert(a, QueueKind::RealTime, InsertIndex::Append);
        queue.insert(b, QueueKind::RealTime, InsertIndex::Append);

        for _ in 0..3 {
            queue.tick(&mut cx, 0.1);
        }

        assert!(log.take().is_empty());
        assert_eq!(queue.current_id(QueueKind::RealTime), None);
        assert_eq!(names(&queue, QueueKind::RealTime), ["A", "B"]);
    }

    #[test]
    fn procedural_scan_skips_over_temporarily_blocked_task() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = scripted(&log, "A", TaskValidity::skip("waiting"), TaskStatus::Running);
        let (b, _) = running(&log, "B");
        queue.insert(a, QueueKind::Procedural, InsertIndex::Append);
        let b_id = queue.insert(b, QueueKind::Procedural, InsertIndex::Append);

        queue.tick(&mut cx, 0.1);

        assert_eq!(log.take(), [Call::Execute("B")]);
        assert_eq!(queue.current_id(QueueKind::Procedural), Some(b_id));
        assert_eq!(names(&queue, QueueKind::Procedural), ["A", "B"]);
    }

    #[test]
    fn finished_real_time_task_is_removed_after_normal_exit() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = scripted(&log, "A", TaskValidity::Valid, TaskStatus::Finished);
        queue.insert(a, QueueKind::RealTime, InsertIndex::Append);

        queue.tick(&mut cx, 0.1);

        assert!(queue.real_time().is_empty());
        assert_eq!(log.exits("A"), [false]);
        assert_eq!(queue.current_id(QueueKind::RealTime), None);
    }

    #[test]
    fn skipped_real_time_task_ends_like_finished() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = scripted(&log, "A", TaskValidity::Valid, TaskStatus::Skipped);
        let (b, _) = running(&log, "B");
        queue.insert(a, QueueKind::RealTime, InsertIndex::Append);
        queue.insert(b, QueueKind::RealTime, InsertIndex::Append);

        queue.tick(&mut cx, 0.1);
        assert_eq!(log.take(), [Call::Execute("A"), Call::Exit("A", false)]);
        assert_eq!(names(&queue, QueueKind::RealTime), ["B"]);

        queue.tick(&mut cx, 0.1);
        assert_eq!(log.take(), [Call::Execute("B")]);
    }

    #[test]
    fn permanently_invalid_task_is_removed_mid_scan() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = scripted(&log, "A", TaskValidity::invalid("gone"), TaskStatus::Running);
        let (b, _) = running(&log, "B");
        queue.insert(a, QueueKind::Procedural, InsertIndex::Append);
        let b_id = queue.insert(b, QueueKind::Procedural, InsertIndex::Append);

        queue.tick(&mut cx, 0.1);

        assert_eq!(queue.procedural().len(), 1);
        assert_eq!(queue.current_id(QueueKind::Procedural), Some(b_id));
        assert_eq!(log.take(), [Call::Execute("B")]);
    }

    #[test]
    fn permanently_invalid_current_task_exits_interrupted() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (rt, rt_knobs) = running(&log, "RT");
        let (proc_task, proc_knobs) = running(&log, "P");
        queue.insert(rt, QueueKind::RealTime, InsertIndex::Append);
        queue.insert(proc_task, QueueKind::Procedural, InsertIndex::Append);
        queue.tick(&mut cx, 0.1);
        log.take();

        rt_knobs.set_validity(TaskValidity::invalid("target destroyed"));
        proc_knobs.set_validity(TaskValidity::invalid("target destroyed"));
        queue.tick(&mut cx, 0.1);

        assert_eq!(log.exits("RT"), [true]);
        assert_eq!(log.exits("P"), [true]);
        assert!(queue.is_idle());
        assert_eq!(queue.current_id(QueueKind::RealTime), None);
        assert_eq!(queue.current_id(QueueKind::Procedural), None);
    }

    #[test]
    fn procedural_finished_rescans_same_index() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = scripted(&log, "A", TaskValidity::Valid, TaskStatus::Finished);
        let (b, _) = running(&log, "B");
        queue.insert(a, QueueKind::Procedural, InsertIndex::Append);
        queue.insert(b, QueueKind::Procedural, InsertIndex::Append);

        queue.tick(&mut cx, 0.1);

        assert_eq!(
            log.take(),
            [
                Call::Execute("A"),
                Call::Exit("A", false),
                Call::Execute("B")
            ]
        );
        assert_eq!(names(&queue, QueueKind::Procedural), ["B"]);
    }

    #[test]
    fn procedural_skipped_task_yields_to_next() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = scripted(&log, "A", TaskValidity::Valid, TaskStatus::Skipped);
        let (b, _) = running(&log, "B");
        queue.insert(a, QueueKind::Procedural, InsertIndex::Append);
        let b_id = queue.insert(b, QueueKind::Procedural, InsertIndex::Append);

        queue.tick(&mut cx, 0.1);

        assert_eq!(
            log.take(),
            [
                Call::Execute("A"),
                Call::Exit("A", true),
                Call::Execute("B")
            ]
        );
        assert_eq!(queue.current_id(QueueKind::Procedural), Some(b_id));
        assert_eq!(queue.procedural().len(), 2);
    }

    #[test]
    fn procedural_queue_goes_idle_when_nothing_runs() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, knobs) = running(&log, "A");
        queue.insert(a, QueueKind::Procedural, InsertIndex::Append);
        queue.tick(&mut cx, 0.1);

        knobs.set_validity(TaskValidity::skip("paused"));
        queue.tick(&mut cx, 0.1);

        assert_eq!(log.exits("A"), [true]);
        assert_eq!(queue.current_id(QueueKind::Procedural), None);
        assert_eq!(queue.procedural().len(), 1);

        // 再び有効になれば入り直す
        knobs.set_validity(TaskValidity::Valid);
        queue.tick(&mut cx, 0.1);
        assert_eq!(log.executed("A"), 2);
        assert!(queue.procedural().get(0).unwrap().has_started());
    }

    #[test]
    fn previous_task_exits_before_new_task_executes() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = running(&log, "A");
        queue.insert(a, QueueKind::RealTime, InsertIndex::Append);
        queue.tick(&mut cx, 0.1);
        log.take();

        let (b, b_knobs) = running(&log, "B");
        queue.insert(b, QueueKind::RealTime, InsertIndex::At(0));
        queue.tick(&mut cx, 0.1);
        assert_eq!(log.take(), [Call::Exit("A", true), Call::Execute("B")]);
        assert_eq!(names(&queue, QueueKind::RealTime), ["B", "A"]);

        b_knobs.set_status(TaskStatus::Finished);
        queue.tick(&mut cx, 0.1);
        queue.tick(&mut cx, 0.1);
        assert_eq!(
            log.take(),
            [
                Call::Execute("B"),
                Call::Exit("B", false),
                Call::Execute("A")
            ]
        );
        assert!(queue.real_time().get(0).unwrap().has_started());
    }

    #[test]
    fn remove_all_keeps_named_tasks_and_exits_removed_current() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = scripted(&log, "keep", TaskValidity::skip("later"), TaskStatus::Running);
        let (b, _) = running(&log, "drop");
        queue.insert(a, QueueKind::Procedural, InsertIndex::Append);
        queue.insert(b, QueueKind::Procedural, InsertIndex::Append);
        queue.tick(&mut cx, 0.1);

        queue.remove_all(&mut cx, Some("keep"));

        assert_eq!(names(&queue, QueueKind::Procedural), ["keep"]);
        assert_eq!(log.exits("drop"), [true]);
        assert!(log.exits("keep").is_empty());
        assert_eq!(queue.current_id(QueueKind::Procedural), None);
    }

    #[test]
    fn remove_all_leaves_kept_current_task_running() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = running(&log, "keep");
        let (b, _) = running(&log, "drop");
        let a_id = queue.insert(a, QueueKind::RealTime, InsertIndex::Append);
        queue.insert(b, QueueKind::RealTime, InsertIndex::Append);
        queue.tick(&mut cx, 0.1);

        queue.remove_all(&mut cx, Some("keep"));
        queue.tick(&mut cx, 0.1);

        assert!(log.exits("keep").is_empty());
        assert_eq!(queue.current_id(QueueKind::RealTime), Some(a_id));
        assert_eq!(log.executed("keep"), 2);
    }

    #[test]
    fn remove_all_without_exception_exits_both_current_tasks() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (rt, _) = running(&log, "RT");
        let (p, _) = running(&log, "P");
        let (waiting, _) = running(&log, "W");
        queue.insert(rt, QueueKind::RealTime, InsertIndex::Append);
        queue.insert(p, QueueKind::Procedural, InsertIndex::Append);
        queue.insert(waiting, QueueKind::Procedural, InsertIndex::Append);
        queue.tick(&mut cx, 0.1);

        queue.remove_all(&mut cx, None);

        assert!(queue.is_idle());
        assert_eq!(log.exits("RT"), [true]);
        assert_eq!(log.exits("P"), [true]);
        assert!(log.exits("W").is_empty());
        assert!(queue.current_task().is_none());
    }

    #[test]
    fn reorder_adjusts_drop_index_past_dragged_slot() {
        let log = Log::default();
        let mut queue = ActionQueue::new();
        for name in ["A", "B", "C", "D"] {
            let (task, _) = running(&log, name);
            queue.insert(task, QueueKind::Procedural, InsertIndex::Append);
        }

        // A を C と D の間へ
        assert!(queue.reorder_procedural(0, 3));
        assert_eq!(names(&queue, QueueKind::Procedural), ["B", "C", "A", "D"]);

        // 末尾より後ろは末尾に丸める
        assert!(queue.reorder_procedural(0, 99));
        assert_eq!(names(&queue, QueueKind::Procedural), ["C", "A", "D", "B"]);

        assert!(queue.reorder_procedural(3, 0));
        assert_eq!(names(&queue, QueueKind::Procedural), ["B", "C", "A", "D"]);

        assert!(!queue.reorder_procedural(4, 0));
    }

    #[test]
    fn remove_procedural_at_exits_current_task() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (a, _) = running(&log, "A");
        let (b, _) = running(&log, "B");
        queue.insert(a, QueueKind::Procedural, InsertIndex::Append);
        queue.insert(b, QueueKind::Procedural, InsertIndex::Append);
        queue.tick(&mut cx, 0.1);

        assert!(queue.remove_procedural_at(&mut cx, 1));
        assert!(log.exits("B").is_empty());
        assert!(queue.remove_procedural_at(&mut cx, 0));
        assert_eq!(log.exits("A"), [true]);
        assert_eq!(queue.current_id(QueueKind::Procedural), None);
        assert!(!queue.remove_procedural_at(&mut cx, 0));
    }

    #[test]
    fn change_outcome_reports_each_transition_once() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let mut queue = ActionQueue::new();
        let walk = TaskDescriptor::new("Walk", TaskCategory::MoveToLocation, |_, _| {
            TaskStatus::Running
        });
        let mine = TaskDescriptor::new("Mine", TaskCategory::InteractWithActor, |_, _| {
            TaskStatus::Running
        });
        queue.insert(mine, QueueKind::Procedural, InsertIndex::Append);

        let first = queue.tick(&mut cx, 0.1);
        assert_eq!(
            first.category_changed,
            Some((TaskCategory::Undefined, TaskCategory::InteractWithActor))
        );
        assert_eq!(first.name_changed, Some((String::new(), "Mine".to_string())));
        assert_eq!(queue.tick(&mut cx, 0.1), TickOutcome::default());

        // リアルタイム側が優先して表示される
        queue.insert(walk, QueueKind::RealTime, InsertIndex::Append);
        let switched = queue.tick(&mut cx, 0.1);
        assert_eq!(queue.current_task_name(), "Walk");
        assert_eq!(
            switched.category_changed,
            Some((TaskCategory::InteractWithActor, TaskCategory::MoveToLocation))
        );
        assert_eq!(
            switched.name_changed,
            Some(("Mine".to_string(), "Walk".to_string()))
        );
    }

    #[test]
    fn status_strings_describe_each_row() {
        let mut h = Harness::new();
        let mut cx = h.cx();
        let log = Log::default();
        let mut queue = ActionQueue::new();
        let (blocked, _) = scripted(&log, "A", TaskValidity::skip("No Ammo"), TaskStatus::Running);
        let runner = TaskDescriptor::new("B", TaskCategory::Undefined, |_, _| {
            TaskStatus::Running
        })
        .with_description(|_| "Mining".to_string());
        let (waiting, waiting_knobs) = running(&log, "C");
        queue.insert(blocked, QueueKind::Procedural, InsertIndex::Append);
        queue.insert(runner, QueueKind::Procedural, InsertIndex::Append);
        queue.insert(waiting, QueueKind::Procedural, InsertIndex::Append);
        queue.tick(&mut cx, 0.1);

        let kind = QueueKind::Procedural;
        assert_eq!(
            queue.status_string(&mut cx, 0, kind),
            "Condition Not Met: No Ammo"
        );
        assert_eq!(
            queue.status_string(&mut cx, 1, kind),
            format!("{STATUS_EXECUTING}\nMining")
        );
        assert_eq!(queue.status_string(&mut cx, 2, kind), STATUS_BLOCKED);
        assert_eq!(queue.status_string(&mut cx, 3, kind), "Invalid Index");

        waiting_knobs.set_validity(TaskValidity::skip("Busy"));
        assert_eq!(queue.status_string(&mut cx, 2, kind), STATUS_BLOCKED);
        assert_eq!(queue.validity_reason(&mut cx, 2, QueueKind::Procedural), "Busy");
        assert_eq!(queue.validity_reason(&mut cx, 1, QueueKind::Procedural), "");
        assert_eq!(
            queue.validity_reason(&mut cx, 7, QueueKind::Procedural),
            "Invalid Action Index"
        );

        let (later, _) = running(&log, "D");
        queue.insert(later, QueueKind::RealTime, InsertIndex::Append);
        assert_eq!(queue.status_string(&mut cx, 0, QueueKind::RealTime), STATUS_READY);
    }

    /// ランダムな操作列で不変条件を確かめる
    #[test]
    fn randomized_operations_keep_scheduling_invariants() {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        enum Event {
            Execute(TaskId, QueueKind),
            Exit(TaskId),
        }

        let mut h = Harness::new();
        let mut cx = h.cx();
        let mut rng = StdRng::seed_from_u64(0x5eed_a11);
        let mut queue = ActionQueue::new();
        let events: Arc<Mutex<Vec<Event>>> = Arc::default();
        let mut knobs: HashMap<TaskId, Knobs> = HashMap::new();

        let validities = [
            TaskValidity::Valid,
            TaskValidity::Valid,
            TaskValidity::Valid,
            TaskValidity::skip("wait"),
            TaskValidity::invalid("gone"),
        ];
        let statuses = [
            TaskStatus::Running,
            TaskStatus::Running,
            TaskStatus::Finished,
            TaskStatus::Skipped,
        ];

        for _ in 0..2_000 {
            match rng.gen_range(0..10) {
                0..=3 => {
                    let control = Knobs(Arc::new(Mutex::new((
                        TaskValidity::Valid,
                        TaskStatus::Running,
                    ))));
                    let (exec_events, exit_events) = (events.clone(), events.clone());
                    let (exec_knobs, check_knobs) = (control.clone(), control.clone());
                    let name = if rng.gen_bool(0.5) { "keep" } else { "other" };
                    let task = TaskDescriptor::new(name, TaskCategory::Undefined, move |cx, _| {
                        let (id, kind) = cx.current_task().expect("current task set");
                        exec_events.lock().unwrap().push(Event::Execute(id, kind));
                        exec_knobs.0.lock().unwrap().1
                    })
                    .with_validity(move |_| check_knobs.0.lock().unwrap().0.clone())
                    .with_on_exit(move |cx, _| {
                        let (id, _) = cx.current_task().expect("current task set");
                        exit_events.lock().unwrap().push(Event::Exit(id));
                    });
                    let kind = if rng.gen_bool(0.5) {
                        QueueKind::RealTime
                    } else {
                        QueueKind::Procedural
                    };
                    let index = if rng.gen_bool(0.3) {
                        InsertIndex::At(rng.gen_range(0..4))
                    } else {
                        InsertIndex::Append
                    };
                    let id = queue.insert(task, kind, index);
                    knobs.insert(id, control);
                }
                4 => {
                    let len = queue.procedural().len().max(1);
                    queue.reorder_procedural(rng.gen_range(0..len), rng.gen_range(0..=len));
                }
                5 => {
                    let len = queue.procedural().len().max(1);
                    queue.remove_procedural_at(&mut cx, rng.gen_range(0..len));
                }
                6 if rng.gen_bool(0.1) => {
                    let except = if rng.gen_bool(0.5) { Some("keep") } else { None };
                    queue.remove_all(&mut cx, except);
                }
                _ => {}
            }

            for control in knobs.values() {
                control.set_validity(validities[rng.gen_range(0..validities.len())].clone());
                control.set_status(statuses[rng.gen_range(0..statuses.len())]);
            }

            queue.tick(&mut cx, 0.016);

            // リアルタイム側は1ティックで高々1つしか実行しない。プロシージャル側は
            // Finished / Skipped を返したタスクの後に走査が続くため、Running で止まる
            // 1つの手前に複数の実行が並ぶことがある。
            let tick_events = std::mem::take(&mut *events.lock().unwrap());
            for kind in [QueueKind::RealTime, QueueKind::Procedural] {
                let running: Vec<_> = tick_events
                    .iter()
                    .filter(|e| matches!(e, Event::Execute(_, k) if *k == kind))
                    .collect();
                assert!(
                    running.len() <= 1 || kind == QueueKind::Procedural,
                    "real-time executed {} tasks in one tick",
                    running.len()
                );

                // 開始済みのタスクは高々1つで、それが現在タスク
                let started: Vec<TaskId> = queue
                    .queue(kind)
                    .iter()
                    .filter(|t| t.has_started())
                    .map(TaskDescriptor::id)
                    .collect();
                assert!(started.len() <= 1, "{kind:?} has {started:?} started");
                if let Some(id) = started.first() {
                    assert_eq!(queue.current_id(kind), Some(*id));
                }
                if let Some(id) = queue.current_id(kind) {
                    assert!(queue.queue(kind).contains(id));
                }
            }

            // 同じタスクの終了処理が、間に実行を挟まず2回呼ばれることはない
            let mut exited_since_execute: HashMap<TaskId, bool> = HashMap::new();
            for event in &tick_events {
                match event {
                    Event::Execute(id, _) => {
                        exited_since_execute.insert(*id, false);
                    }
                    Event::Exit(id) => {
                        let already = exited_since_execute.insert(*id, true);
                        assert_ne!(already, Some(true), "{id} exited twice");
                    }
                }
            }

            knobs.retain(|id, _| {
                queue.real_time().contains(*id) || queue.procedural().contains(*id)
            });
        }
    }
}

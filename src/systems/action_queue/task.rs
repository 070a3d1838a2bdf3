//! アクション（タスク記述子）の型定義
//!
//! 1つの `TaskDescriptor` が「エージェントの1単位の振る舞い」を表す。
//! 実行・有効性判定・終了処理はクロージャとして保持し、
//! 呼び出しのたびに `TaskContext` を明示的に受け取る。

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::context::TaskContext;
use super::params::TaskParams;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// タスクの安定ID
///
/// 生成時に一度だけ採番され、以後変わらない。
/// 「同じタスクか」の判定はすべてこのIDで行う（格納位置では比較しない）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct TaskId(u64);

impl TaskId {
    /// 新しいIDを採番する（プロセス内で単調増加、再利用なし）
    pub fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// 1ティック実行した結果
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
pub enum TaskStatus {
    /// 実行中（次のティックも自分を current のままにする）
    Running,
    /// 完了（キューから取り除く）
    Finished,
    /// 今ティックは実行を見送る（プロシージャルでは次のタスクへ）
    Skipped,
}

/// 有効性チェックの結果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskValidity {
    Valid,
    /// 一時的に条件を満たさない（キューに残して毎ティック再判定）
    TemporarySkip(Cow<'static, str>),
    /// 二度と条件を満たさない（即座に取り除く）
    PermanentInvalid(Cow<'static, str>),
}

impl TaskValidity {
    pub fn skip(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::TemporarySkip(reason.into())
    }

    pub fn invalid(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::PermanentInvalid(reason.into())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// UI表示用の理由文字列（Valid なら空）
    pub fn reason(&self) -> &str {
        match self {
            Self::Valid => "",
            Self::TemporarySkip(reason) | Self::PermanentInvalid(reason) => reason,
        }
    }
}

/// タスクの種別タグ
///
/// UIへの状態通知や「このエージェントは今何をしているか」の問い合わせに使う。
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize,
)]
pub enum TaskCategory {
    MoveToLocation,
    AttackOnChara,
    InteractWithActor,
    InteractWithProduction,
    InteractWithStorage,
    CollectCargo,
    CollectBullets,
    TradeCargo,
    #[default]
    Undefined,
}

impl TaskCategory {
    pub fn label(self) -> &'static str {
        match self {
            TaskCategory::MoveToLocation => "Move To Location",
            TaskCategory::AttackOnChara => "Attack On Character",
            TaskCategory::InteractWithActor => "Interact With Actor",
            TaskCategory::InteractWithProduction => "Interact With Production",
            TaskCategory::InteractWithStorage => "Interact With Storage",
            TaskCategory::CollectCargo => "Collect Cargo",
            TaskCategory::CollectBullets => "Collect Bullets",
            TaskCategory::TradeCargo => "Trade Cargo",
            TaskCategory::Undefined => "Undefined",
        }
    }
}

pub type ExecuteFn =
    Box<dyn for<'a, 'b> FnMut(&'a mut TaskContext<'b>, f32) -> TaskStatus + Send + Sync>;
pub type ValidityFn = Box<dyn for<'a, 'b> Fn(&'a TaskContext<'b>) -> TaskValidity + Send + Sync>;
pub type DescribeFn = Box<dyn for<'a, 'b> Fn(&'a TaskContext<'b>) -> String + Send + Sync>;
pub type ExitFn = Box<dyn for<'a, 'b> FnMut(&'a mut TaskContext<'b>, bool) + Send + Sync>;

/// スケジュール可能な1単位の振る舞い
///
/// `execute` だけが必須。`check_validity` を省略すると常に Valid、
/// `on_exit` を省略すると終了処理なし、`describe` を省略すると説明は空になる。
pub struct TaskDescriptor {
    id: TaskId,
    name: String,
    category: TaskCategory,
    params: TaskParams,
    has_started: bool,
    execute: ExecuteFn,
    validity: Option<ValidityFn>,
    describe: Option<DescribeFn>,
    on_exit: Option<ExitFn>,
}

impl TaskDescriptor {
    pub fn new<F>(name: impl Into<String>, category: TaskCategory, execute: F) -> Self
    where
        F: FnMut(&mut TaskContext<'_>, f32) -> TaskStatus + Send + Sync + 'static,
    {
        Self {
            id: TaskId::next(),
            name: name.into(),
            category,
            params: TaskParams::new(category),
            has_started: false,
            execute: Box::new(execute),
            validity: None,
            describe: None,
            on_exit: None,
        }
    }

    pub fn with_validity<F>(mut self, check: F) -> Self
    where
        F: Fn(&TaskContext<'_>) -> TaskValidity + Send + Sync + 'static,
    {
        self.validity = Some(Box::new(check));
        self
    }

    pub fn with_description<F>(mut self, describe: F) -> Self
    where
        F: Fn(&TaskContext<'_>) -> String + Send + Sync + 'static,
    {
        self.describe = Some(Box::new(describe));
        self
    }

    pub fn with_on_exit<F>(mut self, on_exit: F) -> Self
    where
        F: FnMut(&mut TaskContext<'_>, bool) + Send + Sync + 'static,
    {
        self.on_exit = Some(Box::new(on_exit));
        self
    }

    pub fn with_params(mut self, params: TaskParams) -> Self {
        self.params = params;
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> TaskCategory {
        self.category
    }

    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn check_validity(&self, cx: &TaskContext<'_>) -> TaskValidity {
        match &self.validity {
            Some(check) => check(cx),
            None => TaskValidity::Valid,
        }
    }

    pub fn describe(&self, cx: &TaskContext<'_>) -> String {
        self.describe
            .as_ref()
            .map(|describe| describe(cx))
            .unwrap_or_default()
    }

    pub(crate) fn execute(&mut self, cx: &mut TaskContext<'_>, delta_secs: f32) -> TaskStatus {
        (self.execute)(cx, delta_secs)
    }

    /// current になった時点で呼ぶ
    pub(crate) fn enter(&mut self) {
        self.has_started = true;
    }

    /// current でなくなった時点で呼ぶ。開始済みのときだけ `on_exit` を1回呼ぶ。
    pub(crate) fn exit(&mut self, cx: &mut TaskContext<'_>, interrupted: bool) {
        if !self.has_started {
            return;
        }
        self.has_started = false;
        if let Some(on_exit) = self.on_exit.as_mut() {
            on_exit(cx, interrupted);
        }
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("has_started", &self.has_started)
            .finish_non_exhaustive()
    }
}

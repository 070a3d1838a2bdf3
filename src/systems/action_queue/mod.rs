//! エージェントごとの協調型アクションキュー
//!
//! - `task`: タスク記述子（実行・有効性・終了処理）
//! - `queue`: 並び順を持つタスクの入れ物
//! - `scheduler`: リアルタイム／プロシージャルの2本を配分する `ActionQueue`
//! - `context`: タスク呼び出しに渡すコンテキストとワールドの窓口
//! - `tick`: Bevy システム

mod config;
mod context;
mod params;
mod queue;
mod scheduler;
mod status;
mod task;
mod tick;

pub use config::ActionQueueConfig;
pub use context::{AgentWorld, SourceFilter, TargetState, TaskContext};
pub use params::{CargoLine, QueueSnapshot, RouteStop, SavedTask, TaskParams};
pub use queue::{InsertIndex, QueueChange, QueueKind, TaskQueue};
pub use scheduler::{ActionQueue, TickOutcome};
pub use status::{
    ActionQueueStatusView, REASON_INVALID_INDEX, STATUS_BLOCKED, STATUS_EXECUTING,
    STATUS_INVALID_INDEX, STATUS_READY, TaskStatusLine,
};
pub use task::{TaskCategory, TaskDescriptor, TaskId, TaskStatus, TaskValidity};
pub use tick::{AgentTickQuery, TargetQuery, action_queue_tick_system};

pub mod action_queue;
pub mod logistics;

use bevy::prelude::*;

/// ゲームシステムの実行順序を制御するセット
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSystemSet {
    /// キュー操作の適用・タスク配分などのコアロジック
    Logic,
    /// エンティティの移動・ダメージ適用 (ロジックに基づく実際のアクション)
    Actor,
}

//! プラグインモジュールのエントリポイント

pub mod logic;
pub mod messages;

pub use logic::LogicPlugin;
pub use messages::MessagesPlugin;

use bevy::prelude::*;

/// アクションキュー一式（Message 登録・設定リソース・システム）
pub struct ActionQueuePlugin;

impl Plugin for ActionQueuePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((MessagesPlugin, LogicPlugin));
    }
}

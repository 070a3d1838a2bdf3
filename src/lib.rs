//! Bevy エージェント向けの協調型アクションキュー
//!
//! エージェントはリアルタイム（厳密な FIFO）とプロシージャル（位置による優先度）の
//! 2本のキューを持ち、毎フレーム1回ずつ配分される。

pub mod constants;
pub mod entities;
pub mod events;
pub mod plugins;
pub mod systems;

#[cfg(test)]
pub(crate) mod test_support;

pub use plugins::ActionQueuePlugin;

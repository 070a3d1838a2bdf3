//! 遅延コールバック（アニメーション待ちタイマー）
//!
//! コールバックは予約時のセッション番号を持つ。発火時にセッションが
//! 進んでいれば、その間に中断・再開されたということなので何もしない。

use bevy::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum LogisticsTimerKind {
    Pickup,
    DropOff,
    BulletPickup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerCallback {
    pub kind: LogisticsTimerKind,
    pub session: u64,
}

#[derive(Debug)]
struct PendingTimer {
    timer: Timer,
    callback: TimerCallback,
}

/// エージェントごとの保留中タイマー
#[derive(Component, Debug, Default)]
pub struct DeferredTimers {
    pending: Vec<PendingTimer>,
}

impl DeferredTimers {
    pub fn schedule(&mut self, secs: f32, callback: TimerCallback) {
        self.pending.push(PendingTimer {
            timer: Timer::from_seconds(secs.max(0.0), TimerMode::Once),
            callback,
        });
    }

    pub fn is_pending(&self, kind: LogisticsTimerKind) -> bool {
        self.pending.iter().any(|p| p.callback.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// 時間を進め、満了したコールバックを予約順に返す
    pub fn tick(&mut self, delta: Duration) -> Vec<TimerCallback> {
        let mut fired = Vec::new();
        self.pending.retain_mut(|pending| {
            pending.timer.tick(delta);
            if pending.timer.is_finished() {
                fired.push(pending.callback);
                false
            } else {
                true
            }
        });
        fired
    }
}

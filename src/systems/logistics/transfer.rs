//! 複数区間の積み荷輸送（ステートマシン）
//!
//! `ToSource → Pickup → ToDestination → DropOff` を区間ごとに繰り返す。
//! 積み込み・荷下ろしはタイマー満了時に在庫へ反映し、それまでは Running を返し続ける。
//!
//! ## セッション番号
//! 開始・中断のたびに進める。タイマーは予約時の番号を持ち、
//! 発火時に一致しなければ何もしない（中断後に古い完了通知が届いても状態を壊さない）。
//!
//! ## 所有者
//! エージェントの物流状態は1つしかないため、輸送を開始したタスクを所有者として記録する。
//! リアルタイム側のタスクはプロシージャル側の輸送を横取りできる。

use bevy::prelude::*;

use super::timers::{LogisticsTimerKind, TimerCallback};
use super::types::ItemId;
use crate::systems::action_queue::{QueueKind, RouteStop, TaskContext, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum TransferStep {
    #[default]
    ToSource,
    Pickup,
    ToDestination,
    DropOff,
}

/// 1区間（source から destination へ item を quantity 個まで）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeSegment {
    pub source: Entity,
    pub destination: Entity,
    pub item: ItemId,
    pub quantity: i32,
    /// 実際に積み込めた数
    pub moved: i32,
}

#[derive(Debug, Clone)]
pub struct ActiveTransfer {
    segments: Vec<TradeSegment>,
    index: usize,
    step: TransferStep,
    pickup_pending: bool,
    dropoff_pending: bool,
    elapsed: f32,
    timeout: f32,
}

impl ActiveTransfer {
    pub fn step(&self) -> TransferStep {
        self.step
    }

    pub fn segment_index(&self) -> usize {
        self.index
    }

    pub fn segments(&self) -> &[TradeSegment] {
        &self.segments
    }

    pub fn current_segment(&self) -> Option<&TradeSegment> {
        self.segments.get(self.index)
    }

    pub fn timeout_secs(&self) -> f32 {
        self.timeout
    }
}

/// 弾薬補充の進行状況
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulletRun {
    pub source: Entity,
    pub pickup_pending: bool,
}

/// エージェントの物流状態
#[derive(Component, Debug, Default)]
pub struct CargoLogistics {
    session: u64,
    transfer: Option<ActiveTransfer>,
    pub(crate) self_delivery_done: bool,
    pub(crate) bullets: Option<BulletRun>,
    owner: Option<(TaskId, QueueKind)>,
}

impl CargoLogistics {
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn transfer(&self) -> Option<&ActiveTransfer> {
        self.transfer.as_ref()
    }

    pub fn bullet_run(&self) -> Option<&BulletRun> {
        self.bullets.as_ref()
    }

    pub fn owner(&self) -> Option<(TaskId, QueueKind)> {
        self.owner
    }

    pub fn is_busy(&self) -> bool {
        self.transfer.is_some() || self.bullets.is_some()
    }

    /// セッションを進めて新しい番号を返す
    pub(crate) fn next_session(&mut self) -> u64 {
        self.session += 1;
        self.session
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferProgress {
    InProgress,
    Completed,
    /// ノードが消えたため打ち切った
    Abandoned,
    /// 経路長に応じた制限時間を超えたため打ち切った
    TimedOut,
}

impl TransferProgress {
    pub fn is_done(self) -> bool {
        self != TransferProgress::InProgress
    }
}

// ============================================================
// 所有者
// ============================================================

/// 呼び出し中のタスクを物流状態の所有者にする。他タスクの実行中の輸送は中断する。
pub fn claim_logistics(cx: &mut TaskContext<'_>) {
    let me = cx.current_task();
    if cx.logistics.owner == me {
        return;
    }
    if cx.logistics.is_busy() {
        debug!(
            "TRANSFER: {:?} run handed over from {:?} to {:?}",
            cx.agent, cx.logistics.owner, me
        );
        cancel_transfer(cx);
    }
    cx.logistics.owner = me;
}

/// リアルタイム側のタスクが物流状態を使っている間、プロシージャル側は待たせる
pub fn logistics_busy_for(cx: &TaskContext<'_>) -> bool {
    matches!(
        (cx.logistics.owner, cx.current_task()),
        (Some((owner, QueueKind::RealTime)), Some((me, QueueKind::Procedural))) if owner != me
    )
}

/// 所有者のときだけ止める（タスクの on_exit から呼ぶ）
pub fn release_logistics(cx: &mut TaskContext<'_>) {
    if cx.logistics.owner.is_some() && cx.logistics.owner == cx.current_task() {
        cancel_transfer(cx);
        cx.logistics.owner = None;
    }
}

/// 無条件に中断する
///
/// セッションを進め、保留中のタイマーを破棄し、輸送中なら移動も止める。
pub fn cancel_transfer(cx: &mut TaskContext<'_>) {
    let session = cx.logistics.next_session();
    cx.timers.clear();
    let had_transfer = cx.logistics.transfer.take().is_some();
    let had_bullets = cx.logistics.bullets.take().is_some();
    cx.logistics.self_delivery_done = false;
    if had_transfer || had_bullets {
        cx.world.stop_moving();
        debug!("TRANSFER: {:?} cancelled (session -> {})", cx.agent, session);
    }
}

// ============================================================
// 輸送
// ============================================================

/// ルートから区間を組み立てて輸送を開始する
///
/// 地点が2つ未満なら何もせず `Completed` を返す。
pub fn start_transfer(cx: &mut TaskContext<'_>, route: &[RouteStop]) -> TransferProgress {
    let session = cx.logistics.next_session();
    cx.timers.clear();
    cx.logistics.transfer = None;

    if route.len() < 2 {
        debug!(
            "TRANSFER: {:?} route has {} stop(s), nothing to carry",
            cx.agent,
            route.len()
        );
        return TransferProgress::Completed;
    }

    let mut segments = Vec::new();
    for (i, stop) in route.iter().enumerate() {
        let destination = route[(i + 1) % route.len()].node;
        segments.extend(stop.cargo.iter().map(|line| TradeSegment {
            source: stop.node,
            destination,
            item: line.item,
            quantity: line.quantity,
            moved: 0,
        }));
    }

    let timeout = cx.config.transfer_timeout_base_secs
        + route_length(cx, route) * cx.config.transfer_timeout_secs_per_distance;
    info!(
        "TRANSFER: {:?} started session {} ({} segment(s), timeout {:.1}s)",
        cx.agent,
        session,
        segments.len(),
        timeout
    );
    cx.logistics.transfer = Some(ActiveTransfer {
        segments,
        index: 0,
        step: TransferStep::ToSource,
        pickup_pending: false,
        dropoff_pending: false,
        elapsed: 0.0,
        timeout,
    });
    TransferProgress::InProgress
}

/// 輸送を1ティック進める
pub fn advance_transfer(cx: &mut TaskContext<'_>, delta_secs: f32) -> TransferProgress {
    let agent = cx.agent;
    let Some(transfer) = cx.logistics.transfer.as_mut() else {
        return TransferProgress::Completed;
    };

    transfer.elapsed += delta_secs;
    if transfer.elapsed > transfer.timeout {
        warn!(
            "TRANSFER: {:?} timed out after {:.1}s at segment {}/{}, force-completing",
            agent,
            transfer.elapsed,
            transfer.index,
            transfer.segments.len()
        );
        abort_transfer(cx);
        return TransferProgress::TimedOut;
    }

    let Some(segment) = transfer.segments.get(transfer.index).copied() else {
        info!("TRANSFER: {:?} completed all segments", agent);
        cx.logistics.transfer = None;
        return TransferProgress::Completed;
    };
    let step = transfer.step;
    let pickup_pending = transfer.pickup_pending;
    let dropoff_pending = transfer.dropoff_pending;

    if !node_alive(cx, segment.source) || !node_alive(cx, segment.destination) {
        info!(
            "TRANSFER: {:?} node vanished ({:?} -> {:?}), abandoning transfer",
            agent, segment.source, segment.destination
        );
        abort_transfer(cx);
        return TransferProgress::Abandoned;
    }

    let source_is_self = segment.source == agent;
    let destination_is_self = segment.destination == agent;

    match step {
        TransferStep::ToSource => {
            if source_is_self || cx.is_at(segment.source) {
                cx.world.stop_moving();
                update_transfer(cx, |t| t.step = TransferStep::Pickup);
            } else if let Some(pos) = cx.world.position_of(segment.source) {
                cx.world.move_to(pos);
            }
        }
        TransferStep::Pickup => {
            if source_is_self {
                let moved = cx.world.item_quantity(agent, segment.item).min(segment.quantity);
                update_transfer(cx, |t| {
                    t.segments[t.index].moved = moved.max(0);
                    t.step = TransferStep::ToDestination;
                    t.pickup_pending = false;
                });
            } else if !pickup_pending {
                let secs = cx.config.pickup_duration_secs;
                schedule(cx, LogisticsTimerKind::Pickup, secs);
                update_transfer(cx, |t| t.pickup_pending = true);
            }
        }
        TransferStep::ToDestination => {
            if destination_is_self || cx.is_at(segment.destination) {
                cx.world.stop_moving();
                update_transfer(cx, |t| t.step = TransferStep::DropOff);
            } else if let Some(pos) = cx.world.position_of(segment.destination) {
                cx.world.move_to(pos);
            }
        }
        TransferStep::DropOff => {
            if destination_is_self {
                // 自分宛ての区間は積んだまま次へ
                update_transfer(cx, |t| {
                    t.index += 1;
                    t.step = TransferStep::ToSource;
                    t.dropoff_pending = false;
                });
            } else if !dropoff_pending {
                let secs = cx.config.dropoff_duration_secs;
                schedule(cx, LogisticsTimerKind::DropOff, secs);
                update_transfer(cx, |t| t.dropoff_pending = true);
            }
        }
    }

    TransferProgress::InProgress
}

/// ルートで輸送する。未開始なら開始し、開始済みなら進める。
pub fn trading_cargo(
    cx: &mut TaskContext<'_>,
    route: &[RouteStop],
    delta_secs: f32,
) -> TransferProgress {
    claim_logistics(cx);
    if cx.logistics.transfer.is_none() {
        let progress = start_transfer(cx, route);
        if progress.is_done() {
            return progress;
        }
    }
    advance_transfer(cx, delta_secs)
}

/// 満了したタイマーを反映する。古いセッションのものは無視して `false`。
pub fn on_timer_fired(cx: &mut TaskContext<'_>, callback: TimerCallback) -> bool {
    if callback.session != cx.logistics.session {
        trace!(
            "TRANSFER: {:?} ignored stale {:?} completion (session {} != {})",
            cx.agent, callback.kind, callback.session, cx.logistics.session
        );
        return false;
    }
    match callback.kind {
        LogisticsTimerKind::Pickup => complete_pickup(cx),
        LogisticsTimerKind::DropOff => complete_dropoff(cx),
        LogisticsTimerKind::BulletPickup => super::collect::complete_bullet_pickup(cx),
    }
}

fn complete_pickup(cx: &mut TaskContext<'_>) -> bool {
    let Some(segment) = cx
        .logistics
        .transfer
        .as_ref()
        .filter(|t| t.step == TransferStep::Pickup && t.pickup_pending)
        .and_then(|t| t.current_segment().copied())
    else {
        return false;
    };

    let available = cx.world.item_quantity(segment.source, segment.item);
    let take = available.min(segment.quantity).max(0);
    let moved = if take > 0
        && cx
            .world
            .modify_item_quantity(segment.source, segment.item, -take)
    {
        cx.world.modify_item_quantity(cx.agent, segment.item, take);
        take
    } else {
        0
    };
    debug!(
        "TRANSFER: {:?} picked up {} x item {} from {:?}",
        cx.agent, moved, segment.item, segment.source
    );

    update_transfer(cx, |t| {
        t.segments[t.index].moved = moved;
        t.pickup_pending = false;
        t.step = TransferStep::ToDestination;
    });
    true
}

fn complete_dropoff(cx: &mut TaskContext<'_>) -> bool {
    let Some(segment) = cx
        .logistics
        .transfer
        .as_ref()
        .filter(|t| t.step == TransferStep::DropOff && t.dropoff_pending)
        .and_then(|t| t.current_segment().copied())
    else {
        return false;
    };

    let carried = cx.world.item_quantity(cx.agent, segment.item);
    let amount = segment.moved.min(carried).max(0);
    if amount > 0 && cx.world.modify_item_quantity(cx.agent, segment.item, -amount) {
        cx.world
            .modify_item_quantity(segment.destination, segment.item, amount);
    }
    debug!(
        "TRANSFER: {:?} dropped off {} x item {} at {:?}",
        cx.agent, amount, segment.item, segment.destination
    );

    update_transfer(cx, |t| {
        t.index += 1;
        t.dropoff_pending = false;
        t.step = TransferStep::ToSource;
    });
    true
}

// ============================================================
// 内部ヘルパー
// ============================================================

fn update_transfer(cx: &mut TaskContext<'_>, f: impl FnOnce(&mut ActiveTransfer)) {
    if let Some(transfer) = cx.logistics.transfer.as_mut() {
        f(transfer);
    }
}

pub(crate) fn schedule(cx: &mut TaskContext<'_>, kind: LogisticsTimerKind, secs: f32) {
    let session = cx.logistics.session;
    cx.timers.schedule(secs, TimerCallback { kind, session });
}

/// 途中で打ち切る。保留中の完了通知は無効にする。
fn abort_transfer(cx: &mut TaskContext<'_>) {
    cx.logistics.next_session();
    cx.timers.clear();
    cx.logistics.transfer = None;
    cx.world.stop_moving();
}

fn node_alive(cx: &TaskContext<'_>, node: Entity) -> bool {
    node == cx.agent || cx.world.position_of(node).is_some()
}

fn node_position(cx: &TaskContext<'_>, node: Entity) -> Option<Vec3> {
    if node == cx.agent {
        Some(cx.world.agent_position())
    } else {
        cx.world.position_of(node)
    }
}

/// 現在地 → 各地点 → 先頭地点 の経路長
fn route_length(cx: &TaskContext<'_>, route: &[RouteStop]) -> f32 {
    let mut total = 0.0;
    let mut from = cx.world.agent_position();
    for stop in route.iter().chain(route.first()) {
        if let Some(pos) = node_position(cx, stop.node) {
            total += from.distance(pos);
            from = pos;
        }
    }
    total
}

//! 輸送を組み合わせた回収処理
//!
//! - 石材回収: 手持ちを倉庫へ納品 → 近いコンテナから順に倉庫へ運ぶ
//! - 弾薬補充: 近い保有者から上限まで受け取る
//! - 原料搬入: 生産施設の原料が足りなければ、手持ち → 倉庫/鉱石の順に運び込む
//!
//! やることが無いかどうかは `has_*` 系で事前に判定できる。タスクの検証で使い、
//! 何もしないタスクがプロシージャルの走査で現在タスクを奪わないようにする。

use bevy::prelude::*;

use super::transfer::{
    BulletRun, advance_transfer, claim_logistics, schedule, start_transfer,
};
use super::timers::LogisticsTimerKind;
use crate::constants::{BULLET_ITEM_ID, STONE_ITEM_ID};
use crate::systems::action_queue::{RouteStop, SourceFilter, TaskContext};

/// 呼び出し中のタスクが進行中の輸送を持っているか
fn owns_active_run(cx: &TaskContext<'_>) -> bool {
    cx.logistics.is_busy()
        && cx.logistics.owner().is_some()
        && cx.logistics.owner() == cx.current_task()
}

/// 手持ちの積み荷を自由に使えるか（他タスクの輸送中なら、それはその輸送の荷物）
fn hold_is_free(cx: &TaskContext<'_>) -> bool {
    !cx.logistics.is_busy() || owns_active_run(cx)
}

/// 石材回収にやることが残っているか
pub fn has_cargo_to_collect(cx: &TaskContext<'_>) -> bool {
    if owns_active_run(cx) {
        return true;
    }
    if hold_is_free(cx) && cx.world.item_quantity(cx.agent, STONE_ITEM_ID) > 0 {
        return true;
    }
    !cx.world
        .cargo_sources(STONE_ITEM_ID, SourceFilter::ContainersOnly)
        .is_empty()
}

/// 石材回収を1ティック進める。回収し尽くした（1パス完了）なら `true`。
///
/// 納品先が石材倉庫であることは呼び出し側（タスクの検証）で確認しておく。
pub fn collect_cargo(cx: &mut TaskContext<'_>, storage: Entity, delta_secs: f32) -> bool {
    claim_logistics(cx);

    // 手持ちの石材を先に納品する
    let carried = cx.world.item_quantity(cx.agent, STONE_ITEM_ID);
    if carried > 0 && !cx.logistics.self_delivery_done {
        if cx.logistics.transfer().is_none() {
            let route = [
                RouteStop::new(cx.agent).carrying(STONE_ITEM_ID, carried),
                RouteStop::new(storage),
            ];
            start_transfer(cx, &route);
        }
        if !advance_transfer(cx, delta_secs).is_done() {
            return false;
        }
        cx.logistics.self_delivery_done = true;
    }

    if cx.logistics.transfer().is_none() {
        let sources = cx
            .world
            .cargo_sources(STONE_ITEM_ID, SourceFilter::ContainersOnly);
        let Some(&source) = sources.first() else {
            debug!("COLLECT: {:?} no stone left to collect", cx.agent);
            cx.logistics.self_delivery_done = false;
            return true;
        };

        let quantity = cx.world.item_quantity(source, STONE_ITEM_ID);
        debug!(
            "COLLECT: {:?} next source {:?} ({} stone)",
            cx.agent, source, quantity
        );
        let route = [
            RouteStop::new(source).carrying(STONE_ITEM_ID, quantity),
            RouteStop::new(storage),
        ];
        start_transfer(cx, &route);
    }

    advance_transfer(cx, delta_secs);
    false
}

/// 弾薬補充を1ティック進める。上限に達したか、補充元が無くなれば `true`。
pub fn collect_bullets(cx: &mut TaskContext<'_>) -> bool {
    claim_logistics(cx);

    let max_carry = cx.config.max_bullet_carry;
    if cx.world.item_quantity(cx.agent, BULLET_ITEM_ID) >= max_carry {
        cx.logistics.bullets = None;
        return true;
    }

    let run = match cx.logistics.bullets {
        Some(run) => run,
        None => {
            let sources = cx.world.cargo_sources(BULLET_ITEM_ID, SourceFilter::Any);
            let Some(&source) = sources.first() else {
                debug!("COLLECT: {:?} no bullet holder found", cx.agent);
                return true;
            };
            cx.logistics.next_session();
            let run = BulletRun {
                source,
                pickup_pending: false,
            };
            cx.logistics.bullets = Some(run);
            run
        }
    };

    let Some(source_pos) = cx.world.position_of(run.source) else {
        info!("COLLECT: {:?} bullet source {:?} vanished", cx.agent, run.source);
        cx.logistics.bullets = None;
        cx.timers.clear();
        return true;
    };

    if !run.pickup_pending {
        if cx.world.item_quantity(run.source, BULLET_ITEM_ID) <= 0 {
            // 先に取られた: 次のティックで探し直す
            cx.logistics.bullets = None;
            return false;
        }
        if !cx.is_at(run.source) {
            cx.world.move_to(source_pos);
            return false;
        }
        cx.world.stop_moving();
        let secs = cx.config.bullet_pickup_duration_secs;
        schedule(cx, LogisticsTimerKind::BulletPickup, secs);
        if let Some(run) = cx.logistics.bullets.as_mut() {
            run.pickup_pending = true;
        }
    }
    false
}

/// 原料搬入の進み具合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSupply {
    /// 1サイクル分の原料がそろっている
    Ready,
    /// 搬入中
    Hauling,
    /// 手持ちにも搬入元にも原料が無い
    Unavailable,
}

/// 生産施設の近くから搬入元を探す（1サイクル分以上持っているノードだけ）
fn nearest_raw_source(
    cx: &TaskContext<'_>,
    production: Entity,
    filter: SourceFilter,
) -> Option<Entity> {
    let need = cx.config.production_need_per_cycle;
    let origin = cx.world.position_of(production)?;
    cx.world
        .cargo_sources(STONE_ITEM_ID, filter)
        .into_iter()
        .filter(|&source| {
            source != production && cx.world.item_quantity(source, STONE_ITEM_ID) >= need
        })
        .filter_map(|source| {
            let distance = cx.world.position_of(source)?.distance_squared(origin);
            Some((source, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(source, _)| source)
}

fn raw_material_source(cx: &TaskContext<'_>, production: Entity) -> Option<Entity> {
    let order = if cx.config.production_prefer_storage_first {
        [SourceFilter::StorageOnly, SourceFilter::OreOnly]
    } else {
        [SourceFilter::OreOnly, SourceFilter::StorageOnly]
    };
    order
        .into_iter()
        .find_map(|filter| nearest_raw_source(cx, production, filter))
}

/// 生産を続けられるだけの原料がどこかにあるか
pub fn has_raw_material(cx: &TaskContext<'_>, production: Entity) -> bool {
    let need = cx.config.production_need_per_cycle;
    owns_active_run(cx)
        || cx.world.item_quantity(production, STONE_ITEM_ID) >= need
        || (hold_is_free(cx) && cx.world.item_quantity(cx.agent, STONE_ITEM_ID) >= need)
        || raw_material_source(cx, production).is_some()
}

/// 生産施設の原料を1サイクル分そろえる
///
/// 手持ちに足りるだけあればそれを、無ければ最寄りの搬入元の在庫をまとめて運び込む。
pub fn supply_production(
    cx: &mut TaskContext<'_>,
    production: Entity,
    delta_secs: f32,
) -> RawSupply {
    claim_logistics(cx);

    if cx.logistics.transfer().is_some() && !advance_transfer(cx, delta_secs).is_done() {
        return RawSupply::Hauling;
    }

    let need = cx.config.production_need_per_cycle;
    if cx.world.item_quantity(production, STONE_ITEM_ID) >= need {
        return RawSupply::Ready;
    }

    let source = if cx.world.item_quantity(cx.agent, STONE_ITEM_ID) >= need {
        RouteStop::new(cx.agent).carrying(STONE_ITEM_ID, need)
    } else {
        let Some(source) = raw_material_source(cx, production) else {
            debug!("SUPPLY: {:?} no raw material for {:?}", cx.agent, production);
            return RawSupply::Unavailable;
        };
        let quantity = cx.world.item_quantity(source, STONE_ITEM_ID);
        RouteStop::new(source).carrying(STONE_ITEM_ID, quantity)
    };
    debug!(
        "SUPPLY: {:?} hauling raw material {:?} -> {:?}",
        cx.agent, source.node, production
    );

    cx.world.stop_interaction();
    start_transfer(cx, &[source, RouteStop::new(production)]);
    advance_transfer(cx, delta_secs);
    RawSupply::Hauling
}

/// 弾薬補充タイマーの満了処理
pub(crate) fn complete_bullet_pickup(cx: &mut TaskContext<'_>) -> bool {
    let Some(run) = cx.logistics.bullets.filter(|run| run.pickup_pending) else {
        return false;
    };

    let carried = cx.world.item_quantity(cx.agent, BULLET_ITEM_ID);
    let available = cx.world.item_quantity(run.source, BULLET_ITEM_ID);
    let take = available.min(cx.config.max_bullet_carry - carried).max(0);
    if take > 0 && cx.world.modify_item_quantity(run.source, BULLET_ITEM_ID, -take) {
        cx.world.modify_item_quantity(cx.agent, BULLET_ITEM_ID, take);
    }
    debug!(
        "COLLECT: {:?} took {} bullet(s) from {:?}",
        cx.agent, take, run.source
    );

    // 次の呼び出しで補充元を探し直す
    cx.logistics.bullets = None;
    true
}

//! アクションキュー・物流タスクの調整用定数
//!
//! 実行時に変えたい値は `ActionQueueConfig` リソース経由で上書きする。
//! ここにあるのはそのデフォルト値。

// ============================================================
// 移動 (Movement)
// ============================================================

/// エージェントの移動速度 (ワールド単位/秒)
pub const AGENT_MOVE_SPEED: f32 = 200.0;

/// 目的地に「到着した」とみなす距離
pub const ARRIVE_RADIUS: f32 = 8.0;

/// ノード（倉庫・鉱石など）のインタラクション半径
/// この距離以内にいれば「ノードに接触している」と判定する
pub const NODE_INTERACTION_RADIUS: f32 = 48.0;

// ============================================================
// 物流 (Logistics)
// ============================================================

/// 積み込みアニメーションの長さ (秒)
pub const PICKUP_DURATION_SECS: f32 = 1.0;
/// 荷下ろしアニメーションの長さ (秒)
pub const DROPOFF_DURATION_SECS: f32 = 1.0;
/// 弾薬補充アニメーションの長さ (秒)
pub const BULLET_PICKUP_DURATION_SECS: f32 = 1.5;

/// 輸送タイムアウトの基本値 (秒)
pub const TRANSFER_TIMEOUT_BASE_SECS: f32 = 10.0;
/// 輸送タイムアウトの経路距離あたりの加算値 (秒/ワールド単位)
pub const TRANSFER_TIMEOUT_SECS_PER_DISTANCE: f32 = 0.05;

/// 石材のアイテムID
pub const STONE_ITEM_ID: u32 = 2;
/// 弾薬のアイテムID
pub const BULLET_ITEM_ID: u32 = 3;
/// 弾薬の最大携行数
pub const MAX_BULLET_CARRY: i32 = 300;

// ============================================================
// 戦闘・作業 (Combat / Work)
// ============================================================

/// 攻撃可能距離
pub const ATTACK_RANGE: f32 = 400.0;
/// 攻撃間隔 (秒)
pub const ATTACK_INTERVAL_SECS: f32 = 1.0;
/// 1回の攻撃で与えるダメージ
pub const ATTACK_DAMAGE: f32 = 10.0;

/// 採掘・生産の1サイクルにかかる時間 (秒)
pub const INTERACT_CYCLE_SECS: f32 = 1.0;
/// 生産施設が1サイクルで消費する原料数
pub const PRODUCTION_NEED_PER_CYCLE: i32 = 2;
/// 原料の搬入元: `true` なら倉庫を先に探し、無ければ鉱石
pub const PRODUCTION_PREFER_STORAGE_FIRST: bool = true;

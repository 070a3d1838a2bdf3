//! キューの保存と復元
//!
//! キュー自体は何も保存しない。各タスクが持つ `TaskParams` を並び順どおりに集め、
//! 復元時は同じファクトリに渡して組み立て直す。

use bevy::prelude::*;
use thiserror::Error;

use super::factories::{FactoryError, TaskFactory};
use crate::systems::action_queue::{
    ActionQueue, InsertIndex, QueueKind, QueueSnapshot, SavedTask, TaskContext,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("task '{name}' references {entity:?}, which has no counterpart after loading")]
    UnmappedEntity { name: String, entity: Entity },
    #[error("task '{name}' could not be rebuilt: {source}")]
    Factory {
        name: String,
        #[source]
        source: FactoryError,
    },
}

pub fn snapshot_queue(queue: &ActionQueue) -> QueueSnapshot {
    let collect = |kind: QueueKind| -> Vec<SavedTask> {
        queue
            .queue(kind)
            .iter()
            .map(|task| SavedTask {
                name: task.name().to_string(),
                params: task.params().clone(),
            })
            .collect()
    };
    QueueSnapshot {
        real_time: collect(QueueKind::RealTime),
        procedural: collect(QueueKind::Procedural),
    }
}

/// スナップショットからキューを組み立て直す
///
/// 既存のタスクはすべて取り除いてから復元する。どれか1つでも失敗したら
/// それまでに入れたものも取り除き、空のキューのまま `Err` を返す。
pub fn restore_queue(
    queue: &mut ActionQueue,
    cx: &mut TaskContext<'_>,
    factory: &TaskFactory,
    snapshot: &QueueSnapshot,
    mut remap: impl FnMut(Entity) -> Option<Entity>,
) -> Result<(), RestoreError> {
    queue.remove_all(cx, None);

    let sections = [
        (QueueKind::RealTime, &snapshot.real_time),
        (QueueKind::Procedural, &snapshot.procedural),
    ];
    for (kind, saved) in sections {
        for task in saved {
            let built = task
                .params
                .remap(&mut remap)
                .map_err(|entity| RestoreError::UnmappedEntity {
                    name: task.name.clone(),
                    entity,
                })
                .and_then(|params| {
                    factory
                        .from_params(task.name.clone(), &params)
                        .map_err(|source| RestoreError::Factory {
                            name: task.name.clone(),
                            source,
                        })
                });
            match built {
                Ok(descriptor) => {
                    queue.insert(descriptor, kind, InsertIndex::Append);
                }
                Err(err) => {
                    warn!("ACTION_QUEUE: {:?} restore failed: {}", cx.agent, err);
                    queue.remove_all(cx, None);
                    return Err(err);
                }
            }
        }
    }

    info!(
        "ACTION_QUEUE: {:?} restored {} real-time / {} procedural task(s)",
        cx.agent,
        snapshot.real_time.len(),
        snapshot.procedural.len()
    );
    Ok(())
}

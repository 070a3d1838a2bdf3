//! アクションキューのティックシステム
//!
//! エージェントごとに以下の順で処理する:
//! 1. 受信したキュー操作要求を適用
//! 2. 遅延タイマーを進め、満了したコールバックを反映
//! 3. キューを配分（プロシージャル → リアルタイム）
//! 4. 変化を Message として通知

use bevy::prelude::*;
use std::collections::HashMap;

use super::config::ActionQueueConfig;
use super::context::TaskContext;
use super::scheduler::ActionQueue;
use super::status::ActionQueueStatusView;
use crate::entities::agent::world_view::{
    AgentWorldView, NodeQuery, TargetInfo, TargetSnapshot, target_state_of,
};
use crate::entities::agent::{
    AgentCapabilities, Health, Interactable, MoveTarget, TaskFactory, WorkProgress,
};
use crate::events::{
    ActionQueueChanged, ActionQueueCommand, ActionQueueRequest, DamageRequest,
    TaskCategoryChanged, TaskNameChanged,
};
use crate::systems::logistics::{
    CargoHold, CargoLogistics, CargoNode, DeferredTimers, on_timer_fired,
};

pub type AgentTickQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static Transform,
        &'static mut ActionQueue,
        &'static mut CargoLogistics,
        &'static mut DeferredTimers,
        &'static mut CargoHold,
        &'static mut MoveTarget,
        &'static mut WorkProgress,
        &'static AgentCapabilities,
        Option<&'static mut ActionQueueStatusView>,
    ),
>;

pub type TargetQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static Transform,
        Option<&'static Health>,
        Option<&'static Interactable>,
        Option<&'static CargoNode>,
    ),
>;

#[allow(clippy::too_many_arguments)]
pub fn action_queue_tick_system(
    time: Res<Time>,
    config: Res<ActionQueueConfig>,
    mut ev_requests: MessageReader<ActionQueueRequest>,
    mut ev_category: MessageWriter<TaskCategoryChanged>,
    mut ev_name: MessageWriter<TaskNameChanged>,
    mut ev_queue: MessageWriter<ActionQueueChanged>,
    mut ev_damage: MessageWriter<DamageRequest>,
    q_targets: TargetQuery,
    mut q_agents: AgentTickQuery,
    mut q_nodes: NodeQuery,
) {
    let delta = time.delta();
    let delta_secs = time.delta_secs();
    let config: &ActionQueueConfig = &config;

    let mut requests: HashMap<Entity, Vec<ActionQueueCommand>> = HashMap::new();
    for request in ev_requests.read() {
        requests
            .entry(request.agent)
            .or_default()
            .push(request.command.clone());
    }

    let mut snapshot = TargetSnapshot::default();
    for (entity, transform, health, interactable, node) in q_targets.iter() {
        snapshot.insert(
            entity,
            TargetInfo {
                position: transform.translation,
                state: target_state_of(health, interactable),
                node_kind: node.map(|n| n.kind),
            },
        );
    }

    let mut damage = Vec::new();
    for (
        agent,
        transform,
        mut queue,
        mut logistics,
        mut timers,
        mut hold,
        mut move_target,
        mut work,
        capabilities,
        view,
    ) in q_agents.iter_mut()
    {
        let mut world = AgentWorldView {
            agent,
            position: transform.translation,
            hold: &mut hold,
            move_target: &mut move_target,
            work: &mut work,
            nodes: &mut q_nodes,
            targets: &snapshot,
            config,
            damage: &mut damage,
        };
        let mut cx = TaskContext::new(agent, &mut world, &mut logistics, &mut timers, config);

        if let Some(commands) = requests.remove(&agent) {
            let factory = TaskFactory::new(*capabilities);
            for command in commands {
                apply_command(&mut queue, &mut cx, &factory, command);
            }
        }

        for callback in cx.timers.tick(delta) {
            on_timer_fired(&mut cx, callback);
        }

        let outcome = queue.tick(&mut cx, delta_secs);

        if let Some(mut view) = view {
            view.refresh(&queue, &mut cx);
        }

        for (kind, change) in queue.drain_changes() {
            ev_queue.write(ActionQueueChanged {
                agent,
                queue: kind,
                change,
            });
        }
        if let Some((previous, current)) = outcome.category_changed {
            debug!(
                "ACTION_QUEUE: {:?} category {:?} -> {:?}",
                agent, previous, current
            );
            ev_category.write(TaskCategoryChanged {
                agent,
                previous,
                current,
            });
        }
        if let Some((previous, current)) = outcome.name_changed {
            info!("ACTION_QUEUE: {:?} now '{}' (was '{}')", agent, current, previous);
            ev_name.write(TaskNameChanged {
                agent,
                previous,
                current,
            });
        }
    }

    for (agent, commands) in requests {
        warn!(
            "ACTION_QUEUE: dropped {} request(s) for {:?} (no action queue)",
            commands.len(),
            agent
        );
    }
    for request in damage {
        ev_damage.write(request);
    }
}

fn apply_command(
    action_queue: &mut ActionQueue,
    cx: &mut TaskContext<'_>,
    factory: &TaskFactory,
    command: ActionQueueCommand,
) {
    match command {
        ActionQueueCommand::Insert {
            name,
            params,
            queue,
            index,
        } => match factory.from_params(name, &params) {
            Ok(task) => {
                debug!(
                    "ACTION_QUEUE: {:?} queued '{}' ({:?}) into {:?}",
                    cx.agent,
                    task.name(),
                    task.category(),
                    queue
                );
                action_queue.insert(task, queue, index);
            }
            Err(err) => warn!("ACTION_QUEUE: {:?} rejected task: {}", cx.agent, err),
        },
        ActionQueueCommand::RemoveAll { except } => {
            action_queue.remove_all(cx, except.as_deref());
        }
        ActionQueueCommand::RemoveProceduralAt { index } => {
            action_queue.remove_procedural_at(cx, index);
        }
        ActionQueueCommand::ReorderProcedural { dragged, drop } => {
            action_queue.reorder_procedural(dragged, drop);
        }
    }
}

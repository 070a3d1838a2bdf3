use bevy::prelude::*;

use crate::events::{
    ActionQueueChanged, ActionQueueRequest, DamageRequest, TaskCategoryChanged, TaskNameChanged,
};

pub struct MessagesPlugin;

impl Plugin for MessagesPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<ActionQueueRequest>()
            .add_message::<ActionQueueChanged>()
            .add_message::<TaskCategoryChanged>()
            .add_message::<TaskNameChanged>()
            .add_message::<DamageRequest>();
    }
}

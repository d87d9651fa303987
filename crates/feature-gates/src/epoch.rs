//! Epoch schedule arithmetic
//!
//! Clusters start with a warm-up period where epoch `n` lasts `32 * 2^n` slots.
//! Once `first_normal_epoch` is reached every epoch is `slots_per_epoch` long.

use serde::{Deserialize, Serialize};

/// Length of epoch 0 during warm-up
pub const MINIMUM_SLOTS_PER_EPOCH: u64 = 32;

/// Epoch schedule as reported by `getEpochSchedule`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochSchedule {
    /// The maximum number of slots in each epoch
    pub slots_per_epoch: u64,
    #[serde(default)]
    pub leader_schedule_slot_offset: u64,
    /// Whether the cluster started with shortened warm-up epochs
    #[serde(default)]
    pub warmup: bool,
    /// The first epoch with `slots_per_epoch` slots
    pub first_normal_epoch: u64,
    /// The first slot of `first_normal_epoch`
    pub first_normal_slot: u64,
}

impl EpochSchedule {
    /// Schedule without warm-up: every epoch has `slots_per_epoch` slots.
    pub fn without_warmup(slots_per_epoch: u64) -> Self {
        Self {
            slots_per_epoch,
            leader_schedule_slot_offset: slots_per_epoch,
            warmup: false,
            first_normal_epoch: 0,
            first_normal_slot: 0,
        }
    }
}

/// Returns the epoch that contains `slot`.
pub fn epoch_for_slot(schedule: &EpochSchedule, slot: u64) -> u64 {
    if slot < schedule.first_normal_slot {
        // Warm-up epoch `e` covers [32 * (2^e - 1), 32 * (2^(e+1) - 1)), so the
        // power of two just above `slot + 32` identifies it.
        let bound = slot
            .saturating_add(MINIMUM_SLOTS_PER_EPOCH)
            .saturating_add(1)
            .next_power_of_two();
        u64::from(bound.trailing_zeros())
            .saturating_sub(u64::from(MINIMUM_SLOTS_PER_EPOCH.trailing_zeros()))
            .saturating_sub(1)
    } else {
        let normal_slot_index = slot - schedule.first_normal_slot;
        let slots_per_epoch = schedule.slots_per_epoch.max(1);
        schedule.first_normal_epoch + normal_slot_index / slots_per_epoch
    }
}

/// Returns the first slot of `epoch`.
pub fn first_slot_in_epoch(schedule: &EpochSchedule, epoch: u64) -> u64 {
    if epoch <= schedule.first_normal_epoch {
        let factor = 1u64.checked_shl(epoch as u32).unwrap_or(u64::MAX);
        factor.saturating_sub(1).saturating_mul(MINIMUM_SLOTS_PER_EPOCH)
    } else {
        (epoch - schedule.first_normal_epoch)
            .saturating_mul(schedule.slots_per_epoch)
            .saturating_add(schedule.first_normal_slot)
    }
}

/// Returns the last slot of `epoch`.
pub fn last_slot_in_epoch(schedule: &EpochSchedule, epoch: u64) -> u64 {
    first_slot_in_epoch(schedule, epoch + 1).saturating_sub(1)
}

/// Number of slots in `epoch`.
pub fn slots_in_epoch(schedule: &EpochSchedule, epoch: u64) -> u64 {
    if epoch < schedule.first_normal_epoch {
        1u64.checked_shl(epoch as u32)
            .unwrap_or(u64::MAX)
            .saturating_mul(MINIMUM_SLOTS_PER_EPOCH)
    } else {
        schedule.slots_per_epoch
    }
}

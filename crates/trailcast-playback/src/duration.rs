//! Adaptive animation duration.
//!
//! With stacking enabled an agent can fall behind its producer. The more
//! batches wait behind the playing one, the shorter each batch's window:
//!
//! ```text
//! duration = base / (max(log2(total_steps), backlog_floor) + tier bonuses)
//! ```
//!
//! where `total_steps` counts points across every held batch and a tier
//! bonus applies when the number of waiting batches exceeds its
//! threshold. With stacking disabled, or nothing waiting, the window is
//! `base`. Adding a batch never lengthens the window.

use crate::config::PlaybackConfig;

/// Animation window in milliseconds for an agent whose held batches have
/// the given path lengths (playing batch first).
pub fn animation_duration_ms<I>(config: &PlaybackConfig, batch_lengths: I) -> f64
where
    I: IntoIterator<Item = usize>,
{
    let (count, total_steps) = batch_lengths
        .into_iter()
        .fold((0_usize, 0_usize), |(count, steps), len| {
            (count.saturating_add(1), steps.saturating_add(len))
        });
    let waiting = count.saturating_sub(1);
    if !config.stacking_enabled || waiting == 0 {
        return config.base_duration_ms;
    }

    let log_steps = count_to_f64(total_steps).log2();
    let bonus: f64 = config
        .backlog_tiers
        .iter()
        .filter(|tier| waiting > tier.above)
        .map(|tier| tier.bonus)
        .sum();
    let divisor = log_steps.max(config.backlog_floor) + bonus;
    config.base_duration_ms / divisor.max(1.0)
}

fn count_to_f64(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}

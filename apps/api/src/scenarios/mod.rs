// What-if scenario sweeps over the prediction engine.

pub mod handlers;
pub mod sweep;

// Side-by-side institution comparison.
// Reuses the prediction comparators for admission chance; everything else is
// derived from catalog cost and outcome fields.

pub mod engine;
pub mod handlers;
pub mod rules;

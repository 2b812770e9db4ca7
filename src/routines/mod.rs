// Routines for the IF2 cooling schedule
pub mod cooling;
// Routines for starting designs
pub mod initialization;
// Routines for logging
pub mod logger;
// Numerically stable log-scale arithmetic
pub mod math;
// Routines for output
pub mod output;
// Routines for resampling
pub mod resampling;
// Random-number streams
pub mod rng;
// Routines for settings
pub mod settings;
// Forward simulation
pub mod simulation;

pub mod cyclic_interval;
pub mod objective_weights;
pub mod road;
pub mod subblock;
pub mod vessel;
pub mod vessel_period;
pub mod yard_problem;

/// A discrete step on the cyclic planning horizon.
pub type TimeStep = i64;
/// A number of containers.
pub type Quantity = u32;
pub type Distance = f64;
pub type Cost = f64;

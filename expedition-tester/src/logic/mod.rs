pub mod policy;
pub mod reports;
pub mod runner;
pub mod sim_server;
pub mod tester;

pub use policy::ExplorerStrategy;
pub use runner::{ExpeditionPlan, RunSummary, default_team};
pub use sim_server::{FaultPlan, MapSpec, SimulatedServer};
pub use tester::*;

pub mod report;
pub mod scenario;

pub use report::SimulationReport;
pub use scenario::{Scenario, Simulation, Step};

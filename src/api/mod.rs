pub mod cli;

pub use cli::{
    simulation_lines, startup_lines, Cli, CliHandler, Commands, CursorsArgs, SimulateArgs,
    TrackArgs, TrackPlan,
};

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod actions;
pub mod context;
pub mod dates;
pub mod forms;
pub mod gateway;
pub mod ids;
pub mod listing;
pub mod model;
pub mod paging;
pub mod state;
pub mod stats;
pub mod suggest;

pub use context::*;
pub use gateway::*;
pub use ids::*;
pub use model::*;
pub use state::*;

pub mod barnes_hut;
pub mod collisions;
pub mod engine;
pub mod forces;
pub mod integrator;
pub mod states;

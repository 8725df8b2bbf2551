/// generic combustion chamber: per-atom reaction balance of the fuels of the fluid set
#[allow(non_snake_case)]
pub mod CombustionChamber;
/// combustion chamber working on a declared fuel mixture, air and their stoichiometric flue gas
#[allow(non_snake_case)]
pub mod CombustionChamberStoich;
/// combustion engine with two cooling loops and part-load characteristic lines
#[allow(non_snake_case)]
pub mod CombustionEngine;
#[allow(non_snake_case)]
pub mod ConvergenceHeuristics;
#[allow(non_snake_case)]
pub mod EnergyBalance;
/// centred finite differences of component residuals
#[allow(non_snake_case)]
pub mod NumericDeriv;
#[allow(non_snake_case)]
pub mod ReactionBalance;
/// component trait, Jacobian block, errors and the dispatch enum
pub mod component_api;
#[allow(non_snake_case)]
pub mod stoich_tests;

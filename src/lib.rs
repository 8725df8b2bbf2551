#[allow(non_snake_case)]
pub mod Components;
#[allow(non_snake_case)]
pub mod Examples;
#[allow(non_snake_case)]
pub mod Network;
#[allow(non_snake_case)]
pub mod Thermodynamics;

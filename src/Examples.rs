/// demo scenarios: generic chamber, stoichiometric chamber, combustion engine and an engine
/// read from a JSON task
pub mod combustion_examples;

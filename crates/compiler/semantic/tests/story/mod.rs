mod caller_kinds;
mod goals;
mod guids;
mod inference;
mod parameters;
mod properties;
mod unresolved;

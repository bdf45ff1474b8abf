mod common;
mod parser;

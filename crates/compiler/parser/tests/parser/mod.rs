mod properties;
mod recovery;
mod rules;

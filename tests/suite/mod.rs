mod commands;
mod parse_stream;
mod runner;

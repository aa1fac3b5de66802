mod aof;
mod config;
mod engine;

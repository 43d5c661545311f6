// Test modules

pub mod common;
mod ask_test;
mod execution_router_test;
mod models_test;
mod query_compiler_test;
mod relationship_test;

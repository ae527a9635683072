/*
 * Responsibility
 * - v1 のエントリポイント (routes() を re-export)
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;

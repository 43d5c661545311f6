pub mod ask;
pub mod cache_admin;
pub mod chart_data;
pub mod relationships;

pub mod domain;
pub mod geo_utils;
pub mod ids;
pub mod settings;
pub mod similarity;
pub mod stop_grid;

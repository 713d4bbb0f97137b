pub mod layer;
pub mod region;

// Re-export main types
pub use layer::Layer;
pub use region::Region;

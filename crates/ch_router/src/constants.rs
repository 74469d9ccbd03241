/// Edge weight type
pub type Weight = f64;
/// Opaque reference into an external tag store
pub type TagId = u32;

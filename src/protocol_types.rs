pub(crate) mod compound;
pub(crate) mod primitives;
pub(crate) mod traits;
